//! いいね件数ラベルの解析
//!
//! "23,3 B Beğeni" のような省略表記は千単位として扱う。
//! 解析できなければ 0（件数不明）。

use tracing::debug;

/// 件数ラベルを整数に変換。失敗時は 0
pub fn parse_expected_count(label: &str) -> u64 {
    let Some(token) = first_numeric_token(label) else {
        debug!("No numeric token in count label: {:?}", label);
        return 0;
    };

    let groups: Vec<&str> = token.split([',', '.']).collect();
    let count = match groups.as_slice() {
        // 区切りの後に1桁だけ → 千単位 (23,3 → 23300)
        [whole, fraction] if fraction.len() == 1 => whole
            .parse::<u64>()
            .ok()
            .and_then(|w| w.checked_mul(1000))
            .zip(fraction.parse::<u64>().ok())
            .and_then(|(w, f)| w.checked_add(f * 100)),
        _ => groups.concat().parse::<u64>().ok(),
    };

    let count = count.unwrap_or(0);
    debug!("Parsed expected count {} from {:?}", count, token);
    count
}

/// 最初の数字列（間の `,` `.` を含む）
fn first_numeric_token(label: &str) -> Option<&str> {
    let start = label.find(|c: char| c.is_ascii_digit())?;
    let rest = &label[start..];
    let bytes = rest.as_bytes();

    let mut end = 0;
    while end < bytes.len() {
        let b = bytes[end];
        let is_separator = (b == b',' || b == b'.')
            && bytes.get(end + 1).is_some_and(|next| next.is_ascii_digit());
        if b.is_ascii_digit() || is_separator {
            end += 1;
        } else {
            break;
        }
    }

    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviated_thousands() {
        assert_eq!(parse_expected_count("23,3 B Beğeni"), 23300);
        assert_eq!(parse_expected_count("1.5K Likes"), 1500);
    }

    #[test]
    fn test_plain_integer() {
        assert_eq!(parse_expected_count("1234 Likes"), 1234);
        assert_eq!(parse_expected_count("Likes: 87"), 87);
    }

    #[test]
    fn test_grouping_separators() {
        assert_eq!(parse_expected_count("1,234 Likes"), 1234);
        assert_eq!(parse_expected_count("1.234.567 Beğeni"), 1_234_567);
    }

    #[test]
    fn test_unparseable_is_zero() {
        assert_eq!(parse_expected_count("Likes"), 0);
        assert_eq!(parse_expected_count(""), 0);
        assert_eq!(parse_expected_count("99999999999999999999999 Likes"), 0);
    }

    #[test]
    fn test_trailing_separator_ignored() {
        assert_eq!(parse_expected_count("42. Likes"), 42);
    }
}
