//! ページ内で実行する JavaScript
//!
//! 要素ごとのスクリプトは `this` にポストノードが束縛される関数宣言。
//! 値がない場合は必ず `null` を返す。

use crate::traits::PostField;

pub const POST_SELECTOR: &str = r#"article[data-testid="tweet"]"#;

pub const POST_COUNT: &str = r#"document.querySelectorAll('article[data-testid="tweet"]').length"#;

const PERMALINK: &str = r#"function() {
    const time = this.querySelector('time');
    const link = time ? time.closest('a') : null;
    if (link && link.href) return link.href;
    const status = this.querySelector('a[href*="/status/"]');
    return status ? status.href : null;
}"#;

const PROFILE_LINK: &str = r#"function() {
    const link = this.querySelector('[data-testid="User-Name"] a[role="link"]')
        || this.querySelector('a[role="link"]');
    return link ? link.href : null;
}"#;

const DISPLAY_NAME: &str = r#"function() {
    const name = this.querySelector('[data-testid="User-Name"] span');
    return name ? name.textContent : null;
}"#;

const AVATAR: &str = r#"function() {
    const img = this.querySelector('[data-testid="Tweet-User-Avatar"] img')
        || this.querySelector('img[alt]');
    return img ? img.src : null;
}"#;

const CONTENT: &str = r#"function() {
    const text = this.querySelector('[data-testid="tweetText"]');
    return text ? text.textContent : null;
}"#;

// 配列はリモートオブジェクトになるため JSON 文字列で返す
const MEDIA: &str = r#"function() {
    const imgs = Array.from(this.querySelectorAll('[data-testid="tweetPhoto"] img'));
    return JSON.stringify(imgs.map((img) => img.src).filter((src) => !!src));
}"#;

const TIMESTAMP: &str = r#"function() {
    const time = this.querySelector('time');
    return time ? time.getAttribute('datetime') : null;
}"#;

pub fn field_script(field: PostField) -> &'static str {
    match field {
        PostField::Permalink => PERMALINK,
        PostField::ProfileLink => PROFILE_LINK,
        PostField::DisplayName => DISPLAY_NAME,
        PostField::Avatar => AVATAR,
        PostField::Content => CONTENT,
        PostField::Media => MEDIA,
        PostField::Timestamp => TIMESTAMP,
    }
}

pub const SCROLL_METRICS: &str = r#"(() => {
    const doc = document.documentElement;
    const body = document.body;
    return {
        scrollHeight: Math.max(doc ? doc.scrollHeight : 0, body ? body.scrollHeight : 0),
        scrollTop: Math.max(
            window.pageYOffset || 0,
            doc ? doc.scrollTop || 0 : 0,
            body ? body.scrollTop || 0 : 0
        ),
        viewportHeight: window.innerHeight || 0
    };
})()"#;

// ページによって効く方法が違うので3通りとも実行する
pub const SCROLL_TO_BOTTOM: &str = r#"(() => {
    const doc = document.documentElement;
    const body = document.body;
    const height = Math.max(doc ? doc.scrollHeight : 0, body ? body.scrollHeight : 0);
    window.scrollTo(0, height);
    if (doc) doc.scrollTop = height;
    if (body) body.scrollTop = height;
    return true;
})()"#;

pub const EXPECTED_COUNT_LABEL: &str = r#"(() => {
    const xpath = '/html/body/div[1]/div/div/div[2]/main/div/div/div/div[1]/div/div[1]/div[1]/div/div/div/div/div/div[2]/div/div';
    const found = document.evaluate(xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    if (found) return found.textContent;

    const fallbacks = [
        ['[data-testid="UserProfileHeader_Items"] div', 'Beğeni'],
        ['[data-testid="UserProfileHeader_Items"] div', 'Likes'],
        ['div[role="tablist"] div', 'Beğeni'],
        ['div[role="tablist"] div', 'Likes'],
    ];
    for (const [selector, text] of fallbacks) {
        const el = Array.from(document.querySelectorAll(selector))
            .find((candidate) => (candidate.textContent || '').includes(text));
        if (el) return el.textContent;
    }
    return null;
})()"#;
