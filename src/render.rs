//! 収集したポストを単体の HTML ページに書き出す

use chrono::{DateTime, NaiveDate, Utc};
use maud::{html, Markup, PreEscaped, Render, DOCTYPE};

use crate::types::Post;

const PAGE_TITLE: &str = "Liked posts";

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; background: #0b0d10; color: #e7e9ea; line-height: 1.55; }
a { color: inherit; text-decoration: none; }
.header { background: #15181c; border-bottom: 1px solid #2f3336; padding: 20px; text-align: center; }
.header h1 { color: #1d9bf0; font-size: 26px; margin-bottom: 6px; }
.header p, .post-meta, .username, .footer { color: #8b98a5; }
.container { max-width: 640px; margin: 0 auto; padding: 16px; }
.stats, .post { background: #15181c; border: 1px solid #2f3336; border-radius: 12px; padding: 16px; margin-bottom: 14px; }
.stats { text-align: center; }
.stats h2 { color: #1d9bf0; font-size: 18px; margin-bottom: 6px; }
.post { display: block; overflow-wrap: anywhere; }
.post:hover { border-color: #1d9bf0; }
.post-header { display: flex; gap: 10px; align-items: center; margin-bottom: 10px; }
.avatar { width: 40px; height: 40px; border-radius: 50%; background: #2f3336; flex-shrink: 0; }
.user-info { min-width: 0; }
.display-name { font-weight: 600; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }
.post-content { white-space: pre-wrap; margin-bottom: 10px; }
.post-media img { display: block; max-width: 100%; border-radius: 8px; margin-bottom: 6px; }
.post-meta { font-size: 13px; }
.footer { text-align: center; border-top: 1px solid #2f3336; padding: 24px 16px; font-size: 13px; }
"#;

/// ポスト1件のカード（元ポストへのリンク）
struct PostCard<'a> {
    post: &'a Post,
}

impl Render for PostCard<'_> {
    fn render(&self) -> Markup {
        let post = self.post;

        html! {
            a class="post" href=(post.url) target="_blank" rel="noopener noreferrer" {
                div class="post-header" {
                    @if let Some(avatar) = &post.avatar {
                        img class="avatar" src=(avatar) alt="" loading="lazy";
                    } @else {
                        div class="avatar" {}
                    }
                    div class="user-info" {
                        div class="display-name" { (post.display_name) }
                        div class="username" { "@" (post.username) }
                    }
                }
                @if !post.content.is_empty() {
                    div class="post-content" { (post.content) }
                }
                @if !post.media.is_empty() {
                    div class="post-media" {
                        @for src in &post.media {
                            img src=(src) alt="Post media" loading="lazy";
                        }
                    }
                }
                div class="post-meta" { (authored_at(post.timestamp.as_deref())) }
            }
        }
    }
}

/// 投稿日時の表示。解釈できなければ "Date unknown"
fn authored_at(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "Date unknown".to_string())
}

/// ポスト一覧を単体で開ける HTML にする
pub fn render_html(posts: &[Post], generated_at: DateTime<Utc>) -> String {
    let date = generated_at.format("%Y-%m-%d").to_string();

    let page = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (PAGE_TITLE) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                header class="header" {
                    h1 { (PAGE_TITLE) }
                    p { (posts.len()) " posts, exported " (date) }
                }
                main class="container" {
                    section class="stats" {
                        h2 { "Collection" }
                        p { "Total liked posts: " strong { (posts.len()) } }
                        p { "Export date: " strong { (date) } }
                    }
                    @for post in posts {
                        (PostCard { post })
                    }
                }
                footer class="footer" {
                    p { "Generated " (generated_at.to_rfc3339()) }
                }
            }
        }
    };

    page.into_string()
}

/// 書き出しファイル名（`likes-YYYY-MM-DD.html`）
pub fn export_file_name(date: NaiveDate) -> String {
    format!("likes-{}.html", date.format("%Y-%m-%d"))
}
