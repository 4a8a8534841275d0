use base64::{Engine as _, engine::general_purpose};
use chrono::TimeZone;
use lettre::Address;
use std::fmt::Display;

use crate::domain::post::Post;

pub fn subject(post: &Post) -> String {
    format!("New post from {}", post.author)
}

/// Message body: timestamp, author, text and permalink, one per line. The
/// text arrives HTML-escaped from the feed and is decoded here.
pub fn render_text<Tz>(post: &Post, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}\n@{}\n{}\n{}",
        post.timestamp.with_timezone(tz).to_rfc2822(),
        post.author,
        html_escape::decode_html_entities(&post.text),
        post.permalink,
    )
}

/// Full RFC 5322 message: `To`, `Subject` and `Content-Type` headers followed
/// by the body with CRLF line endings.
pub fn compose_message(to: &[Address], subject: &str, body: &str) -> String {
    let to = to
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!(
        "To: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n",
        to,
        encode_header(subject),
    );
    for line in body.lines() {
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

/// Header-safe value: control characters are dropped and non-ASCII text is
/// wrapped as an RFC 2047 encoded-word.
fn encode_header(value: &str) -> String {
    let clean: String = value.chars().filter(|c| !c.is_control()).collect();
    if clean.is_ascii() {
        clean
    } else {
        format!("=?UTF-8?B?{}?=", general_purpose::STANDARD.encode(clean.as_bytes()))
    }
}
