use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::session_store::CookieFormat;
use crate::domain::cookie::{Cookie, CookieJar};
use crate::error::StorageError;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Foreign encoding: the tab-separated `cookies.txt` jar exported by browser
/// extensions and curl.
#[derive(Debug, Clone)]
pub struct NetscapeCookies {
    path: PathBuf,
}

impl NetscapeCookies {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CookieFormat for NetscapeCookies {
    fn name(&self) -> &'static str {
        "netscape"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<CookieJar>, StorageError> {
        let s = fs::read_to_string(&self.path).map_err(|e| StorageError::io(&self.path, e))?;
        parse(&self.path, &s).map(Some)
    }
}

/// Parse a whole jar. Any bad line fails the load.
pub fn parse(path: &Path, text: &str) -> Result<CookieJar, StorageError> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| parse_line(line).map(|r| (i + 1, r)))
        .map(|(line, r)| {
            r.map_err(|reason| StorageError::MalformedCookies {
                path: path.to_path_buf(),
                line,
                reason,
            })
        })
        .collect()
}

/// `None` for blank and comment lines.
fn parse_line(raw: &str) -> Option<Result<Cookie, String>> {
    let line = raw.trim_end_matches(['\r', '\n']);
    let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
        Some(rest) => (rest, true),
        None => (line, false),
    };
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 6 || fields.len() > 7 {
        return Some(Err(format!("expected 7 tab-separated fields, got {}", fields.len())));
    }

    Some(parse_fields(&fields, http_only))
}

fn parse_fields(fields: &[&str], http_only: bool) -> Result<Cookie, String> {
    let domain = fields[0].to_string();
    // Subdomain flag is implied by the leading dot on the domain.
    parse_flag(fields[1])?;
    let path = fields[2].to_string();
    let secure = parse_flag(fields[3])?;
    let expiration = parse_expiry(fields[4])?;
    let name = fields[5].to_string();
    let value = fields.get(6).copied().unwrap_or_default().to_string();

    if name.is_empty() {
        return Err("empty cookie name".to_string());
    }

    Ok(Cookie {
        name,
        value,
        domain,
        path,
        expiration,
        secure,
        http_only,
    })
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s.to_ascii_uppercase().as_str() {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        other => Err(format!("expected TRUE or FALSE, got {other:?}")),
    }
}

/// `0` marks a session cookie; a negative value is already expired. Some
/// exporters write fractional seconds.
fn parse_expiry(s: &str) -> Result<Option<i64>, String> {
    let secs = match s.parse::<i64>() {
        Ok(v) => v,
        Err(_) => s
            .parse::<f64>()
            .map(|f| f as i64)
            .map_err(|_| format!("bad expiration {s:?}"))?,
    };
    Ok((secs != 0).then_some(secs))
}
