use serde::{Deserialize, Serialize};

/// A single session token, in the shape it is persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Expiry as epoch seconds; `None` for session cookies.
    #[serde(default)]
    pub expiration: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            expiration: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn is_expired(&self, now_epoch: i64) -> bool {
        matches!(self.expiration, Some(exp) if exp <= now_epoch)
    }

    /// Domain-match per RFC 6265: exact host, or a subdomain of the cookie domain.
    pub fn matches_host(&self, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        if domain.is_empty() {
            return false;
        }
        host.eq_ignore_ascii_case(domain)
            || (host.len() > domain.len()
                && host.to_ascii_lowercase().ends_with(&format!(".{}", domain.to_ascii_lowercase())))
    }

    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name
            && self.domain.trim_start_matches('.') == other.domain.trim_start_matches('.')
            && self.path == other.path
    }
}

/// The credential bundle: an ordered set of cookies making up one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar(Vec<Cookie>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.0.iter()
    }

    /// First unexpired value for `name`, regardless of domain.
    pub fn value(&self, name: &str, now_epoch: i64) -> Option<&str> {
        self.0
            .iter()
            .find(|c| c.name == name && !c.is_expired(now_epoch))
            .map(|c| c.value.as_str())
    }

    /// Insert or replace a cookie keyed by (name, domain, path). An already
    /// expired cookie deletes its slot instead, which is how servers clear
    /// tokens.
    pub fn merge(&mut self, cookie: Cookie, now_epoch: i64) {
        let pos = self.0.iter().position(|c| c.same_slot(&cookie));
        match (pos, cookie.is_expired(now_epoch)) {
            (Some(i), true) => {
                self.0.remove(i);
            }
            (Some(i), false) => self.0[i] = cookie,
            (None, true) => {}
            (None, false) => self.0.push(cookie),
        }
    }

    /// `Cookie:` header value for a request to `host`.
    pub fn header_for(&self, host: &str, secure: bool, now_epoch: i64) -> Option<String> {
        let pairs: Vec<String> = self
            .0
            .iter()
            .filter(|c| c.matches_host(host) && !c.is_expired(now_epoch) && (secure || !c.secure))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

impl From<Vec<Cookie>> for CookieJar {
    fn from(cookies: Vec<Cookie>) -> Self {
        Self(cookies)
    }
}

impl FromIterator<Cookie> for CookieJar {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_replaces_same_slot() {
        let mut jar = CookieJar::new();
        jar.merge(Cookie::new("ct0", "old", ".twitter.com"), 0);
        jar.merge(Cookie::new("ct0", "new", "twitter.com"), 0);
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.value("ct0", 0), Some("new"));
    }

    #[test]
    fn test_merge_expired_removes() {
        let mut jar = CookieJar::new();
        jar.merge(Cookie::new("auth_token", "abc", ".twitter.com"), 100);
        let mut gone = Cookie::new("auth_token", "", ".twitter.com");
        gone.expiration = Some(50);
        jar.merge(gone, 100);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_header_for_filters_domain_and_secure() {
        let mut secure = Cookie::new("auth_token", "tok", ".twitter.com");
        secure.secure = true;
        let jar: CookieJar = vec![
            secure,
            Cookie::new("guest_id", "g", "twitter.com"),
            Cookie::new("other", "x", "example.com"),
        ]
        .into();

        assert_eq!(
            jar.header_for("api.twitter.com", true, 0).as_deref(),
            Some("auth_token=tok; guest_id=g")
        );
        assert_eq!(
            jar.header_for("api.twitter.com", false, 0).as_deref(),
            Some("guest_id=g")
        );
        assert_eq!(jar.header_for("nottwitter.com", true, 0), None);
    }

    #[test]
    fn test_json_field_names() {
        let mut c = Cookie::new("ct0", "v", ".twitter.com");
        c.http_only = true;
        c.expiration = Some(1_900_000_000);
        let json = serde_json::to_value(CookieJar::from(vec![c])).unwrap();
        let obj = &json[0];
        assert_eq!(obj["httpOnly"], true);
        assert_eq!(obj["expiration"], 1_900_000_000);
        assert_eq!(obj["path"], "/");
    }
}
