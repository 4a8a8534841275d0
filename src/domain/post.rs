use chrono::{DateTime, Utc};

pub type PostId = String;

/// One item of an account's feed, as produced by a feed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub permalink: String,
}
