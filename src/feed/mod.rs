pub mod timeline;
pub mod twitter;

use crate::domain::cookie::CookieJar;
use crate::domain::post::Post;
use crate::error::{AuthError, FeedError};

pub use twitter::TwitterClient;

/// Lazily fetched posts, newest first. An `Err` item ends the useful part of
/// the stream.
pub type PostStream<'a> = Box<dyn Iterator<Item = Result<Post, FeedError>> + 'a>;

/// Upstream provider of an account's recent posts.
pub trait FeedSource {
    /// Replace the current session with a restored bundle.
    fn import_session(&mut self, jar: CookieJar);

    fn is_authenticated(&mut self) -> bool;

    fn login(&mut self, username: &str, password: &str) -> Result<(), AuthError>;

    /// At most `limit` posts for `account`; fewer only when history runs out.
    fn fetch_recent(&mut self, account: &str, limit: usize) -> PostStream<'_>;

    /// The session as it stands now, including any renewed tokens.
    fn export_session(&self) -> CookieJar;
}
