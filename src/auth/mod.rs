//! Session persistence: the cookie bundle that keeps the feed source logged
//! in between runs.

pub mod cookies_file;
pub mod netscape;
pub mod session_store;

pub use session_store::{CookieFormat, SessionStore};
