//! Mail every new post of a Twitter account, once.
//!
//! A run restores the saved session, fetches the newest page of posts, mails
//! the ones missing from the seen-ledger and records them, then writes the
//! session back for the next run.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod logging;
pub mod mail;
pub mod runner;
pub mod store;

pub use error::{Error, Result};
