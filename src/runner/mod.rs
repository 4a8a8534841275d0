pub mod notifier;

use crate::auth::SessionStore;
use crate::config::Credentials;
use crate::error::{ConfigError, Result};
use crate::feed::FeedSource;
use crate::store::repo::SeenLedger;

use crate::runner::notifier::Notifier;

/// Posts considered per run. Anything older than the newest page is not
/// looked at.
pub const FETCH_LIMIT: usize = 10;

pub struct RunConfig {
    pub account: String,
    pub credentials: Option<Credentials>,
    pub fetch_limit: usize,
}

impl RunConfig {
    pub fn new(account: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            account: account.into(),
            credentials,
            fetch_limit: FETCH_LIMIT,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub notified: usize,
    pub already_seen: usize,
}

/// One pass: restore the session, log in if needed, mail every post the ledger
/// has not seen, then persist the session. The first error aborts the pass; a
/// post is only recorded after its mail went out.
pub fn run_once(
    ledger: &dyn SeenLedger,
    feed: &mut dyn FeedSource,
    sessions: &SessionStore,
    notifier: &Notifier,
    cfg: RunConfig,
) -> Result<RunSummary> {
    if log::log_enabled!(log::Level::Debug) {
        for (key, value) in ledger.entries()? {
            log::debug!("key: {key}");
            log::debug!("value: {value}");
        }
    }

    if let Some(jar) = sessions.load()? {
        feed.import_session(jar);
    }

    if !feed.is_authenticated() {
        let creds = cfg
            .credentials
            .as_ref()
            .ok_or(ConfigError::MissingCredentials)?;
        feed.login(&creds.username, &creds.password)?;
    }

    let mut summary = RunSummary::default();
    for item in feed.fetch_recent(&cfg.account, cfg.fetch_limit) {
        let post = item?;
        summary.fetched += 1;
        log::debug!("post: {post:?}");

        if ledger.has(&post.id)? {
            summary.already_seen += 1;
            continue;
        }
        let text = notifier.notify(&post)?;
        ledger.put(&post.id, &text)?;
        summary.notified += 1;
    }

    sessions.save(&feed.export_session())?;

    log::info!(
        "@{}: fetched {}, mailed {}, already seen {}",
        cfg.account,
        summary.fetched,
        summary.notified,
        summary.already_seen
    );
    Ok(summary)
}
