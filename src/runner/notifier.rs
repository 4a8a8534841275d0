use chrono::Local;

use crate::config::NotificationConfig;
use crate::domain::post::Post;
use crate::error::TransportError;
use crate::mail::MailTransport;
use crate::mail::format::{compose_message, render_text, subject};

/// Turns a post into an email and hands it to the transport.
pub struct Notifier {
    cfg: NotificationConfig,
    transport: Box<dyn MailTransport>,
}

impl Notifier {
    pub fn new(cfg: NotificationConfig, transport: Box<dyn MailTransport>) -> Self {
        Self { cfg, transport }
    }

    /// Send one post. Returns the rendered body that went out, which is what
    /// the ledger keeps.
    pub fn notify(&self, post: &Post) -> Result<String, TransportError> {
        let text = render_text(post, &Local);
        log::debug!("msg text: {text}");

        let message = compose_message(&self.cfg.to, &subject(post), &text);
        self.transport
            .send(&self.cfg.from, &self.cfg.to, message.as_bytes())?;

        log::info!(
            "mailed post {} from {} to {} recipient(s)",
            post.id,
            post.author,
            self.cfg.to.len()
        );
        Ok(text)
    }
}
