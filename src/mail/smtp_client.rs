use lettre::address::Envelope;
use lettre::{Address, SmtpTransport, Transport};

use crate::config::MailServer;
use crate::error::TransportError;

/// Submission of one already-formatted message.
pub trait MailTransport {
    fn send(&self, from: &Address, to: &[Address], message: &[u8]) -> Result<(), TransportError>;
}

/// Plain SMTP relay: no TLS, no authentication.
pub struct SmtpClient {
    server: MailServer,
    transport: SmtpTransport,
}

impl SmtpClient {
    pub fn new(server: &MailServer) -> Self {
        let transport = SmtpTransport::builder_dangerous(server.host.as_str())
            .port(server.port)
            .build();
        Self {
            server: server.clone(),
            transport,
        }
    }
}

impl MailTransport for SmtpClient {
    fn send(&self, from: &Address, to: &[Address], message: &[u8]) -> Result<(), TransportError> {
        let envelope =
            Envelope::new(Some(from.clone()), to.to_vec()).map_err(|e| TransportError::Address {
                address: to
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                reason: e.to_string(),
            })?;

        self.transport
            .send_raw(&envelope, message)
            .map_err(|e| TransportError::Smtp {
                server: self.server.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
