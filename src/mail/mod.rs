pub mod format;
pub mod smtp_client;

pub use smtp_client::{MailTransport, SmtpClient};
