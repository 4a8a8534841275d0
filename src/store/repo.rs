use crate::error::StorageError;

/// Durable record of which post ids have already triggered a notification.
///
/// Entries are only ever added. Presence of an id means delivery was attempted
/// and must not be repeated.
pub trait SeenLedger {
    fn has(&self, id: &str) -> Result<bool, StorageError>;

    /// Record `id` with the text that was sent. Visible to `has` on return.
    fn put(&self, id: &str, text: &str) -> Result<(), StorageError>;

    /// All entries in key order.
    fn entries(&self) -> Result<Vec<(String, String)>, StorageError>;
}
