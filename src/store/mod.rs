pub mod repo;
pub mod sqlite;

pub use repo::SeenLedger;
pub use sqlite::SqliteLedger;
