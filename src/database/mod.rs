pub mod manager;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use store::{ObjectKind, PgStore, Row, Store, StoreError};
