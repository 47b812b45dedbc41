pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;
pub mod version;

pub use common::EntityId;
pub use error::{Result, StoreError};
pub use memory::InMemoryEntityStore;
pub use postgres::PostgresEntityStore;
pub use query::{DEFAULT_PAGE_LIMIT, ListCriteria, MAX_PAGE_LIMIT, Page};
pub use record::{EntityRecord, EntityRecordBuilder, LookupField};
pub use store::EntityStore;
pub use version::{InvalidValueError, VersionStamp};
