pub mod csv_links;
pub mod db;
pub mod file_store;
pub mod users;

pub use db::PgSnapshotSink;
pub use file_store::JsonFileSink;
pub use users::InMemoryUserStore;
