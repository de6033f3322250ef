pub mod key_value_repository;
pub mod remote_sync_repository;

pub use key_value_repository::{InMemoryKeyValueStore, JsonFileKeyValueStore, KeyValueStore};
pub use remote_sync_repository::{MongoRemoteSyncRepository, RemoteSyncRepository};
