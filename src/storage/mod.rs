pub mod engine;
pub mod file_lock;
pub mod file_store;
