pub mod error;
pub mod fetch_cache;
pub mod probe;
pub mod scheduler;
