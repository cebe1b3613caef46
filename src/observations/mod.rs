pub mod consolidate;
pub mod decoder;
pub mod error;
