pub mod error;
pub mod parquet_writer;
