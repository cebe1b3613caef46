pub mod client;
pub mod error;
pub mod listing;
pub mod locator;

#[cfg(test)]
pub(crate) mod mock;
