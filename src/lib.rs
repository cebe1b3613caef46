mod acquisition;
mod error;
mod isd_lite;
mod observations;
mod remote;
mod stations;
mod types;
mod utils;
mod writers;

pub use error::IsdLiteError;
pub use isd_lite::*;

pub use acquisition::error::FetchError;
pub use acquisition::fetch_cache::*;
pub use acquisition::probe::*;
pub use acquisition::scheduler::*;

pub use observations::consolidate::ConsolidationEngine;
pub use observations::decoder::*;
pub use observations::error::{ConsolidationError, DecodeError};

pub use remote::client::*;
pub use remote::error::RemoteError;
pub use remote::listing::{normalize_url, parse_listing};
pub use remote::locator::*;

pub use stations::error::StationError;
pub use stations::history::StationCatalog;
pub use stations::region::*;

pub use types::dataset::*;
pub use types::observation::*;
pub use types::station::*;
pub use types::station_id::StationId;
pub use types::year_range::YearRange;

pub use utils::{ensure_cache_dir_exists, get_cache_dir};

pub use writers::error::WriteError;
pub use writers::parquet_writer::*;
