pub mod dataset;
pub mod observation;
pub mod station;
pub mod station_id;
pub mod year_range;
