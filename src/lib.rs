pub mod cmr;
pub mod config;
pub mod earthdata;
pub mod error;
pub mod imageserver;
pub mod logging;
pub mod samples;
pub mod units;
