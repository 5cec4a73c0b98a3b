//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod averages;

pub use averages::save_year_averages;
