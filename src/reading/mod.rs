pub mod site;
pub mod site_key;
pub mod table;

#[cfg(test)]
pub mod fixtures;

pub use site::{spatial_issue, Measurement, SpatialIssue};
pub use site_key::{
    is_reserved_folder, should_skip, year_average_key, year_from_average_key, SiteKey,
    YEAR_AVERAGE_FOLDER,
};
pub use table::{CsvTable, TableError};
