//! GSOD site file columns and their quality checks.

use super::table::{CsvTable, TableError};

/// Columns that must hold a single value for the whole station-year.
pub const SPATIAL_COLUMNS: [&str; 4] = ["STATION", "LATITUDE", "LONGITUDE", "ELEVATION"];

#[derive(Debug, Clone, Copy, PartialEq)]
/// A daily measurement that gets averaged over the year. See the
/// [GSOD readme](https://www.ncei.noaa.gov/data/global-summary-of-the-day/doc/readme.txt)
/// for units and missing-value codes.
pub enum Measurement {
    Temp,
    Dewp,
    Stp,
    Min,
    Max,
    Prcp,
}

impl Measurement {
    pub fn column(&self) -> &'static str {
        match self {
            Measurement::Temp => "TEMP",
            Measurement::Dewp => "DEWP",
            Measurement::Stp => "STP",
            Measurement::Min => "MIN",
            Measurement::Max => "MAX",
            Measurement::Prcp => "PRCP",
        }
    }

    /// Value NOAA writes when the measurement is missing.
    pub fn sentinel(&self) -> f64 {
        match self {
            Measurement::Prcp => 99.99,
            _ => 9999.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialIssue {
    /// A spatial column changes part of the way through the year.
    NonUnique,
    /// A spatial column has blank cells throughout.
    Missing,
}

/// Uniqueness is checked across all spatial columns before missing values.
pub fn spatial_issue(table: &CsvTable) -> Result<Option<SpatialIssue>, TableError> {
    for column in SPATIAL_COLUMNS {
        if table.distinct_count(column)? > 1 {
            return Ok(Some(SpatialIssue::NonUnique));
        }
    }

    for column in SPATIAL_COLUMNS {
        if table.has_missing(column)? {
            return Ok(Some(SpatialIssue::Missing));
        }
    }

    Ok(None)
}
