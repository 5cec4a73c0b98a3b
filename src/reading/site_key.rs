//! Object keys of site files and the reserved bucket folders.

/// Quarantined site files.
pub const DATA_ERROR_FOLDER: &str = "_data_error";
/// Staged per-year site averages.
pub const YEAR_AVERAGE_FOLDER: &str = "year_average";

#[derive(Debug, Clone, PartialEq)]
/// A site file stored as `{year}/{station}.csv`.
pub struct SiteKey {
    pub year: String,
    pub station: String,
}

impl SiteKey {
    pub fn parse(key: &str) -> Option<Self> {
        let (year, file_name) = key.split_once('/')?;
        if file_name.contains('/') {
            return None;
        }
        let station = file_name.split('.').next()?;

        if year.is_empty() || station.is_empty() {
            return None;
        }

        Some(SiteKey {
            year: year.to_string(),
            station: station.to_string(),
        })
    }

    pub fn quarantine_key(&self, note: &str) -> String {
        format!(
            "{}/{}-{}-{}.csv",
            DATA_ERROR_FOLDER, self.year, self.station, note
        )
    }
}

pub fn is_reserved_folder(name: &str) -> bool {
    name == DATA_ERROR_FOLDER || name == YEAR_AVERAGE_FOLDER
}

/// Keys the cleaner leaves alone: folder markers and anything in a reserved folder.
pub fn should_skip(key: &str) -> bool {
    key.len() <= 5 || key.contains(YEAR_AVERAGE_FOLDER) || key.contains(DATA_ERROR_FOLDER)
}

pub fn year_average_key(year: &str) -> String {
    format!("{}/avg_{}.csv", YEAR_AVERAGE_FOLDER, year)
}

pub fn year_from_average_key(key: &str) -> Option<&str> {
    key.strip_prefix(YEAR_AVERAGE_FOLDER)?
        .strip_prefix("/avg_")?
        .strip_suffix(".csv")
        .filter(|year| !year.is_empty())
}
