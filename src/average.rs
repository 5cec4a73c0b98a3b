//! Reduce a year of site files to one row of averages per site.

use std::{collections::BTreeSet, fmt};

use anyhow::Result;
use object_store::ObjectStore;
use tracing::{debug, info};

use crate::{
    reading::{
        should_skip, table::parse_and_filter_f64, year_average_key, CsvTable, Measurement,
        TableError,
    },
    storage::{self, AgeFilter},
};

pub const YEAR_CSV_HEADER: &str =
    "SITE_NUMBER,LATITUDE,LONGITUDE,ELEVATION,AVERAGE_TEMP,DEWP,STP,MIN,MAX,PRCP";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteAverage {
    pub site_number: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub temp: Option<f64>,
    pub dewp: Option<f64>,
    pub stp: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub prcp: Option<f64>,
}

impl SiteAverage {
    /// Averages one GSOD site file. Spatial values come from the first non-blank row.
    pub fn from_site(bytes: &[u8]) -> Result<Self, TableError> {
        let table = CsvTable::from_bytes(bytes)?;
        let spatial = |name: &str| -> Result<Option<f64>, TableError> {
            Ok(table
                .first_value(name)?
                .and_then(|v| parse_and_filter_f64(v, None)))
        };
        let mean = |m: Measurement| table.mean(m.column(), Some(m.sentinel()));

        Ok(SiteAverage {
            site_number: table.first_value("STATION")?.unwrap_or_default().to_string(),
            latitude: spatial("LATITUDE")?,
            longitude: spatial("LONGITUDE")?,
            elevation: spatial("ELEVATION")?,
            temp: mean(Measurement::Temp)?,
            dewp: mean(Measurement::Dewp)?,
            stp: mean(Measurement::Stp)?,
            min: mean(Measurement::Min)?,
            max: mean(Measurement::Max)?,
            prcp: mean(Measurement::Prcp)?,
        })
    }

    fn from_year_row(table: &CsvTable, row: usize) -> Result<Self, TableError> {
        let number = |name: &str| -> Result<Option<f64>, TableError> {
            Ok(table
                .value(name, row)?
                .and_then(|v| parse_and_filter_f64(v, None)))
        };

        Ok(SiteAverage {
            site_number: table
                .value("SITE_NUMBER", row)?
                .unwrap_or_default()
                .to_string(),
            latitude: number("LATITUDE")?,
            longitude: number("LONGITUDE")?,
            elevation: number("ELEVATION")?,
            temp: number("AVERAGE_TEMP")?,
            dewp: number("DEWP")?,
            stp: number("STP")?,
            min: number("MIN")?,
            max: number("MAX")?,
            prcp: number("PRCP")?,
        })
    }

    pub fn to_csv_row(&self) -> String {
        let spatial = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        let mean = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_default();

        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.site_number,
            spatial(self.latitude),
            spatial(self.longitude),
            spatial(self.elevation),
            mean(self.temp),
            mean(self.dewp),
            mean(self.stp),
            mean(self.min),
            mean(self.max),
            mean(self.prcp)
        )
    }
}

/// One site's averages tagged with the year they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct YearSiteAverage {
    pub year: u16,
    pub site: SiteAverage,
}

pub fn render_year_csv(rows: &[SiteAverage]) -> String {
    let mut content = String::from(YEAR_CSV_HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(&row.to_csv_row());
        content.push('\n');
    }
    content
}

/// Reads a year average file back. A file with only a header holds no sites.
pub fn parse_year_csv(bytes: &[u8]) -> Result<Vec<SiteAverage>, TableError> {
    let table = match CsvTable::from_bytes(bytes) {
        Ok(table) => table,
        Err(TableError::EmptyData) => return Ok(vec![]),
        Err(e) => return Err(e),
    };

    (0..table.num_rows())
        .map(|row| SiteAverage::from_year_row(&table, row))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearOutcome {
    /// An average file already exists.
    Skipped,
    Written { sites: usize, unreadable: usize },
}

/// Writes `year_average/avg_{year}.csv` from every site file in the year folder.
///
/// Skips years listed in `finished` unless `calc_all` is set.
pub async fn calculate_year(
    store: &dyn ObjectStore,
    year: &str,
    finished: &BTreeSet<String>,
    calc_all: bool,
) -> Result<YearOutcome> {
    if !calc_all && finished.contains(&year_average_key(year)) {
        debug!(year, "Year average exists, skipping");
        return Ok(YearOutcome::Skipped);
    }

    let keys = storage::list_keys(store, year, AgeFilter::Any).await?;
    let mut rows = Vec::with_capacity(keys.len());
    let mut unreadable = 0;

    for key in keys.iter().filter(|k| !should_skip(k)) {
        let Some(bytes) = storage::read(store, key).await? else {
            continue;
        };
        match SiteAverage::from_site(&bytes) {
            Ok(row) => rows.push(row),
            Err(e) => {
                debug!(key = %key, error = %e, "Skipping unreadable site file");
                unreadable += 1;
            }
        }
    }

    storage::put_year_average(store, year, render_year_csv(&rows)).await?;
    info!(year, sites = rows.len(), unreadable, "Wrote year average");

    Ok(YearOutcome::Written {
        sites: rows.len(),
        unreadable,
    })
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CalcSummary {
    pub written: usize,
    pub skipped: usize,
    pub sites: usize,
    pub unreadable: usize,
}

impl CalcSummary {
    pub fn record(&mut self, outcome: YearOutcome) {
        match outcome {
            YearOutcome::Skipped => self.skipped += 1,
            YearOutcome::Written { sites, unreadable } => {
                self.written += 1;
                self.sites += sites;
                self.unreadable += unreadable;
            }
        }
    }
}

impl fmt::Display for CalcSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} years written ({} sites, {} unreadable files), {} years skipped",
            self.written, self.sites, self.unreadable, self.skipped
        )
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use object_store::{memory::InMemory, path::Path, PutPayload};

    use super::*;
    use crate::reading::fixtures;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn should_average_site_without_sentinels() {
        let site = SiteAverage::from_site(fixtures::good_site().as_bytes()).unwrap();

        assert_eq!(site.site_number, "01001099999");
        assert_eq!(site.latitude, Some(70.9333333));
        assert_eq!(site.longitude, Some(-8.6666667));
        assert_eq!(site.elevation, Some(9.0));
        assert_close(site.temp, 29.1);
        assert_close(site.dewp, 23.9);
        assert_close(site.stp, 11.1);
        assert_close(site.max, 32.6);
        assert_close(site.min, 25.3);
        assert_close(site.prcp, 0.07);
    }

    #[test]
    fn should_render_year_csv() {
        let site = SiteAverage::from_site(fixtures::good_site().as_bytes()).unwrap();
        let no_data = SiteAverage {
            site_number: "99999999999".to_string(),
            ..Default::default()
        };

        let csv = render_year_csv(&[site, no_data]);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], YEAR_CSV_HEADER);
        assert_eq!(
            lines[1],
            "01001099999,70.9333333,-8.6666667,9,29.10,23.90,11.10,25.30,32.60,0.07"
        );
        assert_eq!(lines[2], "99999999999,,,,,,,,,");
    }

    #[test]
    fn should_parse_year_csv() {
        let site = SiteAverage::from_site(fixtures::good_site().as_bytes()).unwrap();
        let csv = render_year_csv(&[site]);

        let parsed = parse_year_csv(csv.as_bytes()).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].site_number, "01001099999");
        assert_eq!(parsed[0].temp, Some(29.1));
        assert_eq!(parsed[0].prcp, Some(0.07));
    }

    #[test]
    fn should_parse_header_only_year_as_no_sites() {
        let parsed = parse_year_csv(render_year_csv(&[]).as_bytes()).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn should_write_year_average_and_skip_unreadable_files() {
        let store = InMemory::new();
        for (key, body) in [
            ("1929/01001099999.csv", fixtures::good_site()),
            ("1929/broken.csv", String::new()),
        ] {
            store
                .put(&Path::from(key), PutPayload::from(body))
                .await
                .unwrap();
        }

        let outcome = calculate_year(&store, "1929", &BTreeSet::new(), false)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            YearOutcome::Written {
                sites: 1,
                unreadable: 1
            }
        );
        let staged = storage::read(&store, "year_average/avg_1929.csv")
            .await
            .unwrap()
            .unwrap();
        let rows = parse_year_csv(&staged).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site_number, "01001099999");
    }

    #[tokio::test]
    async fn should_skip_finished_year_unless_calc_all() {
        let store = InMemory::new();
        let finished: BTreeSet<String> = [year_average_key("1929")].into_iter().collect();

        let outcome = calculate_year(&store, "1929", &finished, false).await.unwrap();
        assert_eq!(outcome, YearOutcome::Skipped);

        let outcome = calculate_year(&store, "1929", &finished, true).await.unwrap();
        assert_eq!(
            outcome,
            YearOutcome::Written {
                sites: 0,
                unreadable: 0
            }
        );
    }
}
