pub mod calc;
pub mod clean;
pub mod export;
pub mod fetch;
pub mod run;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local};
pub use calc::calc;
pub use clean::clean;
pub use export::export;
pub use fetch::fetch;
pub use run::run;

pub fn make_parquet_file_name(dataset: &str) -> Result<PathBuf> {
    let today = Local::now();
    let file_name = format!(
        "gsod-{}-{}-{:02}-{:02}.parquet",
        dataset,
        today.year(),
        today.month(),
        today.day()
    );

    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find a home directory"))?;

    Ok(home.join(file_name))
}

// -- Tests -------------------------------------------------------------------
