use anyhow::Result;

use crate::{
    config::{CalcConfig, CleanConfig},
    storage::Store,
};

use super::{calc, clean};

/// The whole flow: clean every year, then recalculate the year averages.
pub async fn run(
    store: &Store,
    clean_config: &CleanConfig,
    calc_config: &CalcConfig,
) -> Result<String> {
    let cleaned = clean(store, clean_config).await?;
    let calculated = calc(store, calc_config).await?;

    Ok(format!("Clean: {}\nCalc: {}", cleaned, calculated))
}
