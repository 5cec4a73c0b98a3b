//! Read NCEI directory listings.
//!
//! The GSOD `access` tree is a plain Apache index: the root lists one folder per year and
//! each year folder lists one CSV per station.

use scraper::{Html, Selector};

pub const ACCESS_ROOT: &str = "https://www.ncei.noaa.gov/data/global-summary-of-the-day/access";
pub const ARCHIVE_ROOT: &str = "https://www.ncei.noaa.gov/data/global-summary-of-the-day/archive";

/// Relative links in a listing that end with `suffix`, without the trailing `/`.
///
/// Parent, absolute and sort-order links are dropped.
pub fn parse_listing(html: &str, suffix: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector is valid");

    let mut links: Vec<String> = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| href.ends_with(suffix))
        .filter(|href| !href.starts_with(['?', '/', '.', '#']) && !href.contains("://"))
        .map(|href| href.trim_end_matches('/').to_string())
        .filter(|href| !href.is_empty())
        .collect();

    links.sort();
    links.dedup();
    links
}

pub fn year_links(html: &str) -> Vec<String> {
    parse_listing(html, "/")
        .into_iter()
        .filter(|name| name.len() == 4 && name.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

pub fn site_links(html: &str) -> Vec<String> {
    parse_listing(html, ".csv")
}

pub fn year_listing_url(year: &str) -> String {
    format!("{}/{}/", ACCESS_ROOT, year)
}

pub fn site_url(year: &str, file_name: &str) -> String {
    format!("{}/{}/{}", ACCESS_ROOT, year, file_name)
}

pub fn archive_url(year: &str) -> String {
    format!("{}/{}.tar.gz", ARCHIVE_ROOT, year)
}

// -- Tests -------------------------------------------------------------------
