//! Site files shared by the unit tests.

const HEADER: &str = "\"STATION\",\"DATE\",\"LATITUDE\",\"LONGITUDE\",\"ELEVATION\",\"NAME\",\"TEMP\",\"DEWP\",\"STP\",\"MAX\",\"MIN\",\"PRCP\",\"FRSHTT\"";

/// Three days at Jan Mayen with one missing value in most measurements.
///
/// Means: TEMP 29.1, DEWP 23.9, STP 11.1, MAX 32.6, MIN 25.3, PRCP 0.07.
pub fn good_site() -> String {
    [
        HEADER,
        "\"01001099999\",\"2020-01-01\",\"70.9333333\",\"-8.6666667\",\"9.0\",\"JAN MAYEN NOR NAVY, NO\",\"   28.1\",\"   21.9\",\"  10.1\",\"   31.6\",\"   24.3\",\" 0.04\",\"010000\"",
        "\"01001099999\",\"2020-01-02\",\"70.9333333\",\"-8.6666667\",\"9.0\",\"JAN MAYEN NOR NAVY, NO\",\"   30.1\",\"   25.9\",\"9999.9\",\"   33.6\",\"   26.3\",\" 0.10\",\"010000\"",
        "\"01001099999\",\"2020-01-03\",\"70.9333333\",\"-8.6666667\",\"9.0\",\"JAN MAYEN NOR NAVY, NO\",\"9999.9\",\"   23.9\",\"  12.1\",\"9999.9\",\"   25.3\",\"99.99\",\"010000\"",
    ]
    .join("\n")
}

/// One row per `(station, latitude, longitude, elevation)` with fixed measurements.
pub fn site_with_spatial(rows: &[(&str, &str, &str, &str)]) -> String {
    let mut csv = String::from(HEADER);
    for (day, (station, lat, lon, elev)) in rows.iter().enumerate() {
        csv.push_str(&format!(
            "\n\"{}\",\"2020-01-{:02}\",\"{}\",\"{}\",\"{}\",\"SITE\",\"10.0\",\"5.0\",\"1000.0\",\"12.0\",\"8.0\",\"0.00\",\"000000\"",
            station,
            day + 1,
            lat,
            lon,
            elev
        ));
    }
    csv
}
