//! Save the year averages to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, StringArray, UInt16Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};

use crate::{average::YearSiteAverage, cli::create_progress_bar};

const CHUNK_SIZE: usize = 100_000;

pub fn save_year_averages(rows: &[YearSiteAverage], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;

    let mut fields = vec![
        Field::new("year", DataType::UInt16, false),
        Field::new("site_number", DataType::Utf8, false),
    ];
    for name in [
        "latitude",
        "longitude",
        "elevation",
        "average_temp",
        "dewp",
        "stp",
        "min",
        "max",
        "prcp",
    ] {
        fields.push(Field::new(name, DataType::Float64, true));
    }
    let schema = Arc::new(Schema::new(fields));

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_dictionary_enabled(true)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
    let pb = create_progress_bar(rows.len() as u64, "Writing parquet file".to_string());

    for chunk in rows.chunks(CHUNK_SIZE) {
        let batch = make_batch(&schema, chunk)?;
        writer.write(&batch)?;
        pb.inc(chunk.len() as u64);
    }

    writer.close()?;
    pb.finish_with_message("Parquet file written");

    Ok(())
}

fn make_batch(schema: &Arc<Schema>, rows: &[YearSiteAverage]) -> Result<RecordBatch> {
    let float_column = |value: fn(&YearSiteAverage) -> Option<f64>| -> ArrayRef {
        Arc::new(rows.iter().map(value).collect::<Float64Array>())
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt16Array::from_iter_values(rows.iter().map(|r| r.year))),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.site.site_number.as_str()),
        )),
        float_column(|r| r.site.latitude),
        float_column(|r| r.site.longitude),
        float_column(|r| r.site.elevation),
        float_column(|r| r.site.temp),
        float_column(|r| r.site.dewp),
        float_column(|r| r.site.stp),
        float_column(|r| r.site.min),
        float_column(|r| r.site.max),
        float_column(|r| r.site.prcp),
    ];

    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

// -- Tests -------------------------------------------------------------------
