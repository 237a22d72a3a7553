use crate::arrow::{dataset_to_record_batch, record_batches_to_dataset};
use crate::error::LoadError;
use crate::table::Dataset;
use bytes::Bytes;
use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use ::parquet::arrow::ArrowWriter;
use ::parquet::basic::Compression;
use ::parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;

/// Read a Parquet file into a dataset named `name`.
pub fn read_parquet_to_dataset(path: &Path, name: &str) -> Result<Dataset, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let dataset = record_batches_to_dataset(name, &schema, reader)?;

    log::debug!(
        "loaded {} from {}: {} rows x {} columns",
        name,
        path.display(),
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

/// Read an in-memory Parquet file into a dataset named `name`.
pub fn read_parquet_bytes_to_dataset(bytes: Bytes, name: &str) -> Result<Dataset, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    record_batches_to_dataset(name, &schema, reader)
}

/// Write a dataset to a snappy-compressed Parquet file, replacing any existing file.
pub fn write_dataset_to_parquet(dataset: &Dataset, path: &Path) -> Result<(), LoadError> {
    let batch = dataset_to_record_batch(dataset)?;
    let file = File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
