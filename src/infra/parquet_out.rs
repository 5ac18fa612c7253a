//! Columnar encoding of record sets for the blob tiers.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::Result;
use crate::types::{ColumnType, RecordSet};

fn data_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        // Untyped cells are rendered as text.
        ColumnType::Str | ColumnType::Any => DataType::Utf8,
    }
}

pub fn arrow_schema(records: &RecordSet) -> Arc<Schema> {
    Arc::new(Schema::new(
        records
            .columns()
            .iter()
            .map(|c| Field::new(c.name.as_str(), data_type(c.ty), true))
            .collect::<Vec<_>>(),
    ))
}

fn column_array(records: &RecordSet, index: usize) -> ArrayRef {
    let cells = records.column_values(index);
    match records.columns()[index].ty {
        ColumnType::Int => Arc::new(Int64Array::from(cells.map(|v| v.as_i64()).collect::<Vec<_>>())),
        ColumnType::Float => Arc::new(Float64Array::from(cells.map(|v| v.as_f64()).collect::<Vec<_>>())),
        ColumnType::Bool => Arc::new(BooleanArray::from(cells.map(|v| v.as_bool()).collect::<Vec<_>>())),
        ColumnType::Str | ColumnType::Any => {
            Arc::new(StringArray::from(cells.map(|v| v.render()).collect::<Vec<_>>()))
        }
    }
}

pub fn to_record_batch(records: &RecordSet) -> Result<RecordBatch> {
    let arrays = (0..records.columns().len())
        .map(|i| column_array(records, i))
        .collect::<Vec<_>>();
    Ok(RecordBatch::try_new(arrow_schema(records), arrays)?)
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("telco_churn_elt".to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encode a record set as a single-row-group ZSTD Parquet file.
pub fn encode_parquet(records: &RecordSet) -> Result<Vec<u8>> {
    let batch = to_record_batch(records)?;
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, batch.schema(), Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(cursor.into_inner())
}

/// Decode every record batch of a Parquet payload.
pub fn read_batches(bytes: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes))?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, Value};
    use arrow::array::Array;

    fn sample() -> RecordSet {
        let mut rs = RecordSet::new(vec![
            Column::new("customer_id", ColumnType::Str),
            Column::new("tenure", ColumnType::Int),
            Column::new("charges", ColumnType::Float),
            Column::new("churned", ColumnType::Bool),
            Column::new("extra", ColumnType::Any),
        ]);
        rs.push_row(vec![
            Value::Str("C1".into()),
            Value::Int(3),
            Value::Float(29.85),
            Value::Bool(true),
            Value::Float(1.0),
        ])
        .unwrap();
        rs.push_row(vec![
            Value::Str("C2".into()),
            Value::Int(0),
            Value::Null,
            Value::Null,
            Value::Null,
        ])
        .unwrap();
        rs
    }

    #[test]
    fn parquet_payload_reads_back() {
        let bytes = encode_parquet(&sample()).unwrap();
        assert_eq!(&bytes[..4], b"PAR1");

        let batches = read_batches(bytes).unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);

        let batch = &batches[0];
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Int64);
        let charges = batch
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(charges.value(0), 29.85);
        assert!(charges.is_null(1));
        let extra = batch.column(4).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(extra.value(0), "1.0");
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode_parquet(&sample()).unwrap(), encode_parquet(&sample()).unwrap());
    }

    #[test]
    fn empty_record_set_still_has_schema() {
        let empty = RecordSet::new(sample().columns().to_vec());
        let batches = read_batches(encode_parquet(&empty).unwrap()).unwrap();
        assert!(batches.iter().all(|b| b.num_rows() == 0));
    }
}
