//! SDMX-CSV → typed table normalization.
//!
//! The table schema is decided once from the header row: every field name is
//! lowercased and each column is typed. Columns listed as numeric (by default
//! only `obs_value`) hold nullable floats; everything else is passed through
//! as text untouched.

use serde::Serialize;
use thiserror::Error;

/// Columns coerced to nullable floats unless configured otherwise.
pub const DEFAULT_NUMERIC_FIELDS: &[&str] = &["obs_value"];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("column '{0}' appears more than once after lowercasing")]
    DuplicateColumn(String),

    #[error("row {row}: column '{column}' value '{value}' is not a number")]
    NumericParse {
        row: usize,
        column: String,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of `name`, matched case-insensitively.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.columns.iter().position(|column| column.name == name)
    }
}

/// A single normalized cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    /// Numeric cell; `None` when the source cell was empty.
    Number(Option<f64>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => *value,
            Self::Text(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Number(None))
    }
}

/// Borrowed view of one table row keyed by lowercase field name.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedRecord<'a> {
    schema: &'a TableSchema,
    values: &'a [FieldValue],
}

impl<'a> NormalizedRecord<'a> {
    pub fn get(&self, name: &str) -> Option<&'a FieldValue> {
        self.schema
            .index_of(name)
            .and_then(|index| self.values.get(index))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a FieldValue)> + 'a {
        let columns = self.schema.columns();
        columns
            .iter()
            .map(|column| column.name.as_str())
            .zip(self.values.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedTable {
    schema: TableSchema,
    rows: Vec<Vec<FieldValue>>,
}

impl NormalizedTable {
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<NormalizedRecord<'_>> {
        self.rows.get(index).map(|values| NormalizedRecord {
            schema: &self.schema,
            values,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = NormalizedRecord<'_>> {
        self.rows.iter().map(|values| NormalizedRecord {
            schema: &self.schema,
            values,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CsvNormalizer {
    numeric_fields: Vec<String>,
}

impl Default for CsvNormalizer {
    fn default() -> Self {
        Self::with_numeric_fields(DEFAULT_NUMERIC_FIELDS.iter().copied())
    }
}

impl CsvNormalizer {
    pub fn with_numeric_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            numeric_fields: fields.into_iter().map(str::to_lowercase).collect(),
        }
    }

    /// Schema for a header row: names lowercased, numeric fields typed.
    pub fn schema_for<'a>(
        &self,
        headers: impl IntoIterator<Item = &'a str>,
    ) -> Result<TableSchema, NormalizeError> {
        let mut columns: Vec<Column> = Vec::new();
        for header in headers {
            let name = header.to_lowercase();
            if columns.iter().any(|column| column.name == name) {
                return Err(NormalizeError::DuplicateColumn(name));
            }
            let kind = if self.numeric_fields.contains(&name) {
                ColumnKind::Numeric
            } else {
                ColumnKind::Text
            };
            columns.push(Column { name, kind });
        }
        Ok(TableSchema::new(columns))
    }

    /// Parses header-delimited CSV. No data rows is an empty table, not an error;
    /// a single bad numeric cell fails the whole parse.
    pub fn parse(&self, text: &str) -> Result<NormalizedTable, NormalizeError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let schema = self.schema_for(reader.headers()?.iter())?;
        let mut rows = Vec::new();

        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let values = schema
                .columns()
                .iter()
                .zip(record.iter())
                .map(|(column, raw)| coerce(column, raw, index + 1))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(values);
        }

        Ok(NormalizedTable { schema, rows })
    }
}

fn coerce(column: &Column, raw: &str, row: usize) -> Result<FieldValue, NormalizeError> {
    match column.kind {
        ColumnKind::Text => Ok(FieldValue::Text(raw.to_string())),
        ColumnKind::Numeric => {
            if raw.is_empty() {
                return Ok(FieldValue::Number(None));
            }
            raw.trim()
                .parse::<f64>()
                .map(|value| FieldValue::Number(Some(value)))
                .map_err(|_| NormalizeError::NumericParse {
                    row,
                    column: column.name.clone(),
                    value: raw.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
DATAFLOW,REF_AREA,SEX,TIME_PERIOD,OBS_VALUE,Note_Source
ILO:DF_UNE_DEAP_SEX_AGE_RT(1.0),FRA,SEX_T,2023,7.3,R1:3513
ILO:DF_UNE_DEAP_SEX_AGE_RT(1.0),FRA,SEX_F,2023,,
ILO:DF_UNE_DEAP_SEX_AGE_RT(1.0),DEU,SEX_T,2023,5.2, Mixed Case Value
";

    #[test]
    fn lowercases_every_field_name() {
        let table = CsvNormalizer::default().parse(SAMPLE).expect("parse");
        let names: Vec<&str> = table
            .schema()
            .columns()
            .iter()
            .map(|column| column.name.as_str())
            .collect();

        assert_eq!(
            names,
            vec!["dataflow", "ref_area", "sex", "time_period", "obs_value", "note_source"]
        );
        assert_eq!(table.num_rows(), 3);
    }

    #[test]
    fn obs_value_is_coerced_to_nullable_float() {
        let table = CsvNormalizer::default().parse(SAMPLE).expect("parse");

        let obs = |index: usize| table.record(index).and_then(|r| r.get("OBS_VALUE"));

        assert_eq!(obs(0).and_then(FieldValue::as_f64), Some(7.3));
        assert!(obs(1).is_some_and(FieldValue::is_null));
        assert_eq!(obs(2).and_then(FieldValue::as_f64), Some(5.2));
        assert_eq!(table.schema().columns()[4].kind, ColumnKind::Numeric);
    }

    #[test]
    fn other_fields_pass_through_unchanged() {
        let table = CsvNormalizer::default().parse(SAMPLE).expect("parse");
        let record = table.record(2).expect("row");

        assert_eq!(
            record.get("note_source").and_then(FieldValue::as_text),
            Some(" Mixed Case Value")
        );
        assert_eq!(record.get("ref_area").and_then(FieldValue::as_text), Some("DEU"));
        assert_eq!(
            table.record(1).and_then(|r| r.get("note_source")).and_then(FieldValue::as_text),
            Some("")
        );
    }

    #[test]
    fn non_numeric_obs_value_fails_whole_parse() {
        let text = "REF_AREA,OBS_VALUE\nFRA,1.5\nDEU,n/a\n";
        let error = CsvNormalizer::default().parse(text).expect_err("should fail");

        match error {
            NormalizeError::NumericParse { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "obs_value");
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_obs_value_is_not_missing() {
        let error = CsvNormalizer::default()
            .parse("REF_AREA,OBS_VALUE\nFRA,   \n")
            .expect_err("whitespace is content, not a missing value");

        assert!(matches!(
            error,
            NormalizeError::NumericParse { row: 1, ref column, ref value }
                if column == "obs_value" && value == "   "
        ));
    }

    #[test]
    fn padded_obs_value_still_parses() {
        let table = CsvNormalizer::default()
            .parse("REF_AREA,OBS_VALUE\nFRA, 7.25 \n")
            .expect("parse");
        let obs = table.record(0).and_then(|r| r.get("obs_value"));
        assert_eq!(obs.and_then(FieldValue::as_f64), Some(7.25));
    }

    #[test]
    fn header_only_and_empty_input_yield_empty_tables() {
        let normalizer = CsvNormalizer::default();

        let header_only = normalizer.parse("REF_AREA,OBS_VALUE\n").expect("parse");
        assert!(header_only.is_empty());
        assert_eq!(header_only.schema().len(), 2);

        let empty = normalizer.parse("").expect("parse");
        assert!(empty.is_empty());
        assert!(empty.schema().is_empty());
    }

    #[test]
    fn columns_colliding_after_lowercasing_are_rejected() {
        let error = CsvNormalizer::default()
            .parse("OBS_VALUE,obs_value\n1,2\n")
            .expect_err("should fail");
        assert!(matches!(error, NormalizeError::DuplicateColumn(name) if name == "obs_value"));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let error = CsvNormalizer::default()
            .parse("REF_AREA,OBS_VALUE\nFRA\n")
            .expect_err("should fail");
        assert!(matches!(error, NormalizeError::Csv(_)));
    }

    #[test]
    fn record_fields_follow_header_order() {
        let table = CsvNormalizer::default()
            .parse("B,A,OBS_VALUE\nx,y,1\n")
            .expect("parse");
        let fields: Vec<(&str, &FieldValue)> = table.record(0).expect("row").fields().collect();

        assert_eq!(fields[0], ("b", &FieldValue::Text(String::from("x"))));
        assert_eq!(fields[1], ("a", &FieldValue::Text(String::from("y"))));
        assert_eq!(fields[2], ("obs_value", &FieldValue::Number(Some(1.0))));
    }

    #[test]
    fn custom_numeric_fields_are_honoured() {
        let table = CsvNormalizer::with_numeric_fields(["OBS_VALUE", "UNIT_MULT"])
            .parse("UNIT_MULT,OBS_VALUE\n3,\n")
            .expect("parse");
        let unit_mult = table.record(0).and_then(|r| r.get("unit_mult"));
        assert_eq!(unit_mult.and_then(FieldValue::as_f64), Some(3.0));
    }
}
