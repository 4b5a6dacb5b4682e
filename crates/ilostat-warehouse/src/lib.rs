//! # ILOSTAT Warehouse
//!
//! Local `DuckDB` store that published datasets land in.
//!
//! ## Overview
//!
//! Every dataset becomes one table named after its dataset id, with one
//! column per normalized CSV column (`TEXT` or `DOUBLE`). Published datasets
//! are registered in `dataset_catalog` together with their metadata.
//!
//! ```rust,no_run
//! use ilostat_warehouse::{Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open(WarehouseConfig::at("/tmp/ilostat/warehouse.duckdb"))?;
//!     if let Some(dataset) = warehouse.published_dataset("ilo_une_deap_sex_age_rt")? {
//!         println!("{} rows in {}", dataset.row_count, dataset.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `dataset_catalog` | One row per published dataset |
//! | `schema_migrations` | Applied migration versions |
//! | `ilo_*` | Dataset contents |
//!
//! All values are bound as statement parameters. Identifiers cannot be bound,
//! so dataset ids are validated and column names are quoted.

pub mod duckdb;
pub mod migrations;

use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::{appender_params_from_iter, Connection, ToSql};
use ilostat_core::{
    ColumnKind, ConnectorConfig, DatasetMetadata, DatasetPublisher, FieldValue, NormalizedTable,
    PublishError, WriteMode,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use duckdb::{ConnectionPool, PooledConnection};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Dataset ids are used as table names and must be plain identifiers.
    #[error("invalid dataset id '{0}'")]
    InvalidDatasetId(String),

    #[error("dataset {dataset_id} has an unnamed column at position {position}")]
    UnnamedColumn { dataset_id: String, position: usize },

    #[error("dataset {dataset_id} has no columns")]
    NoColumns { dataset_id: String },

    /// `publish` was called before any table was uploaded under that id.
    #[error("dataset {0} has not been uploaded")]
    NotUploaded(String),
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            max_pool_size: 4,
        }
    }
}

impl From<&ConnectorConfig> for WarehouseConfig {
    fn from(config: &ConnectorConfig) -> Self {
        Self::at(config.warehouse_path.clone())
    }
}

/// Row of `dataset_catalog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedDataset {
    pub id: String,
    pub title: String,
    pub description: String,
    pub source_dataflow: String,
    pub row_count: i64,
    pub published_at: String,
}

#[derive(Clone)]
pub struct Warehouse {
    pool: ConnectionPool,
}

impl Warehouse {
    /// Opens (creating if needed) the database and applies pending migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let warehouse = Self {
            pool: ConnectionPool::new(config.db_path, config.max_pool_size),
        };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        let applied = migrations::apply_migrations(&connection)?;
        debug!(applied, db_path = %self.db_path().display(), "warehouse schema ready");
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Writes `table` into the table named `dataset_id`.
    ///
    /// [`WriteMode::Overwrite`] replaces the table and its schema;
    /// [`WriteMode::Append`] creates it if missing and adds rows.
    /// Returns the number of rows written.
    pub fn upload_table(
        &self,
        table: &NormalizedTable,
        dataset_id: &str,
        mode: WriteMode,
    ) -> Result<usize, WarehouseError> {
        validate_dataset_id(dataset_id)?;
        let columns = column_definitions(table, dataset_id)?;

        let create = match mode {
            WriteMode::Overwrite => "CREATE OR REPLACE TABLE",
            WriteMode::Append => "CREATE TABLE IF NOT EXISTS",
        };
        let create_sql = format!("{create} {dataset_id} ({})", columns.join(", "));

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            connection.execute_batch(&create_sql)?;
            // Rows must be flushed before COMMIT.
            let mut appender = connection.appender(dataset_id)?;
            for row in table.rows() {
                appender.append_row(appender_params_from_iter(row.iter().map(to_duck_value)))?;
            }
            appender.flush()?;
            Ok(table.num_rows())
        })();

        let written = finalize_transaction(&connection, result)?;
        info!(dataset_id, rows = written, ?mode, "table uploaded");
        Ok(written)
    }

    /// Registers or refreshes the catalogue entry of an uploaded dataset.
    pub fn publish_dataset(
        &self,
        dataset_id: &str,
        metadata: &DatasetMetadata,
    ) -> Result<(), WarehouseError> {
        let row_count = self
            .table_row_count(dataset_id)?
            .ok_or_else(|| WarehouseError::NotUploaded(dataset_id.to_string()))?;

        let connection = self.pool.acquire()?;
        let params: [&dyn ToSql; 5] = [
            &dataset_id,
            &metadata.title,
            &metadata.description,
            &metadata.source_dataflow,
            &row_count,
        ];
        connection.execute(
            "INSERT OR REPLACE INTO dataset_catalog \
             (id, title, description, source_dataflow, row_count, published_at) \
             VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;

        info!(dataset_id, row_count, "dataset published");
        Ok(())
    }

    /// Row count of the dataset table, or `None` if it was never uploaded.
    pub fn table_row_count(&self, dataset_id: &str) -> Result<Option<i64>, WarehouseError> {
        validate_dataset_id(dataset_id)?;
        let connection = self.pool.acquire()?;

        if !table_exists(&connection, dataset_id)? {
            return Ok(None);
        }
        let count: i64 = connection.query_row(
            &format!("SELECT COUNT(*) FROM {dataset_id}"),
            [],
            |row| row.get(0),
        )?;
        Ok(Some(count))
    }

    pub fn published_dataset(
        &self,
        dataset_id: &str,
    ) -> Result<Option<PublishedDataset>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let found = connection.query_row(
            "SELECT id, title, description, source_dataflow, row_count, \
             CAST(published_at AS VARCHAR) \
             FROM dataset_catalog WHERE id = ?",
            [dataset_id],
            read_published,
        );
        match found {
            Ok(dataset) => Ok(Some(dataset)),
            Err(::duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// All catalogue entries ordered by id.
    pub fn list_published(&self) -> Result<Vec<PublishedDataset>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            "SELECT id, title, description, source_dataflow, row_count, \
             CAST(published_at AS VARCHAR) \
             FROM dataset_catalog ORDER BY id",
        )?;
        let rows = statement.query_map([], read_published)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl DatasetPublisher for Warehouse {
    fn upload(
        &self,
        table: &NormalizedTable,
        dataset_id: &str,
        mode: WriteMode,
    ) -> Result<(), PublishError> {
        self.upload_table(table, dataset_id, mode)
            .map(|_| ())
            .map_err(|error| {
                PublishError::with_source(format!("upload of {dataset_id} failed"), error)
            })
    }

    fn publish(&self, dataset_id: &str, metadata: &DatasetMetadata) -> Result<(), PublishError> {
        self.publish_dataset(dataset_id, metadata)
            .map_err(|error| {
                PublishError::with_source(format!("publish of {dataset_id} failed"), error)
            })
    }
}

/// Commits on success, rolls back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn read_published(row: &::duckdb::Row<'_>) -> Result<PublishedDataset, ::duckdb::Error> {
    Ok(PublishedDataset {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        source_dataflow: row.get(3)?,
        row_count: row.get(4)?,
        published_at: row.get(5)?,
    })
}

fn table_exists(connection: &Connection, table_name: &str) -> Result<bool, ::duckdb::Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn validate_dataset_id(dataset_id: &str) -> Result<(), WarehouseError> {
    let mut chars = dataset_id.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WarehouseError::InvalidDatasetId(dataset_id.to_string()))
    }
}

fn column_definitions(
    table: &NormalizedTable,
    dataset_id: &str,
) -> Result<Vec<String>, WarehouseError> {
    let columns = table.schema().columns();
    if columns.is_empty() {
        return Err(WarehouseError::NoColumns {
            dataset_id: dataset_id.to_string(),
        });
    }

    columns
        .iter()
        .enumerate()
        .map(|(position, column)| {
            if column.name.trim().is_empty() {
                return Err(WarehouseError::UnnamedColumn {
                    dataset_id: dataset_id.to_string(),
                    position,
                });
            }
            let sql_type = match column.kind {
                ColumnKind::Text => "TEXT",
                ColumnKind::Numeric => "DOUBLE",
            };
            Ok(format!("{} {sql_type}", quote_identifier(&column.name)))
        })
        .collect()
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_duck_value(value: &FieldValue) -> DuckValue {
    match value {
        FieldValue::Text(text) => DuckValue::Text(text.clone()),
        FieldValue::Number(Some(number)) => DuckValue::Double(*number),
        FieldValue::Number(None) => DuckValue::Null,
    }
}
