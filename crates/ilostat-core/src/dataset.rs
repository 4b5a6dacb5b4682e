//! Published dataset model and the publisher contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{DataflowDescriptor, DEFAULT_LANG};
use crate::normalize::NormalizedTable;

pub const DATASET_ID_PREFIX: &str = "ilo_";
const DATAFLOW_ID_PREFIX: &str = "DF_";

/// `DF_UNE_DEAP_SEX_AGE_RT` → `ilo_une_deap_sex_age_rt`.
pub fn derive_dataset_id(dataflow_id: &str) -> String {
    let base = dataflow_id
        .strip_prefix(DATAFLOW_ID_PREFIX)
        .unwrap_or(dataflow_id);
    format!("{DATASET_ID_PREFIX}{}", base.to_lowercase())
}

/// Metadata registered alongside an uploaded table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub source_dataflow: String,
}

impl DatasetMetadata {
    /// Metadata for the dataset built from `descriptor`.
    pub fn from_descriptor(descriptor: &DataflowDescriptor) -> Self {
        let description = descriptor
            .description_text(DEFAULT_LANG)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Data from ILO dataflow {}", descriptor.id));

        Self {
            id: derive_dataset_id(&descriptor.id),
            title: format!("ILO: {}", descriptor.display_name(DEFAULT_LANG)),
            description,
            source_dataflow: descriptor.id.clone(),
        }
    }
}

/// A normalized table ready to hand to a [`DatasetPublisher`].
#[derive(Debug, Clone)]
pub struct Dataset {
    pub metadata: DatasetMetadata,
    pub table: NormalizedTable,
}

impl Dataset {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }
}

/// How `upload` treats data already stored under the dataset id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    #[default]
    Overwrite,
    Append,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct PublishError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Durable store datasets are published into.
///
/// Both calls must be idempotent for a given dataset id.
pub trait DatasetPublisher: Send + Sync {
    fn upload(
        &self,
        table: &NormalizedTable,
        dataset_id: &str,
        mode: WriteMode,
    ) -> Result<(), PublishError>;

    fn publish(&self, dataset_id: &str, metadata: &DatasetMetadata) -> Result<(), PublishError>;
}
