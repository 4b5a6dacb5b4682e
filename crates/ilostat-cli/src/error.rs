use ilostat_core::PipelineError;
use ilostat_warehouse::WarehouseError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("warehouse unavailable: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Pipeline(error) => match error {
                PipelineError::CatalogueFetch(_) | PipelineError::DataflowFetch { .. } => 3,
                PipelineError::CacheMiss { .. }
                | PipelineError::EmptyTable { .. }
                | PipelineError::Normalize { .. } => 4,
                PipelineError::Publish { .. } => 5,
                PipelineError::Cache(_) | PipelineError::Catalog(_) => 10,
            },
            Self::Warehouse(_) => 5,
            Self::Serialization(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
