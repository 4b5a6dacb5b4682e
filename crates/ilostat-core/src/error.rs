use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::client::FetchError;
use crate::dataset::PublishError;
use crate::normalize::NormalizeError;

/// Failures raised by the ingest and transform phases.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The catalogue could not be fetched; nothing downstream can run.
    #[error("catalogue fetch failed: {0}")]
    CatalogueFetch(#[source] FetchError),

    #[error("fetch failed for dataflow {dataflow_id}: {source}")]
    DataflowFetch {
        dataflow_id: String,
        #[source]
        source: FetchError,
    },

    /// A dataflow was expected in the raw cache but was never ingested.
    #[error("dataflow {dataflow_id} has not been ingested (missing artifact '{key}')")]
    CacheMiss { dataflow_id: String, key: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("no data found for {dataflow_id}")]
    EmptyTable { dataflow_id: String },

    #[error("failed to normalize {dataflow_id}: {source}")]
    Normalize {
        dataflow_id: String,
        #[source]
        source: NormalizeError,
    },

    #[error("failed to publish {dataset_id}: {source}")]
    Publish {
        dataset_id: String,
        #[source]
        source: PublishError,
    },
}

impl PipelineError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CatalogueFetch(_) => "pipeline.catalogue_fetch",
            Self::DataflowFetch { .. } => "pipeline.dataflow_fetch",
            Self::CacheMiss { .. } => "pipeline.cache_miss",
            Self::Cache(_) => "pipeline.cache",
            Self::Catalog(_) => "pipeline.catalog",
            Self::EmptyTable { .. } => "pipeline.empty_table",
            Self::Normalize { .. } => "pipeline.normalize",
            Self::Publish { .. } => "pipeline.publish",
        }
    }
}
