//! Ingest and transform orchestration.
//!
//! Both phases walk their dataflows one at a time. A failure inside the loop
//! is logged, recorded against its dataflow id and never stops the batch;
//! failures outside the loop (catalogue fetch, cache discovery) end the phase.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::cache::{data_key, ArtifactFormat, CacheError, RawCache, CATALOGUE_KEY, DATA_KEY_PREFIX};
use crate::catalog::{parse_catalogue, CatalogStore, DEFAULT_LANG};
use crate::client::{DataRequest, IloClient};
use crate::dataset::{derive_dataset_id, Dataset, DatasetMetadata, DatasetPublisher, WriteMode};
use crate::error::PipelineError;
use crate::normalize::CsvNormalizer;

/// Which dataflows the transform phase covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformScope {
    Skip,
    All,
    /// One dataflow; its failure is returned to the caller.
    Single(String),
}

/// Phases selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub ingest: bool,
    pub transform: TransformScope,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            ingest: true,
            transform: TransformScope::All,
        }
    }
}

impl RunPlan {
    pub fn from_flags(ingest_only: bool, transform_only: bool, dataflow: Option<String>) -> Self {
        let transform = match (ingest_only, dataflow) {
            (true, _) => TransformScope::Skip,
            (false, Some(id)) => TransformScope::Single(id),
            (false, None) => TransformScope::All,
        };
        Self {
            ingest: !transform_only,
            transform,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataflowFailure {
    pub dataflow_id: String,
    pub code: &'static str,
    pub message: String,
}

impl DataflowFailure {
    fn new(dataflow_id: &str, error: &PipelineError) -> Self {
        Self {
            dataflow_id: dataflow_id.to_string(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedDataflow {
    pub dataflow_id: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub catalogue_size: usize,
    pub fetched: Vec<IngestedDataflow>,
    pub failures: Vec<DataflowFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformOutcome {
    pub dataflow_id: String,
    pub dataset_id: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub succeeded: Vec<TransformOutcome>,
    pub failures: Vec<DataflowFailure>,
}

impl TransformReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformReport>,
}

pub struct Pipeline {
    client: IloClient,
    cache: RawCache,
    catalog: Arc<CatalogStore>,
    publisher: Arc<dyn DatasetPublisher>,
    normalizer: CsvNormalizer,
    run_id: String,
}

impl Pipeline {
    pub fn new(
        client: IloClient,
        cache: RawCache,
        catalog: Arc<CatalogStore>,
        publisher: Arc<dyn DatasetPublisher>,
    ) -> Self {
        Self {
            client,
            cache,
            catalog,
            publisher,
            normalizer: CsvNormalizer::default(),
            run_id: String::from(crate::config::DEFAULT_RUN_ID),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub async fn run(&self, plan: &RunPlan) -> Result<RunSummary, PipelineError> {
        let span = info_span!("run", run_id = %self.run_id);
        async move {
            let mut summary = RunSummary {
                run_id: self.run_id.clone(),
                ingest: None,
                transform: None,
            };

            if plan.ingest {
                info!("phase 1: ingest");
                summary.ingest = Some(self.ingest().await?);
            }

            match &plan.transform {
                TransformScope::Skip => {}
                TransformScope::All => {
                    info!("phase 2: transform");
                    summary.transform = Some(self.transform_all()?);
                }
                TransformScope::Single(dataflow_id) => {
                    info!(dataflow_id = %dataflow_id, "phase 2: transform (single dataflow)");
                    let outcome = self.transform_one(dataflow_id)?;
                    summary.transform = Some(TransformReport {
                        succeeded: vec![outcome],
                        failures: Vec::new(),
                    });
                }
            }

            info!("run complete");
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Fetches the catalogue, caches it, then fetches and caches every dataflow.
    pub async fn ingest(&self) -> Result<IngestReport, PipelineError> {
        info!("fetching dataflow catalogue");
        let message = self
            .client
            .fetch_catalogue()
            .await
            .map_err(PipelineError::CatalogueFetch)?;
        self.cache.save_json(CATALOGUE_KEY, &message)?;

        let dataflows = parse_catalogue(&message)
            .map_err(|error| PipelineError::CatalogueFetch(error.into()))?;
        let total = dataflows.len();
        info!(dataflows = total, "fetching dataflow data");

        let mut report = IngestReport {
            catalogue_size: total,
            ..IngestReport::default()
        };

        for (index, descriptor) in dataflows.iter().enumerate() {
            let dataflow_id = descriptor.id.as_str();
            let name: String = descriptor.display_name(DEFAULT_LANG).chars().take(50).collect();
            info!(dataflow_id, name = %name, "[{}/{}]", index + 1, total);

            match self.ingest_one(dataflow_id).await {
                Ok(bytes) => {
                    info!(dataflow_id, bytes, "cached");
                    report.fetched.push(IngestedDataflow {
                        dataflow_id: dataflow_id.to_string(),
                        bytes,
                    });
                }
                Err(error) => {
                    error!(dataflow_id, code = error.code(), "{error}");
                    report.failures.push(DataflowFailure::new(dataflow_id, &error));
                }
            }
        }

        info!(
            fetched = report.fetched.len(),
            failed = report.failures.len(),
            "ingest complete"
        );
        Ok(report)
    }

    async fn ingest_one(&self, dataflow_id: &str) -> Result<usize, PipelineError> {
        let csv_text = self
            .client
            .fetch_data(&DataRequest::new(dataflow_id))
            .await
            .map_err(|source| PipelineError::DataflowFetch {
                dataflow_id: dataflow_id.to_string(),
                source,
            })?;
        self.cache
            .save(&data_key(dataflow_id), &csv_text, ArtifactFormat::Csv)?;
        Ok(csv_text.len())
    }

    /// Ids of every dataflow with cached data, sorted.
    pub fn discover_ingested(&self) -> Result<Vec<String>, PipelineError> {
        Ok(self
            .cache
            .list(DATA_KEY_PREFIX, ArtifactFormat::Csv)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(DATA_KEY_PREFIX).map(str::to_string))
            .filter(|id| !id.is_empty())
            .collect())
    }

    /// Loads and normalizes the cached data of one dataflow.
    pub fn build_dataset(&self, dataflow_id: &str) -> Result<Dataset, PipelineError> {
        let descriptor = self.catalog.describe(dataflow_id)?;
        let metadata = DatasetMetadata::from_descriptor(&descriptor);

        let key = data_key(dataflow_id);
        let csv_text = self
            .cache
            .load(&key, ArtifactFormat::Csv)
            .map_err(|error| match error {
                CacheError::NotFound { key } => PipelineError::CacheMiss {
                    dataflow_id: dataflow_id.to_string(),
                    key,
                },
                other => other.into(),
            })?;

        let table = self
            .normalizer
            .parse(&csv_text)
            .map_err(|source| PipelineError::Normalize {
                dataflow_id: dataflow_id.to_string(),
                source,
            })?;
        if table.is_empty() {
            return Err(PipelineError::EmptyTable {
                dataflow_id: dataflow_id.to_string(),
            });
        }

        Ok(Dataset { metadata, table })
    }

    /// Builds, uploads and publishes one dataflow's dataset.
    pub fn transform_one(&self, dataflow_id: &str) -> Result<TransformOutcome, PipelineError> {
        let dataset = self.build_dataset(dataflow_id)?;
        let rows = dataset.num_rows();
        let dataset_id = dataset.id().to_string();

        let publish_error = |source| PipelineError::Publish {
            dataset_id: dataset_id.clone(),
            source,
        };
        self.publisher
            .upload(&dataset.table, &dataset_id, WriteMode::Overwrite)
            .map_err(publish_error)?;
        self.publisher
            .publish(&dataset_id, &dataset.metadata)
            .map_err(publish_error)?;

        Ok(TransformOutcome {
            dataflow_id: dataflow_id.to_string(),
            dataset_id,
            rows,
        })
    }

    /// Transforms every ingested dataflow, recording failures per dataflow.
    pub fn transform_all(&self) -> Result<TransformReport, PipelineError> {
        let dataflow_ids = self.discover_ingested()?;
        let total = dataflow_ids.len();
        info!(dataflows = total, "found ingested dataflows");

        let mut report = TransformReport::default();
        for (index, dataflow_id) in dataflow_ids.iter().enumerate() {
            let dataset_id = derive_dataset_id(dataflow_id);
            info!(
                dataflow_id = %dataflow_id,
                dataset_id = %dataset_id,
                "[{}/{}]",
                index + 1,
                total
            );

            match self.transform_one(dataflow_id) {
                Ok(outcome) => {
                    info!(dataflow_id = %dataflow_id, rows = outcome.rows, "published");
                    report.succeeded.push(outcome);
                }
                Err(error) => {
                    warn!(dataflow_id = %dataflow_id, code = error.code(), "{error}");
                    report.failures.push(DataflowFailure::new(dataflow_id, &error));
                }
            }
        }

        info!(
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "transforms complete"
        );
        Ok(report)
    }
}
