//! # ILOSTAT Core
//!
//! Batch connector core for the ILO SDMX statistics API.
//!
//! ## Overview
//!
//! A run has two phases that can also be invoked on their own:
//!
//! - **Ingest** fetches the dataflow catalogue, then each dataflow's data as
//!   SDMX-CSV, and stores every response verbatim in the raw cache.
//! - **Transform** discovers what was cached, normalizes each CSV into a typed
//!   table and hands it to a [`DatasetPublisher`].
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Raw artifact store keyed by logical name |
//! | [`catalog`] | Dataflow descriptors and the memoized catalogue store |
//! | [`client`] | Rate-limited SDMX REST client |
//! | [`config`] | Environment-driven configuration |
//! | [`dataset`] | Dataset ids, metadata and the publisher contract |
//! | [`error`] | Pipeline error kinds |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`normalize`] | SDMX-CSV → typed table |
//! | [`pipeline`] | Ingest/transform orchestration |
//! | [`throttling`] | Rolling-window request limiter |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │  IloClient   │──▶│    RawCache     │──▶│ CsvNormalizer│
//! │ (throttled)  │   │ dataflows.json  │   └──────┬───────┘
//! └──────────────┘   │ data_<id>.csv   │          │
//!                    └────────┬────────┘          ▼
//!                             │           ┌────────────────┐
//!                             └──────────▶│DatasetPublisher│
//!                           CatalogStore  └────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Per-dataflow failures are recorded in the phase report and never abort the
//! batch. Only failures outside the per-dataflow loop surface as `Err`:
//!
//! ```rust,ignore
//! match pipeline.run(&RunPlan::default()).await {
//!     Ok(summary) => println!("{summary:?}"),
//!     Err(PipelineError::CatalogueFetch(error)) => eprintln!("no catalogue: {error}"),
//!     Err(error) => eprintln!("run failed: {error}"),
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod pipeline;
pub mod throttling;

pub use cache::{data_key, ArtifactFormat, CacheError, RawCache, CATALOGUE_KEY, DATA_KEY_PREFIX};
pub use catalog::{
    parse_catalogue, CatalogError, CatalogStore, DataflowDescriptor, LocalizedText,
    LocalizedValue,
};
pub use client::{DataRequest, FetchError, IloClient};
pub use config::{ClientConfig, ConnectorConfig};
pub use dataset::{
    derive_dataset_id, Dataset, DatasetMetadata, DatasetPublisher, PublishError, WriteMode,
};
pub use error::PipelineError;
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use normalize::{
    Column, ColumnKind, CsvNormalizer, FieldValue, NormalizeError, NormalizedRecord,
    NormalizedTable, TableSchema,
};
pub use pipeline::{
    DataflowFailure, IngestReport, IngestedDataflow, Pipeline, RunPlan, RunSummary,
    TransformOutcome, TransformReport, TransformScope,
};
pub use throttling::SlidingWindowLimiter;
