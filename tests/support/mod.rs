//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use ilostat_core::{
    DatasetMetadata, DatasetPublisher, HttpClient, HttpError, HttpRequest, HttpResponse,
    NormalizedTable, PublishError, WriteMode,
};

/// Transport answering from a fixed route table and recording every request.
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Vec<(String, Result<HttpResponse, HttpError>)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers any URL containing `fragment`. Earlier routes win.
    pub fn route(mut self, fragment: &str, status: u16, body: &str) -> Self {
        self.routes.push((
            fragment.to_string(),
            Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
        ));
        self
    }

    pub fn route_error(mut self, fragment: &str, error: HttpError) -> Self {
        self.routes.push((fragment.to_string(), Err(error)));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let answer = self
                .routes
                .iter()
                .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                .map(|(_, answer)| answer.clone())
                .unwrap_or_else(|| {
                    Ok(HttpResponse {
                        status: 404,
                        body: format!("no route for {}", request.url),
                    })
                });
            self.requests.lock().expect("requests lock").push(request);
            answer
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub dataset_id: String,
    pub mode: WriteMode,
    pub rows: usize,
    pub table: NormalizedTable,
}

/// Publisher keeping everything it receives in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    pub uploads: Mutex<Vec<Upload>>,
    pub published: Mutex<Vec<DatasetMetadata>>,
    pub fail_uploads_for: Option<String>,
}

impl RecordingPublisher {
    pub fn failing_for(dataset_id: &str) -> Self {
        Self {
            fail_uploads_for: Some(dataset_id.to_string()),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().expect("uploads lock").clone()
    }

    pub fn published(&self) -> Vec<DatasetMetadata> {
        self.published.lock().expect("published lock").clone()
    }
}

impl DatasetPublisher for RecordingPublisher {
    fn upload(
        &self,
        table: &NormalizedTable,
        dataset_id: &str,
        mode: WriteMode,
    ) -> Result<(), PublishError> {
        if self.fail_uploads_for.as_deref() == Some(dataset_id) {
            return Err(PublishError::new(format!("store rejected {dataset_id}")));
        }
        self.uploads.lock().expect("uploads lock").push(Upload {
            dataset_id: dataset_id.to_string(),
            mode,
            rows: table.num_rows(),
            table: table.clone(),
        });
        Ok(())
    }

    fn publish(&self, dataset_id: &str, metadata: &DatasetMetadata) -> Result<(), PublishError> {
        assert_eq!(dataset_id, metadata.id);
        self.published
            .lock()
            .expect("published lock")
            .push(metadata.clone());
        Ok(())
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}

pub const CATALOGUE_JSON: &str = r#"{
  "data": {
    "dataflows": [
      {
        "id": "DF_A",
        "agencyID": "ILO",
        "version": "1.0",
        "names": {"en": "Labour force A"},
        "description": {"en": "Series A by sex"}
      },
      {
        "id": "DF_B",
        "agencyID": "ILO",
        "version": "1.0",
        "names": [{"lang": "fr", "value": "Série B"}]
      }
    ]
  }
}"#;

pub const DF_A_CSV: &str = "\
DATAFLOW,REF_AREA,SEX,TIME_PERIOD,OBS_VALUE
ILO:DF_A(1.0),FRA,SEX_T,2022,7.3
ILO:DF_A(1.0),FRA,SEX_T,2023,
ILO:DF_A(1.0),DEU,SEX_T,2023,3.1
";
