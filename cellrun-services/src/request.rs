// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use cellrun_core::ds::Channel;
use cellrun_core::mp::ObjectMorphology;
use cellrun_core::pl::{AnnotationError, AnnotationRequest, Annotator, TypePrediction};

#[derive(Serialize)]
struct PredictRequest<'a> {
    dataset_id: &'a str,
    model: &'a str,
    mpp: Option<f64>,
    markers: &'a [Channel],
    objects: &'a [ObjectMorphology],
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<TypePrediction>,
}

/// Client for a DeepCell Types prediction endpoint
///
/// Each call blocks on a runtime owned by the client, so the driver loop
/// stays synchronous.
pub struct HttpAnnotator {
    client: Client,
    runtime: Runtime,
    url: String,
    model: String,
}

impl HttpAnnotator {
    /// # Arguments
    ///
    /// * `url` - Base URL of the service; requests go to `<url>/predict`
    /// * `model` - Model name forwarded with every request
    /// * `timeout` - Per-request timeout
    pub fn new(url: &str, model: &str, timeout: Duration) -> Result<HttpAnnotator> {
        let client = Client::builder()
            .user_agent(concat!("cellrun/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        Ok(HttpAnnotator {
            client,
            runtime,
            url: format!("{}/predict", url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    async fn predict(&self, request: &AnnotationRequest<'_>) -> Result<Vec<TypePrediction>, AnnotationError> {
        let body = PredictRequest {
            dataset_id: request.dataset_id,
            model: &self.model,
            mpp: request.mpp,
            markers: request.markers,
            objects: request.morphology.rows(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(request.token.expose())
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let text = response
            .text()
            .await
            .map_err(|err| AnnotationError::Transient(format!("Failed to read response: {}", err)))?;

        let parsed: PredictResponse = serde_json::from_str(&text).map_err(|err| {
            AnnotationError::Rejected(format!("Response is not a prediction list: {}", err))
        })?;

        Ok(parsed.predictions)
    }
}

impl Annotator for HttpAnnotator {
    fn annotate(&mut self, request: &AnnotationRequest) -> Result<Vec<TypePrediction>, AnnotationError> {
        self.runtime.block_on(self.predict(request))
    }
}

fn classify_send_error(err: reqwest::Error) -> AnnotationError {
    if err.is_builder() {
        AnnotationError::Rejected(format!("Request could not be built: {}", err))
    } else if err.is_timeout() {
        AnnotationError::Transient(format!("Request timed out: {}", err))
    } else {
        AnnotationError::Transient(format!("Request failed: {}", err))
    }
}

/// Map a non-success HTTP status onto an annotation failure
pub fn classify_status(status: StatusCode, body: &str) -> AnnotationError {
    let body: String = body.chars().take(200).collect();
    let message = format!("{} {}", status, body).trim().to_string();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnnotationError::Auth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AnnotationError::Transient(message)
        }
        status if status.is_server_error() => AnnotationError::Transient(message),
        _ => AnnotationError::Rejected(message),
    }
}
