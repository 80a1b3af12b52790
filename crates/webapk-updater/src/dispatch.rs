//! [`HttpUpdateDispatcher`] — posts update requests to the update server.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use webapk_core::{
  collab::{DispatchOutcome, UpdateDispatcher, UpdateRequest},
  lifecycle::UpdateResult,
};

use crate::Result;

/// Body the update server answers with on success. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct UpdateResponse {
  #[serde(default)]
  relax_updates: bool,
}

/// Sends [`UpdateRequest`]s as JSON to a single endpoint.
#[derive(Clone)]
pub struct HttpUpdateDispatcher {
  client:   Client,
  endpoint: String,
}

impl HttpUpdateDispatcher {
  pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, endpoint: endpoint.into() })
  }
}

impl UpdateDispatcher for HttpUpdateDispatcher {
  async fn dispatch(&self, request: &UpdateRequest) -> DispatchOutcome {
    let app_id = request.app_id.as_str();

    let response = match self.client.post(&self.endpoint).json(request).send().await {
      Ok(r) => r,
      // A request that never connected certainly failed; anything later may
      // have reached the server.
      Err(e) if e.is_connect() || e.is_builder() => {
        tracing::warn!(app_id, "update request not sent: {e}");
        return DispatchOutcome::failed(UpdateResult::Failure);
      }
      Err(e) => {
        tracing::warn!(app_id, "update request outcome unknown: {e}");
        return DispatchOutcome::failed(UpdateResult::ProbableFailure);
      }
    };

    let status = response.status();
    if !status.is_success() {
      tracing::warn!(app_id, %status, "update server rejected request");
      return DispatchOutcome::failed(UpdateResult::Failure);
    }

    let body = response.bytes().await.unwrap_or_default();
    let parsed: UpdateResponse = serde_json::from_slice(&body).unwrap_or_default();
    tracing::info!(app_id, relax_updates = parsed.relax_updates, "update accepted");
    DispatchOutcome {
      result:        UpdateResult::Success,
      relax_updates: parsed.relax_updates,
    }
  }
}
