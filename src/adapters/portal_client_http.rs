//! Voting portal client implementation using reqwest.

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use url::Url;

use crate::domain::{AppError, PortalApiConfig, RawProposal};
use crate::ports::{OpenListing, RemoteSource};

const STATUS_OK: &str = "OK";

/// HTTP client for the voting portal API.
#[derive(Debug, Clone)]
pub struct HttpPortalClient {
    open_url: Url,
    detail_url: Url,
    client: Client,
}

impl HttpPortalClient {
    /// Create a new HTTP client from the portal configuration.
    pub fn new(config: &PortalApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let open_url = config.api_url.join(&config.open_endpoint).map_err(|e| {
            AppError::InvalidConfig(format!("Invalid open_endpoint '{}': {}", config.open_endpoint, e))
        })?;
        let detail_url = config.api_url.join(&config.detail_endpoint).map_err(|e| {
            AppError::InvalidConfig(format!(
                "Invalid detail_endpoint '{}': {}",
                config.detail_endpoint, e
            ))
        })?;

        Ok(Self { open_url, detail_url, client })
    }

    fn detail_url_for(&self, proposal_id: u64) -> Result<Url, AppError> {
        self.detail_url
            .join(&proposal_id.to_string())
            .map_err(|e| AppError::Fetch(format!("Invalid detail URL for {}: {}", proposal_id, e)))
    }

    /// GET `url` and unwrap the `{status: "OK", result: ...}` envelope.
    fn get_result(&self, url: Url) -> Result<Value, AppError> {
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| AppError::Fetch(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("Invalid status code {}", status.as_u16())));
        }

        let body: Value = response
            .json()
            .map_err(|e| AppError::MalformedPayload(format!("Failed to parse response: {}", e)))?;

        unwrap_envelope(body)
    }
}

fn unwrap_envelope(body: Value) -> Result<Value, AppError> {
    let Value::Object(mut envelope) = body else {
        return Err(AppError::MalformedPayload("response is not a JSON object".into()));
    };

    let status = envelope
        .get("status")
        .ok_or_else(|| AppError::MalformedPayload("Invalid response: status missing!".into()))?;

    if !status.as_str().is_some_and(|s| s.contains(STATUS_OK)) {
        return Err(AppError::Fetch(format!("Invalid response: status not OK => {}", status)));
    }

    envelope
        .remove("result")
        .ok_or_else(|| AppError::MalformedPayload("Invalid response: result missing!".into()))
}

/// Pick the proposal object out of a detail `result`.
///
/// The portal has shipped the key misspelt as `propposal`; both spellings and
/// a bare proposal object are accepted.
fn detail_proposal(result: Value) -> Result<RawProposal, AppError> {
    let Value::Object(mut result) = result else {
        return Err(AppError::MalformedPayload("Invalid response: result is not an object".into()));
    };

    let nested = result.remove("proposal").or_else(|| result.remove("propposal"));
    match nested {
        Some(Value::Object(raw)) => Ok(raw),
        Some(_) => Err(AppError::MalformedPayload("Invalid response: proposal is not an object".into())),
        None if result.contains_key("proposalId") => Ok(result),
        None => Err(AppError::MalformedPayload("Invalid response: proposal missing!".into())),
    }
}

impl RemoteSource for HttpPortalClient {
    fn fetch_open_proposals(&self) -> Result<OpenListing, AppError> {
        let result = self.get_result(self.open_url.clone())?;

        let Value::Array(items) = result else {
            return Err(AppError::MalformedPayload("Invalid response: result is not a list".into()));
        };

        let mut listing = OpenListing { proposals: Vec::with_capacity(items.len()), rejected: 0 };
        for item in items {
            match item {
                Value::Object(raw) => listing.proposals.push(raw),
                other => {
                    log::warn!("Skipping non-object entry in open list: {}", other);
                    listing.rejected += 1;
                }
            }
        }
        Ok(listing)
    }

    fn fetch_detail(&self, proposal_id: u64) -> Result<RawProposal, AppError> {
        let result = self.get_result(self.detail_url_for(proposal_id)?)?;
        let raw = detail_proposal(result)?;

        let received = raw
            .get("proposalId")
            .and_then(Value::as_u64)
            .ok_or_else(|| AppError::MissingField("proposalId".into()))?;

        if received != proposal_id {
            return Err(AppError::IdMismatch { requested: proposal_id, received });
        }

        Ok(raw)
    }
}
