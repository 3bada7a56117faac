//! ==============================================================================
//! client.rs - sensor node client
//! ==============================================================================
//!
//! purpose:
//!     what a sensor node links against to talk to the hub: register once at
//!     boot, push a reading every cycle, unregister on shutdown.
//!
//! relationships:
//!     - talks to: api.rs routes over http (reqwest)
//!
//! ==============================================================================

use crate::api::{MessageResponse, RegisterRequest, UnregisterRequest, UpdateRequest};
use crate::domain::{Device, Snapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with an error body.
    #[error("Hub rejected request ({status}, {kind}): {message}")]
    Hub {
        status: u16,
        kind: String,
        message: String,
    },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Hub { status: 404, .. })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    kind: String,
}

#[derive(Clone)]
pub struct HubClient {
    base_url: String,
    http: reqwest::Client,
}

impl HubClient {
    /// `base_url` like `http://192.168.1.85:5000`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub async fn register(&self, name: &str, location: &str) -> Result<String, ClientError> {
        let req = RegisterRequest {
            name: name.to_string(),
            location: location.to_string(),
        };
        let resp: MessageResponse = self.post("register", &req).await?;
        Ok(resp.message)
    }

    pub async fn unregister(&self, name: &str) -> Result<String, ClientError> {
        let req = UnregisterRequest {
            name: name.to_string(),
        };
        let resp: MessageResponse = self.post("unregister", &req).await?;
        Ok(resp.message)
    }

    /// Pushes one reading. `readings` maps metric keys (`temperature`,
    /// `gasResistance`, ...) to values.
    pub async fn update(
        &self,
        name: &str,
        readings: BTreeMap<String, f64>,
    ) -> Result<String, ClientError> {
        let req = UpdateRequest {
            name: name.to_string(),
            readings: readings
                .into_iter()
                .map(|(key, value)| (key, serde_json::Value::from(value)))
                .collect(),
        };
        let resp: MessageResponse = self.post("update", &req).await?;
        Ok(resp.message)
    }

    pub async fn list(&self) -> Result<Snapshot, ClientError> {
        let resp = self.http.post(self.url("get_list")).send().await?;
        Self::decode(resp).await
    }

    pub async fn device(&self, name: &str) -> Result<Device, ClientError> {
        let resp = self
            .http
            .get(self.url(&format!("devices/{name}")))
            .send()
            .await?;
        Self::decode(resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let text = resp.text().await?;
        let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.kind, body.error),
            Err(_) => (String::new(), text),
        };
        Err(ClientError::Hub {
            status: status.as_u16(),
            kind,
            message,
        })
    }
}
