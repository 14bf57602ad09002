//! HashiCorp Vault client over the live HTTP API.

use crate::config::HashicorpSpecs;
use keymanager_spec::vendor::{HttpError, KvClient, TokenClient};
use keymanager_spec::Error;
use parking_lot::RwLock;
use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fs;

pub struct HashicorpClient {
    client: Client,
    address: String,
    namespace: Option<String>,
    token: RwLock<String>,
}

#[derive(Deserialize)]
struct DataEnvelope {
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct KeyListResponse {
    data: KeyListData,
}

#[derive(Deserialize)]
struct KeyListData {
    keys: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct UnwrapResponse {
    auth: Option<UnwrapAuth>,
}

#[derive(Deserialize)]
struct UnwrapAuth {
    client_token: String,
}

impl HashicorpClient {
    pub fn new(specs: &HashicorpSpecs) -> keymanager_spec::Result<Self> {
        let token = match (&specs.token, &specs.token_path) {
            (Some(token), _) => token.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .map(|raw| raw.trim().to_string())
                .map_err(|err| {
                    Error::Config(format!("failed to read token file {}: {err}", path.display()))
                })?,
            (None, None) => String::new(),
        };

        let mut builder = Client::builder().timeout(specs.timeout());
        if let Some(path) = specs.ca_bundle.as_ref() {
            let ca = fs::read(path).map_err(|err| {
                Error::Config(format!("failed to read CA bundle {}: {err}", path.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&ca)
                .or_else(|_| reqwest::Certificate::from_der(&ca))
                .map_err(|err| Error::Config(format!("failed to parse CA bundle: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if specs.skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|err| Error::Config(format!("failed to build Vault HTTP client: {err}")))?;

        Ok(Self {
            client,
            address: specs.address.clone(),
            namespace: specs.namespace.clone(),
            token: RwLock::new(token),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Response, HttpError> {
        let url = format!(
            "{}/v1/{}",
            self.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut builder = self.client.request(method, url);
        let current = self.token.read().clone();
        builder = builder.header("X-Vault-Token", token.unwrap_or(&current));
        if let Some(namespace) = &self.namespace {
            builder = builder.header("X-Vault-Namespace", namespace);
        }
        if let Some(payload) = body {
            builder = builder.json(&payload);
        }
        builder
            .send()
            .map_err(|err| HttpError::transport(format!("vault request failed: {err}")))
    }
}

fn failure(response: Response) -> HttpError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    HttpError::new(status, body)
}

fn data_of(response: Response) -> Result<Option<Value>, HttpError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    let body = response.text().unwrap_or_default();
    if body.trim().is_empty() {
        return Ok(None);
    }
    let envelope: DataEnvelope = serde_json::from_str(&body).map_err(|err| {
        HttpError::transport(format!("failed to decode vault response: {err}; body={body}"))
    })?;
    Ok(envelope.data.filter(|data| !data.is_null()))
}

impl KvClient for HashicorpClient {
    fn read(&self, path: &str) -> Result<Option<Value>, HttpError> {
        let response = self.request(Method::GET, path, None, None)?;
        match response.status() {
            // KV v2 answers 404 for deleted versions but still returns their metadata.
            StatusCode::NOT_FOUND => Ok(data_of(response).unwrap_or(None)),
            status if status.is_success() => data_of(response),
            _ => Err(failure(response)),
        }
    }

    fn write(&self, path: &str, data: Value) -> Result<Option<Value>, HttpError> {
        let response = self.request(Method::POST, path, None, Some(data))?;
        if !response.status().is_success() {
            return Err(failure(response));
        }
        data_of(response)
    }

    fn list(&self, path: &str) -> Result<Vec<String>, HttpError> {
        let method = Method::from_bytes(b"LIST")
            .map_err(|err| HttpError::transport(format!("LIST method unavailable: {err}")))?;
        let response = self.request(method, path, None, None)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let body = response.text().unwrap_or_default();
                let list: KeyListResponse = serde_json::from_str(&body).map_err(|err| {
                    HttpError::transport(format!("failed to decode vault key list: {err}; body={body}"))
                })?;
                Ok(list.data.keys.unwrap_or_default())
            }
            _ => Err(failure(response)),
        }
    }

    fn delete(&self, path: &str) -> Result<(), HttpError> {
        let response = self.request(Method::DELETE, path, None, None)?;
        if !response.status().is_success() {
            return Err(failure(response));
        }
        Ok(())
    }
}

impl TokenClient for HashicorpClient {
    fn set_token(&self, token: &str) {
        *self.token.write() = token.to_string();
    }

    fn unwrap_token(&self, wrapped: &str) -> Result<String, HttpError> {
        let response = self.request(Method::POST, "sys/wrapping/unwrap", Some(wrapped), None)?;
        if !response.status().is_success() {
            return Err(failure(response));
        }
        let body = response.text().unwrap_or_default();
        let parsed: UnwrapResponse = serde_json::from_str(&body).map_err(|err| {
            HttpError::transport(format!("failed to decode unwrap response: {err}"))
        })?;
        parsed
            .auth
            .map(|auth| auth.client_token)
            .ok_or_else(|| HttpError::new(400, "unwrap response carries no client token"))
    }

    fn health_check(&self) -> Result<(), HttpError> {
        let response = self.request(Method::GET, "sys/health", None, None)?;
        match response.status().as_u16() {
            // active, standby and performance standby nodes all serve requests
            200 | 429 | 473 => Ok(()),
            _ => Err(failure(response)),
        }
    }
}
