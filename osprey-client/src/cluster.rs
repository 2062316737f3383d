//! Cluster settings services.

use bytes::Bytes;
use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::{Client, PerformRequestOptions};
use crate::error::{Error, Result};
use crate::params::{CommonParams, common_params_setters};

const SETTINGS_PATH: &str = "/_cluster/settings";

/// Reads cluster-wide settings via `GET /_cluster/settings`.
#[derive(Debug, Clone)]
pub struct ClusterGetSettingsService {
    client: Client,
    common: CommonParams,
    flat_settings: Option<bool>,
    include_defaults: Option<bool>,
    cluster_manager_timeout: Option<String>,
    timeout: Option<String>,
}

impl ClusterGetSettingsService {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            common: CommonParams::default(),
            flat_settings: None,
            include_defaults: None,
            cluster_manager_timeout: None,
            timeout: None,
        }
    }

    /// Return settings in flat format.
    pub fn flat_settings(mut self, flat: bool) -> Self {
        self.flat_settings = Some(flat);
        self
    }

    /// Include default settings.
    pub fn include_defaults(mut self, include: bool) -> Self {
        self.include_defaults = Some(include);
        self
    }

    /// Timeout for connecting to the cluster manager, e.g. `30s`.
    pub fn cluster_manager_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.cluster_manager_timeout = Some(timeout.into());
        self
    }

    /// Operation timeout, e.g. `30s`.
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    fn build_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        self.common.append_to(&mut params);
        if let Some(v) = &self.cluster_manager_timeout {
            params.push(("cluster_manager_timeout".to_string(), v.clone()));
        }
        if let Some(v) = &self.timeout {
            params.push(("timeout".to_string(), v.clone()));
        }
        if let Some(v) = self.flat_settings {
            params.push(("flat_settings".to_string(), v.to_string()));
        }
        if let Some(v) = self.include_defaults {
            params.push(("include_defaults".to_string(), v.to_string()));
        }
        params
    }

    /// Execute the request and return the decoded settings object.
    pub async fn send(&self) -> Result<Map<String, Value>> {
        let options = PerformRequestOptions::new(Method::GET, SETTINGS_PATH)
            .params(self.build_params())
            .headers(self.common.headers.clone());
        let response = self.client.perform_request(options).await?;
        Ok(response.json()?)
    }
}

common_params_setters!(ClusterGetSettingsService);

/// Updates cluster-wide settings via `PUT /_cluster/settings`.
#[derive(Debug, Clone)]
pub struct ClusterPutSettingsService {
    client: Client,
    common: CommonParams,
    flat_settings: Option<bool>,
    cluster_manager_timeout: Option<String>,
    timeout: Option<String>,
    body: Option<Bytes>,
}

impl ClusterPutSettingsService {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            common: CommonParams::default(),
            flat_settings: None,
            cluster_manager_timeout: None,
            timeout: None,
            body: None,
        }
    }

    /// Return settings in flat format.
    pub fn flat_settings(mut self, flat: bool) -> Self {
        self.flat_settings = Some(flat);
        self
    }

    /// Timeout for connecting to the cluster manager, e.g. `30s`.
    pub fn cluster_manager_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.cluster_manager_timeout = Some(timeout.into());
        self
    }

    /// Operation timeout, e.g. `30s`.
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Settings to apply, serialized as JSON.
    pub fn body_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Settings to apply, as a JSON string.
    pub fn body_string(mut self, body: impl Into<String>) -> Self {
        self.body = Some(Bytes::from(body.into()));
        self
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        if self.body.is_none() {
            return Err(Error::Validation(
                "missing required fields: [Body]".to_string(),
            ));
        }
        Ok(())
    }

    fn build_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        self.common.append_to(&mut params);
        if let Some(v) = &self.cluster_manager_timeout {
            params.push(("cluster_manager_timeout".to_string(), v.clone()));
        }
        if let Some(v) = &self.timeout {
            params.push(("timeout".to_string(), v.clone()));
        }
        if let Some(v) = self.flat_settings {
            params.push(("flat_settings".to_string(), v.to_string()));
        }
        params
    }

    /// Execute the request and return the decoded response object.
    pub async fn send(&self) -> Result<Map<String, Value>> {
        self.validate()?;
        let mut options = PerformRequestOptions::new(Method::PUT, SETTINGS_PATH)
            .params(self.build_params())
            .headers(self.common.headers.clone());
        if let Some(body) = &self.body {
            options = options.body(body.clone());
        }
        let response = self.client.perform_request(options).await?;
        Ok(response.json()?)
    }
}

common_params_setters!(ClusterPutSettingsService);
