// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use super::error::{StageError, StageResult};

/// Connection and retry tuning keys shared by every backend.
pub(crate) const TUNING_OPTIONS: [&str; 7] = [
    "timeout",
    "connect_timeout",
    "max_retries",
    "read_retries",
    "retry_timeout",
    "pool_idle_timeout",
    "pool_max_idle_per_host",
];

/// Keys that carry credentials and must never be logged.
const SECRET_OPTIONS: [&str; 8] = [
    "secret_access_key",
    "session_token",
    "token",
    "access_key",
    "account_key",
    "sas_token",
    "client_secret",
    "service_account_key",
];

/// Stage backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    /// Local filesystem directory
    Local,
    /// Process-local in-memory store, mostly for tests and dry runs
    Memory,
    /// AWS S3 (and S3-compatible endpoints)
    Aws,
    /// Azure Blob Storage / Data Lake Storage
    Azure,
    /// Google Cloud Storage
    Gcs,
}

impl StageType {
    /// The canonical lowercase name of this backend type.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Local => "local",
            StageType::Memory => "memory",
            StageType::Aws => "aws",
            StageType::Azure => "azure",
            StageType::Gcs => "gcs",
        }
    }
}

impl FromStr for StageType {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "file" => Ok(StageType::Local),
            "memory" | "mem" => Ok(StageType::Memory),
            "aws" | "s3" => Ok(StageType::Aws),
            "azure" | "abfss" => Ok(StageType::Azure),
            "gcs" | "gcp" | "gs" => Ok(StageType::Gcs),
            _ => Err(StageError::ConfigError(format!(
                "Unknown stage type: {}",
                s
            ))),
        }
    }
}

/// Configuration for a stage backed by `object_store`.
///
/// Options are a flat string map handed to the `object_store` builders, so a
/// stage can be described in JSON/TOML by the surrounding application
/// without this crate owning any loading logic.
///
/// The optional `prefix` scopes the whole stage to a sub-tree of the bucket,
/// container or directory. Object names seen through the stage are relative
/// to it.
///
/// # Examples
///
/// ## Local filesystem
/// ```
/// use warehouse_stage::stage::StageConfig;
///
/// let config = StageConfig::local()
///     .with_option("path", "/tmp/staging")
///     .with_prefix("loads");
/// ```
///
/// ## AWS S3
/// ```
/// use warehouse_stage::stage::StageConfig;
///
/// let config = StageConfig::new("s3")
///     .unwrap()
///     .with_option("bucket", "my-bucket")
///     .with_option("region", "us-east-1")
///     .with_option("access_key_id", "ACCESS_KEY")
///     .with_option("secret_access_key", "SECRET_ACCESS_KEY");
/// ```
///
/// ## Azure
/// ```
/// use warehouse_stage::stage::StageConfig;
///
/// let config = StageConfig::azure()
///     .with_option("container", "staging")
///     .with_option("account_name", "myaccount")
///     .with_option("access_key", "ACCOUNT_KEY");
/// ```
///
/// ## GCS
/// ```
/// use warehouse_stage::stage::StageConfig;
///
/// let config = StageConfig::gcs()
///     .with_option("bucket", "bq-staging")
///     .with_option("service_account_key_path", "/path/to/key.json");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Backend type
    #[serde(rename = "type")]
    pub storage_type: StageType,

    /// Namespace inside the backend that the stage operates over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Backend-specific configuration options
    ///
    /// AWS S3:
    /// - bucket, region, access_key_id, secret_access_key
    /// - session_token / token: temporary credentials
    /// - endpoint: custom endpoint URL (S3-compatible services)
    /// - allow_http: "true" to allow HTTP connections
    ///
    /// Azure:
    /// - container, account_name (both required)
    /// - access_key / account_key, sas_token
    /// - tenant_id, client_id, client_secret
    /// - use_fabric_endpoint, endpoint
    ///
    /// GCS:
    /// - bucket, service_account_key_path, service_account_key
    ///
    /// Local:
    /// - path: base directory (must exist)
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl StageConfig {
    /// Create a new stage configuration from a backend type name.
    ///
    /// Accepts "local", "memory", "aws"/"s3", "azure", "gcs"/"gcp"
    /// (case-insensitive).
    pub fn new(storage_type: impl AsRef<str>) -> StageResult<Self> {
        let storage_type = storage_type.as_ref().parse::<StageType>()?;
        Ok(Self::of_type(storage_type))
    }

    fn of_type(storage_type: StageType) -> Self {
        let options = match storage_type {
            StageType::Memory => HashMap::new(),
            _ => Self::default_options(),
        };
        Self {
            storage_type,
            prefix: None,
            options,
        }
    }

    /// Local filesystem stage configuration with default options.
    pub fn local() -> Self {
        Self::of_type(StageType::Local)
    }

    /// In-memory stage configuration. Carries no options.
    pub fn memory() -> Self {
        Self::of_type(StageType::Memory)
    }

    /// AWS S3 stage configuration with default options.
    pub fn aws() -> Self {
        Self::of_type(StageType::Aws)
    }

    /// Azure stage configuration with default options.
    pub fn azure() -> Self {
        Self::of_type(StageType::Azure)
    }

    /// Google Cloud Storage stage configuration with default options.
    pub fn gcs() -> Self {
        Self::of_type(StageType::Gcs)
    }

    /// Default timeout, retry, and connection pool settings.
    pub fn default_options() -> HashMap<String, String> {
        [
            ("timeout", "1200"),
            ("connect_timeout", "30"),
            ("max_retries", "20"),
            ("retry_timeout", "1200"),
            ("pool_idle_timeout", "15"),
            ("pool_max_idle_per_host", "5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Add a configuration option, replacing any previous value.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Add multiple configuration options.
    pub fn with_options(mut self, options: HashMap<String, String>) -> Self {
        self.options.extend(options);
        self
    }

    /// Scope the stage to a namespace prefix. Leading and trailing `/` are
    /// ignored; an empty prefix means the backend root.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Get a configuration option.
    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }

    /// The backend type as a string ("local", "memory", "aws", "azure", "gcs").
    pub fn storage_type_str(&self) -> &str {
        self.storage_type.as_str()
    }

    /// Options with tuning keys and credentials removed, safe to log.
    pub fn clean_options(&self) -> HashMap<String, String> {
        self.options
            .iter()
            .filter(|(k, _)| {
                !TUNING_OPTIONS.contains(&k.as_str()) && !SECRET_OPTIONS.contains(&k.as_str())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
