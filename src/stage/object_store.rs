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

use super::config::{StageConfig, StageType, TUNING_OPTIONS};
use super::error::{StageError, StageResult};
use super::provider::{validate_name, Stage};
use crate::util::retry::{retry_with_max_retries, source_chain};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{
    aws::AmazonS3Builder, azure::MicrosoftAzureBuilder, gcp::GoogleCloudStorageBuilder,
    local::LocalFileSystem, memory::InMemory, ClientOptions, ObjectStore, ObjectStoreExt,
    PutPayload, RetryConfig,
};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

const DEFAULT_READ_RETRIES: usize = 3;

/// Stage adapter over any `object_store` backend: local directory, memory,
/// AWS S3, Azure and GCS.
///
/// Behaviour every backend shares:
///
/// * uploads overwrite an existing object, and the replacement is atomic
///   (local: temp file + rename, cloud: single PUT);
/// * deleting a missing key succeeds without doing anything;
/// * `list_bucket` returns names sorted ascending;
/// * after [`close`](Stage::close) every operation fails with
///   [`StageError::Closed`], including a second `close`.
///
/// Names must map onto an object path unchanged: no leading or trailing `/`,
/// no empty, `.` or `..` segments. Anything else is rejected as
/// `InvalidArgument` instead of being silently aliased to another key.
///
/// Local stages add two restrictions of the filesystem layout:
///
/// * a final segment ending in `#<digits>` (`part#1`) is reserved for the
///   store's temporary upload files;
/// * a name cannot be both an object and a prefix of another object
///   (`a` and `a/1`), since one would need to be a file and a directory.
///
/// Both are reported as `InvalidArgument`.
///
/// Reads (`list_bucket`, `get_object`) are retried on connection-level
/// failures up to `read_retries` times (default 3). That loop sits on top of
/// the HTTP retries of cloud clients, which `max_retries` and
/// `retry_timeout` configure, so each outer attempt may itself retry.
///
/// The stage is `Send + Sync` and may be shared between tasks.
pub struct ObjectStoreStage {
    config: StageConfig,
    store: RwLock<Option<Arc<dyn ObjectStore>>>,
    namespace: Option<ObjectPath>,
    base_path: String,
}

impl ObjectStoreStage {
    /// Create a stage from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// * required options for the backend are missing
    /// * the configured prefix is not a valid object path
    /// * the local path does not exist or is not a directory
    /// * the `object_store` builder rejects the options
    pub async fn new(config: StageConfig) -> StageResult<Self> {
        let namespace = Self::parse_namespace(config.prefix.as_deref())?;
        let (store, root) = Self::build_store(&config).await?;

        let base_path = match &namespace {
            Some(ns) => format!("{}/{}", root.trim_end_matches('/'), ns),
            None => root,
        };

        info!(
            "Opened stage type={} base_path={} options={:?}",
            config.storage_type_str(),
            base_path,
            config.clean_options()
        );

        Ok(Self {
            config,
            store: RwLock::new(Some(Arc::from(store))),
            namespace,
            base_path,
        })
    }

    /// Check that the backend is reachable with the configured credentials.
    ///
    /// Lists one level under the stage namespace; a missing namespace is not
    /// an error since the first upload creates it.
    pub async fn validate_connection(&self) -> StageResult<()> {
        let store = self.client().await?;
        store.list_with_delimiter(self.namespace.as_ref()).await?;
        Ok(())
    }

    /// Configuration this stage was built from.
    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    fn parse_namespace(prefix: Option<&str>) -> StageResult<Option<ObjectPath>> {
        let prefix = match prefix.map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(None),
        };
        Self::canonical_path(prefix)
            .map(Some)
            .ok_or_else(|| StageError::ConfigError(format!("Invalid stage prefix '{}'", prefix)))
    }

    /// Parse `s` as an object path, but only if it survives the round trip
    /// unchanged.
    fn canonical_path(s: &str) -> Option<ObjectPath> {
        if s.is_empty() {
            return None;
        }
        ObjectPath::parse(s).ok().filter(|path| path.as_ref() == s)
    }

    /// Full object path for a stage-relative name.
    fn object_path(&self, name: &str) -> StageResult<ObjectPath> {
        validate_name(name)?;
        let relative = Self::canonical_path(name).ok_or_else(|| {
            StageError::InvalidArgument(format!(
                "object name '{}' is not a canonical object path",
                name
            ))
        })?;
        if self.config.storage_type == StageType::Local && has_staging_suffix(name) {
            return Err(StageError::InvalidArgument(format!(
                "object name '{}' ends in '#<digits>', which local stages reserve",
                name
            )));
        }
        Ok(self.qualify(relative))
    }

    fn qualify(&self, relative: ObjectPath) -> ObjectPath {
        match &self.namespace {
            Some(ns) => ns.parts().chain(relative.parts()).collect(),
            None => relative,
        }
    }

    /// Stage-relative name of a listed location, `None` if it lies outside
    /// the namespace.
    fn name_from_location(&self, location: &ObjectPath) -> Option<String> {
        let location = location.as_ref();
        match &self.namespace {
            Some(ns) => location
                .strip_prefix(ns.as_ref())?
                .strip_prefix('/')
                .map(str::to_string),
            None => Some(location.to_string()),
        }
    }

    async fn client(&self) -> StageResult<Arc<dyn ObjectStore>> {
        self.store
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(StageError::Closed)
    }

    /// Build the appropriate object store based on configuration.
    ///
    /// Returns the store together with the URL or path of its root.
    async fn build_store(config: &StageConfig) -> StageResult<(Box<dyn ObjectStore>, String)> {
        match config.storage_type {
            StageType::Local => Self::build_local_store(config),
            StageType::Memory => Ok((Box::new(InMemory::new()), "memory://stage".to_string())),
            StageType::Aws => Self::build_aws_store(config),
            StageType::Azure => Self::build_azure_store(config),
            StageType::Gcs => Self::build_gcs_store(config),
        }
    }

    /// Build a local filesystem store rooted at the canonical `path` option.
    fn build_local_store(config: &StageConfig) -> StageResult<(Box<dyn ObjectStore>, String)> {
        let path = config.options.get("path").ok_or_else(|| {
            StageError::ConfigError("Local stage requires 'path' option".to_string())
        })?;
        let base_path = PathBuf::from(path);

        let canonical_path = base_path.canonicalize().map_err(|e| {
            StageError::ConfigError(format!(
                "Failed to resolve path '{}': {} (path must exist)",
                path, e
            ))
        })?;

        if !canonical_path.is_dir() {
            return Err(StageError::ConfigError(format!(
                "Base path is not a directory: {}",
                canonical_path.display()
            )));
        }

        let store = LocalFileSystem::new_with_prefix(&canonical_path).map_err(|e| {
            StageError::ConfigError(format!("Failed to create local store: {}", e))
        })?;

        let base_path_str = canonical_path.to_string_lossy().to_string();
        Ok((Box::new(store), base_path_str))
    }

    fn build_connection_options(config: &StageConfig) -> ClientOptions {
        let mut client_options = ClientOptions::default();
        if let Some(timeout_str) = config.options.get("timeout") {
            if timeout_str == "0" || timeout_str == "disabled" {
                client_options = client_options.with_timeout_disabled();
            } else if let Ok(sec) = timeout_str.parse::<u64>() {
                client_options = client_options.with_timeout(Duration::from_secs(sec))
            }
        };
        if let Some(connect_timeout_str) = config.options.get("connect_timeout") {
            if connect_timeout_str == "0" || connect_timeout_str == "disabled" {
                client_options = client_options.with_connect_timeout_disabled();
            } else if let Ok(sec) = connect_timeout_str.parse::<u64>() {
                client_options = client_options.with_connect_timeout(Duration::from_secs(sec))
            }
        }
        if let Some(pool_idle_timeout_str) = config.options.get("pool_idle_timeout") {
            if let Ok(sec) = pool_idle_timeout_str.parse::<u64>() {
                client_options = client_options.with_pool_idle_timeout(Duration::from_secs(sec))
            }
        }
        if let Some(pool_max_idle_per_host_str) = config.options.get("pool_max_idle_per_host") {
            if let Ok(max_idle) = pool_max_idle_per_host_str.parse::<usize>() {
                client_options = client_options.with_pool_max_idle_per_host(max_idle)
            }
        }
        client_options
    }

    fn build_retry_options(config: &StageConfig) -> RetryConfig {
        let default_retry_config = RetryConfig::default();
        let max_retries = config
            .options
            .get("max_retries")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(default_retry_config.max_retries);
        let retry_timeout = config
            .options
            .get("retry_timeout")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default_retry_config.retry_timeout);
        RetryConfig {
            backoff: Default::default(),
            max_retries,
            retry_timeout,
        }
    }

    /// Extra attempts for idempotent reads on top of the client's own HTTP
    /// retries (defaults to 3 if not specified).
    fn read_retries(config: &StageConfig) -> usize {
        config
            .options
            .get("read_retries")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_READ_RETRIES)
    }

    /// Retry wrapper for reads that may fail on transient network errors.
    async fn retry_operation<F, Fut, T>(&self, operation_name: &str, operation: F) -> StageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StageResult<T>>,
    {
        let max_retries = Self::read_retries(&self.config);
        retry_with_max_retries(max_retries, operation_name, operation).await
    }

    fn is_tuning_option(key: &str) -> bool {
        TUNING_OPTIONS.contains(&key)
    }

    /// Build an AWS S3 store.
    fn build_aws_store(config: &StageConfig) -> StageResult<(Box<dyn ObjectStore>, String)> {
        let mut builder = AmazonS3Builder::new()
            .with_client_options(Self::build_connection_options(config))
            .with_retry(Self::build_retry_options(config));
        let mut bucket: Option<&String> = None;
        let mut endpoint: Option<&String> = None;

        for (key, value) in &config.options {
            match key.as_str() {
                "bucket" => {
                    bucket = Some(value);
                    builder = builder.with_bucket_name(value);
                }
                "region" => builder = builder.with_region(value),
                "access_key_id" => builder = builder.with_access_key_id(value),
                "secret_access_key" => builder = builder.with_secret_access_key(value),
                "session_token" | "token" => builder = builder.with_token(value),
                "endpoint" => {
                    endpoint = Some(value);
                    builder = builder.with_endpoint(value);
                }
                "allow_http" => {
                    if value.to_lowercase() == "true" {
                        builder = builder.with_allow_http(true);
                    }
                }
                k if Self::is_tuning_option(k) => (),
                _ => tracing::warn!("Unknown AWS S3 option: {}", key),
            }
        }

        let store = builder
            .build()
            .map_err(|e| StageError::ConfigError(format!("Failed to create S3 store: {}", e)))?;

        let base_url = match (endpoint, bucket) {
            // Path-style addressing on custom endpoints
            (Some(endpoint_url), Some(bucket_name)) => {
                format!("{}/{}", endpoint_url.trim_end_matches('/'), bucket_name)
            }
            (Some(endpoint_url), None) => endpoint_url.trim_end_matches('/').to_string(),
            (None, Some(bucket_name)) => format!("s3://{}", bucket_name),
            (None, None) => "s3://".to_string(),
        };

        Ok((Box::new(store), base_url))
    }

    /// Build an Azure store. `account_name` and `container` are required.
    fn build_azure_store(config: &StageConfig) -> StageResult<(Box<dyn ObjectStore>, String)> {
        let account_name = config.get_option("account_name").ok_or_else(|| {
            StageError::ConfigError("Azure requires 'account_name' option".to_string())
        })?;
        let container = config.get_option("container").ok_or_else(|| {
            StageError::ConfigError("Azure requires 'container' option".to_string())
        })?;

        let mut builder = MicrosoftAzureBuilder::new()
            .with_client_options(Self::build_connection_options(config))
            .with_retry(Self::build_retry_options(config))
            .with_account(account_name)
            .with_container_name(container);

        let mut use_fabric_endpoint = false;
        let mut custom_endpoint: Option<&String> = None;

        for (key, value) in &config.options {
            match key.as_str() {
                "container" | "account_name" => (),
                "access_key" | "account_key" => builder = builder.with_access_key(value),
                "sas_token" => builder = builder.with_sas_authorization(parse_sas_token(value)),
                "tenant_id" => builder = builder.with_tenant_id(value),
                "client_id" => builder = builder.with_client_id(value),
                "client_secret" => builder = builder.with_client_secret(value),
                "use_fabric_endpoint" => {
                    use_fabric_endpoint = value.to_lowercase() == "true";
                    builder = builder.with_use_fabric_endpoint(use_fabric_endpoint);
                }
                "endpoint" => {
                    custom_endpoint = Some(value);
                    builder = builder.with_endpoint(value.clone());
                }
                k if Self::is_tuning_option(k) => (),
                _ => tracing::warn!("Unknown Azure option: {}", key),
            }
        }

        let store = builder.build().map_err(|e| {
            StageError::ConfigError(format!("Failed to create Azure store: {}", e))
        })?;

        // abfss://<container>@<account>.<endpoint>
        let base_url = if let Some(endpoint) = custom_endpoint {
            endpoint.trim_end_matches('/').to_string()
        } else {
            let endpoint_domain = if use_fabric_endpoint {
                "dfs.fabric.microsoft.com"
            } else {
                "dfs.core.windows.net"
            };
            format!("abfss://{}@{}.{}", container, account_name, endpoint_domain)
        };

        Ok((Box::new(store), base_url))
    }

    /// Build a GCS store.
    fn build_gcs_store(config: &StageConfig) -> StageResult<(Box<dyn ObjectStore>, String)> {
        let mut builder = GoogleCloudStorageBuilder::new()
            .with_client_options(Self::build_connection_options(config))
            .with_retry(Self::build_retry_options(config));
        let mut bucket: Option<&String> = None;

        for (key, value) in &config.options {
            match key.as_str() {
                "bucket" => {
                    bucket = Some(value);
                    builder = builder.with_bucket_name(value);
                }
                "service_account_key_path" => builder = builder.with_service_account_path(value),
                "service_account_key" => builder = builder.with_service_account_key(value),
                k if Self::is_tuning_option(k) => (),
                _ => tracing::warn!("Unknown GCS option: {}", key),
            }
        }

        let store = builder
            .build()
            .map_err(|e| StageError::ConfigError(format!("Failed to create GCS store: {}", e)))?;

        let base_url = match bucket {
            Some(bucket_name) => format!("gs://{}", bucket_name),
            None => "gs://".to_string(),
        };

        Ok((Box::new(store), base_url))
    }
}

/// Whether the final segment of `name` looks like `file#123`, the pattern
/// `LocalFileSystem` uses for in-flight uploads.
fn has_staging_suffix(name: &str) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    match file_name.split_once('#') {
        Some((_, suffix)) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Whether a filesystem error comes from a name that is used both as an
/// object and as a prefix.
fn is_file_prefix_conflict(error: &object_store::Error) -> bool {
    source_chain(error)
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io_err| {
            matches!(
                io_err.kind(),
                std::io::ErrorKind::NotADirectory | std::io::ErrorKind::IsADirectory
            )
        })
}

/// Split a SAS token (`?sv=...&sig=...`) into query pairs.
fn parse_sas_token(token: &str) -> Vec<(String, String)> {
    token
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.is_empty() => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl Stage for ObjectStoreStage {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    async fn upload_bytes(&self, name: &str, payload: &[u8]) -> StageResult<()> {
        let store = self.client().await?;
        let path = self.object_path(name)?;

        match store.put(&path, PutPayload::from(payload.to_vec())).await {
            Ok(_) => (),
            Err(e) if is_file_prefix_conflict(&e) => {
                return Err(StageError::InvalidArgument(format!(
                    "object name '{}' conflicts with an existing object or prefix",
                    name
                )))
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Uploaded object={} size={}", name, payload.len());
        Ok(())
    }

    async fn list_bucket(&self, prefix: &str) -> StageResult<Vec<String>> {
        let store = self.client().await?;

        // Object store listings match whole path segments, so list from the
        // deepest complete directory of `prefix` and filter on the string.
        let root = match prefix.rfind('/') {
            Some(idx) => match Self::canonical_path(&prefix[..idx]) {
                Some(dir) => Some(self.qualify(dir)),
                None => return Ok(Vec::new()),
            },
            None => self.namespace.clone(),
        };

        let mut names = self
            .retry_operation(&format!("list_bucket({})", prefix), || async {
                let mut names = Vec::new();
                let mut stream = store.list(root.as_ref());
                while let Some(meta) = stream.next().await {
                    let meta = meta?;
                    if let Some(name) = self.name_from_location(&meta.location) {
                        if name.starts_with(prefix) {
                            names.push(name);
                        }
                    }
                }
                Ok(names)
            })
            .await?;

        names.sort();
        debug!("Listed prefix={} count={}", prefix, names.len());
        Ok(names)
    }

    async fn get_object(&self, name: &str) -> StageResult<Vec<u8>> {
        let store = self.client().await?;
        let path = self.object_path(name)?;

        let result = self
            .retry_operation(&format!("get_object({})", name), || async {
                let bytes: Bytes = store.get(&path).await?.bytes().await?;
                Ok(bytes.to_vec())
            })
            .await;

        match result {
            Ok(bytes) => {
                debug!("Read object={} size={}", name, bytes.len());
                Ok(bytes)
            }
            Err(e) if e.is_not_found() => Err(StageError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn delete_object(&self, key: &str) -> StageResult<()> {
        let store = self.client().await?;
        let path = self.object_path(key)?;

        match store.delete(&path).await {
            Ok(()) => debug!("Deleted object={}", key),
            Err(object_store::Error::NotFound { .. }) => {
                debug!("Delete of missing object={} ignored", key)
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn close(&self) -> StageResult<()> {
        match self.store.write().await.take() {
            Some(_) => {
                info!("Closed stage base_path={}", self.base_path);
                Ok(())
            }
            None => Err(StageError::Closed),
        }
    }

    fn uri_for(&self, name: &str) -> String {
        let relative = name.trim_start_matches('/');
        if self.config.storage_type == StageType::Local {
            let file = PathBuf::from(&self.base_path).join(relative);
            if let Ok(url) = Url::from_file_path(&file) {
                return url.to_string();
            }
        }
        format!("{}/{}", self.base_path.trim_end_matches('/'), relative)
    }
}

impl Debug for ObjectStoreStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stage(type=object_store, backend={}, base_path={}, options={:?})",
            self.config.storage_type_str(),
            self.base_path,
            self.config.clean_options()
        )
    }
}
