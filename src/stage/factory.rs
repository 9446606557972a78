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

use std::sync::Arc;

use super::config::StageConfig;
use super::error::StageResult;
use super::object_store::ObjectStoreStage;
use super::provider::Stage;

/// Factory for creating stages
pub struct StageFactory;

impl StageFactory {
    /// Create a stage from a configuration.
    ///
    /// Every supported backend (local, memory, AWS S3, Azure, GCS) is served
    /// by [`ObjectStoreStage`]; callers only ever see `dyn Stage`.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * Required configuration options are missing
    /// * The namespace prefix is not a valid object path
    /// * The backend client cannot be initialized
    pub async fn from_config(config: StageConfig) -> StageResult<Arc<dyn Stage>> {
        let stage = ObjectStoreStage::new(config).await?;
        Ok(Arc::new(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageError;

    #[tokio::test]
    async fn test_from_config_memory() {
        let stage = StageFactory::from_config(StageConfig::memory().with_prefix("tmp"))
            .await
            .unwrap();

        assert_eq!(stage.base_path(), "memory://stage/tmp");
        stage.upload_bytes("a", b"1").await.unwrap();
        assert_eq!(stage.get_object("a").await.unwrap(), b"1");
        stage.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_from_config_propagates_config_errors() {
        let result = StageFactory::from_config(StageConfig::gcs().with_prefix("a//b")).await;
        assert!(matches!(result, Err(StageError::ConfigError(_))));
    }
}
