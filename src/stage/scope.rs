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

use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use super::error::StageResult;
use super::provider::Stage;

/// Run `work` against `stage`, then close the stage whatever the outcome.
///
/// If `work` fails its error is returned and a failing `close` is only
/// logged. If `work` succeeds, a failing `close` is returned instead of the
/// value.
///
/// # Examples
///
/// ```
/// use warehouse_stage::stage::{with_stage, StageConfig, StageFactory};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let stage = StageFactory::from_config(StageConfig::memory()).await?;
///
/// let names = with_stage(stage, |stage| async move {
///     stage.upload_bytes("report.csv", b"a,b,c\n1,2,3\n").await?;
///     stage.list_bucket("report").await
/// })
/// .await?;
///
/// assert_eq!(names, vec!["report.csv".to_string()]);
/// # Ok(())
/// # }
/// ```
pub async fn with_stage<T, F, Fut>(stage: Arc<dyn Stage>, work: F) -> StageResult<T>
where
    F: FnOnce(Arc<dyn Stage>) -> Fut,
    Fut: Future<Output = StageResult<T>>,
{
    let outcome = work(Arc::clone(&stage)).await;
    let closed = stage.close().await;

    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(
                "Failed to close stage base_path={} after error: {}",
                stage.base_path(),
                close_err
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageConfig, StageError, StageFactory};

    async fn memory_stage() -> Arc<dyn Stage> {
        StageFactory::from_config(StageConfig::memory())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_closes_after_success() {
        let stage = memory_stage().await;

        let bytes = with_stage(Arc::clone(&stage), |stage| async move {
            stage.upload_bytes("x", b"payload").await?;
            stage.get_object("x").await
        })
        .await
        .unwrap();

        assert_eq!(bytes, b"payload");
        assert!(matches!(stage.list_bucket("").await, Err(StageError::Closed)));
    }

    #[tokio::test]
    async fn test_closes_after_error() {
        let stage = memory_stage().await;

        let result = with_stage(Arc::clone(&stage), |stage| async move {
            stage.get_object("missing").await
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert!(matches!(stage.close().await, Err(StageError::Closed)));
    }

    #[tokio::test]
    async fn test_close_error_surfaces_on_success() {
        let stage = memory_stage().await;
        stage.close().await.unwrap();

        // Work that never touches the stage still reports the failed release
        let result = with_stage(stage, |_stage| async move { Ok::<_, StageError>(42) }).await;

        assert!(matches!(result, Err(StageError::Closed)));
    }

    #[tokio::test]
    async fn test_work_error_wins_over_close_error() {
        let stage = memory_stage().await;

        let result: StageResult<()> = with_stage(stage, |stage| async move {
            stage.close().await?;
            Err(StageError::InvalidArgument("bad batch".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StageError::InvalidArgument(_))));
    }
}
