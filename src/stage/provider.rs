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

use async_trait::async_trait;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use super::error::{StageError, StageResult};

/// Intermediate storage layer in front of a warehouse bulk load
/// (BigQuery, Snowflake, Redshift, ...).
///
/// Every adapter must behave identically as seen by the pipeline:
///
/// * a successful [`upload_bytes`](Stage::upload_bytes) is visible to every
///   `list_bucket`/`get_object` call that starts after it returns;
/// * [`get_object`](Stage::get_object) returns the uploaded bytes unchanged
///   and reports a missing object as [`StageError::NotFound`], never as an
///   IO error;
/// * transport, auth and quota failures surface as IO errors and are not
///   retried by the contract itself.
///
/// Calls complete before returning; nothing is streamed. Whether an instance
/// may be shared between tasks is up to the adapter and must be documented
/// there. A stage is released with [`close`](Stage::close) exactly once;
/// prefer [`with_stage`](super::scope::with_stage) so release happens on
/// every exit path.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Root location the stage writes under, e.g. `s3://bucket/prefix`.
    fn base_path(&self) -> &str;

    /// Store `payload` under `name`.
    ///
    /// `name` must be non-empty; further character restrictions are up to the
    /// adapter. An existing object is replaced atomically: concurrent readers
    /// observe either the old or the new content.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `name` is empty or not representable
    /// * IO errors on transport, auth or quota failures
    async fn upload_bytes(&self, name: &str, payload: &[u8]) -> StageResult<()>;

    /// Names of all existing objects starting with `prefix`.
    ///
    /// The match is a plain string prefix, so `"report"` matches
    /// `"report.csv"`. An empty prefix lists everything. No ordering is
    /// promised unless the adapter documents one.
    async fn list_bucket(&self, prefix: &str) -> StageResult<Vec<String>>;

    /// The exact bytes previously uploaded under `name`.
    ///
    /// # Errors
    ///
    /// * `NotFound` if no object named `name` exists
    /// * IO errors on transport, auth or quota failures
    async fn get_object(&self, name: &str) -> StageResult<Vec<u8>>;

    /// Remove the object stored under `key`.
    ///
    /// Whether deleting a missing key fails is adapter-defined and must be
    /// documented by the adapter.
    async fn delete_object(&self, key: &str) -> StageResult<()>;

    /// Release the underlying session or client.
    ///
    /// No operation may follow. A second call is not guaranteed to be
    /// idempotent.
    async fn close(&self) -> StageResult<()>;

    /// Fully qualified URI of the object `name`, in the form a warehouse load
    /// command expects (`gs://bucket/prefix/name`, ...).
    fn uri_for(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.base_path().trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }
}

impl Debug for dyn Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Stage(base_path={})", self.base_path())
    }
}

/// Reject names the contract never accepts, independent of the backend.
pub fn validate_name(name: &str) -> StageResult<()> {
    if name.is_empty() {
        return Err(StageError::InvalidArgument(
            "object name must not be empty".to_string(),
        ));
    }
    Ok(())
}
