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

//! # Warehouse Stage
//!
//! A pluggable staging layer for data warehouse bulk loads.
//!
//! Producers write batches to a *stage* (object storage or a local
//! directory) before BigQuery, Snowflake or Redshift load them. This crate
//! defines the contract every staging backend satisfies, so the pipeline
//! never depends on a concrete backend:
//!
//! - **Uniform contract**: upload, list by prefix, get, delete and close,
//!   with `NotFound` kept distinct from transport failures
//! - **Backends**: AWS S3, Azure Blob/ADLS, Google Cloud Storage, local
//!   filesystem and in-memory, all through `object_store`
//! - **Namespacing**: scope a stage to a prefix inside a shared bucket
//! - **Scoped release**: [`with_stage`] closes the stage on every exit path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warehouse_stage::{with_stage, StageConfig, StageFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = StageConfig::gcs()
//!     .with_option("bucket", "bq-staging")
//!     .with_option("service_account_key_path", "/path/to/key.json")
//!     .with_prefix("daily/2024-06-01");
//!
//! let stage = StageFactory::from_config(config).await?;
//!
//! let uri = with_stage(stage, |stage| async move {
//!     stage
//!         .upload_bytes("events.json", b"{\"id\":1}\n")
//!         .await
//!         .map(|()| stage.uri_for("events.json"))
//! })
//! .await?;
//!
//! // Hand `uri` (gs://bq-staging/daily/2024-06-01/events.json) to the load job
//! println!("{}", uri);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`stage`] - The `Stage` contract, configuration and the `object_store` adapter
//! - [`util`] - Utility functions and helpers

pub mod stage;
pub mod util;

// Re-export commonly used types
pub use stage::{with_stage, Stage, StageConfig, StageError, StageFactory, StageResult};
