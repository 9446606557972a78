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

//! Staging storage contract
//!
//! This module defines [`Stage`], the capability set every staging backend
//! implements (upload, list, get, delete, close), together with the
//! `object_store` based adapter that serves local directories, memory,
//! AWS S3, Azure and GCS through that one contract.
//!
//! Pipeline code depends on `dyn Stage` only and obtains instances through
//! [`StageFactory`].

pub mod config;
pub mod error;
pub mod factory;
pub mod object_store;
pub mod provider;
pub mod scope;

// Public exports
pub use config::{StageConfig, StageType};
pub use error::{ErrorKind, StageError, StageResult};
pub use factory::StageFactory;
pub use object_store::ObjectStoreStage;
pub use provider::Stage;
pub use scope::with_stage;
