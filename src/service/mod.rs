// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Library and study services: the path from a user action through the
//! scheduler and store to cache invalidation.

pub mod library;
pub mod study;

use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use smartlearn_core::SchedulerError;

use crate::error::SyncError;

/// The composite cache/watch key prefix for one library's resources.
pub fn library_prefix(library_id: &str) -> String {
    format!("library:{library_id}")
}

/// Failures of a review transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    /// The reviewed item does not exist in the store.
    NotFound(String),
    /// The scheduler rejected the transition.
    Scheduler(SchedulerError),
    /// The store could not be read or written.
    Sync(SyncError),
}

impl Display for ReviewError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ReviewError::NotFound(id) => write!(f, "no such item: {id}"),
            ReviewError::Scheduler(err) => write!(f, "{err}"),
            ReviewError::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReviewError {}

impl From<SchedulerError> for ReviewError {
    fn from(value: SchedulerError) -> Self {
        ReviewError::Scheduler(value)
    }
}

impl From<SyncError> for ReviewError {
    fn from(value: SyncError) -> Self {
        ReviewError::Sync(value)
    }
}
