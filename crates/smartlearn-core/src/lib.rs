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

//! smartlearn-core: Core library for the smartlearn study system.
//!
//! This library provides WASM-compatible types and algorithms for:
//! - The spaced-repetition review scheduler (four-valued difficulty choice)
//! - Progress aggregation over a library's items
//! - Schedule state and item types

pub mod error;
pub mod progress;
pub mod scheduler;
pub mod types;

// Re-exports for convenience
pub use error::{Fallible, SchedulerError};
pub use progress::{ProgressSummary, summarize, summarize_with};
pub use scheduler::{SchedulerTuning, compute_next, compute_next_with, tier, tier_with};
pub use types::choice::ReviewChoice;
pub use types::item::{ReviewItem, ScheduleState, Tier};
pub use types::timestamp::Timestamp;
