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

use std::sync::Arc;

use smartlearn_core::ProgressSummary;
use smartlearn_core::ReviewChoice;
use smartlearn_core::ReviewItem;
use smartlearn_core::ScheduleState;
use smartlearn_core::SchedulerTuning;
use smartlearn_core::Timestamp;
use smartlearn_core::compute_next_with;
use smartlearn_core::summarize_with;

use crate::error::SyncError;
use crate::service::ReviewError;
use crate::service::library::LibraryService;
use crate::service::library_prefix;
use crate::store::DocumentStore;
use crate::store::Mutation;

/// The study flow: due queues, review transitions, progress summaries.
pub struct StudyService<S> {
    library: LibraryService<S>,
    tuning: SchedulerTuning,
}

impl<S> Clone for StudyService<S> {
    fn clone(&self) -> Self {
        Self {
            library: self.library.clone(),
            tuning: self.tuning,
        }
    }
}

impl<S: DocumentStore> StudyService<S> {
    pub fn new(library: LibraryService<S>, tuning: SchedulerTuning) -> Self {
        Self { library, tuning }
    }

    /// The items in a library that are eligible for review at `now`.
    pub async fn due_items(
        &self,
        library_id: &str,
        now: Timestamp,
    ) -> Result<Vec<ReviewItem>, SyncError> {
        let items = self.library.items(library_id).await?;
        Ok(items
            .iter()
            .filter(|item| item.schedule.is_due(now))
            .cloned()
            .collect())
    }

    pub async fn summary(
        &self,
        library_id: &str,
        now: Timestamp,
    ) -> Result<ProgressSummary, SyncError> {
        let items = self.library.items(library_id).await?;
        Ok(summarize_with(&self.tuning, &items, now))
    }

    /// Applies a difficulty judgment to an item: computes the next schedule
    /// state, persists it, and invalidates the library's cached reads so
    /// observers see the transition.
    pub async fn record_review(
        &self,
        item_id: &str,
        choice: ReviewChoice,
        now: Timestamp,
    ) -> Result<ScheduleState, ReviewError> {
        let store = self.library.store();
        let item = store
            .fetch_one(item_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(item_id.to_string()))?;
        let next = compute_next_with(&self.tuning, &item.schedule, choice, now)?;
        store
            .mutate(Mutation::UpdateSchedule {
                item_id: item.id.clone(),
                schedule: next,
            })
            .await?;
        self.library
            .cache()
            .invalidate(Some(&library_prefix(&item.library_id)));
        log::debug!(
            "reviewed {item_id} as {}, next due {}",
            choice.as_str(),
            next.due_at
        );
        Ok(next)
    }
}
