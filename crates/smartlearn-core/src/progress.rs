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

use serde::Deserialize;
use serde::Serialize;

use crate::scheduler::SchedulerTuning;
use crate::scheduler::tier_with;
use crate::types::item::ReviewItem;
use crate::types::item::Tier;
use crate::types::timestamp::Timestamp;

/// Aggregate progress over one library's items. A pure projection:
/// recomputed on demand, owned by nobody.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub mastered_count: usize,
    pub learning_count: usize,
    pub due_count: usize,
}

impl ProgressSummary {
    pub fn mastered_pct(&self) -> u32 {
        pct(self.mastered_count, self.total)
    }

    pub fn learning_pct(&self) -> u32 {
        pct(self.learning_count, self.total)
    }
}

/// Integer percentage, 0 on an empty collection.
fn pct(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// `summarize_with` under the default tuning.
pub fn summarize(items: &[ReviewItem], now: Timestamp) -> ProgressSummary {
    summarize_with(&SchedulerTuning::default(), items, now)
}

/// Folds a collection of items into a progress summary. Items that are not
/// yet mastered (including new ones) count as learning.
pub fn summarize_with(
    tuning: &SchedulerTuning,
    items: &[ReviewItem],
    now: Timestamp,
) -> ProgressSummary {
    let total = items.len();
    let mastered_count = items
        .iter()
        .filter(|item| tier_with(tuning, &item.schedule) == Tier::Mastered)
        .count();
    let due_count = items
        .iter()
        .filter(|item| item.schedule.is_due(now))
        .count();
    ProgressSummary {
        total,
        mastered_count,
        learning_count: total - mastered_count,
        due_count,
    }
}
