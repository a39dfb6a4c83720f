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

use crate::types::timestamp::Timestamp;

/// The scheduling portion of a review item. Mutated exclusively through
/// scheduler transitions.
///
/// Counters are signed: the state arrives from an external document store
/// and may be corrupt, so the scheduler validates rather than assuming the
/// type rules negatives out.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct ScheduleState {
    /// When the item next becomes eligible for review.
    pub due_at: Timestamp,
    /// The current review interval in minutes. Zero until the first graded
    /// review.
    pub interval_minutes: i64,
    /// The number of completed reviews.
    pub repetition_count: i64,
    /// The number of times the item lapsed.
    pub lapse_count: i64,
    /// When the item was last reviewed, if ever.
    pub last_reviewed_at: Option<Timestamp>,
}

impl ScheduleState {
    /// The state of a freshly created item: due immediately, never
    /// reviewed.
    pub fn new(created_at: Timestamp) -> Self {
        Self {
            due_at: created_at,
            interval_minutes: 0,
            repetition_count: 0,
            lapse_count: 0,
            last_reviewed_at: None,
        }
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.due_at <= now
    }
}

/// Coarse mastery classification, derived from the schedule state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    New,
    Learning,
    Mastered,
}

/// One learnable unit: a term/definition pair in a library, together with
/// its schedule state.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub library_id: String,
    pub term: String,
    pub definition: String,
    pub favorite: bool,
    pub schedule: ScheduleState,
}

impl ReviewItem {
    pub fn new(
        id: impl Into<String>,
        library_id: impl Into<String>,
        term: impl Into<String>,
        definition: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            library_id: library_id.into(),
            term: term.into(),
            definition: definition.into(),
            favorite: false,
            schedule: ScheduleState::new(created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(s: &str) -> Timestamp {
        Timestamp::try_from(s.to_string()).unwrap()
    }

    #[test]
    fn test_new_item_is_due_immediately() {
        let created_at = make("2024-01-01T12:00:00.000");
        let item = ReviewItem::new("i1", "lib1", "term", "definition", created_at);
        assert!(item.schedule.is_due(created_at));
        assert_eq!(item.schedule.repetition_count, 0);
        assert_eq!(item.schedule.lapse_count, 0);
        assert!(item.schedule.last_reviewed_at.is_none());
        assert!(!item.favorite);
    }

    #[test]
    fn test_not_due_before_due_date() {
        let created_at = make("2024-01-01T12:00:00.000");
        let mut state = ScheduleState::new(created_at);
        state.due_at = make("2024-01-02T12:00:00.000");
        assert!(!state.is_due(created_at));
        assert!(state.is_due(make("2024-01-02T12:00:00.000")));
    }

    #[test]
    fn test_tier_serialization_format() {
        assert_eq!(serde_json::to_string(&Tier::New).unwrap(), "\"new\"");
        assert_eq!(serde_json::to_string(&Tier::Learning).unwrap(), "\"learning\"");
        assert_eq!(serde_json::to_string(&Tier::Mastered).unwrap(), "\"mastered\"");
    }
}
