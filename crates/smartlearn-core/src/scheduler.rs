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

use crate::error::Fallible;
use crate::error::invalid_state;
use crate::types::choice::ReviewChoice;
use crate::types::item::ScheduleState;
use crate::types::item::Tier;
use crate::types::timestamp::Timestamp;

/// The same-day relearn step in minutes.
pub const RELEARN_STEP_MINUTES: i64 = 10;

/// The minimum graded interval in minutes (one day).
pub const BASE_INTERVAL_MINUTES: i64 = 24 * 60;

/// The maximum review interval in minutes (180 days).
pub const MAX_INTERVAL_MINUTES: i64 = 180 * 24 * 60;

/// The interval at which an item counts as mastered (21 days).
pub const MASTERY_THRESHOLD_MINUTES: i64 = 21 * 24 * 60;

/// Interval growth factor for a `hard` answer.
pub const HARD_FACTOR: f64 = 1.2;

/// Interval growth factor for a `normal` answer.
pub const GROWTH_FACTOR: f64 = 2.5;

/// Scheduler tuning parameters. All transitions are computed against one of
/// these; the defaults are the values above.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerTuning {
    pub relearn_step_minutes: i64,
    pub base_interval_minutes: i64,
    pub max_interval_minutes: i64,
    pub mastery_threshold_minutes: i64,
    pub hard_factor: f64,
    pub growth_factor: f64,
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self {
            relearn_step_minutes: RELEARN_STEP_MINUTES,
            base_interval_minutes: BASE_INTERVAL_MINUTES,
            max_interval_minutes: MAX_INTERVAL_MINUTES,
            mastery_threshold_minutes: MASTERY_THRESHOLD_MINUTES,
            hard_factor: HARD_FACTOR,
            growth_factor: GROWTH_FACTOR,
        }
    }
}

/// The mastery tier of a schedule state under the given tuning.
pub fn tier_with(tuning: &SchedulerTuning, state: &ScheduleState) -> Tier {
    if state.last_reviewed_at.is_none() {
        Tier::New
    } else if state.interval_minutes >= tuning.mastery_threshold_minutes {
        Tier::Mastered
    } else {
        Tier::Learning
    }
}

/// `tier_with` under the default tuning.
pub fn tier(state: &ScheduleState) -> Tier {
    tier_with(&SchedulerTuning::default(), state)
}

/// `compute_next_with` under the default tuning.
pub fn compute_next(
    state: &ScheduleState,
    choice: ReviewChoice,
    now: Timestamp,
) -> Fallible<ScheduleState> {
    compute_next_with(&SchedulerTuning::default(), state, choice, now)
}

/// Computes the schedule state after a review. Pure: the result depends
/// only on `(tuning, state, choice, now)`.
///
/// Invariants: the returned `due_at` is strictly after `now`, and
/// `repetition_count` never decreases.
pub fn compute_next_with(
    tuning: &SchedulerTuning,
    state: &ScheduleState,
    choice: ReviewChoice,
    now: Timestamp,
) -> Fallible<ScheduleState> {
    validate(state)?;
    let was_mastered = tier_with(tuning, state) == Tier::Mastered;
    // An interval strictly below the mastery threshold, so a demoted item
    // derives as Learning.
    let demoted_interval = tuning.mastery_threshold_minutes / 2;
    let next = match choice {
        // Same-day retry. No counter moves; a mastered item drops back to
        // the learning tier.
        ReviewChoice::Again => ScheduleState {
            due_at: now.plus_minutes(tuning.relearn_step_minutes),
            interval_minutes: if was_mastered {
                demoted_interval
            } else {
                state.interval_minutes
            },
            repetition_count: state.repetition_count,
            lapse_count: state.lapse_count,
            last_reviewed_at: Some(now),
        },
        // A lapse: back to the relearn floor, counted.
        ReviewChoice::VeryHard => ScheduleState {
            due_at: now.plus_minutes(tuning.relearn_step_minutes),
            interval_minutes: tuning.relearn_step_minutes,
            repetition_count: state.repetition_count,
            lapse_count: state.lapse_count + 1,
            last_reviewed_at: Some(now),
        },
        ReviewChoice::Hard => {
            let interval_minutes = if was_mastered {
                demoted_interval
            } else {
                grow(tuning, state.interval_minutes, tuning.hard_factor)
            };
            ScheduleState {
                due_at: now.plus_minutes(interval_minutes),
                interval_minutes,
                repetition_count: state.repetition_count + 1,
                lapse_count: state.lapse_count,
                last_reviewed_at: Some(now),
            }
        }
        ReviewChoice::Normal => {
            let interval_minutes = grow(tuning, state.interval_minutes, tuning.growth_factor);
            ScheduleState {
                due_at: now.plus_minutes(interval_minutes),
                interval_minutes,
                repetition_count: state.repetition_count + 1,
                lapse_count: state.lapse_count,
                last_reviewed_at: Some(now),
            }
        }
    };
    Ok(next)
}

/// Multiplicative interval growth, clamped to `[base, max]`. A zero
/// interval (first graded review) grows to the base interval.
fn grow(tuning: &SchedulerTuning, interval_minutes: i64, factor: f64) -> i64 {
    let grown = (interval_minutes as f64 * factor).round() as i64;
    grown.clamp(tuning.base_interval_minutes, tuning.max_interval_minutes)
}

fn validate(state: &ScheduleState) -> Fallible<()> {
    if state.repetition_count < 0 {
        return invalid_state(format!("repetition_count = {}", state.repetition_count));
    }
    if state.lapse_count < 0 {
        return invalid_state(format!("lapse_count = {}", state.lapse_count));
    }
    if state.interval_minutes < 0 {
        return invalid_state(format!("interval_minutes = {}", state.interval_minutes));
    }
    Ok(())
}
