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

use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

/// Contract violations of the scheduler. Both variants are programmer (or
/// upstream data) errors: they are returned to the caller, never coerced
/// into a default transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The difficulty choice is not a member of the four-valued enum.
    InvalidChoice(String),
    /// The schedule state is malformed (negative counters or interval).
    InvalidState(String),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SchedulerError::InvalidChoice(msg) => {
                write!(f, "invalid difficulty choice: {msg}")
            }
            SchedulerError::InvalidState(msg) => {
                write!(f, "invalid schedule state: {msg}")
            }
        }
    }
}

impl Error for SchedulerError {}

pub type Fallible<T> = Result<T, SchedulerError>;

pub fn invalid_choice<T>(msg: impl Into<String>) -> Fallible<T> {
    Err(SchedulerError::InvalidChoice(msg.into()))
}

pub fn invalid_state<T>(msg: impl Into<String>) -> Fallible<T> {
    Err(SchedulerError::InvalidState(msg.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SchedulerError::InvalidChoice("sorta".to_string());
        assert_eq!(err.to_string(), "invalid difficulty choice: sorta");
        let err = SchedulerError::InvalidState("repetition_count = -1".to_string());
        assert_eq!(
            err.to_string(),
            "invalid schedule state: repetition_count = -1"
        );
    }
}
