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

use crate::error::SchedulerError;
use crate::error::invalid_choice;

/// The difficulty judgment supplied by the user at review time. Consumed
/// once per transition, never persisted.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewChoice {
    VeryHard,
    Hard,
    Again,
    Normal,
}

impl ReviewChoice {
    pub fn as_str(&self) -> &str {
        match self {
            ReviewChoice::VeryHard => "veryHard",
            ReviewChoice::Hard => "hard",
            ReviewChoice::Again => "again",
            ReviewChoice::Normal => "normal",
        }
    }
}

impl TryFrom<String> for ReviewChoice {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "veryHard" => Ok(ReviewChoice::VeryHard),
            "hard" => Ok(ReviewChoice::Hard),
            "again" => Ok(ReviewChoice::Again),
            "normal" => Ok(ReviewChoice::Normal),
            _ => invalid_choice(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    #[test]
    fn test_choice_string_roundtrip() {
        let choices = [
            ReviewChoice::VeryHard,
            ReviewChoice::Hard,
            ReviewChoice::Again,
            ReviewChoice::Normal,
        ];
        for choice in choices {
            assert_eq!(choice, ReviewChoice::try_from(choice.as_str().to_string()).unwrap());
        }
    }

    /// Test the serialization format of ReviewChoice.
    #[test]
    fn test_choice_serialization_format() {
        let choices = [
            ReviewChoice::VeryHard,
            ReviewChoice::Hard,
            ReviewChoice::Again,
            ReviewChoice::Normal,
        ];
        let expected = ["veryHard", "hard", "again", "normal"];
        for (choice, expected) in zip(choices, expected) {
            let serialized = serde_json::to_string(&choice).unwrap();
            assert_eq!(serialized, format!("\"{expected}\""));
        }
    }

    #[test]
    fn test_invalid_choice_string() {
        let invalid_strings = ["", "easy", "VeryHard", "very_hard"];
        for s in invalid_strings {
            let result = ReviewChoice::try_from(s.to_string());
            assert!(matches!(result, Err(SchedulerError::InvalidChoice(_))));
        }
    }
}
