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

//! WASM bindings for smartlearn - runs the review scheduler in the browser
//! for offline study, persisting schedule state and settings to
//! localStorage.

use chrono::DateTime;
use chrono::Utc;
use wasm_bindgen::prelude::*;
use web_sys::console;

use smartlearn_core::ReviewChoice;
use smartlearn_core::ReviewItem;
use smartlearn_core::Timestamp;
use smartlearn_core::compute_next;
use smartlearn_core::summarize;

mod storage;

use storage::Storage;

const ITEMS_KEY: &str = "smartlearn.items";
const THEME_KEY: &str = "smartlearn.theme";

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    console::log_1(&"smartlearn WASM initialized".into());
}

/// An offline study session managed from JavaScript. Items come in as
/// JSON; schedule state survives page reloads through localStorage.
#[wasm_bindgen]
pub struct StudySession {
    /// All items of the library under study.
    items: Vec<ReviewItem>,
    /// Indices of items currently due, in study order.
    queue: Vec<usize>,
    /// Reviews performed in this session.
    reviews_this_session: usize,
    /// Storage backend.
    storage: Storage,
}

impl Default for StudySession {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl StudySession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            queue: Vec::new(),
            reviews_this_session: 0,
            storage: Storage::new(),
        }
    }

    /// Loads a library from a JSON array of items, merging any schedule
    /// state persisted from an earlier session.
    pub fn load_items(&mut self, json: &str, now_ms: f64) -> Result<(), JsValue> {
        let mut items: Vec<ReviewItem> = serde_json::from_str(json).map_err(to_js)?;
        if let Some(saved) = self.storage.get_item(ITEMS_KEY)? {
            if let Ok(saved_items) = serde_json::from_str::<Vec<ReviewItem>>(&saved) {
                for item in items.iter_mut() {
                    if let Some(saved) = saved_items.iter().find(|s| s.id == item.id) {
                        item.schedule = saved.schedule;
                        item.favorite = saved.favorite;
                    }
                }
            }
        }
        self.items = items;
        self.reviews_this_session = 0;
        self.rebuild_queue(timestamp_from_millis(now_ms));
        Ok(())
    }

    /// The current item as JSON, or `None` when the session is finished.
    pub fn current_item(&self) -> Result<Option<String>, JsValue> {
        match self.queue.first() {
            Some(&index) => Ok(Some(serde_json::to_string(&self.items[index]).map_err(to_js)?)),
            None => Ok(None),
        }
    }

    /// Applies a difficulty judgment to the current item and persists the
    /// new schedule state.
    pub fn answer(&mut self, choice: &str, now_ms: f64) -> Result<(), JsValue> {
        let choice = ReviewChoice::try_from(choice.to_string()).map_err(to_js)?;
        let index = match self.queue.first() {
            Some(&index) => index,
            None => return Err(JsValue::from_str("no item under review")),
        };
        let now = timestamp_from_millis(now_ms);
        let next = compute_next(&self.items[index].schedule, choice, now).map_err(to_js)?;
        self.items[index].schedule = next;
        self.queue.remove(0);
        self.reviews_this_session += 1;
        let serialized = serde_json::to_string(&self.items).map_err(to_js)?;
        self.storage.set_item(ITEMS_KEY, &serialized)?;
        Ok(())
    }

    /// The progress summary as JSON.
    pub fn summary(&self, now_ms: f64) -> Result<String, JsValue> {
        let now = timestamp_from_millis(now_ms);
        let summary = summarize(&self.items, now);
        serde_json::to_string(&summary).map_err(to_js)
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn reviews_this_session(&self) -> usize {
        self.reviews_this_session
    }

    /// The persisted theme, if any.
    pub fn theme(&self) -> Result<Option<String>, JsValue> {
        self.storage.get_item(THEME_KEY)
    }

    pub fn set_theme(&self, theme: &str) -> Result<(), JsValue> {
        self.storage.set_item(THEME_KEY, theme)
    }
}

impl StudySession {
    fn rebuild_queue(&mut self, now: Timestamp) {
        self.queue = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.schedule.is_due(now))
            .map(|(index, _)| index)
            .collect();
    }
}

fn timestamp_from_millis(ms: f64) -> Timestamp {
    let ndt = DateTime::<Utc>::from_timestamp_millis(ms as i64)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default();
    Timestamp::new(ndt)
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}
