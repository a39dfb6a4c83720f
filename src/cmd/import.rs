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

use std::fs;

use serde::Deserialize;
use smartlearn_core::ReviewItem;
use smartlearn_core::Timestamp;

use crate::cmd::DEFAULT_DB_PATH;
use crate::error::Fallible;
use crate::store::DocumentStore;
use crate::store::Mutation;
use crate::store::sqlite::SqliteStore;

#[derive(Deserialize)]
struct ImportEntry {
    library_id: String,
    term: String,
    definition: String,
    #[serde(default)]
    id: Option<String>,
}

/// Seeds libraries from a JSON file of `{library_id, term, definition}`
/// entries. Items already in the database keep their schedule state.
pub async fn import_items(file: String, db: Option<String>) -> Fallible<()> {
    let db_path = db.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    let store = SqliteStore::open(&db_path)?;
    let content = fs::read_to_string(&file)?;
    let entries: Vec<ImportEntry> = serde_json::from_str(&content)?;
    let now = Timestamp::now();
    let mut imported = 0;
    let mut skipped = 0;
    for entry in entries {
        let id = entry
            .id
            .unwrap_or_else(|| format!("{}/{}", entry.library_id, entry.term));
        if store.fetch_one(&id).await?.is_some() {
            skipped += 1;
            continue;
        }
        let item = ReviewItem::new(id, entry.library_id, entry.term, entry.definition, now);
        store.mutate(Mutation::Upsert(item)).await?;
        imported += 1;
    }
    println!("Imported {imported} items ({skipped} already present).");
    Ok(())
}
