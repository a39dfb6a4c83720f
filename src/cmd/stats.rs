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

use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Path;

use clap::ValueEnum;
use serde_json::json;
use smartlearn_core::Timestamp;
use smartlearn_core::summarize;

use crate::cmd::DEFAULT_DB_PATH;
use crate::error::Fallible;
use crate::error::fail;
use crate::store::DocumentStore;
use crate::store::Query;
use crate::store::sqlite::SqliteStore;

#[derive(ValueEnum, Clone, Copy, PartialEq)]
pub enum StatsFormat {
    Text,
    Json,
}

impl Display for StatsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsFormat::Text => write!(f, "text"),
            StatsFormat::Json => write!(f, "json"),
        }
    }
}

pub async fn print_stats(
    db: Option<String>,
    library: Option<String>,
    format: StatsFormat,
) -> Fallible<()> {
    let db_path = db.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    if !Path::new(&db_path).exists() {
        return fail("database does not exist.");
    }
    let store = SqliteStore::open(&db_path)?;
    let now = Timestamp::now();
    let libraries = match library {
        Some(library_id) => vec![library_id],
        None => store.libraries().await?,
    };
    let mut reports = Vec::new();
    for library_id in libraries {
        let items = store.query(&Query::Library(library_id.clone())).await?;
        let summary = summarize(&items, now);
        reports.push((library_id, summary));
    }
    match format {
        StatsFormat::Text => {
            for (library_id, summary) in reports {
                println!("{library_id}:");
                println!("  total:    {}", summary.total);
                println!(
                    "  mastered: {} ({}%)",
                    summary.mastered_count,
                    summary.mastered_pct()
                );
                println!(
                    "  learning: {} ({}%)",
                    summary.learning_count,
                    summary.learning_pct()
                );
                println!("  due:      {}", summary.due_count);
            }
        }
        StatsFormat::Json => {
            let reports: Vec<_> = reports
                .into_iter()
                .map(|(library_id, summary)| {
                    json!({
                        "library_id": library_id,
                        "total": summary.total,
                        "mastered_count": summary.mastered_count,
                        "learning_count": summary.learning_count,
                        "due_count": summary.due_count,
                        "mastered_pct": summary.mastered_pct(),
                        "learning_pct": summary.learning_pct(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }
    Ok(())
}
