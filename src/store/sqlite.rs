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

//! SQLite-backed document store. Also holds the durable settings table.

use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::Ordering;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use smartlearn_core::ReviewItem;
use smartlearn_core::ScheduleState;
use smartlearn_core::Timestamp;

use crate::error::Fallible;
use crate::error::SyncError;
use crate::store::ChangeCallback;
use crate::store::DocumentStore;
use crate::store::ListenerHandle;
use crate::store::ListenerRegistry;
use crate::store::Mutation;
use crate::store::Query;
use crate::store::SettingsStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    registry: ListenerRegistry,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Fallible<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            registry: ListenerRegistry::new(),
        })
    }

    pub fn open_in_memory() -> Fallible<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            registry: ListenerRegistry::new(),
        })
    }

    fn snapshot(&self, query: &Query) -> Result<Vec<ReviewItem>, SyncError> {
        let conn = self.conn.lock().unwrap();
        let sql = match query {
            Query::Library(_) => {
                "SELECT id, library_id, term, definition, favorite, due_at, interval_minutes,
                        repetition_count, lapse_count, last_reviewed_at
                 FROM items WHERE library_id = ?1 ORDER BY id"
            }
            Query::Favorites(_) => {
                "SELECT id, library_id, term, definition, favorite, due_at, interval_minutes,
                        repetition_count, lapse_count, last_reviewed_at
                 FROM items WHERE library_id = ?1 AND favorite = 1 ORDER BY id"
            }
        };
        let mut stmt = conn.prepare(sql).map_err(load_failed)?;
        let rows = stmt
            .query_map(params![query.library_id()], row_to_item)
            .map_err(load_failed)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(load_failed)?);
        }
        Ok(result)
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<ReviewItem>, SyncError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, library_id, term, definition, favorite, due_at, interval_minutes,
                    repetition_count, lapse_count, last_reviewed_at
             FROM items WHERE id = ?1",
            params![id],
            row_to_item,
        )
        .optional()
        .map_err(load_failed)
    }

    fn apply(&self, op: Mutation) -> Result<String, SyncError> {
        let conn = self.conn.lock().unwrap();
        match op {
            Mutation::Upsert(item) => {
                let library_id = item.library_id.clone();
                conn.execute(
                    "INSERT OR REPLACE INTO items
                     (id, library_id, term, definition, favorite, due_at, interval_minutes,
                      repetition_count, lapse_count, last_reviewed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        item.id,
                        item.library_id,
                        item.term,
                        item.definition,
                        item.favorite as i64,
                        item.schedule.due_at.to_string(),
                        item.schedule.interval_minutes,
                        item.schedule.repetition_count,
                        item.schedule.lapse_count,
                        item.schedule.last_reviewed_at.map(|ts| ts.to_string()),
                    ],
                )
                .map_err(load_failed)?;
                Ok(library_id)
            }
            Mutation::SetFavorite { item_id, favorite } => {
                let changed = conn
                    .execute(
                        "UPDATE items SET favorite = ?1 WHERE id = ?2",
                        params![favorite as i64, item_id],
                    )
                    .map_err(load_failed)?;
                if changed == 0 {
                    return Err(SyncError::LoadFailed(format!("no such item: {item_id}")));
                }
                library_of(&conn, &item_id)
            }
            Mutation::UpdateSchedule { item_id, schedule } => {
                let changed = conn
                    .execute(
                        "UPDATE items SET due_at = ?1, interval_minutes = ?2,
                         repetition_count = ?3, lapse_count = ?4, last_reviewed_at = ?5
                         WHERE id = ?6",
                        params![
                            schedule.due_at.to_string(),
                            schedule.interval_minutes,
                            schedule.repetition_count,
                            schedule.lapse_count,
                            schedule.last_reviewed_at.map(|ts| ts.to_string()),
                            item_id,
                        ],
                    )
                    .map_err(load_failed)?;
                if changed == 0 {
                    return Err(SyncError::LoadFailed(format!("no such item: {item_id}")));
                }
                library_of(&conn, &item_id)
            }
            Mutation::Remove { item_id } => {
                let library_id = library_of(&conn, &item_id)?;
                conn.execute("DELETE FROM items WHERE id = ?1", params![item_id])
                    .map_err(load_failed)?;
                Ok(library_id)
            }
        }
    }

    fn notify(&self, library_id: &str) {
        let affected = self.registry.affected_queries(library_id);
        let mut deliveries = Vec::new();
        for (query, callback, alive) in affected {
            match self.snapshot(&query) {
                Ok(snapshot) => deliveries.push((snapshot, callback, alive)),
                Err(err) => log::warn!("dropping change delivery for {}: {err}", query.key()),
            }
        }
        for (snapshot, callback, alive) in deliveries {
            if alive.load(Ordering::SeqCst) {
                callback(snapshot);
            }
        }
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            library_id TEXT NOT NULL,
            term TEXT NOT NULL,
            definition TEXT NOT NULL,
            favorite INTEGER NOT NULL DEFAULT 0,
            due_at TEXT NOT NULL,
            interval_minutes INTEGER NOT NULL DEFAULT 0,
            repetition_count INTEGER NOT NULL DEFAULT 0,
            lapse_count INTEGER NOT NULL DEFAULT 0,
            last_reviewed_at TEXT
        )",
        (),
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS items_library_idx ON items (library_id)",
        (),
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        (),
    )?;
    Ok(())
}

fn row_to_item(row: &Row) -> rusqlite::Result<ReviewItem> {
    let due_at: String = row.get(5)?;
    let last_reviewed_at: Option<String> = row.get(9)?;
    let due_at = parse_timestamp(5, due_at)?;
    let last_reviewed_at = match last_reviewed_at {
        Some(ts) => Some(parse_timestamp(9, ts)?),
        None => None,
    };
    Ok(ReviewItem {
        id: row.get(0)?,
        library_id: row.get(1)?,
        term: row.get(2)?,
        definition: row.get(3)?,
        favorite: row.get::<_, i64>(4)? != 0,
        schedule: ScheduleState {
            due_at,
            interval_minutes: row.get(6)?,
            repetition_count: row.get(7)?,
            lapse_count: row.get(8)?,
            last_reviewed_at,
        },
    })
}

fn parse_timestamp(column: usize, value: String) -> rusqlite::Result<Timestamp> {
    Timestamp::try_from(value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
    })
}

fn library_of(conn: &Connection, item_id: &str) -> Result<String, SyncError> {
    conn.query_row(
        "SELECT library_id FROM items WHERE id = ?1",
        params![item_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(load_failed)?
    .ok_or_else(|| SyncError::LoadFailed(format!("no such item: {item_id}")))
}

fn load_failed(err: rusqlite::Error) -> SyncError {
    SyncError::LoadFailed(err.to_string())
}

impl DocumentStore for SqliteStore {
    fn fetch_one(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ReviewItem>, SyncError>> + Send {
        let result = self.fetch_by_id(id);
        async move { result }
    }

    fn fetch_many(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<ReviewItem>, SyncError>> + Send {
        let result = (|| {
            let mut items = Vec::new();
            for id in ids {
                if let Some(item) = self.fetch_by_id(id)? {
                    items.push(item);
                }
            }
            Ok(items)
        })();
        async move { result }
    }

    fn query(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<ReviewItem>, SyncError>> + Send {
        let result = self.snapshot(query);
        async move { result }
    }

    fn listen(&self, query: Query, on_change: ChangeCallback) -> Result<ListenerHandle, SyncError> {
        let snapshot = self
            .snapshot(&query)
            .map_err(|err| SyncError::ListenSetupFailed(err.to_string()))?;
        let (handle, alive) = self.registry.register(query, on_change.clone());
        tokio::spawn(async move {
            if alive.load(Ordering::SeqCst) {
                on_change(snapshot);
            }
        });
        Ok(handle)
    }

    fn mutate(&self, op: Mutation) -> impl Future<Output = Result<(), SyncError>> + Send {
        let result = self.apply(op);
        if let Ok(library_id) = &result {
            self.notify(library_id);
        }
        async move { result.map(|_| ()) }
    }

    fn libraries(&self) -> impl Future<Output = Result<Vec<String>, SyncError>> + Send {
        let result = (|| {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare("SELECT DISTINCT library_id FROM items ORDER BY library_id")
                .map_err(load_failed)?;
            let rows = stmt
                .query_map((), |row| row.get::<_, String>(0))
                .map_err(load_failed)?;
            let mut result = Vec::new();
            for row in rows {
                result.push(row.map_err(load_failed)?);
            }
            Ok(result)
        })();
        async move { result }
    }
}

impl SettingsStore for SqliteStore {
    fn get_item(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, SyncError>> + Send {
        let result = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(load_failed)
        };
        async move { result }
    }

    fn set_item(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), SyncError>> + Send {
        let result = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map(|_| ())
            .map_err(load_failed)
        };
        async move { result }
    }
}
