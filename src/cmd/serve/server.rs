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
use std::sync::Mutex;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use chrono::Duration;
use serde::Deserialize;
use serde::Serialize;
use smartlearn_core::ProgressSummary;
use smartlearn_core::ReviewChoice;
use smartlearn_core::ReviewItem;
use smartlearn_core::ScheduleState;
use smartlearn_core::SchedulerError;
use smartlearn_core::SchedulerTuning;
use smartlearn_core::Tier;
use smartlearn_core::Timestamp;
use smartlearn_core::tier_with;
use tokio::net::TcpListener;
use tokio::select;
use tokio::signal;
use tokio::sync::oneshot::Receiver;
use tokio::sync::oneshot::Sender;
use tokio::sync::oneshot::channel;

use crate::cache::InvalidationGuard;
use crate::cache::SyncCache;
use crate::error::Fallible;
use crate::error::SyncError;
use crate::service::ReviewError;
use crate::service::library::LibraryService;
use crate::service::study::StudyService;
use crate::store::SettingsStore;
use crate::store::sqlite::SqliteStore;
use crate::watch::WatchHub;

/// How long a long-poll watch waits for a change before returning empty.
const WATCH_TIMEOUT_SECS: u64 = 25;

pub struct ServeConfig {
    pub db_path: Option<String>,
    pub host: String,
    pub port: u16,
    pub cache_ttl_secs: i64,
    pub tuning: SchedulerTuning,
}

#[derive(Clone)]
pub struct AppState {
    library: LibraryService<SqliteStore>,
    study: StudyService<SqliteStore>,
    settings: Arc<SqliteStore>,
    tuning: SchedulerTuning,
    shutdown_tx: Arc<Mutex<Option<Sender<()>>>>,
    // Lives as long as the server; logs every cache invalidation.
    _invalidation_log: Arc<InvalidationGuard>,
}

pub async fn start_server(config: ServeConfig) -> Fallible<()> {
    let db_path = config
        .db_path
        .unwrap_or_else(|| crate::cmd::DEFAULT_DB_PATH.to_string());
    let store = Arc::new(SqliteStore::open(&db_path)?);
    let cache = Arc::new(SyncCache::new(Duration::seconds(config.cache_ttl_secs)));
    let invalidation_log = cache.on_invalidated(|prefix| {
        log::info!("stale reads cleared under {}", prefix.unwrap_or("<all>"));
    });
    let hub = Arc::new(WatchHub::new());
    let library = LibraryService::new(store.clone(), cache, hub);
    let study = StudyService::new(library.clone(), config.tuning);

    let (shutdown_tx, shutdown_rx) = channel();

    let state = AppState {
        library,
        study,
        settings: store,
        tuning: config.tuning,
        shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
        _invalidation_log: Arc::new(invalidation_log),
    };

    let app = Router::new();
    let app = app.route("/health", get(health_handler));
    let app = app.route("/libraries/{library_id}/items", get(items_handler));
    let app = app.route("/libraries/{library_id}/favorites", get(favorites_handler));
    let app = app.route("/libraries/{library_id}/due", get(due_handler));
    let app = app.route("/libraries/{library_id}/summary", get(summary_handler));
    let app = app.route("/libraries/{library_id}/watch", get(watch_handler));
    let app = app.route(
        "/libraries/{library_id}/items/{item_id}",
        delete(remove_item_handler),
    );
    let app = app.route("/items", post(add_item_handler));
    let app = app.route("/reviews", post(review_handler));
    let app = app.route("/favorites", post(favorite_handler));
    let app = app.route("/settings/{key}", get(get_setting_handler));
    let app = app.route("/settings/{key}", put(put_setting_handler));
    let app = app.route("/shutdown", post(shutdown_handler));
    let app = app.with_state(state);
    let bind = format!("{}:{}", config.host, config.port);

    log::debug!("starting server on {bind}");
    let listener = TcpListener::bind(bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn sync_error_response(err: SyncError) -> Response {
    let status = match err {
        SyncError::LoadFailed(_) => StatusCode::BAD_GATEWAY,
        SyncError::ListenSetupFailed(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, err.to_string())
}

async fn health_handler() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<ReviewItem>,
}

async fn items_handler(
    State(state): State<AppState>,
    Path(library_id): Path<String>,
) -> Response {
    match state.library.items(&library_id).await {
        Ok(items) => (
            StatusCode::OK,
            Json(ItemsResponse {
                items: (*items).clone(),
            }),
        )
            .into_response(),
        Err(err) => sync_error_response(err),
    }
}

async fn favorites_handler(
    State(state): State<AppState>,
    Path(library_id): Path<String>,
) -> Response {
    match state.library.favorites(&library_id).await {
        Ok(items) => (
            StatusCode::OK,
            Json(ItemsResponse {
                items: (*items).clone(),
            }),
        )
            .into_response(),
        Err(err) => sync_error_response(err),
    }
}

async fn due_handler(State(state): State<AppState>, Path(library_id): Path<String>) -> Response {
    match state.study.due_items(&library_id, Timestamp::now()).await {
        Ok(items) => (StatusCode::OK, Json(ItemsResponse { items })).into_response(),
        Err(err) => sync_error_response(err),
    }
}

#[derive(Serialize)]
struct SummaryResponse {
    #[serde(flatten)]
    summary: ProgressSummary,
    mastered_pct: u32,
    learning_pct: u32,
}

async fn summary_handler(
    State(state): State<AppState>,
    Path(library_id): Path<String>,
) -> Response {
    match state.study.summary(&library_id, Timestamp::now()).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(SummaryResponse {
                summary,
                mastered_pct: summary.mastered_pct(),
                learning_pct: summary.learning_pct(),
            }),
        )
            .into_response(),
        Err(err) => sync_error_response(err),
    }
}

/// Long-poll: returns the library's items after the next change, or 204 if
/// nothing changed within the window. All concurrent polls of one library
/// share a single store subscription; when the last poll ends, the
/// subscription is torn down.
async fn watch_handler(State(state): State<AppState>, Path(library_id): Path<String>) -> Response {
    let mut stream = match state.library.watch_items(&library_id) {
        Ok(stream) => stream,
        Err(err) => return sync_error_response(err),
    };
    // The first delivery is the initial snapshot; a change is whatever
    // comes after it.
    if stream.next().await.is_none() {
        return error_response(StatusCode::BAD_GATEWAY, "watch closed before snapshot");
    }
    let window = std::time::Duration::from_secs(WATCH_TIMEOUT_SECS);
    match tokio::time::timeout(window, stream.next()).await {
        Ok(Some(items)) => (StatusCode::OK, Json(ItemsResponse { items })).into_response(),
        Ok(None) => error_response(StatusCode::BAD_GATEWAY, "watch closed"),
        Err(_) => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn remove_item_handler(
    State(state): State<AppState>,
    Path((library_id, item_id)): Path<(String, String)>,
) -> Response {
    match state.library.remove_item(&library_id, &item_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => sync_error_response(err),
    }
}

#[derive(Deserialize)]
struct AddItemRequest {
    library_id: String,
    term: String,
    definition: String,
    id: Option<String>,
}

async fn add_item_handler(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> Response {
    let id = request
        .id
        .unwrap_or_else(|| format!("{}/{}", request.library_id, request.term));
    let item = ReviewItem::new(
        id,
        request.library_id,
        request.term,
        request.definition,
        Timestamp::now(),
    );
    match state.library.upsert_item(item.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(err) => sync_error_response(err),
    }
}

#[derive(Deserialize)]
struct ReviewRequest {
    item_id: String,
    choice: String,
}

#[derive(Serialize)]
struct ReviewResponse {
    schedule: ScheduleState,
    tier: Tier,
}

async fn review_handler(
    State(state): State<AppState>,
    Json(request): Json<ReviewRequest>,
) -> Response {
    let choice = match ReviewChoice::try_from(request.choice) {
        Ok(choice) => choice,
        Err(err) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    };
    match state
        .study
        .record_review(&request.item_id, choice, Timestamp::now())
        .await
    {
        Ok(schedule) => (
            StatusCode::OK,
            Json(ReviewResponse {
                schedule,
                tier: tier_with(&state.tuning, &schedule),
            }),
        )
            .into_response(),
        Err(ReviewError::NotFound(id)) => {
            error_response(StatusCode::NOT_FOUND, format!("no such item: {id}"))
        }
        Err(ReviewError::Scheduler(err @ SchedulerError::InvalidChoice(_))) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        Err(ReviewError::Scheduler(err @ SchedulerError::InvalidState(_))) => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        Err(ReviewError::Sync(err)) => sync_error_response(err),
    }
}

#[derive(Deserialize)]
struct FavoriteRequest {
    library_id: String,
    item_id: String,
    favorite: bool,
}

async fn favorite_handler(
    State(state): State<AppState>,
    Json(request): Json<FavoriteRequest>,
) -> Response {
    match state
        .library
        .set_favorite(&request.library_id, &request.item_id, request.favorite)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => sync_error_response(err),
    }
}

#[derive(Serialize)]
struct SettingResponse {
    key: String,
    value: String,
}

async fn get_setting_handler(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.settings.get_item(&key).await {
        Ok(Some(value)) => (StatusCode::OK, Json(SettingResponse { key, value })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("no such setting: {key}")),
        Err(err) => sync_error_response(err),
    }
}

#[derive(Deserialize)]
struct PutSettingRequest {
    value: String,
}

async fn put_setting_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<PutSettingRequest>,
) -> Response {
    match state.settings.set_item(&key, &request.value).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => sync_error_response(err),
    }
}

async fn shutdown_handler(State(state): State<AppState>) -> StatusCode {
    let mut shutdown_tx = state.shutdown_tx.lock().unwrap();
    if let Some(tx) = shutdown_tx.take() {
        let _ = tx.send(());
    }
    StatusCode::NO_CONTENT
}

async fn shutdown_signal(shutdown_rx: Receiver<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let shutdown = async {
        shutdown_rx.await.ok();
    };

    select! {
        _ = ctrl_c => {
            log::debug!("Received Ctrl+C, shutting down gracefully");
        },
        _ = shutdown => {
            log::debug!("Received shutdown signal, shutting down gracefully");
        },
    }
}
