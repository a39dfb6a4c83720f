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

pub mod server;

#[cfg(test)]
mod tests {
    use portpicker::pick_unused_port;
    use reqwest::StatusCode;
    use serde_json::Value;
    use serde_json::json;
    use smartlearn_core::SchedulerTuning;
    use tempfile::tempdir;
    use tokio::spawn;

    use crate::cmd::serve::server::ServeConfig;
    use crate::cmd::serve::server::start_server;
    use crate::error::Fallible;
    use crate::utils::wait_for_server;

    const TEST_HOST: &str = "127.0.0.1";

    async fn spawn_server() -> Fallible<(String, tempfile::TempDir)> {
        let port = pick_unused_port().unwrap();
        let dir = tempdir()?;
        let db_path = dir.path().join("smartlearn.sqlite3").display().to_string();
        let config = ServeConfig {
            db_path: Some(db_path),
            host: TEST_HOST.to_string(),
            port,
            cache_ttl_secs: 300,
            tuning: SchedulerTuning::default(),
        };
        spawn(async move { start_server(config).await });
        wait_for_server(TEST_HOST, port).await?;
        Ok((format!("http://{TEST_HOST}:{port}"), dir))
    }

    async fn add_item(base: &str, id: &str, term: &str) -> Fallible<()> {
        let response = reqwest::Client::new()
            .post(format!("{base}/items"))
            .json(&json!({
                "library_id": "lib1",
                "term": term,
                "definition": format!("definition of {term}"),
                "id": id,
            }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        Ok(())
    }

    #[tokio::test]
    async fn test_e2e() -> Fallible<()> {
        let (base, _dir) = spawn_server().await?;
        let client = reqwest::Client::new();

        // Hit the health endpoint.
        let response = reqwest::get(format!("{base}/health")).await?;
        assert!(response.status().is_success());
        assert_eq!(response.text().await?, "ok");

        // An unknown library has an empty summary.
        let response = reqwest::get(format!("{base}/libraries/lib1/summary")).await?;
        assert!(response.status().is_success());
        let summary: Value = response.json().await?;
        assert_eq!(summary["total"], 0);
        assert_eq!(summary["mastered_pct"], 0);

        // Seed two items.
        add_item(&base, "card-1", "alpha").await?;
        add_item(&base, "card-2", "beta").await?;

        // Both show up in the library and in the due queue.
        let response = reqwest::get(format!("{base}/libraries/lib1/items")).await?;
        let items: Value = response.json().await?;
        assert_eq!(items["items"].as_array().unwrap().len(), 2);
        let response = reqwest::get(format!("{base}/libraries/lib1/due")).await?;
        let due: Value = response.json().await?;
        assert_eq!(due["items"].as_array().unwrap().len(), 2);

        let response = reqwest::get(format!("{base}/libraries/lib1/summary")).await?;
        let summary: Value = response.json().await?;
        assert_eq!(summary["total"], 2);
        assert_eq!(summary["due_count"], 2);
        assert_eq!(summary["mastered_count"], 0);
        assert_eq!(summary["learning_pct"], 100);

        // Review one card as 'normal'.
        let response = client
            .post(format!("{base}/reviews"))
            .json(&json!({"item_id": "card-1", "choice": "normal"}))
            .send()
            .await?;
        assert!(response.status().is_success());
        let review: Value = response.json().await?;
        assert_eq!(review["schedule"]["repetition_count"], 1);
        assert_eq!(review["tier"], "learning");

        // The review left the due queue and the summary reflects it.
        let response = reqwest::get(format!("{base}/libraries/lib1/due")).await?;
        let due: Value = response.json().await?;
        assert_eq!(due["items"].as_array().unwrap().len(), 1);
        let response = reqwest::get(format!("{base}/libraries/lib1/summary")).await?;
        let summary: Value = response.json().await?;
        assert_eq!(summary["due_count"], 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_review_error_taxonomy() -> Fallible<()> {
        let (base, _dir) = spawn_server().await?;
        let client = reqwest::Client::new();
        add_item(&base, "card-1", "alpha").await?;

        // A choice outside the four-valued enum is rejected.
        let response = client
            .post(format!("{base}/reviews"))
            .json(&json!({"item_id": "card-1", "choice": "easy"}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json().await?;
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .contains("invalid difficulty choice")
        );

        // Reviewing an unknown item is a 404.
        let response = client
            .post(format!("{base}/reviews"))
            .json(&json!({"item_id": "ghost", "choice": "normal"}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        Ok(())
    }

    #[tokio::test]
    async fn test_favorites_flow() -> Fallible<()> {
        let (base, _dir) = spawn_server().await?;
        let client = reqwest::Client::new();
        add_item(&base, "card-1", "alpha").await?;
        add_item(&base, "card-2", "beta").await?;

        let response = reqwest::get(format!("{base}/libraries/lib1/favorites")).await?;
        let favorites: Value = response.json().await?;
        assert!(favorites["items"].as_array().unwrap().is_empty());

        let response = client
            .post(format!("{base}/favorites"))
            .json(&json!({"library_id": "lib1", "item_id": "card-2", "favorite": true}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = reqwest::get(format!("{base}/libraries/lib1/favorites")).await?;
        let favorites: Value = response.json().await?;
        let items = favorites["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "card-2");

        Ok(())
    }

    #[tokio::test]
    async fn test_remove_item() -> Fallible<()> {
        let (base, _dir) = spawn_server().await?;
        let client = reqwest::Client::new();
        add_item(&base, "card-1", "alpha").await?;

        let response = client
            .delete(format!("{base}/libraries/lib1/items/card-1"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = reqwest::get(format!("{base}/libraries/lib1/items")).await?;
        let items: Value = response.json().await?;
        assert!(items["items"].as_array().unwrap().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_watch_long_poll_sees_mutation() -> Fallible<()> {
        let (base, _dir) = spawn_server().await?;
        let client = reqwest::Client::new();
        add_item(&base, "card-1", "alpha").await?;

        let watch = client.get(format!("{base}/libraries/lib1/watch")).send();
        let mutate = async {
            // Give the watch time to establish its subscription.
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            client
                .post(format!("{base}/favorites"))
                .json(&json!({"library_id": "lib1", "item_id": "card-1", "favorite": true}))
                .send()
                .await
        };
        let (watch_response, mutate_response) = tokio::join!(watch, mutate);
        assert_eq!(mutate_response?.status(), StatusCode::NO_CONTENT);
        let watch_response = watch_response?;
        assert_eq!(watch_response.status(), StatusCode::OK);
        let items: Value = watch_response.json().await?;
        let items = items["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["favorite"], true);

        Ok(())
    }

    #[tokio::test]
    async fn test_settings_roundtrip() -> Fallible<()> {
        let (base, _dir) = spawn_server().await?;
        let client = reqwest::Client::new();

        let response = reqwest::get(format!("{base}/settings/theme")).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = client
            .put(format!("{base}/settings/theme"))
            .json(&json!({"value": "dark"}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = reqwest::get(format!("{base}/settings/theme")).await?;
        assert!(response.status().is_success());
        let setting: Value = response.json().await?;
        assert_eq!(setting["value"], "dark");

        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_endpoint() -> Fallible<()> {
        let (base, _dir) = spawn_server().await?;
        let response = reqwest::Client::new()
            .post(format!("{base}/shutdown"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }
}
