// tests/api_tests.rs

use std::{net::SocketAddr, sync::Arc, time::Duration};

use learnpath::{
    catalog::CourseCatalog, config::Config, persistence::MIGRATOR, routes,
    session::SessionRegistry, state::AppState,
};
use serde_json::{Value, json};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

/// `mini`: one section, `[introduction, quiz]`, correct answer 1.
/// `orbit`: one section, `[introduction, video, image, playground, quiz]`.
fn test_catalog() -> CourseCatalog {
    let mini = serde_json::from_value(json!({
        "id": "mini",
        "title": "Mini course",
        "sections": [{
            "id": "only",
            "title": "Only section",
            "introduction": "Hello",
            "quizzes": [{
                "question": "Which one?",
                "options": ["first", "second", "third"],
                "correct_answer_index": 1
            }]
        }],
        "content_overrides": { "only": ["introduction", "quiz"] }
    }))
    .expect("invalid test course");

    let orbit = serde_json::from_value(json!({
        "id": "orbit",
        "title": "Orbits",
        "sections": [{
            "id": "kepler",
            "title": "Kepler's laws",
            "introduction": "Planets move on ellipses",
            "quizzes": [{
                "question": "Orbit shape?",
                "options": ["circle", "ellipse"],
                "correct_answer_index": 1
            }]
        }],
        "content_overrides": { "kepler": ["introduction", "video", "image", "playground", "quiz"] }
    }))
    .expect("invalid test course");

    CourseCatalog::from_courses(vec![mini, orbit]).expect("test catalog should be valid")
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    spawn_app_with(None).await.0
}

/// Same as `spawn_app`, with optional rate limiting. Also hands back the pool
/// so a test can tamper with storage.
async fn spawn_app_with(rate_limit_per_second: Option<u64>) -> (String, SqlitePool) {
    // 1. Create an in-memory database that lives as long as its single connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    // 2. Run migrations
    MIGRATOR.run(&pool).await.expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        courses_dir: "courses".into(),
        bind_addr: "127.0.0.1:0".to_string(),
        rate_limit_per_second,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        catalog: Arc::new(test_catalog()),
        sessions: Arc::new(SessionRegistry::new()),
    };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background (peer address is the rate limit key)
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    (address, pool)
}

async fn register(client: &reqwest::Client, address: &str) -> String {
    let response = client
        .post(format!("{}/api/learners", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    body["token"].as_str().expect("Token not found").to_string()
}

async fn post(client: &reqwest::Client, url: String, token: &str, body: Option<Value>) -> reqwest::Response {
    let mut request = client
        .post(url)
        .header("Authorization", format!("Bearer {}", token));
    if let Some(body) = body {
        request = request.json(&body);
    }
    request.send().await.expect("Failed to execute request")
}

#[tokio::test]
async fn unknown_path_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn courses_are_listed_without_answers() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let list: Vec<Value> = client
        .get(format!("{}/api/courses", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], "mini");
    assert_eq!(list[0]["content_count"], 2);

    let detail: Value = client
        .get(format!("{}/api/courses/mini", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["sections"][0]["content_kinds"], json!(["introduction", "quiz"]));
    assert!(detail["sections"][0]["quizzes"][0].get("correct_answer_index").is_none());

    let missing = client
        .get(format!("{}/api/courses/nope", address))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn session_routes_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/courses/mini/session", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = post(&client, format!("{}/api/courses/mini/session", address), "garbage", None).await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn intents_without_an_open_session_are_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register(&client, &address).await;

    let response = post(&client, format!("{}/api/courses/mini/session/advance", address), &token, None).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn full_course_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register(&client, &address).await;
    let session = format!("{}/api/courses/mini/session", address);

    // 1. Open the course
    let response = post(&client, session.clone(), &token, None).await;
    assert_eq!(response.status().as_u16(), 201);
    let snapshot: Value = response.json().await.unwrap();
    assert_eq!(snapshot["content_kind"], "introduction");
    assert_eq!(snapshot["xp"], 0);

    // 2. Introduction -> quiz
    let body: Value = post(&client, format!("{}/advance", session), &token, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["transition"]["type"], "moved");
    assert_eq!(body["snapshot"]["content_kind"], "quiz");
    assert_eq!(body["snapshot"]["xp"], 5);
    assert_eq!(body["snapshot"]["quiz"]["options"], json!(["first", "second", "third"]));

    // 3. Advancing an unanswered quiz is soft-blocked
    let response = post(&client, format!("{}/advance", session), &token, None).await;
    assert_eq!(response.status().as_u16(), 409);

    // 4. Out-of-range answers are rejected
    let response = post(&client, format!("{}/answer", session), &token, Some(json!({ "index": 9 }))).await;
    assert_eq!(response.status().as_u16(), 400);

    // 5. Select and submit
    let response = post(&client, format!("{}/answer", session), &token, Some(json!({ "index": 1 }))).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: Value = post(&client, format!("{}/submit", session), &token, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["transition"]["type"], "submitted");
    assert_eq!(body["snapshot"]["answer_correct"], true);

    // 6. Changing the answer after submission is a conflict
    let response = post(&client, format!("{}/answer", session), &token, Some(json!({ "index": 0 }))).await;
    assert_eq!(response.status().as_u16(), 409);

    // 7. Finish the course
    let body: Value = post(&client, format!("{}/advance", session), &token, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["transition"]["type"], "course_completed");
    assert_eq!(body["transition"]["bonus_awarded"], true);
    assert_eq!(body["snapshot"]["xp"], 75);
    assert_eq!(body["snapshot"]["level"], 2);
    assert_eq!(body["snapshot"]["course_completed"], true);

    // 8. The stored projection agrees with the engine
    let overview: Value = client
        .get(format!("{}/api/progress", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["total_xp"], 75);
    assert_eq!(overview["courses"][0]["course_id"], "mini");
    assert_eq!(overview["courses"][0]["completed_items"], 2);
    assert_eq!(overview["courses"][0]["total_items"], 2);
    assert_eq!(overview["courses"][0]["course_completed"], true);
    assert!(overview["courses"][0]["last_activity"].is_string());

    // 9. Close and reopen: progress is resumed from storage
    let response = client
        .delete(&session)
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let snapshot: Value = post(&client, session.clone(), &token, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["xp"], 75);
    assert_eq!(snapshot["content_index"], 0);
    assert_eq!(snapshot["completed"], json!(["0-0", "0-1", "course-complete"]));
}

#[tokio::test]
async fn navigation_intents() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register(&client, &address).await;
    let session = format!("{}/api/courses/mini/session", address);

    post(&client, session.clone(), &token, None).await;

    // Going back from the first card stays put
    let body: Value = post(&client, format!("{}/back", session), &token, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["transition"]["type"], "stayed");

    // Jumping awards nothing
    let body: Value = post(&client, format!("{}/jump", session), &token, Some(json!({ "index": 1 })))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["snapshot"]["content_index"], 1);
    assert_eq!(body["snapshot"]["xp"], 0);

    let response = post(&client, format!("{}/jump", session), &token, Some(json!({ "index": 2 }))).await;
    assert_eq!(response.status().as_u16(), 400);

    let snapshot: Value = client
        .get(&session)
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["content_kind"], "quiz");
    assert_eq!(snapshot["completed"], json!([]));
}

#[tokio::test]
async fn learners_do_not_share_progress() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let alice = register(&client, &address).await;
    let bob = register(&client, &address).await;
    let session = format!("{}/api/courses/mini/session", address);

    post(&client, session.clone(), &alice, None).await;
    post(&client, format!("{}/advance", session), &alice, None).await;

    let response = post(&client, format!("{}/advance", session), &bob, None).await;
    assert_eq!(response.status().as_u16(), 404);

    let snapshot: Value = post(&client, session.clone(), &bob, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["xp"], 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let doc: Value = client
        .get(format!("{}/api-docs/openapi.json", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(doc["paths"]["/api/courses/{id}/session/advance"].is_object());
}

#[tokio::test]
async fn failed_flush_leaves_the_session_untouched() {
    let (address, pool) = spawn_app_with(None).await;
    let client = reqwest::Client::new();
    let token = register(&client, &address).await;
    let session = format!("{}/api/courses/mini/session", address);

    post(&client, session.clone(), &token, None).await;

    // 1. Take storage away and advance
    sqlx::query("ALTER TABLE progress_entries RENAME TO progress_entries_offline")
        .execute(&pool)
        .await
        .unwrap();

    let response = post(&client, format!("{}/advance", session), &token, None).await;
    assert_eq!(response.status().as_u16(), 500);

    // 2. The live engine neither moved nor earned anything
    let snapshot: Value = client
        .get(&session)
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["content_index"], 0);
    assert_eq!(snapshot["xp"], 0);
    assert_eq!(snapshot["completed"], json!([]));

    // 3. Once storage is back, the retry applies exactly once
    sqlx::query("ALTER TABLE progress_entries_offline RENAME TO progress_entries")
        .execute(&pool)
        .await
        .unwrap();

    let body: Value = post(&client, format!("{}/advance", session), &token, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["snapshot"]["content_index"], 1);
    assert_eq!(body["snapshot"]["xp"], 5);

    // 4. A reopened session sees the committed progress
    let snapshot: Value = post(&client, session.clone(), &token, None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["xp"], 5);
    assert_eq!(snapshot["completed"], json!(["0-0"]));
}

#[tokio::test]
async fn concurrent_intents_leave_storage_in_step_with_the_engine() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register(&client, &address).await;
    let session = format!("{}/api/courses/orbit/session", address);

    post(&client, session.clone(), &token, None).await;

    // introduction (+5), video (+10), image (+5), in whatever order they land
    let requests: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            let token = token.clone();
            let url = format!("{}/advance", session);
            tokio::spawn(async move { post(&client, url, &token, None).await.status().as_u16() })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await.unwrap(), 200);
    }

    let snapshot: Value = client
        .get(&session)
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["content_index"], 3);
    assert_eq!(snapshot["xp"], 20);

    let overview: Value = client
        .get(format!("{}/api/progress", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["courses"][1]["course_id"], "orbit");
    assert_eq!(overview["courses"][1]["xp"], 20);
    assert_eq!(overview["courses"][1]["completed_items"], 3);
}

#[tokio::test]
async fn rate_limit_allows_the_configured_rate() {
    // 2 req/s: a burst of 4, then one request every 500ms
    let (address, _pool) = spawn_app_with(Some(2)).await;
    let client = reqwest::Client::new();
    let courses = format!("{}/api/courses", address);

    for _ in 0..4 {
        let response = client.get(&courses).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = client.get(&courses).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 429);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let response = client.get(&courses).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}
