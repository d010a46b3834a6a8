use axum::http::{Method, StatusCode};
use chrono::Duration;
use integration_tests::http::{app, TestApp};
use serde_json::{json, Value};

async fn register(app: &TestApp, name: &str) -> String {
    let (status, user) = app.post("/api/users", json!({ "username": name })).await;
    assert_eq!(status, StatusCode::CREATED);
    user["id"].as_str().unwrap().to_string()
}

async fn open_thread(app: &TestApp, creator: &str, title: &str) -> Value {
    let (status, thread) = app
        .post(
            "/api/threads",
            json!({
                "creatorId": creator,
                "title": title,
                "description": "bring snacks",
                "location": "Dorm B lounge",
                "tags": ["Games", "games", " social "],
                "durationHours": 2,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    thread
}

#[tokio::test]
async fn create_join_approve_and_chat_over_http() {
    let app = app();
    let host = register(&app, "host").await;
    let guest = register(&app, "guest").await;
    let thread = open_thread(&app, &host, "Mario Kart night").await;
    let id = thread["id"].as_str().unwrap();
    assert_eq!(thread["members"], json!([host]));
    assert_eq!(thread["tags"], json!(["Games", "social"]));

    let (status, _) = app.post(&format!("/api/threads/{id}/join"), json!({ "userId": guest })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.post(&format!("/api/threads/{id}/join"), json!({ "userId": guest })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = app
        .post(
            &format!("/api/threads/{id}/requests"),
            json!({ "userId": guest, "approve": true, "actingUserId": guest }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, joined) = app
        .post(
            &format!("/api/threads/{id}/requests"),
            json!({ "userId": guest, "approve": true, "actingUserId": host }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(joined["members"], json!([host, guest]));

    let (status, message) = app
        .post(
            &format!("/api/threads/{id}/messages"),
            json!({ "senderId": guest, "message": "bringing controllers" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["seq"], 1);
    assert_eq!(message["user"], "guest");

    let (status, body) = app
        .post(&format!("/api/threads/{id}/messages"), json!({ "senderId": guest, "message": "   " }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");

    let (status, messages) = app.get(&format!("/api/threads/{id}/messages?after=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn expired_threads_answer_gone() {
    let app = app();
    let host = register(&app, "host").await;
    let thread = open_thread(&app, &host, "Quick chess").await;
    let id = thread["id"].as_str().unwrap();

    app.world.clock.advance(Duration::hours(2));

    let (status, body) = app
        .post(&format!("/api/threads/{id}/messages"), json!({ "senderId": host, "message": "gg" }))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "expired");

    let (status, detail) = app.get(&format!("/api/threads/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["expired"], true);

    let (_, feed) = app.get("/api/threads").await;
    assert_eq!(feed, json!([]));
}

#[tokio::test]
async fn feed_filters_by_category_and_search() {
    let app = app();
    let host = register(&app, "host").await;
    open_thread(&app, &host, "Mario Kart night").await;
    app.world.clock.advance(Duration::minutes(1));
    let (status, _) = app
        .post(
            "/api/threads",
            json!({
                "creatorId": host,
                "title": "Calculus review",
                "tags": ["study"],
                "durationHours": 1,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, feed) = app.get("/api/threads?category=study").await;
    let titles: Vec<&str> = feed.as_array().unwrap().iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Calculus review"]);

    let (_, feed) = app.get("/api/threads?search=kart").await;
    assert_eq!(feed.as_array().unwrap().len(), 1);

    let (_, feed) = app.get("/api/threads?sort=expiringSoon").await;
    assert_eq!(feed[0]["title"], "Calculus review");
}

#[tokio::test]
async fn creator_edits_and_deletes_but_strangers_cannot() {
    let app = app();
    let host = register(&app, "host").await;
    let stranger = register(&app, "stranger").await;
    let thread = open_thread(&app, &host, "Pottery").await;
    let id = thread["id"].as_str().unwrap();

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/threads/{id}"),
            Some(json!({ "userId": stranger, "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .call(
            Method::PUT,
            &format!("/api/threads/{id}"),
            Some(json!({ "userId": host, "location": "Art room" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["location"], "Art room");
    assert_eq!(updated["title"], "Pottery");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/threads/{id}"), Some(json!({ "userId": host })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/threads/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "thread_not_found");
}

#[tokio::test]
async fn insights_and_alerts_are_per_user() {
    let app = app();
    let host = register(&app, "host").await;
    open_thread(&app, &host, "Jam session").await;

    let (status, insights) = app.get(&format!("/api/threads/user/{host}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(insights["stats"]["created"], 1);
    assert_eq!(insights["stats"]["impact"], 0);

    app.world.clock.advance(Duration::minutes(100));
    let (status, alerts) = app.get(&format!("/api/threads/alerts/{host}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts[0]["type"], "urgent");
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let app = app();
    let (status, body) = app.get("/api/threads/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = app.post("/api/threads", json!({ "title": "no creator" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_and_metrics_report_traffic() {
    let app = app();
    register(&app, "host").await;

    let (status, health) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["fanout"]["subscribers"], 0);

    let (status, body) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains(r#"prastha_commands_total{operation="POST /api/users",outcome="ok"} 1"#));
}
