use axum::http::{Method, StatusCode};
use integration_tests::http::{app, TestApp};
use serde_json::{json, Value};

async fn register(app: &TestApp, name: &str, admin: bool) -> String {
    let (status, user) = app
        .post("/api/users", json!({ "username": name, "isAdmin": admin }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    user["id"].as_str().unwrap().to_string()
}

async fn comment(app: &TestApp, gossip: &str, author: &str, content: &str, parent: Option<&str>) -> Value {
    let (status, body) = app
        .post(
            &format!("/api/gossips/{gossip}/comments"),
            json!({ "authorId": author, "content": content, "parentCommentId": parent }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn gossip_board_over_http() {
    let app = app();
    let alice = register(&app, "alice", false).await;
    let bob = register(&app, "bob", false).await;

    let (status, gossip) = app
        .post("/api/gossips", json!({ "authorId": alice, "content": "the vending machine is free" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = gossip["id"].as_str().unwrap().to_string();
    assert_eq!(gossip["upvotes"], 0);

    let (status, votes) = app
        .post(&format!("/api/gossips/{id}/vote"), json!({ "userId": bob, "voteType": "up" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(votes["upvotes"], 1);
    assert_eq!(votes["upvotedBy"], json!([bob]));

    let (_, votes) = app
        .post(&format!("/api/gossips/{id}/vote"), json!({ "userId": bob, "vote": "none" }))
        .await;
    assert_eq!(votes["upvotes"], 0);

    let first = comment(&app, &id, &bob, "since when?", None).await;
    let first_id = first["id"].as_str().unwrap();
    let reply = comment(&app, &id, &alice, "since monday", Some(first_id)).await;
    assert_eq!(reply["replyTo"], "bob");

    let (_, view) = app.get(&format!("/api/gossips/{id}")).await;
    assert_eq!(view["commentCount"], 2);
    assert_eq!(view["comments"][0]["replies"][0]["content"], "since monday");

    let (status, votes) = app
        .post(
            &format!("/api/gossips/{id}/comments/{first_id}/vote"),
            json!({ "userId": alice, "voteType": "down" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(votes["downvotes"], 1);

    let (status, removed) = app
        .call(
            Method::DELETE,
            &format!("/api/gossips/{id}/comments/{first_id}"),
            Some(json!({ "userId": bob })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["removed"], 2);

    let (status, board) = app.get("/api/gossips?sort=controversial").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn moderation_flows_through_reports_and_the_dashboard() {
    let app = app();
    let alice = register(&app, "alice", false).await;
    let bob = register(&app, "bob", false).await;
    let admin = register(&app, "root", true).await;

    let (_, gossip) = app
        .post("/api/gossips", json!({ "authorId": alice, "content": "library closes early" }))
        .await;
    let id = gossip["id"].as_str().unwrap().to_string();
    let rude = comment(&app, &id, &bob, "who cares", None).await;
    let rude_id = rude["id"].as_str().unwrap();
    let report_uri = format!("/api/gossips/{id}/comments/{rude_id}/report");

    let (status, _) = app.post(&report_uri, json!({ "reporterId": bob })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, report) = app.post(&report_uri, json!({ "reporterId": alice })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["reason"], "Inappropriate content");

    let (status, _) = app.post(&report_uri, json!({ "reporterId": alice, "reason": "rude" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.get(&format!("/api/admin/dashboard/{alice}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, dashboard) = app.get(&format!("/api/admin/dashboard/{admin}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["users"], 3);
    assert_eq!(dashboard["reports"][0]["commentContent"], "who cares");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/gossips/{id}"), Some(json!({ "userId": bob })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/gossips/{id}"), Some(json!({ "userId": admin })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/gossips/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "gossip_not_found");
}

#[tokio::test]
async fn unknown_comment_is_not_found() {
    let app = app();
    let alice = register(&app, "alice", false).await;
    let (_, gossip) = app
        .post("/api/gossips", json!({ "authorId": alice, "content": "quiet day" }))
        .await;
    let id = gossip["id"].as_str().unwrap();
    let missing = uuid::Uuid::now_v7();

    let (status, body) = app
        .post(
            &format!("/api/gossips/{id}/comments/{missing}/vote"),
            json!({ "userId": alice, "voteType": "up" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "comment_not_found");

    let (status, _) = app
        .post("/api/gossips", json!({ "authorId": alice, "content": "  " }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn extreme_durations_and_deep_replies_stay_well_formed() {
    let app = app();
    let alice = register(&app, "alice", false).await;

    let (status, body) = app
        .post(
            "/api/gossips",
            json!({ "authorId": alice, "content": "forever", "durationHours": u32::MAX }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");

    let (status, _) = app
        .post(
            "/api/threads",
            json!({ "creatorId": alice, "title": "forever", "durationHours": u32::MAX }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, gossip) = app
        .post("/api/gossips", json!({ "authorId": alice, "content": "reply chain" }))
        .await;
    let id = gossip["id"].as_str().unwrap().to_string();
    let mut parent: Option<String> = None;
    for i in 0..40 {
        let added = comment(&app, &id, &alice, &format!("level {i}"), parent.as_deref()).await;
        parent = added["id"].as_str().map(str::to_string);
    }

    let (status, view) = app.get(&format!("/api/gossips/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["commentCount"], 40);
    let mut depth = 0;
    let mut level = &view["comments"];
    while let Some(node) = level.as_array().and_then(|nodes| nodes.first()) {
        depth += 1;
        level = &node["replies"];
    }
    assert_eq!(depth, 16);
}
