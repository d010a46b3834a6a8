//! # api-adapters
//!
//! REST and WebSocket surface for prastha.
//!
//! Routes are mounted under `/api`; `/ws` streams fan-out frames and
//! `/health` and `/metrics` serve operators. Handlers are thin: they pass
//! the acting user id and payload to a service and map `DomainError` to a
//! status code.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod state;
#[cfg(feature = "web-axum")]
pub mod ws;

pub use metrics::{MeteredPublisher, Metrics};

#[cfg(feature = "web-axum")]
pub use state::AppState;

#[cfg(feature = "web-axum")]
pub use routes::router;

#[cfg(feature = "web-axum")]
mod routes {
    use std::time::Duration;

    use axum::extract::{MatchedPath, Request, State};
    use axum::http::Method;
    use axum::middleware::{self, Next};
    use axum::response::Response;
    use axum::routing::{delete, get, post};
    use axum::Router;
    use tower::ServiceBuilder;
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
    use tower_http::trace::TraceLayer;

    use crate::handlers::{admin, gossips, system, threads, users};
    use crate::state::AppState;
    use crate::ws;

    pub fn router(state: AppState) -> Router {
        let api = Router::new()
            .route("/users", post(users::register))
            .route("/users/{id}", get(users::get_user))
            .route("/threads", get(threads::list).post(threads::create))
            .route("/threads/user/{user_id}", get(threads::insights))
            .route("/threads/alerts/{user_id}", get(threads::alerts))
            .route(
                "/threads/{id}",
                get(threads::get).put(threads::update).delete(threads::delete),
            )
            .route("/threads/{id}/join", post(threads::request_join))
            .route("/threads/{id}/requests", post(threads::handle_request))
            .route(
                "/threads/{id}/messages",
                get(threads::messages_since).post(threads::send_message),
            )
            .route("/gossips", get(gossips::list).post(gossips::create))
            .route("/gossips/{id}", get(gossips::get).delete(gossips::delete))
            .route("/gossips/{id}/vote", post(gossips::vote))
            .route("/gossips/{id}/comments", post(gossips::add_comment))
            .route(
                "/gossips/{id}/comments/{comment_id}",
                delete(gossips::delete_comment),
            )
            .route(
                "/gossips/{id}/comments/{comment_id}/vote",
                post(gossips::vote_comment),
            )
            .route(
                "/gossips/{id}/comments/{comment_id}/report",
                post(gossips::report_comment),
            )
            .route("/admin/dashboard/{user_id}", get(admin::dashboard))
            .route_layer(middleware::from_fn_with_state(state.clone(), record_command));

        Router::new()
            .nest("/api", api)
            .route("/ws", get(ws::upgrade))
            .route("/health", get(system::health))
            .route("/metrics", get(system::metrics))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("");
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id = %request_id
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(cors_policy()),
            )
            .with_state(state)
    }

    fn cors_policy() -> CorsLayer {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    }

    /// Counts every API command by route template and outcome.
    async fn record_command(State(state): State<AppState>, req: Request, next: Next) -> Response {
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| req.uri().path().to_string(), |m| m.as_str().to_string());
        let operation = format!("{} {}", req.method(), route);

        let response = next.run(req).await;
        let status = response.status();
        let outcome = if status.is_server_error() {
            "error"
        } else if status.is_client_error() {
            "rejected"
        } else {
            "ok"
        };
        state.metrics.record_command(operation, outcome);
        response
    }
}
