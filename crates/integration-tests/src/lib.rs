//! Shared fixtures for the cross-crate tests in `tests/`.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use domains::{EventPublisher, GossipRepo, ReportRepo, Thread, ThreadRepo, User, UserRepo};
use services::{
    BroadcastPublisher, ExpiryPolicy, ManualClock, NewThread, Ports, RegisterUser, RetryPolicy,
    Services,
};
use storage_adapters::InMemoryStore;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap()
}

/// Services over one store, a manual clock and a live fan-out hub.
pub struct World {
    pub services: Services,
    pub clock: Arc<ManualClock>,
    pub hub: BroadcastPublisher,
}

pub fn world() -> World {
    world_over(Arc::new(InMemoryStore::new()))
}

pub fn world_over<S>(store: Arc<S>) -> World
where
    S: ThreadRepo + GossipRepo + UserRepo + ReportRepo + 'static,
{
    let clock = Arc::new(ManualClock::new(epoch()));
    let hub = BroadcastPublisher::new(64);
    let events: Arc<dyn EventPublisher> = Arc::new(hub.clone());
    let ports = Ports::new(store, clock.clone(), events).with_retry(RetryPolicy::no_retries());
    World {
        services: Services::new(ports, ExpiryPolicy::default()),
        clock,
        hub,
    }
}

impl World {
    pub async fn user(&self, name: &str, is_admin: bool) -> User {
        self.services
            .users
            .register(RegisterUser {
                username: name.to_string(),
                is_admin,
            })
            .await
            .unwrap()
    }

    pub async fn thread(&self, creator: &User, title: &str, hours: u32) -> Thread {
        self.services
            .threads
            .create(NewThread {
                creator_id: creator.id,
                title: title.to_string(),
                description: format!("{title} near the quad"),
                location: "Quad".into(),
                tags: vec!["campus".into()],
                expires_at: None,
                duration_hours: Some(hours),
            })
            .await
            .unwrap()
    }
}

#[cfg(feature = "web-axum")]
pub mod http {
    //! Drives the router in-process with `tower::ServiceExt::oneshot`.

    use api_adapters::{router, AppState, Metrics};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{world, World};

    pub struct TestApp {
        pub router: Router,
        pub world: World,
        pub metrics: Metrics,
    }

    pub fn app() -> TestApp {
        let world = world();
        let metrics = Metrics::new();
        let state = AppState::new(world.services.clone(), world.hub.clone(), metrics.clone());
        TestApp {
            router: router(state),
            world,
            metrics,
        }
    }

    impl TestApp {
        pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(json) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string())),
                None => builder.body(Body::empty()),
            }
            .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            };
            (status, json)
        }

        pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Method::GET, uri, None).await
        }

        pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, uri, Some(body)).await
        }
    }
}
