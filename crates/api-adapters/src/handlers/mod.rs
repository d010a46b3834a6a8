//! # Handlers
//!
//! Each handler extracts the acting user id from the request, calls one
//! service operation and renders the result. Authorization and invariants
//! live in the services; nothing here inspects entity state.

pub mod admin;
pub mod gossips;
pub mod system;
pub mod threads;
pub mod users;

use serde::Deserialize;
use uuid::Uuid;

/// Body of commands that only need to know who is acting.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorBody {
    pub user_id: Uuid,
}
