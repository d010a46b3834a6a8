//! User directory. Credentials and sessions are handled elsewhere; this
//! only knows who exists and who is an admin.

use domains::{DomainError, DomainResult, EntityKind, User};
use serde::Deserialize;
use uuid::Uuid;

use crate::validation::required_text;
use crate::Ports;

const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

pub struct UserDirectory {
    ports: Ports,
}

impl UserDirectory {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn register(&self, cmd: RegisterUser) -> DomainResult<User> {
        let username = required_text(&cmd.username, "username", MAX_USERNAME_LEN)?;
        let user = User {
            id: Uuid::now_v7(),
            username,
            is_admin: cmd.is_admin,
            created_at: self.ports.clock.now(),
        };
        self.ports.users.insert_user(user.clone()).await?;
        tracing::info!(user_id = %user.id, username = %user.username, is_admin = user.is_admin, "user registered");
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<User> {
        require_user(&self.ports, id).await
    }
}

/// Resolves an acting user id, failing with `NotFound` when unknown.
pub(crate) async fn require_user(ports: &Ports, id: Uuid) -> DomainResult<User> {
    ports
        .retry
        .read("get_user", || ports.users.get_user(id))
        .await?
        .ok_or_else(|| DomainError::not_found(EntityKind::User, id))
}
