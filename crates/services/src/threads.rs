//! Thread lifecycle: create, read, list, update and delete, plus the
//! per-user aggregate used by the profile page.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use domains::{
    DomainError, DomainResult, EntityKind, FanoutEvent, ForbiddenReason, Thread, User,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ranking::{sort_threads, ThreadQuery};
use crate::users::require_user;
use crate::validation::{expiry_after, normalize_tags, optional_text, required_text, ContentLimits};
use crate::Ports;

const MAX_TEXT_LEN: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub creator_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Absolute expiry. Takes precedence over `duration_hours`.
    pub expires_at: Option<DateTime<Utc>>,
    pub duration_hours: Option<u32>,
}

/// Fields a creator or admin may change. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub tags: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A thread as seen at one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: Thread,
    pub expired: bool,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub created: usize,
    pub joined: usize,
    /// Members gathered across the user's own threads, excluding the user.
    pub impact: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInsights {
    pub stats: UserStats,
    pub created_threads: Vec<Thread>,
    pub joined_threads: Vec<Thread>,
}

fn check_expiry(
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    limits: &ContentLimits,
) -> Result<(), ValidationError> {
    if expires_at <= created_at {
        return Err(ValidationError::InvalidExpiry(
            "expiry must be after creation".into(),
        ));
    }
    if expires_at - created_at > limits.max_thread_duration {
        return Err(ValidationError::InvalidExpiry(format!(
            "threads may last at most {} hours",
            limits.max_thread_duration.num_hours()
        )));
    }
    Ok(())
}

pub struct ThreadService {
    ports: Ports,
}

impl ThreadService {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn create(&self, cmd: NewThread) -> DomainResult<Thread> {
        let creator = require_user(&self.ports, cmd.creator_id).await?;
        let limits = &self.ports.limits;
        let now = self.ports.clock.now();

        let title = required_text(&cmd.title, "title", limits.max_title_len)?;
        let description = optional_text(&cmd.description, "description", MAX_TEXT_LEN)?;
        let location = optional_text(&cmd.location, "location", limits.max_title_len)?;
        let expires_at = match (cmd.expires_at, cmd.duration_hours) {
            (Some(at), _) => at,
            (None, Some(hours)) => expiry_after(now, hours, limits.max_thread_duration)?,
            (None, None) => {
                return Err(ValidationError::InvalidExpiry(
                    "expiresAt or durationHours is required".into(),
                )
                .into())
            }
        };
        check_expiry(now, expires_at, limits)?;

        let thread = Thread {
            id: Uuid::now_v7(),
            title,
            description,
            location,
            creator_id: creator.id,
            creator: creator.username.clone(),
            tags: normalize_tags(&cmd.tags),
            members: vec![creator.id],
            pending_requests: BTreeSet::new(),
            chat: Vec::new(),
            created_at: now,
            expires_at,
        };
        self.ports.threads.insert_thread(thread.clone()).await?;

        tracing::info!(thread_id = %thread.id, creator_id = %creator.id, expires_at = %thread.expires_at, "thread created");
        self.ports.events.publish(FanoutEvent::RefreshThreads);
        Ok(thread)
    }

    /// Detail view. Expired threads are still returned, flagged against the
    /// same instant used to compute the flag.
    pub async fn get(&self, id: Uuid) -> DomainResult<ThreadDetail> {
        let thread = load_thread(&self.ports, id).await?;
        let now = self.ports.clock.now();
        Ok(ThreadDetail {
            expired: !thread.is_active(now),
            thread,
            observed_at: now,
        })
    }

    /// Active threads matching `query`, in the requested order.
    pub async fn list(&self, query: &ThreadQuery) -> DomainResult<Vec<Thread>> {
        let now = self.ports.clock.now();
        let mut threads = self
            .ports
            .retry
            .read("list_active_threads", || self.ports.threads.list_active_threads(now))
            .await?;
        threads.retain(|t| query.matches(t));
        sort_threads(&mut threads, query.sort);
        Ok(threads)
    }

    pub async fn update(&self, id: Uuid, actor_id: Uuid, patch: ThreadPatch) -> DomainResult<Thread> {
        let actor = require_user(&self.ports, actor_id).await?;
        let limits = self.ports.limits;
        let now = self.ports.clock.now();

        let title = patch
            .title
            .as_deref()
            .map(|t| required_text(t, "title", limits.max_title_len))
            .transpose()?;
        let description = patch
            .description
            .as_deref()
            .map(|d| optional_text(d, "description", MAX_TEXT_LEN))
            .transpose()?;
        let location = patch
            .location
            .as_deref()
            .map(|l| optional_text(l, "location", limits.max_title_len))
            .transpose()?;
        let tags = patch.tags.as_ref().map(normalize_tags);
        let expires_at = patch.expires_at;

        let thread = self
            .ports
            .threads
            .update_thread(
                id,
                Box::new(move |thread: &mut Thread| {
                    if !thread.can_moderate(&actor) {
                        return Err(ForbiddenReason::NotCreatorOrAdmin.into());
                    }
                    if !thread.is_active(now) {
                        return Err(DomainError::expired(EntityKind::Thread, thread.id));
                    }
                    if let Some(at) = expires_at {
                        check_expiry(thread.created_at, at, &limits)?;
                        if at <= now {
                            return Err(ValidationError::InvalidExpiry(
                                "expiry must be in the future".into(),
                            )
                            .into());
                        }
                        thread.expires_at = at;
                    }
                    if let Some(title) = title {
                        thread.title = title;
                    }
                    if let Some(description) = description {
                        thread.description = description;
                    }
                    if let Some(location) = location {
                        thread.location = location;
                    }
                    if let Some(tags) = tags {
                        thread.tags = tags;
                    }
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(thread_id = %id, actor_id = %actor_id, "thread updated");
        self.ports.events.publish(FanoutEvent::RefreshThreads);
        Ok(thread)
    }

    /// Hard delete by creator or admin. Messages go with the thread.
    pub async fn delete(&self, id: Uuid, actor_id: Uuid) -> DomainResult<()> {
        let actor = require_user(&self.ports, actor_id).await?;
        let thread = load_thread(&self.ports, id).await?;
        if !thread.can_moderate(&actor) {
            return Err(ForbiddenReason::NotCreatorOrAdmin.into());
        }
        if !self.ports.threads.delete_thread(id).await? {
            return Err(DomainError::not_found(EntityKind::Thread, id));
        }

        tracing::info!(thread_id = %id, actor_id = %actor_id, messages = thread.chat.len(), "thread deleted");
        self.ports.events.publish(FanoutEvent::RefreshThreads);
        Ok(())
    }

    /// Threads the user created and joined, including expired ones.
    pub async fn insights(&self, user_id: Uuid) -> DomainResult<UserInsights> {
        let user: User = require_user(&self.ports, user_id).await?;
        let mut threads = self
            .ports
            .retry
            .read("list_threads_for_user", || {
                self.ports.threads.list_threads_for_user(user.id)
            })
            .await?;
        sort_threads(&mut threads, Default::default());

        let (created_threads, joined_threads): (Vec<Thread>, Vec<Thread>) =
            threads.into_iter().partition(|t| t.creator_id == user.id);
        let impact = created_threads
            .iter()
            .map(|t| t.members.iter().filter(|m| **m != user.id).count())
            .sum();

        Ok(UserInsights {
            stats: UserStats {
                created: created_threads.len(),
                joined: joined_threads.len(),
                impact,
            },
            created_threads,
            joined_threads,
        })
    }
}

/// Reads a thread, failing with `NotFound` when absent.
pub(crate) async fn load_thread(ports: &Ports, id: Uuid) -> DomainResult<Thread> {
    ports
        .retry
        .read("get_thread", || ports.threads.get_thread(id))
        .await?
        .ok_or_else(|| DomainError::not_found(EntityKind::Thread, id))
}
