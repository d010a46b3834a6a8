//! # Core Traits (Ports)
//!
//! Any storage or delivery adapter must implement these traits to be used by
//! the services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::DomainResult;
use crate::models::{CommentReport, FanoutEvent, Gossip, Thread, User};

/// A read-check-write step applied atomically to one stored entity.
///
/// The store runs it against a working copy while holding the entity's
/// write lock and only persists the copy when it returns `Ok`.
pub type Mutation<T> = Box<dyn FnOnce(&mut T) -> DomainResult<()> + Send>;

/// Thread persistence. Chat logs are stored inside their thread, so a thread
/// delete cascades to its messages.
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn insert_thread(&self, thread: Thread) -> DomainResult<()>;
    async fn get_thread(&self, id: Uuid) -> DomainResult<Option<Thread>>;
    async fn list_threads(&self) -> DomainResult<Vec<Thread>>;
    /// Threads where `now < expires_at`.
    async fn list_active_threads(&self, now: DateTime<Utc>) -> DomainResult<Vec<Thread>>;
    /// Threads created by or joined by `user_id`.
    async fn list_threads_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Thread>>;
    /// Fails with `NotFound` when the thread is missing.
    async fn update_thread(&self, id: Uuid, mutation: Mutation<Thread>) -> DomainResult<Thread>;
    /// Returns whether a thread was removed.
    async fn delete_thread(&self, id: Uuid) -> DomainResult<bool>;
}

/// Gossip persistence. Comments are stored inside their gossip.
#[async_trait]
pub trait GossipRepo: Send + Sync {
    async fn insert_gossip(&self, gossip: Gossip) -> DomainResult<()>;
    async fn get_gossip(&self, id: Uuid) -> DomainResult<Option<Gossip>>;
    async fn list_gossips(&self) -> DomainResult<Vec<Gossip>>;
    async fn update_gossip(&self, id: Uuid, mutation: Mutation<Gossip>) -> DomainResult<Gossip>;
    async fn delete_gossip(&self, id: Uuid) -> DomainResult<bool>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict(UsernameTaken)` on a case-insensitive clash.
    async fn insert_user(&self, user: User) -> DomainResult<()>;
    async fn get_user(&self, id: Uuid) -> DomainResult<Option<User>>;
    async fn count_users(&self) -> DomainResult<usize>;
}

#[async_trait]
pub trait ReportRepo: Send + Sync {
    /// Fails with `Conflict(AlreadyReported)` when the reporter already
    /// reported this comment.
    async fn insert_report(&self, report: CommentReport) -> DomainResult<()>;
    async fn list_reports(&self) -> DomainResult<Vec<CommentReport>>;
}

/// The single authoritative time source. Each operation reads it once.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Best-effort notification sink. Must never block the write path.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: FanoutEvent);
}
