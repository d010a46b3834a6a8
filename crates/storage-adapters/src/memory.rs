//! In-memory Entity Store.
//!
//! Each entity lives in a `DashMap` shard; `update_*` holds that shard's
//! write lock for the duration of the mutation, which gives per-entity
//! atomicity while writes to different entities proceed in parallel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use domains::{
    CommentReport, ConflictReason, DomainError, DomainResult, EntityKind, Gossip, GossipRepo,
    Mutation, ReportRepo, Thread, ThreadRepo, User, UserRepo,
};

#[derive(Default)]
pub struct InMemoryStore {
    threads: DashMap<Uuid, Thread>,
    gossips: DashMap<Uuid, Gossip>,
    users: DashMap<Uuid, User>,
    /// Lowercased username -> user id.
    usernames: DashMap<String, Uuid>,
    reports: DashMap<Uuid, CommentReport>,
    /// (comment id, reporter id) -> report id.
    report_index: DashMap<(Uuid, Uuid), Uuid>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs `mutation` on a copy of the entry and commits it only on success.
fn apply_locked<T: Clone>(entry: &mut T, mutation: Mutation<T>) -> DomainResult<T> {
    let mut draft = entry.clone();
    mutation(&mut draft)?;
    *entry = draft.clone();
    Ok(draft)
}

#[async_trait]
impl ThreadRepo for InMemoryStore {
    async fn insert_thread(&self, thread: Thread) -> DomainResult<()> {
        self.threads.insert(thread.id, thread);
        Ok(())
    }

    async fn get_thread(&self, id: Uuid) -> DomainResult<Option<Thread>> {
        Ok(self.threads.get(&id).map(|t| t.value().clone()))
    }

    async fn list_threads(&self) -> DomainResult<Vec<Thread>> {
        Ok(self.threads.iter().map(|t| t.value().clone()).collect())
    }

    async fn list_active_threads(&self, now: DateTime<Utc>) -> DomainResult<Vec<Thread>> {
        Ok(self
            .threads
            .iter()
            .filter(|t| t.is_active(now))
            .map(|t| t.value().clone())
            .collect())
    }

    async fn list_threads_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Thread>> {
        Ok(self
            .threads
            .iter()
            .filter(|t| t.is_member(user_id))
            .map(|t| t.value().clone())
            .collect())
    }

    async fn update_thread(&self, id: Uuid, mutation: Mutation<Thread>) -> DomainResult<Thread> {
        let mut entry = self
            .threads
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Thread, id))?;
        apply_locked(entry.value_mut(), mutation)
    }

    async fn delete_thread(&self, id: Uuid) -> DomainResult<bool> {
        Ok(self.threads.remove(&id).is_some())
    }
}

#[async_trait]
impl GossipRepo for InMemoryStore {
    async fn insert_gossip(&self, gossip: Gossip) -> DomainResult<()> {
        self.gossips.insert(gossip.id, gossip);
        Ok(())
    }

    async fn get_gossip(&self, id: Uuid) -> DomainResult<Option<Gossip>> {
        Ok(self.gossips.get(&id).map(|g| g.value().clone()))
    }

    async fn list_gossips(&self) -> DomainResult<Vec<Gossip>> {
        Ok(self.gossips.iter().map(|g| g.value().clone()).collect())
    }

    async fn update_gossip(&self, id: Uuid, mutation: Mutation<Gossip>) -> DomainResult<Gossip> {
        let mut entry = self
            .gossips
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Gossip, id))?;
        apply_locked(entry.value_mut(), mutation)
    }

    async fn delete_gossip(&self, id: Uuid) -> DomainResult<bool> {
        Ok(self.gossips.remove(&id).is_some())
    }
}

#[async_trait]
impl UserRepo for InMemoryStore {
    async fn insert_user(&self, user: User) -> DomainResult<()> {
        match self.usernames.entry(user.username.to_lowercase()) {
            Entry::Occupied(_) => Err(ConflictReason::UsernameTaken.into()),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user);
                Ok(())
            }
        }
    }

    async fn get_user(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn count_users(&self) -> DomainResult<usize> {
        Ok(self.users.len())
    }
}

#[async_trait]
impl ReportRepo for InMemoryStore {
    async fn insert_report(&self, report: CommentReport) -> DomainResult<()> {
        match self.report_index.entry((report.comment_id, report.reporter_id)) {
            Entry::Occupied(_) => Err(ConflictReason::AlreadyReported.into()),
            Entry::Vacant(slot) => {
                slot.insert(report.id);
                self.reports.insert(report.id, report);
                Ok(())
            }
        }
    }

    async fn list_reports(&self) -> DomainResult<Vec<CommentReport>> {
        Ok(self.reports.iter().map(|r| r.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domains::ValidationError;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn thread(creator_id: Uuid, expires_in: Duration) -> Thread {
        let now = Utc::now();
        Thread {
            id: Uuid::now_v7(),
            title: "Study group".into(),
            description: String::new(),
            location: "Library".into(),
            creator_id,
            creator: "kim".into(),
            tags: vec!["study".into()],
            members: vec![creator_id],
            pending_requests: BTreeSet::new(),
            chat: Vec::new(),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[tokio::test]
    async fn failed_mutation_leaves_entity_untouched() {
        let store = InMemoryStore::new();
        let t = thread(Uuid::now_v7(), Duration::hours(1));
        let id = t.id;
        store.insert_thread(t.clone()).await.unwrap();

        let err = store
            .update_thread(
                id,
                Box::new(|t: &mut Thread| {
                    t.title = "changed".into();
                    Err(ValidationError::EmptyMessage.into())
                }),
            )
            .await
            .unwrap_err();

        assert_eq!(err, DomainError::Validation(ValidationError::EmptyMessage));
        assert_eq!(store.get_thread(id).await.unwrap(), Some(t));
    }

    #[tokio::test]
    async fn update_of_missing_thread_is_not_found() {
        let store = InMemoryStore::new();
        let id = Uuid::now_v7();
        let err = store
            .update_thread(id, Box::new(|_: &mut Thread| Ok(())))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::not_found(EntityKind::Thread, id));
    }

    #[tokio::test]
    async fn active_and_user_queries() {
        let store = InMemoryStore::new();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();

        let live = thread(alice, Duration::hours(1));
        let mut joined = thread(bob, Duration::hours(1));
        joined.members.push(alice);
        let gone = thread(alice, Duration::seconds(-1));

        for t in [&live, &joined, &gone] {
            store.insert_thread(t.clone()).await.unwrap();
        }

        let active = store.list_active_threads(Utc::now()).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|t| t.id != gone.id));

        assert_eq!(store.list_threads_for_user(alice).await.unwrap().len(), 3);
        assert_eq!(store.list_threads_for_user(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_are_serialized() {
        let store = Arc::new(InMemoryStore::new());
        let t = thread(Uuid::now_v7(), Duration::hours(1));
        let id = t.id;
        store.insert_thread(t).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_thread(
                        id,
                        Box::new(|t: &mut Thread| {
                            t.tags.push(format!("n{}", t.tags.len()));
                            Ok(())
                        }),
                    )
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let t = store.get_thread(id).await.unwrap().unwrap();
        assert_eq!(t.tags.len(), 33);
        assert_eq!(t.tags.last().map(String::as_str), Some("n32"));
    }

    #[tokio::test]
    async fn usernames_are_unique_ignoring_case() {
        let store = InMemoryStore::new();
        let user = |name: &str| User {
            id: Uuid::now_v7(),
            username: name.into(),
            is_admin: false,
            created_at: Utc::now(),
        };

        store.insert_user(user("Ravi")).await.unwrap();
        let err = store.insert_user(user("ravi")).await.unwrap_err();
        assert_eq!(err, DomainError::Conflict(ConflictReason::UsernameTaken));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }
}
