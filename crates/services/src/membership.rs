//! Join requests and their approval.
//!
//! A user id is in at most one of `members` and `pending_requests`. Both
//! transitions run as a single store mutation so two concurrent approvals of
//! the same user resolve to one move and one `NotPending` conflict.

use domains::{
    ConflictReason, DomainError, DomainResult, EntityKind, FanoutEvent, ForbiddenReason, Thread,
};
use uuid::Uuid;

use crate::users::require_user;
use crate::Ports;

pub struct MembershipGate {
    ports: Ports,
}

impl MembershipGate {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn request_join(&self, thread_id: Uuid, user_id: Uuid) -> DomainResult<Thread> {
        require_user(&self.ports, user_id).await?;
        let now = self.ports.clock.now();

        let thread = self
            .ports
            .threads
            .update_thread(
                thread_id,
                Box::new(move |thread: &mut Thread| {
                    if thread.is_member(user_id) {
                        return Err(ConflictReason::AlreadyMember.into());
                    }
                    if thread.is_pending(user_id) {
                        return Err(ConflictReason::AlreadyPending.into());
                    }
                    if !thread.is_active(now) {
                        return Err(DomainError::expired(EntityKind::Thread, thread.id));
                    }
                    thread.pending_requests.insert(user_id);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(thread_id = %thread_id, user_id = %user_id, pending = thread.pending_requests.len(), "join requested");
        self.ports.events.publish(FanoutEvent::RefreshThreads);
        Ok(thread)
    }

    /// Approves or denies `user_id`'s pending request on behalf of
    /// `acting_user_id`, who must be the creator or an admin.
    pub async fn handle_request(
        &self,
        thread_id: Uuid,
        user_id: Uuid,
        approve: bool,
        acting_user_id: Uuid,
    ) -> DomainResult<Thread> {
        let actor = require_user(&self.ports, acting_user_id).await?;
        let now = self.ports.clock.now();

        let thread = self
            .ports
            .threads
            .update_thread(
                thread_id,
                Box::new(move |thread: &mut Thread| {
                    if !thread.can_moderate(&actor) {
                        return Err(ForbiddenReason::NotCreatorOrAdmin.into());
                    }
                    if !thread.is_pending(user_id) {
                        return Err(ConflictReason::NotPending.into());
                    }
                    if approve && !thread.is_active(now) {
                        return Err(DomainError::expired(EntityKind::Thread, thread.id));
                    }
                    thread.pending_requests.remove(&user_id);
                    if approve && !thread.members.contains(&user_id) {
                        thread.members.push(user_id);
                    }
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(
            thread_id = %thread_id,
            user_id = %user_id,
            acting_user_id = %acting_user_id,
            approve,
            members = thread.members.len(),
            "join request handled"
        );
        self.ports.events.publish(FanoutEvent::RefreshThreads);
        Ok(thread)
    }
}
