//! Per-thread append-only chat log.
//!
//! The store serializes mutations per thread, so `seq` is assigned inside the
//! mutation and reflects commit order. Timestamps never go backwards within a
//! thread even if the clock does.

use domains::{
    DomainError, DomainResult, EntityKind, FanoutEvent, ForbiddenReason, ReplyContext, Thread,
    ThreadMessage, ValidationError,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::threads::load_thread;
use crate::users::require_user;
use crate::validation::preview;
use crate::Ports;

const REPLY_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub sender_id: Uuid,
    #[serde(alias = "message")]
    pub text: String,
    #[serde(default)]
    pub reply: Option<ReplyContext>,
}

pub struct MessagingCore {
    ports: Ports,
}

impl MessagingCore {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn send_message(&self, thread_id: Uuid, cmd: SendMessage) -> DomainResult<ThreadMessage> {
        let text = cmd.text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let max = self.ports.limits.max_message_len;
        if text.chars().count() > max {
            return Err(ValidationError::TooLong { field: "message", max }.into());
        }
        let text = text.to_string();

        let sender = require_user(&self.ports, cmd.sender_id).await?;
        let now = self.ports.clock.now();
        let reply = cmd.reply;
        let message_id = Uuid::now_v7();

        let thread = self
            .ports
            .threads
            .update_thread(
                thread_id,
                Box::new(move |thread: &mut Thread| {
                    if !thread.is_member(sender.id) {
                        return Err(ForbiddenReason::NotAMember.into());
                    }
                    if !thread.is_active(now) {
                        return Err(DomainError::expired(EntityKind::Thread, thread.id));
                    }
                    let timestamp = thread.chat.last().map_or(now, |last| last.timestamp.max(now));
                    let (reply_to_message_id, reply_to_user, reply_preview) =
                        reply_snapshot(thread, reply);
                    let message = ThreadMessage {
                        id: message_id,
                        thread_id: thread.id,
                        seq: thread.next_seq(),
                        user: sender.username,
                        user_id: sender.id,
                        message: text,
                        timestamp,
                        reply_to_message_id,
                        reply_to_user,
                        reply_preview,
                    };
                    thread.chat.push(message);
                    Ok(())
                }),
            )
            .await?;

        let message = thread
            .message(message_id)
            .cloned()
            .ok_or_else(|| DomainError::storage("appended message missing after commit"))?;

        tracing::debug!(thread_id = %thread_id, user_id = %message.user_id, seq = message.seq, "message appended");
        self.ports.events.publish(FanoutEvent::NewMessage {
            thread_id,
            message: message.clone(),
        });
        Ok(message)
    }

    /// Messages with `seq > after_seq`, in log order. Lets a subscriber that
    /// missed fan-out events catch up without reloading the whole thread.
    pub async fn messages_since(&self, thread_id: Uuid, after_seq: u64) -> DomainResult<Vec<ThreadMessage>> {
        let thread = load_thread(&self.ports, thread_id).await?;
        Ok(thread.chat.into_iter().filter(|m| m.seq > after_seq).collect())
    }
}

/// Snapshot of the replied-to message when it exists in this thread,
/// otherwise whatever the client supplied.
fn reply_snapshot(
    thread: &Thread,
    reply: Option<ReplyContext>,
) -> (Option<Uuid>, Option<String>, Option<String>) {
    let Some(reply) = reply else {
        return (None, None, None);
    };
    let target = reply.message_id.and_then(|id| thread.message(id));
    match target {
        Some(original) => (
            Some(original.id),
            Some(original.user.clone()),
            Some(preview(&original.message, REPLY_PREVIEW_CHARS)),
        ),
        None => (
            reply.message_id,
            reply.user,
            reply.preview.map(|p| preview(&p, REPLY_PREVIEW_CHARS)),
        ),
    }
}
