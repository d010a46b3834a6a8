//! # Domain Models
//!
//! These structs represent the core entities of prastha.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account. Credentials live outside this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Unique, compared case-insensitively.
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A time-bounded pop-up community with an append-only chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub creator_id: Uuid,
    /// Display name of the creator at creation time.
    pub creator: String,
    /// Display order; filtering ignores order and case.
    pub tags: Vec<String>,
    /// Join order. `members[0]` is the creator.
    pub members: Vec<Uuid>,
    pub pending_requests: BTreeSet<Uuid>,
    pub chat: Vec<ThreadMessage>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Thread {
    /// A thread is active strictly before its expiry instant.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        user_id == self.creator_id || self.members.contains(&user_id)
    }

    pub fn is_pending(&self, user_id: Uuid) -> bool {
        self.pending_requests.contains(&user_id)
    }

    /// Creator or admin.
    pub fn can_moderate(&self, actor: &User) -> bool {
        actor.is_admin || actor.id == self.creator_id
    }

    pub fn message(&self, id: Uuid) -> Option<&ThreadMessage> {
        self.chat.iter().find(|m| m.id == id)
    }

    /// Position the next appended message will take.
    pub fn next_seq(&self) -> u64 {
        self.chat.last().map_or(1, |m| m.seq + 1)
    }
}

/// One chat line. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    /// Server-assigned, strictly increasing within a thread.
    pub seq: u64,
    /// Sender display name at send time.
    pub user: String,
    pub user_id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_preview: Option<String>,
}

/// Reply metadata supplied by the sender. The server prefers a snapshot of
/// the referenced message and falls back to these values when it is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyContext {
    pub message_id: Option<Uuid>,
    pub user: Option<String>,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
    None,
}

/// Set-based vote state. Counts are always derived from the sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VotesRepr", into = "VotesRepr")]
pub struct Votes {
    upvoted_by: BTreeSet<Uuid>,
    downvoted_by: BTreeSet<Uuid>,
}

impl Votes {
    /// Sets `user_id`'s vote. Applying the same vote twice is a no-op.
    /// Returns whether anything changed.
    pub fn apply(&mut self, user_id: Uuid, vote: VoteType) -> bool {
        let before = self.current(user_id);
        match vote {
            VoteType::Up => {
                self.downvoted_by.remove(&user_id);
                self.upvoted_by.insert(user_id);
            }
            VoteType::Down => {
                self.upvoted_by.remove(&user_id);
                self.downvoted_by.insert(user_id);
            }
            VoteType::None => {
                self.upvoted_by.remove(&user_id);
                self.downvoted_by.remove(&user_id);
            }
        }
        before != vote
    }

    pub fn current(&self, user_id: Uuid) -> VoteType {
        if self.upvoted_by.contains(&user_id) {
            VoteType::Up
        } else if self.downvoted_by.contains(&user_id) {
            VoteType::Down
        } else {
            VoteType::None
        }
    }

    pub fn upvotes(&self) -> usize {
        self.upvoted_by.len()
    }

    pub fn downvotes(&self) -> usize {
        self.downvoted_by.len()
    }

    /// Net score, `upvotes - downvotes`.
    pub fn score(&self) -> i64 {
        self.upvotes() as i64 - self.downvotes() as i64
    }

    pub fn total(&self) -> usize {
        self.upvotes() + self.downvotes()
    }

    pub fn upvoted_by(&self) -> &BTreeSet<Uuid> {
        &self.upvoted_by
    }

    pub fn downvoted_by(&self) -> &BTreeSet<Uuid> {
        &self.downvoted_by
    }
}

/// Wire shape of [`Votes`]. Counts are written for readers and ignored on
/// the way back in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VotesRepr {
    #[serde(default)]
    upvotes: usize,
    #[serde(default)]
    downvotes: usize,
    #[serde(default)]
    upvoted_by: BTreeSet<Uuid>,
    #[serde(default)]
    downvoted_by: BTreeSet<Uuid>,
}

impl From<VotesRepr> for Votes {
    fn from(repr: VotesRepr) -> Self {
        // A user present in both sets has no valid vote.
        let both: BTreeSet<Uuid> = repr
            .upvoted_by
            .intersection(&repr.downvoted_by)
            .copied()
            .collect();
        Votes {
            upvoted_by: repr.upvoted_by.difference(&both).copied().collect(),
            downvoted_by: repr.downvoted_by.difference(&both).copied().collect(),
        }
    }
}

impl From<Votes> for VotesRepr {
    fn from(votes: Votes) -> Self {
        VotesRepr {
            upvotes: votes.upvotes(),
            downvotes: votes.downvotes(),
            upvoted_by: votes.upvoted_by,
            downvoted_by: votes.downvoted_by,
        }
    }
}

/// A votable short post with nested comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gossip {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author: String,
    pub votes: Votes,
    /// Flat arena keyed by comment id. Trees are built on read.
    pub comments: BTreeMap<Uuid, GossipComment>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

impl Gossip {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }

    pub fn can_moderate(&self, actor: &User) -> bool {
        actor.is_admin || actor.id == self.author_id
    }

    /// `id` followed by its parent, grandparent and so on up to a root.
    /// Stops at a missing parent or a repeated id.
    pub fn ancestry(&self, id: Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut next = self.comments.get(&id);
        while let Some(comment) = next {
            if !seen.insert(comment.id) {
                break;
            }
            chain.push(comment.id);
            next = comment.parent_comment_id.and_then(|p| self.comments.get(&p));
        }
        chain
    }

    /// Ids of `root` and every comment beneath it.
    pub fn subtree_ids(&self, root: Uuid) -> BTreeSet<Uuid> {
        let mut found = BTreeSet::from([root]);
        loop {
            let before = found.len();
            for comment in self.comments.values() {
                if let Some(parent) = comment.parent_comment_id {
                    if found.contains(&parent) {
                        found.insert(comment.id);
                    }
                }
            }
            if found.len() == before {
                return found;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GossipComment {
    pub id: Uuid,
    pub gossip_id: Uuid,
    pub content: String,
    pub author: String,
    pub author_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<Uuid>,
    /// Display name of the parent's author at reply time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub votes: Votes,
}

impl GossipComment {
    pub fn can_moderate(&self, actor: &User) -> bool {
        actor.is_admin || actor.id == self.author_id
    }
}

/// A report filed against a comment, kept for admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReport {
    pub id: Uuid,
    pub gossip_id: Uuid,
    pub comment_id: Uuid,
    pub reporter_id: Uuid,
    pub reporter: String,
    pub comment_author_id: Uuid,
    pub comment_author: String,
    pub comment_content: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// State-change notifications pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum FanoutEvent {
    /// Thread list or thread state changed; clients should re-fetch.
    RefreshThreads,
    /// A message was appended to a thread.
    NewMessage {
        #[serde(rename = "threadId")]
        thread_id: Uuid,
        message: ThreadMessage,
    },
    /// Gossip board changed; clients should re-fetch.
    RefreshGossips,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_is_idempotent_and_exclusive() {
        let mut votes = Votes::default();
        let user = Uuid::now_v7();

        assert!(votes.apply(user, VoteType::Up));
        assert!(!votes.apply(user, VoteType::Up));
        assert_eq!((votes.upvotes(), votes.downvotes()), (1, 0));

        assert!(votes.apply(user, VoteType::Down));
        assert!(!votes.upvoted_by().contains(&user));
        assert_eq!((votes.upvotes(), votes.downvotes()), (0, 1));

        assert!(votes.apply(user, VoteType::None));
        assert_eq!(votes.total(), 0);
        assert_eq!(votes.current(user), VoteType::None);
    }

    #[test]
    fn votes_serialize_with_derived_counts() {
        let mut votes = Votes::default();
        votes.apply(Uuid::now_v7(), VoteType::Up);
        votes.apply(Uuid::now_v7(), VoteType::Up);

        let json = serde_json::to_value(&votes).unwrap();
        assert_eq!(json["upvotes"], 2);
        assert_eq!(json["downvotes"], 0);
        assert_eq!(json["upvotedBy"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn stale_counts_and_overlaps_are_dropped_on_load() {
        let both = Uuid::now_v7();
        let up = Uuid::now_v7();
        let json = serde_json::json!({
            "upvotes": 40,
            "downvotes": 7,
            "upvotedBy": [both, up],
            "downvotedBy": [both],
        });

        let votes: Votes = serde_json::from_value(json).unwrap();
        assert_eq!(votes.upvotes(), 1);
        assert_eq!(votes.downvotes(), 0);
        assert_eq!(votes.current(both), VoteType::None);
    }

    #[test]
    fn ancestry_walks_to_the_root_and_stops_on_cycles() {
        let now = Utc::now();
        let comment = |id: Uuid, parent: Option<Uuid>| GossipComment {
            id,
            gossip_id: Uuid::nil(),
            content: "c".into(),
            author: "a".into(),
            author_id: Uuid::nil(),
            parent_comment_id: parent,
            reply_to: None,
            created_at: now,
            votes: Votes::default(),
        };
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let mut gossip = Gossip {
            id: Uuid::now_v7(),
            content: "g".into(),
            author_id: Uuid::nil(),
            author: "a".into(),
            votes: Votes::default(),
            comments: [comment(a, None), comment(b, Some(a)), comment(c, Some(b))]
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
            created_at: now,
            expires_at: None,
            last_activity: now,
        };
        assert_eq!(gossip.ancestry(c), vec![c, b, a]);
        assert!(gossip.ancestry(Uuid::nil()).is_empty());

        gossip.comments.insert(a, comment(a, Some(c)));
        assert_eq!(gossip.ancestry(c), vec![c, b, a]);
    }

    #[test]
    fn fanout_event_wire_shape() {
        let json = serde_json::to_value(FanoutEvent::RefreshThreads).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "refresh-threads" }));
    }
}
