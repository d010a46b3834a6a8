//! Gossip board: posts, set-based votes, nested comments and moderation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use domains::{
    CommentReport, DomainError, DomainResult, EntityKind, FanoutEvent, ForbiddenReason, Gossip,
    GossipComment, User, ValidationError, VoteType, Votes,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::comment_tree::{build_comment_tree, CommentNode};
use crate::ranking::{sort_gossips, GossipSort};
use crate::users::require_user;
use crate::validation::{expiry_after, optional_text, required_text};
use crate::Ports;

const DEFAULT_REPORT_REASON: &str = "Inappropriate content";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGossip {
    pub author_id: Uuid,
    pub content: String,
    /// Absent means the gossip never expires.
    pub duration_hours: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub author_id: Uuid,
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportComment {
    pub reporter_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Read model of a gossip with its comments arranged as a tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GossipView {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author: String,
    #[serde(flatten)]
    pub votes: Votes,
    pub comment_count: usize,
    pub comments: Vec<CommentNode>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub expired: bool,
}

impl GossipView {
    pub fn new(gossip: Gossip, now: DateTime<Utc>, max_reply_depth: usize) -> Self {
        let comments = build_comment_tree(&gossip.comments, max_reply_depth);
        Self {
            expired: !gossip.is_active(now),
            id: gossip.id,
            content: gossip.content,
            author_id: gossip.author_id,
            author: gossip.author,
            votes: gossip.votes,
            comment_count: gossip.comments.len(),
            comments,
            created_at: gossip.created_at,
            expires_at: gossip.expires_at,
            last_activity: gossip.last_activity,
        }
    }
}

pub struct GossipEngine {
    ports: Ports,
}

impl GossipEngine {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn create(&self, cmd: NewGossip) -> DomainResult<GossipView> {
        let author = require_user(&self.ports, cmd.author_id).await?;
        let content = required_text(&cmd.content, "content", self.ports.limits.max_gossip_len)?;
        let now = self.ports.clock.now();
        let expires_at = cmd
            .duration_hours
            .map(|hours| expiry_after(now, hours, self.ports.limits.max_gossip_duration))
            .transpose()?;

        let gossip = Gossip {
            id: Uuid::now_v7(),
            content,
            author_id: author.id,
            author: author.username,
            votes: Votes::default(),
            comments: BTreeMap::new(),
            created_at: now,
            expires_at,
            last_activity: now,
        };
        self.ports.gossips.insert_gossip(gossip.clone()).await?;

        tracing::info!(gossip_id = %gossip.id, author_id = %gossip.author_id, "gossip created");
        self.ports.events.publish(FanoutEvent::RefreshGossips);
        Ok(GossipView::new(gossip, now, self.ports.limits.max_reply_depth))
    }

    /// Active gossips in the requested order.
    pub async fn list(&self, sort: GossipSort) -> DomainResult<Vec<GossipView>> {
        let now = self.ports.clock.now();
        let mut gossips = self
            .ports
            .retry
            .read("list_gossips", || self.ports.gossips.list_gossips())
            .await?;
        gossips.retain(|g| g.is_active(now));
        sort_gossips(&mut gossips, sort);
        let depth = self.ports.limits.max_reply_depth;
        Ok(gossips.into_iter().map(|g| GossipView::new(g, now, depth)).collect())
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<GossipView> {
        let gossip = self.load(id).await?;
        Ok(GossipView::new(
            gossip,
            self.ports.clock.now(),
            self.ports.limits.max_reply_depth,
        ))
    }

    pub async fn delete(&self, id: Uuid, actor_id: Uuid) -> DomainResult<()> {
        let actor = require_user(&self.ports, actor_id).await?;
        let gossip = self.load(id).await?;
        if !gossip.can_moderate(&actor) {
            return Err(ForbiddenReason::NotAuthorOrAdmin.into());
        }
        if !self.ports.gossips.delete_gossip(id).await? {
            return Err(DomainError::not_found(EntityKind::Gossip, id));
        }
        tracing::info!(gossip_id = %id, actor_id = %actor_id, comments = gossip.comments.len(), "gossip deleted");
        self.ports.events.publish(FanoutEvent::RefreshGossips);
        Ok(())
    }

    /// Sets the user's vote on a gossip and returns the resulting tallies.
    pub async fn vote(&self, id: Uuid, user_id: Uuid, vote: VoteType) -> DomainResult<Votes> {
        require_user(&self.ports, user_id).await?;
        let now = self.ports.clock.now();

        let gossip = self
            .ports
            .gossips
            .update_gossip(
                id,
                Box::new(move |gossip: &mut Gossip| {
                    ensure_active(gossip, now)?;
                    gossip.votes.apply(user_id, vote);
                    Ok(())
                }),
            )
            .await?;

        tracing::debug!(gossip_id = %id, user_id = %user_id, ?vote, "gossip vote");
        self.ports.events.publish(FanoutEvent::RefreshGossips);
        Ok(gossip.votes)
    }

    /// Adds a comment. A reply that would nest past the depth limit is
    /// attached to the deepest allowed ancestor instead; `reply_to` still
    /// names the author being answered.
    pub async fn add_comment(&self, gossip_id: Uuid, cmd: NewComment) -> DomainResult<GossipComment> {
        let author = require_user(&self.ports, cmd.author_id).await?;
        let content = required_text(&cmd.content, "content", self.ports.limits.max_comment_len)?;
        let now = self.ports.clock.now();
        let comment_id = Uuid::now_v7();
        let parent_id = cmd.parent_comment_id;
        let max_depth = self.ports.limits.max_reply_depth;

        let gossip = self
            .ports
            .gossips
            .update_gossip(
                gossip_id,
                Box::new(move |gossip: &mut Gossip| {
                    ensure_active(gossip, now)?;
                    let (parent_comment_id, reply_to) = match parent_id {
                        Some(parent) => {
                            let answered = gossip
                                .comments
                                .get(&parent)
                                .map(|p| p.author.clone())
                                .ok_or(ValidationError::ParentNotFound(parent))?;
                            // ancestry[0] is the parent; the reply lands one level below it.
                            let ancestry = gossip.ancestry(parent);
                            let excess = (ancestry.len() + 1).saturating_sub(max_depth);
                            (ancestry.get(excess).copied(), Some(answered))
                        }
                        None => (None, None),
                    };
                    let comment = GossipComment {
                        id: comment_id,
                        gossip_id: gossip.id,
                        content,
                        author: author.username,
                        author_id: author.id,
                        parent_comment_id,
                        reply_to,
                        created_at: now,
                        votes: Votes::default(),
                    };
                    gossip.comments.insert(comment.id, comment);
                    gossip.last_activity = now;
                    Ok(())
                }),
            )
            .await?;

        let comment = gossip
            .comments
            .get(&comment_id)
            .cloned()
            .ok_or_else(|| DomainError::storage("added comment missing after commit"))?;

        tracing::info!(gossip_id = %gossip_id, comment_id = %comment_id, requested_parent = ?parent_id, parent = ?comment.parent_comment_id, "comment added");
        self.ports.events.publish(FanoutEvent::RefreshGossips);
        Ok(comment)
    }

    /// Deletes a comment and every reply beneath it. Returns how many
    /// comments were removed.
    pub async fn delete_comment(&self, gossip_id: Uuid, comment_id: Uuid, actor_id: Uuid) -> DomainResult<usize> {
        let actor = require_user(&self.ports, actor_id).await?;
        let subtree = self.load(gossip_id).await?.subtree_ids(comment_id);

        let gossip = self
            .ports
            .gossips
            .update_gossip(
                gossip_id,
                Box::new(move |gossip: &mut Gossip| {
                    let comment = find_comment(gossip, comment_id)?;
                    if !comment.can_moderate(&actor) {
                        return Err(ForbiddenReason::NotAuthorOrAdmin.into());
                    }
                    for id in gossip.subtree_ids(comment_id) {
                        gossip.comments.remove(&id);
                    }
                    Ok(())
                }),
            )
            .await?;

        let removed = subtree.iter().filter(|id| !gossip.comments.contains_key(id)).count();
        tracing::info!(gossip_id = %gossip_id, comment_id = %comment_id, actor_id = %actor_id, removed, "comment deleted");
        self.ports.events.publish(FanoutEvent::RefreshGossips);
        Ok(removed)
    }

    pub async fn vote_comment(
        &self,
        gossip_id: Uuid,
        comment_id: Uuid,
        user_id: Uuid,
        vote: VoteType,
    ) -> DomainResult<Votes> {
        require_user(&self.ports, user_id).await?;
        let now = self.ports.clock.now();

        let gossip = self
            .ports
            .gossips
            .update_gossip(
                gossip_id,
                Box::new(move |gossip: &mut Gossip| {
                    ensure_active(gossip, now)?;
                    let comment = gossip
                        .comments
                        .get_mut(&comment_id)
                        .ok_or_else(|| DomainError::not_found(EntityKind::Comment, comment_id))?;
                    comment.votes.apply(user_id, vote);
                    Ok(())
                }),
            )
            .await?;

        let votes = find_comment(&gossip, comment_id)?.votes.clone();
        tracing::debug!(gossip_id = %gossip_id, comment_id = %comment_id, user_id = %user_id, ?vote, "comment vote");
        self.ports.events.publish(FanoutEvent::RefreshGossips);
        Ok(votes)
    }

    /// Files a report for admin review. The comment itself is untouched.
    pub async fn report_comment(
        &self,
        gossip_id: Uuid,
        comment_id: Uuid,
        cmd: ReportComment,
    ) -> DomainResult<CommentReport> {
        let reporter: User = require_user(&self.ports, cmd.reporter_id).await?;
        let gossip = self.load(gossip_id).await?;
        let comment = find_comment(&gossip, comment_id)?;
        if comment.author_id == reporter.id {
            return Err(ForbiddenReason::SelfReport.into());
        }
        let reason = optional_text(
            cmd.reason.as_deref().unwrap_or_default(),
            "reason",
            self.ports.limits.max_reason_len,
        )?;

        let report = CommentReport {
            id: Uuid::now_v7(),
            gossip_id,
            comment_id,
            reporter_id: reporter.id,
            reporter: reporter.username,
            comment_author_id: comment.author_id,
            comment_author: comment.author.clone(),
            comment_content: comment.content.clone(),
            reason: if reason.is_empty() {
                DEFAULT_REPORT_REASON.to_string()
            } else {
                reason
            },
            created_at: self.ports.clock.now(),
        };
        self.ports.reports.insert_report(report.clone()).await?;

        tracing::info!(gossip_id = %gossip_id, comment_id = %comment_id, reporter_id = %report.reporter_id, "comment reported");
        Ok(report)
    }

    async fn load(&self, id: Uuid) -> DomainResult<Gossip> {
        self.ports
            .retry
            .read("get_gossip", || self.ports.gossips.get_gossip(id))
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Gossip, id))
    }
}

fn ensure_active(gossip: &Gossip, now: DateTime<Utc>) -> DomainResult<()> {
    if gossip.is_active(now) {
        Ok(())
    } else {
        Err(DomainError::expired(EntityKind::Gossip, gossip.id))
    }
}

fn find_comment(gossip: &Gossip, id: Uuid) -> DomainResult<&GossipComment> {
    gossip
        .comments
        .get(&id)
        .ok_or_else(|| DomainError::not_found(EntityKind::Comment, id))
}
