//! Admin overview: counts and the open report queue.

use domains::{CommentReport, DomainResult, ForbiddenReason};
use serde::Serialize;
use uuid::Uuid;

use crate::users::require_user;
use crate::Ports;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub users: usize,
    pub active_threads: usize,
    pub expired_threads: usize,
    pub active_gossips: usize,
    pub comments: usize,
    /// Newest first.
    pub reports: Vec<CommentReport>,
}

pub struct AdminService {
    ports: Ports,
}

impl AdminService {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn dashboard(&self, actor_id: Uuid) -> DomainResult<AdminDashboard> {
        let actor = require_user(&self.ports, actor_id).await?;
        if !actor.is_admin {
            return Err(ForbiddenReason::NotAdmin.into());
        }
        let now = self.ports.clock.now();
        let retry = &self.ports.retry;

        let users = retry.read("count_users", || self.ports.users.count_users()).await?;
        let threads = retry.read("list_threads", || self.ports.threads.list_threads()).await?;
        let gossips = retry.read("list_gossips", || self.ports.gossips.list_gossips()).await?;
        let mut reports = retry.read("list_reports", || self.ports.reports.list_reports()).await?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let active_threads = threads.iter().filter(|t| t.is_active(now)).count();
        let live_gossips: Vec<_> = gossips.iter().filter(|g| g.is_active(now)).collect();

        tracing::debug!(actor_id = %actor_id, reports = reports.len(), "admin dashboard");
        Ok(AdminDashboard {
            users,
            active_threads,
            expired_threads: threads.len() - active_threads,
            active_gossips: live_gossips.len(),
            comments: live_gossips.iter().map(|g| g.comments.len()).sum(),
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gossip::{GossipEngine, NewComment, NewGossip, ReportComment};
    use crate::test_support::harness;
    use crate::threads::{NewThread, ThreadService};
    use chrono::Duration;
    use domains::DomainError;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn non_admins_are_refused() {
        let h = harness();
        let admin = AdminService::new(h.ports.clone());
        let ana = h.user("ana", false).await;

        let err = assert_err!(admin.dashboard(ana.id).await);
        assert_eq!(err, DomainError::Forbidden(ForbiddenReason::NotAdmin));
    }

    #[tokio::test]
    async fn dashboard_counts_and_orders_reports() {
        let h = harness();
        let admin = AdminService::new(h.ports.clone());
        let threads = ThreadService::new(h.ports.clone());
        let gossips = GossipEngine::new(h.ports.clone());
        let root = h.user("root", true).await;
        let ana = h.user("ana", false).await;
        let bo = h.user("bo", false).await;

        for hours in [1, 5] {
            assert_ok!(
                threads
                    .create(NewThread {
                        creator_id: ana.id,
                        title: format!("{hours}h"),
                        description: String::new(),
                        location: String::new(),
                        tags: Vec::new(),
                        expires_at: None,
                        duration_hours: Some(hours),
                    })
                    .await
            );
        }
        let g = assert_ok!(
            gossips
                .create(NewGossip {
                    author_id: ana.id,
                    content: "hot take".into(),
                    duration_hours: None,
                })
                .await
        );
        let first = assert_ok!(
            gossips
                .add_comment(
                    g.id,
                    NewComment {
                        author_id: ana.id,
                        content: "one".into(),
                        parent_comment_id: None,
                    },
                )
                .await
        );
        let second = assert_ok!(
            gossips
                .add_comment(
                    g.id,
                    NewComment {
                        author_id: ana.id,
                        content: "two".into(),
                        parent_comment_id: None,
                    },
                )
                .await
        );
        for comment in [first.id, second.id] {
            h.clock.advance(Duration::seconds(1));
            assert_ok!(
                gossips
                    .report_comment(
                        g.id,
                        comment,
                        ReportComment {
                            reporter_id: bo.id,
                            reason: None,
                        },
                    )
                    .await
            );
        }

        h.clock.advance(Duration::hours(2));
        let dash = assert_ok!(admin.dashboard(root.id).await);
        assert_eq!(dash.users, 3);
        assert_eq!((dash.active_threads, dash.expired_threads), (1, 1));
        assert_eq!((dash.active_gossips, dash.comments), (1, 2));
        let reported: Vec<_> = dash.reports.iter().map(|r| r.comment_id).collect();
        assert_eq!(reported, [second.id, first.id]);
    }
}
