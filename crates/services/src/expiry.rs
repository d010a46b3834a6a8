//! Expiry tracking.
//!
//! Request paths decide expiry lazily with one clock read each. The sweep
//! runs on an interval, independent of traffic, and keeps a snapshot of
//! every thread classified against the instant the sweep started. Alerts
//! are computed only from that snapshot and its `taken_at`, so an alert
//! never disagrees with the listing taken at the same instant.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use domains::{DomainResult, FanoutEvent, Thread};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::users::require_user;
use crate::Ports;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Urgent,
    Soon,
    Scheduled,
    Expired,
}

/// Alert thresholds, measured from the sweep instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub urgent_within: Duration,
    pub soon_within: Duration,
    /// Expired threads older than this no longer produce an alert.
    pub expired_alert_window: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            urgent_within: Duration::minutes(30),
            soon_within: Duration::minutes(120),
            expired_alert_window: Duration::minutes(720),
        }
    }
}

impl ExpiryPolicy {
    pub fn classify(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<AlertKind> {
        if now >= expires_at {
            return (now - expires_at <= self.expired_alert_window).then_some(AlertKind::Expired);
        }
        let left = expires_at - now;
        Some(if left <= self.urgent_within {
            AlertKind::Urgent
        } else if left <= self.soon_within {
            AlertKind::Soon
        } else {
            AlertKind::Scheduled
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadAlert {
    pub id: String,
    pub thread_id: Uuid,
    pub title: String,
    pub location: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    /// The thread's expiry instant.
    pub time: DateTime<Utc>,
    pub members: usize,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub active_threads: usize,
    pub expired_threads: usize,
    pub newly_expired_threads: Vec<Uuid>,
    pub newly_expired_gossips: Vec<Uuid>,
}

struct Snapshot {
    taken_at: DateTime<Utc>,
    threads: Vec<Thread>,
    expired_threads: BTreeSet<Uuid>,
    expired_gossips: BTreeSet<Uuid>,
}

pub struct ExpiryScheduler {
    ports: Ports,
    policy: ExpiryPolicy,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl ExpiryScheduler {
    pub fn new(ports: Ports, policy: ExpiryPolicy) -> Self {
        Self {
            ports,
            policy,
            snapshot: RwLock::new(None),
        }
    }

    /// Reclassifies every thread and gossip against one clock read.
    ///
    /// Entities that were active at the previous sweep and are now expired
    /// trigger a refresh event. The first sweep only establishes a baseline.
    pub async fn sweep(&self) -> DomainResult<SweepReport> {
        let snapshot = Arc::new(self.take_snapshot().await?);

        let mut guard = self.snapshot.write().await;
        let (newly_expired_threads, newly_expired_gossips) = match guard.as_ref() {
            Some(prev) if prev.taken_at > snapshot.taken_at => {
                tracing::debug!(kept = %prev.taken_at, discarded = %snapshot.taken_at, "stale sweep discarded");
                return Ok(summarize(prev, Vec::new(), Vec::new()));
            }
            Some(prev) => (
                snapshot.expired_threads.difference(&prev.expired_threads).copied().collect(),
                snapshot.expired_gossips.difference(&prev.expired_gossips).copied().collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        *guard = Some(snapshot.clone());
        drop(guard);

        let report = summarize(&snapshot, newly_expired_threads, newly_expired_gossips);
        if !report.newly_expired_threads.is_empty() {
            tracing::info!(count = report.newly_expired_threads.len(), "threads expired");
            self.ports.events.publish(FanoutEvent::RefreshThreads);
        }
        if !report.newly_expired_gossips.is_empty() {
            tracing::info!(count = report.newly_expired_gossips.len(), "gossips expired");
            self.ports.events.publish(FanoutEvent::RefreshGossips);
        }
        tracing::debug!(
            taken_at = %snapshot.taken_at,
            active = report.active_threads,
            expired = report.expired_threads,
            "expiry sweep"
        );
        Ok(report)
    }

    /// Expiry alerts for every thread the user created or joined, soonest
    /// first. Runs a sweep inline when none has completed yet.
    pub async fn alerts_for(&self, user_id: Uuid) -> DomainResult<Vec<ThreadAlert>> {
        require_user(&self.ports, user_id).await?;
        let current = self.snapshot.read().await.clone();
        let snapshot = match current {
            Some(snapshot) => snapshot,
            None => {
                self.sweep().await?;
                match self.snapshot.read().await.clone() {
                    Some(snapshot) => snapshot,
                    None => return Ok(Vec::new()),
                }
            }
        };

        let now = snapshot.taken_at;
        let mut threads: Vec<&Thread> = snapshot
            .threads
            .iter()
            .filter(|t| t.is_member(user_id))
            .collect();
        threads.sort_by_key(|t| (t.expires_at, t.id));

        Ok(threads
            .into_iter()
            .filter_map(|thread| {
                let kind = self.policy.classify(thread.expires_at, now)?;
                Some(ThreadAlert {
                    id: format!("{}-{}", thread.id, kind_slug(kind)),
                    thread_id: thread.id,
                    title: thread.title.clone(),
                    location: thread.location.clone(),
                    message: alert_message(kind, thread.expires_at, now),
                    kind,
                    time: thread.expires_at,
                    members: thread.members.len(),
                })
            })
            .collect())
    }

    /// Runs [`sweep`](Self::sweep) every `every` until `shutdown` flips.
    pub fn spawn(self: Arc<Self>, every: StdDuration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tracing::info!(interval_secs = every.as_secs(), "starting expiry sweep");
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(every);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(err) = self.sweep().await {
                            tracing::warn!(error = %err, "expiry sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("expiry sweep stopped");
        })
    }

    async fn take_snapshot(&self) -> DomainResult<Snapshot> {
        let now = self.ports.clock.now();
        let threads = self
            .ports
            .retry
            .read("list_threads", || self.ports.threads.list_threads())
            .await?;
        let gossips = self
            .ports
            .retry
            .read("list_gossips", || self.ports.gossips.list_gossips())
            .await?;

        Ok(Snapshot {
            taken_at: now,
            expired_threads: threads.iter().filter(|t| !t.is_active(now)).map(|t| t.id).collect(),
            expired_gossips: gossips.iter().filter(|g| !g.is_active(now)).map(|g| g.id).collect(),
            threads,
        })
    }
}

fn summarize(snapshot: &Snapshot, newly_expired_threads: Vec<Uuid>, newly_expired_gossips: Vec<Uuid>) -> SweepReport {
    SweepReport {
        active_threads: snapshot.threads.len() - snapshot.expired_threads.len(),
        expired_threads: snapshot.expired_threads.len(),
        newly_expired_threads,
        newly_expired_gossips,
    }
}

fn kind_slug(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Urgent => "urgent",
        AlertKind::Soon => "soon",
        AlertKind::Scheduled => "scheduled",
        AlertKind::Expired => "expired",
    }
}

fn alert_message(kind: AlertKind, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match kind {
        AlertKind::Expired => format!("Ended {} ago", humanize(now - expires_at)),
        _ => format!("Ends in {}", humanize(expires_at - now)),
    }
}

fn humanize(span: Duration) -> String {
    let minutes = span.num_minutes().max(0);
    let (n, unit) = if minutes < 1 {
        return "less than a minute".to_string();
    } else if minutes < 60 {
        (minutes, "minute")
    } else if minutes < 60 * 24 {
        (minutes / 60, "hour")
    } else {
        (minutes / (60 * 24), "day")
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
