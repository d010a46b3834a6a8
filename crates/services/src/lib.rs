//! # services
//!
//! Business logic for prastha: thread lifecycle, the membership gate, the
//! per-thread message log, the gossip/comment engine, expiry tracking and
//! the realtime fan-out hub.
//!
//! Every write follows the same path: resolve the actor, check invariants
//! inside an atomic store mutation, commit, then publish a fan-out event.

use std::sync::Arc;

use domains::{Clock, EventPublisher, GossipRepo, ReportRepo, ThreadRepo, UserRepo};

pub mod admin;
pub mod clock;
pub mod comment_tree;
pub mod expiry;
pub mod fanout;
pub mod gossip;
pub mod membership;
pub mod messaging;
pub mod ranking;
pub mod retry;
pub mod threads;
pub mod users;
pub mod validation;

pub use admin::{AdminDashboard, AdminService};
pub use clock::{ManualClock, SystemClock};
pub use comment_tree::{build_comment_tree, CommentNode};
pub use expiry::{AlertKind, ExpiryPolicy, ExpiryScheduler, SweepReport, ThreadAlert};
pub use fanout::{BroadcastPublisher, FanoutStats, Frame};
pub use gossip::{GossipEngine, GossipView, NewComment, NewGossip, ReportComment};
pub use membership::MembershipGate;
pub use messaging::{MessagingCore, SendMessage};
pub use ranking::{GossipSort, ThreadQuery, ThreadSort};
pub use retry::RetryPolicy;
pub use threads::{NewThread, ThreadDetail, ThreadPatch, ThreadService, UserInsights, UserStats};
pub use users::{RegisterUser, UserDirectory};
pub use validation::ContentLimits;

/// Everything a service needs from the outside world.
#[derive(Clone)]
pub struct Ports {
    pub threads: Arc<dyn ThreadRepo>,
    pub gossips: Arc<dyn GossipRepo>,
    pub users: Arc<dyn UserRepo>,
    pub reports: Arc<dyn ReportRepo>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventPublisher>,
    pub retry: RetryPolicy,
    pub limits: ContentLimits,
}

impl Ports {
    /// Wires all repositories to one store.
    pub fn new<S>(store: Arc<S>, clock: Arc<dyn Clock>, events: Arc<dyn EventPublisher>) -> Self
    where
        S: ThreadRepo + GossipRepo + UserRepo + ReportRepo + 'static,
    {
        Self {
            threads: store.clone(),
            gossips: store.clone(),
            users: store.clone(),
            reports: store,
            clock,
            events,
            retry: RetryPolicy::default(),
            limits: ContentLimits::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_limits(mut self, limits: ContentLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// The full set of services sharing one [`Ports`].
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UserDirectory>,
    pub threads: Arc<ThreadService>,
    pub membership: Arc<MembershipGate>,
    pub messaging: Arc<MessagingCore>,
    pub gossips: Arc<GossipEngine>,
    pub expiry: Arc<ExpiryScheduler>,
    pub admin: Arc<AdminService>,
}

impl Services {
    pub fn new(ports: Ports, policy: ExpiryPolicy) -> Self {
        Self {
            users: Arc::new(UserDirectory::new(ports.clone())),
            threads: Arc::new(ThreadService::new(ports.clone())),
            membership: Arc::new(MembershipGate::new(ports.clone())),
            messaging: Arc::new(MessagingCore::new(ports.clone())),
            gossips: Arc::new(GossipEngine::new(ports.clone())),
            expiry: Arc::new(ExpiryScheduler::new(ports.clone(), policy)),
            admin: Arc::new(AdminService::new(ports)),
        }
    }
}
