//! prastha/crates/domains/src/lib.rs
//!
//! The central domain model and interface definitions for prastha.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn thread(creator_id: Uuid) -> Thread {
        let now = Utc::now();
        Thread {
            id: Uuid::now_v7(),
            title: "Pickup football".to_string(),
            description: "Bring water".to_string(),
            location: "North field".to_string(),
            creator_id,
            creator: "ana".to_string(),
            tags: vec!["sports".to_string()],
            members: vec![creator_id],
            pending_requests: BTreeSet::new(),
            chat: Vec::new(),
            created_at: now,
            expires_at: now + Duration::hours(2),
        }
    }

    #[test]
    fn thread_expires_at_the_boundary() {
        let t = thread(Uuid::now_v7());
        assert!(t.is_active(t.expires_at - Duration::milliseconds(1)));
        assert!(!t.is_active(t.expires_at));
    }

    #[test]
    fn creator_is_always_a_member() {
        let creator = Uuid::now_v7();
        let mut t = thread(creator);
        t.members.clear();
        assert!(t.is_member(creator));
        assert_eq!(t.next_seq(), 1);
    }
}
