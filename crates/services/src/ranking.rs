//! Listing filters and sort orders for threads and gossips.

use std::cmp::Ordering;

use domains::{Gossip, Thread, Votes};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreadSort {
    #[default]
    Newest,
    Oldest,
    MostMembers,
    ExpiringSoon,
    MostActive,
}

/// Query for the active thread feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadQuery {
    /// Tag category; `all` or absent means no filter.
    pub category: Option<String>,
    /// Free text over title, description and tags.
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ThreadSort,
}

impl ThreadQuery {
    pub fn matches(&self, thread: &Thread) -> bool {
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
            .map(str::to_lowercase);
        if let Some(category) = category {
            let hit = thread
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&category));
            if !hit {
                return false;
            }
        }

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        match search {
            Some(needle) => {
                thread.title.to_lowercase().contains(&needle)
                    || thread.description.to_lowercase().contains(&needle)
                    || thread.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

/// Sorts in place. Ties fall back to newest first, then id.
pub fn sort_threads(threads: &mut [Thread], sort: ThreadSort) {
    threads.sort_by(|a, b| {
        let primary = match sort {
            ThreadSort::Newest => Ordering::Equal,
            ThreadSort::Oldest => a.created_at.cmp(&b.created_at),
            ThreadSort::MostMembers => b.members.len().cmp(&a.members.len()),
            ThreadSort::ExpiringSoon => a.expires_at.cmp(&b.expires_at),
            ThreadSort::MostActive => b.chat.len().cmp(&a.chat.len()),
        };
        primary
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GossipSort {
    #[default]
    Newest,
    Popular,
    Controversial,
}

/// `min(up, down) * (up + down)`: zero unless both sides voted, and grows
/// with engagement and with how even the split is.
pub fn controversy(votes: &Votes) -> u64 {
    let up = votes.upvotes() as u64;
    let down = votes.downvotes() as u64;
    up.min(down) * (up + down)
}

pub fn sort_gossips(gossips: &mut [Gossip], sort: GossipSort) {
    gossips.sort_by(|a, b| {
        let primary = match sort {
            GossipSort::Newest => Ordering::Equal,
            GossipSort::Popular => b
                .votes
                .upvotes()
                .cmp(&a.votes.upvotes())
                .then_with(|| b.votes.score().cmp(&a.votes.score())),
            GossipSort::Controversial => controversy(&b.votes)
                .cmp(&controversy(&a.votes))
                .then_with(|| b.votes.total().cmp(&a.votes.total())),
        };
        primary
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });
}
