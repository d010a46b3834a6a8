//! Builds the nested reply view from the flat comment arena.
//!
//! Comments are grouped by `parent_comment_id` in a single pass and siblings
//! are ordered by `created_at` (then id). A comment whose parent does not
//! resolve is shown at the root. Comments that are only reachable through a
//! parent cycle are also promoted to the root, earliest first, so every
//! stored comment appears exactly once.
//!
//! The walk uses an explicit stack. Nesting never exceeds `max_depth`:
//! anything stored deeper is listed after its ancestor at the last allowed
//! level, in reading order.

use std::collections::{BTreeMap, HashMap, HashSet};

use domains::GossipComment;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: GossipComment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// This node plus all of its descendants.
    pub fn subtree_len(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::subtree_len).sum::<usize>()
    }

    /// Levels of nesting, counting this node as 1.
    pub fn depth(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::depth).max().unwrap_or(0)
    }
}

fn sibling_order(a: &&GossipComment, b: &&GossipComment) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

/// One visited comment in pre-order, with where it lands in the view.
struct Placement<'a> {
    comment: &'a GossipComment,
    parent: Option<usize>,
    depth: usize,
}

pub fn build_comment_tree(comments: &BTreeMap<Uuid, GossipComment>, max_depth: usize) -> Vec<CommentNode> {
    let max_depth = max_depth.max(1);
    let mut children: HashMap<Uuid, Vec<&GossipComment>> = HashMap::new();
    let mut roots: Vec<&GossipComment> = Vec::new();

    for comment in comments.values() {
        match comment.parent_comment_id {
            Some(parent) if parent != comment.id && comments.contains_key(&parent) => {
                children.entry(parent).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_by(sibling_order);
    }
    roots.sort_by(sibling_order);

    let mut visited = HashSet::with_capacity(comments.len());
    let mut order: Vec<Placement> = Vec::with_capacity(comments.len());
    for root in roots {
        place_subtree(root, &children, max_depth, &mut visited, &mut order);
    }

    let mut promoted = false;
    if visited.len() < comments.len() {
        let mut stranded: Vec<&GossipComment> = comments
            .values()
            .filter(|c| !visited.contains(&c.id))
            .collect();
        stranded.sort_by(sibling_order);
        for comment in stranded {
            if !visited.contains(&comment.id) {
                place_subtree(comment, &children, max_depth, &mut visited, &mut order);
                promoted = true;
            }
        }
    }

    let mut tree = assemble(order);
    if promoted {
        tree.sort_by(|a, b| sibling_order(&&a.comment, &&b.comment));
    }
    tree
}

/// Pre-order walk from `start`, appending each newly reached comment.
fn place_subtree<'a>(
    start: &'a GossipComment,
    children: &HashMap<Uuid, Vec<&'a GossipComment>>,
    max_depth: usize,
    visited: &mut HashSet<Uuid>,
    order: &mut Vec<Placement<'a>>,
) {
    let mut stack = vec![Placement {
        comment: start,
        parent: None,
        depth: 1,
    }];
    while let Some(next) = stack.pop() {
        if !visited.insert(next.comment.id) {
            continue;
        }
        let index = order.len();
        let (parent, depth) = if next.depth < max_depth {
            (Some(index), next.depth + 1)
        } else {
            (next.parent, next.depth)
        };
        for child in children.get(&next.comment.id).into_iter().flatten().rev() {
            if !visited.contains(&child.id) {
                stack.push(Placement {
                    comment: child,
                    parent,
                    depth,
                });
            }
        }
        order.push(next);
    }
}

/// Turns the pre-order placements into nodes, innermost first.
fn assemble(order: Vec<Placement>) -> Vec<CommentNode> {
    let mut replies: Vec<Vec<CommentNode>> = (0..order.len()).map(|_| Vec::new()).collect();
    let mut roots = Vec::new();
    for (index, placement) in order.into_iter().enumerate().rev() {
        let mut own = std::mem::take(&mut replies[index]);
        own.reverse();
        let node = CommentNode {
            comment: placement.comment.clone(),
            replies: own,
        };
        match placement.parent {
            Some(parent) => replies[parent].push(node),
            None => roots.push(node),
        }
    }
    roots.reverse();
    roots
}
