//! Builds a rooted, ordered tree from parent-linked move records

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::id::MoveId;
use crate::storage::{MoveRecord, Moves};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveTreeNode {
    pub record: MoveRecord,
    /// Sorted by creation time, oldest first.
    pub children: Vec<MoveTreeNode>,
}

/// One line of a flattened tree, in pre-order.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub node: &'a MoveTreeNode,
}

impl MoveTreeNode {
    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        self.flatten().len()
    }

    /// Nodes without children, in pre-order.
    pub fn leaves(&self) -> Vec<&MoveTreeNode> {
        self.flatten()
            .into_iter()
            .map(|row| row.node)
            .filter(|node| node.children.is_empty())
            .collect()
    }

    /// Pre-order walk with depths; the root has depth 0.
    pub fn flatten(&self) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        let mut stack = vec![(0, self)];

        while let Some((depth, node)) = stack.pop() {
            rows.push(TreeRow { depth, node });
            for child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }

        rows
    }

    pub fn find(&self, move_id: &MoveId) -> Option<&MoveTreeNode> {
        self.flatten()
            .into_iter()
            .map(|row| row.node)
            .find(|node| node.record.id == *move_id)
    }

    /// Display label for a node at `depth`, e.g. `"1. e2-e4 (Alice)"` or
    /// `"1... e7-e5 (Bob)"`.
    pub fn label(&self, depth: usize) -> String {
        if depth == 0 {
            return "Starting Position".to_string();
        }

        let move_number = (depth + 1) / 2;
        let move_name = self
            .record
            .mv
            .map(|mv| mv.to_string())
            .unwrap_or_else(|| "Initial position".to_string());
        let contributor = if self.record.contributor.trim().is_empty() {
            "Anonymous"
        } else {
            self.record.contributor.as_str()
        };

        if depth % 2 == 1 {
            format!("{}. {} ({})", move_number, move_name, contributor)
        } else {
            format!("{}... {} ({})", move_number, move_name, contributor)
        }
    }
}

fn find_root(moves: &Moves) -> Result<&MoveRecord> {
    let mut roots = moves.values().filter(|m| m.is_root());
    let root = roots.next().ok_or(Error::MissingRoot)?;
    let extra = roots.count();
    if extra > 0 {
        return Err(Error::MultipleRoots { count: extra + 1 });
    }
    Ok(root)
}

/// Chain of records from the root down to `move_id`, inclusive.
///
/// The walk takes at most `moves.len()` steps; a longer chain means a cycle.
pub fn ancestry<'a>(moves: &'a Moves, move_id: &MoveId) -> Result<Vec<&'a MoveRecord>> {
    let mut current = moves.get(move_id).ok_or_else(|| Error::MoveNotFound {
        game_id: String::new(),
        move_id: move_id.to_string(),
    })?;

    let mut chain = vec![current];
    while let Some(parent_id) = &current.parent_move_id {
        if chain.len() >= moves.len() {
            return Err(Error::CyclicAncestry(move_id.to_string()));
        }
        current = moves.get(parent_id).ok_or_else(|| Error::DanglingParent {
            move_id: current.id.to_string(),
            parent_id: parent_id.to_string(),
        })?;
        chain.push(current);
    }

    chain.reverse();
    Ok(chain)
}

/// Rebuilds the move tree of one game.
///
/// Fails unless there is exactly one root, every parent reference resolves,
/// and every record descends from the root. Children are ordered by
/// `created_at`; ties keep map order.
pub fn build_tree(moves: &Moves) -> Result<MoveTreeNode> {
    let root = find_root(moves)?;

    let mut children: HashMap<&MoveId, Vec<&MoveRecord>> = HashMap::with_capacity(moves.len());
    for record in moves.values() {
        let Some(parent_id) = &record.parent_move_id else {
            continue;
        };
        if !moves.contains_key(parent_id) {
            return Err(Error::DanglingParent {
                move_id: record.id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }
        children.entry(parent_id).or_default().push(record);
    }

    for siblings in children.values_mut() {
        siblings.sort_by_key(|r| r.created_at);
    }

    // Pre-order from the root; anything left unvisited hangs off a cycle.
    let mut order: Vec<&MoveRecord> = Vec::with_capacity(moves.len());
    let mut stack = vec![root];
    while let Some(record) = stack.pop() {
        order.push(record);
        if let Some(kids) = children.get(&record.id) {
            stack.extend(kids.iter().rev());
        }
    }

    if order.len() != moves.len() {
        let reached: std::collections::HashSet<&MoveId> = order.iter().map(|r| &r.id).collect();
        let stray = moves
            .keys()
            .find(|id| !reached.contains(id))
            .map(|id| id.to_string())
            .unwrap_or_default();
        return Err(Error::CyclicAncestry(stray));
    }

    // Reverse pre-order visits every child before its parent.
    let mut built: HashMap<&MoveId, MoveTreeNode> = HashMap::with_capacity(moves.len());
    for &record in order.iter().rev() {
        let kids = children
            .get(&record.id)
            .map(|kids| {
                kids.iter()
                    .filter_map(|kid| built.remove(&kid.id))
                    .collect()
            })
            .unwrap_or_default();

        built.insert(
            &record.id,
            MoveTreeNode {
                record: record.clone(),
                children: kids,
            },
        );
    }

    built.remove(&root.id).ok_or(Error::MissingRoot)
}
