//! Move tree reconstruction and game statistics
//!
//! Move records are stored flat, each pointing at its parent. Trees are
//! rebuilt on every read and never persisted.

mod builder;
mod stats;

pub use builder::{ancestry, build_tree, MoveTreeNode, TreeRow};
pub use stats::{GameStats, SiteStats};
