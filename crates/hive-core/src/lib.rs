//! Core domain logic for Hive: parallel tasks bound 1:1 to git branches and
//! isolated worktrees, plus the merge coordination and overlap analysis on
//! top of them.

pub mod analyze;
pub mod config;
pub mod error;
pub mod git;
pub mod merge;
pub mod ops;
pub mod reconcile;
pub mod registry;
pub mod review;
pub mod share;
pub mod slug;
pub mod task;
pub mod worktree;

pub use error::{HiveError, Result};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
