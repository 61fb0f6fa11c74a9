use std::collections::HashSet;

use crate::ir::{BlockId, Program, User, ValueRef};

/// Decision returned by a successor-walk visitor for each block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    /// Expand the block's successors.
    Continue,
    /// Do not expand this block.
    Skip,
    /// End the whole walk.
    Stop,
}

/// Depth-first walk over the CFG successors of `start`.
///
/// `start` itself is marked visited but not passed to `visit`. Every other
/// reachable block is visited at most once across the walk, including blocks
/// already in `visited` on entry. Returns `true` when the visitor stopped the
/// walk.
pub fn successor_walk<F>(
    program: &Program,
    start: BlockId,
    visited: &mut HashSet<BlockId>,
    mut visit: F,
) -> bool
where
    F: FnMut(BlockId) -> WalkControl,
{
    visited.insert(start);
    let mut stack: Vec<BlockId> = program.successors(start).into_iter().rev().collect();
    while let Some(block) = stack.pop() {
        if !visited.insert(block) {
            continue;
        }
        match visit(block) {
            WalkControl::Stop => return true,
            WalkControl::Skip => {}
            WalkControl::Continue => {
                stack.extend(program.successors(block).into_iter().rev());
            }
        }
    }
    false
}

/// Transitive users of `value` that satisfy `predicate`, in breadth-first
/// discovery order. Each user is examined once even on cyclic use graphs
/// (phi nodes).
pub fn forward_uses<F>(program: &Program, value: ValueRef, mut predicate: F) -> Vec<User>
where
    F: FnMut(User) -> bool,
{
    let mut seen: HashSet<User> = HashSet::new();
    let mut queue = std::collections::VecDeque::from([value]);
    let mut out = Vec::new();
    while let Some(current) = queue.pop_front() {
        for user in program.users(current) {
            if !seen.insert(*user) {
                continue;
            }
            if predicate(*user) {
                out.push(*user);
            }
            queue.push_back(user.as_value());
        }
    }
    out
}
