//! Waitlist promotion policy.

use rally_storage::{ListKind, VoteEntry};

/// The waitlisted entry that takes a freed main-list slot: the earliest cast.
///
/// Ordering is by store-assigned `cast_seq`, never by wall-clock `cast_at`,
/// so entries cast within the same millisecond still have a strict order.
pub fn next_in_line(entries: &[VoteEntry]) -> Option<&VoteEntry> {
    entries
        .iter()
        .filter(|e| e.list == ListKind::Waitlist)
        .min_by_key(|e| e.cast_seq)
}
