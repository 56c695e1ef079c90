//! Outbound command queue and the pending-work bookkeeping that drives the
//! session loop.

use std::collections::VecDeque;

/// Kinds of work a trigger can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    /// One full state refresh pass
    Poll,
    /// Draining the command queue
    Command,
}

/// FIFO of raw command lines awaiting execution.
///
/// The only entry ever inserted at the head is a failed in-flight command
/// being put back for retry; everything else appends at the tail.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<String>,
}

impl CommandQueue {
    pub fn push_back(&mut self, command: String) {
        self.entries.push_back(command);
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.entries.pop_front()
    }

    /// Put a failed command back at the head so it retries before anything
    /// enqueued after it
    pub fn requeue_front(&mut self, command: String) {
        self.entries.push_front(command);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Set of requested work kinds, at most one instance of each.
///
/// A kind is cleared only when its whole backlog is drained: one successful
/// poll pass for `Poll`, an emptied queue for `Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PendingWork {
    poll: bool,
    command: bool,
}

impl PendingWork {
    pub fn mark(&mut self, kind: WorkKind) {
        match kind {
            WorkKind::Poll => self.poll = true,
            WorkKind::Command => self.command = true,
        }
    }

    pub fn clear(&mut self, kind: WorkKind) {
        match kind {
            WorkKind::Poll => self.poll = false,
            WorkKind::Command => self.command = false,
        }
    }

    pub fn contains(&self, kind: WorkKind) -> bool {
        match kind {
            WorkKind::Poll => self.poll,
            WorkKind::Command => self.command,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.poll && !self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut queue = CommandQueue::default();
        queue.push_back("PWON".to_string());
        queue.push_back("MV30".to_string());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().as_deref(), Some("PWON"));
        assert_eq!(queue.pop_front().as_deref(), Some("MV30"));
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn requeued_command_runs_before_later_entries() {
        let mut queue = CommandQueue::default();
        queue.push_back("SITV".to_string());
        queue.push_back("MV30".to_string());

        // SITV fails in flight and is put back at the head
        let in_flight = queue.pop_front().unwrap();
        queue.push_back("MUON".to_string());
        queue.requeue_front(in_flight);

        assert_eq!(queue.pop_front().as_deref(), Some("SITV"));
        assert_eq!(queue.pop_front().as_deref(), Some("MV30"));
        assert_eq!(queue.pop_front().as_deref(), Some("MUON"));
    }

    #[test]
    fn pending_work_dedups_per_kind() {
        let mut pending = PendingWork::default();
        assert!(pending.is_empty());

        pending.mark(WorkKind::Poll);
        pending.mark(WorkKind::Poll);
        pending.mark(WorkKind::Poll);
        assert!(pending.contains(WorkKind::Poll));
        assert!(!pending.contains(WorkKind::Command));

        pending.clear(WorkKind::Poll);
        assert!(pending.is_empty());

        pending.mark(WorkKind::Command);
        assert!(!pending.is_empty());
        pending.clear(WorkKind::Command);
        assert!(pending.is_empty());
    }
}
