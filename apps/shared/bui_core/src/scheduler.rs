//! Delayed teardown on the frame clock
//!
//! Nothing here runs on its own: [`Scheduler::advance`] is called from
//! `PanelRegistry::tick` and returns the tasks that became due.

use std::time::Duration;

use crate::panel::PanelId;

/// Delay applied by `CloseRule::DestroyDeferred`
pub const DEFERRED_DESTROY_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Destroy(PanelId),
}

impl Task {
    pub fn panel(&self) -> PanelId {
        match self {
            Task::Destroy(id) => *id,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    seq: u64,
    /// (due, seq, task); seq keeps same-instant tasks in scheduling order
    pending: Vec<(Duration, u64, Task)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the scheduler clock
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run `task` once `delay` has elapsed; a zero delay is due on the next advance
    pub fn schedule(&mut self, delay: Duration, task: Task) {
        let due = self.now.saturating_add(delay);
        self.seq += 1;
        self.pending.push((due, self.seq, task));
    }

    /// Drop every pending task for `panel`, returns how many were dropped
    pub fn cancel_panel(&mut self, panel: PanelId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(_, _, task)| task.panel() != panel);
        before - self.pending.len()
    }

    pub fn is_scheduled(&self, panel: PanelId) -> bool {
        self.pending.iter().any(|(_, _, task)| task.panel() == panel)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Move the clock forward, returning due tasks in due order
    pub fn advance(&mut self, dt: Duration) -> Vec<Task> {
        self.now = self.now.saturating_add(dt);
        let now = self.now;

        let mut due: Vec<(Duration, u64, Task)> = Vec::new();
        self.pending.retain(|entry| {
            if entry.0 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(at, seq, _)| (*at, *seq));
        due.into_iter().map(|(_, _, task)| task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_task_waits_for_delay() {
        let mut scheduler = Scheduler::new();
        let id = PanelId::from_raw(1);
        scheduler.schedule(DEFERRED_DESTROY_DELAY, Task::Destroy(id));

        assert!(scheduler.advance(Duration::from_millis(10)).is_empty());
        assert_eq!(scheduler.advance(Duration::from_millis(10)), vec![Task::Destroy(id)]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_due_order() {
        let mut scheduler = Scheduler::new();
        let (a, b, c) = (PanelId::from_raw(1), PanelId::from_raw(2), PanelId::from_raw(3));
        scheduler.schedule(Duration::from_millis(5), Task::Destroy(a));
        scheduler.schedule(Duration::ZERO, Task::Destroy(b));
        scheduler.schedule(Duration::ZERO, Task::Destroy(c));

        assert_eq!(
            scheduler.advance(Duration::from_millis(5)),
            vec![Task::Destroy(b), Task::Destroy(c), Task::Destroy(a)]
        );
    }

    #[test]
    fn test_cancel_panel() {
        let mut scheduler = Scheduler::new();
        let id = PanelId::from_raw(4);
        scheduler.schedule(Duration::ZERO, Task::Destroy(id));
        assert!(scheduler.is_scheduled(id));
        assert_eq!(scheduler.cancel_panel(id), 1);
        assert!(scheduler.advance(Duration::from_secs(1)).is_empty());
    }
}
