use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use domain::driver::CommandToken;
use domain::{Command, ExecutionMode, TimeoutPolicy};
use tokio::time::Instant;

struct Waiting<C> {
    seq: u64,
    command: Command<C>,
    enqueued_at: Instant,
}

struct InFlight<C> {
    command: Command<C>,
    sent_at: Instant,
    slow_warned: bool,
}

/// A command handed out for sending
#[derive(Debug)]
pub struct Dispatch<C> {
    pub token: CommandToken,
    pub command: Command<C>,
    /// Time spent in the queue before being sent
    pub waited: Duration,
    /// `waited` exceeded the slow-sent threshold
    pub slow_sent: bool,
}

/// A command that reached a terminal outcome
#[derive(Debug)]
pub struct Resolved<C> {
    pub command: Command<C>,
    pub elapsed: Duration,
    /// `elapsed` reached the slow-fulfilled threshold
    pub slow: bool,
}

#[derive(Debug)]
pub enum DeadlineEvent<C> {
    /// Still pending past the slow-fulfilled threshold; stays in flight
    SlowFulfilled {
        token: CommandToken,
        command: Command<C>,
        elapsed: Duration,
    },
    /// No reply within the reply timeout; the slot is released
    TimedOut {
        token: CommandToken,
        command: Command<C>,
        timeout: Duration,
    },
}

/// Per-device ordering of pending commands.
///
/// Commands carrying a queue id form FIFO sub-queues: only the head of
/// each sub-queue may be sent, and only once nothing else from that
/// sub-queue is in flight. Every eligible command is handed out by
/// temporal priority (higher first), then insertion order. The execution
/// mode caps how many commands may be in flight at once.
pub struct DispatchQueue<C> {
    mode: ExecutionMode,
    timeouts: TimeoutPolicy,
    waiting: Vec<Waiting<C>>,
    in_flight: BTreeMap<CommandToken, InFlight<C>>,
    busy_queues: HashSet<String>,
    next_seq: u64,
    next_token: CommandToken,
}

impl<C: Clone> DispatchQueue<C> {
    pub fn new(mode: ExecutionMode, timeouts: TimeoutPolicy) -> Self {
        Self {
            mode,
            timeouts,
            waiting: Vec::new(),
            in_flight: BTreeMap::new(),
            busy_queues: HashSet::new(),
            next_seq: 0,
            next_token: 1,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn enqueue(&mut self, command: Command<C>, now: Instant) {
        self.waiting.push(Waiting {
            seq: self.next_seq,
            command,
            enqueued_at: now,
        });
        self.next_seq += 1;
    }

    /// Take every command that may be sent now, in send order
    pub fn pop_ready(&mut self, now: Instant) -> Vec<Dispatch<C>> {
        let mut dispatched = Vec::new();
        while let Some(index) = self.next_eligible() {
            let item = self.waiting.remove(index);
            let token = self.next_token;
            self.next_token += 1;

            if let Some(queue_id) = item.command.queue_id() {
                self.busy_queues.insert(queue_id.to_string());
            }
            let waited = now.saturating_duration_since(item.enqueued_at);
            self.in_flight.insert(
                token,
                InFlight {
                    command: item.command.clone(),
                    sent_at: now,
                    slow_warned: false,
                },
            );
            dispatched.push(Dispatch {
                token,
                command: item.command,
                waited,
                slow_sent: self.timeouts.slow_sent.is_some_and(|t| waited > t),
            });
        }
        dispatched
    }

    fn has_capacity(&self) -> bool {
        self.mode
            .max_in_flight()
            .is_none_or(|max| self.in_flight.len() < max)
    }

    fn next_eligible(&self) -> Option<usize> {
        if !self.has_capacity() {
            return None;
        }

        let mut seen_queues = HashSet::new();
        let mut best: Option<(usize, &Waiting<C>)> = None;
        // `waiting` is kept in insertion order, so the first item seen per
        // queue id is that sub-queue's head
        for (index, item) in self.waiting.iter().enumerate() {
            if let Some(queue_id) = item.command.queue_id() {
                if !seen_queues.insert(queue_id) || self.busy_queues.contains(queue_id) {
                    continue;
                }
            }
            let better = match best {
                None => true,
                Some((_, current)) => {
                    item.command.temporal_priority() > current.command.temporal_priority()
                        || (item.command.temporal_priority() == current.command.temporal_priority()
                            && item.seq < current.seq)
                }
            };
            if better {
                best = Some((index, item));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Mark a sent command as done. `None` when the token is unknown, e.g.
    /// a late reply for a command that already timed out.
    pub fn resolve(&mut self, token: CommandToken, now: Instant) -> Option<Resolved<C>> {
        let entry = self.in_flight.remove(&token)?;
        if let Some(queue_id) = entry.command.queue_id() {
            self.busy_queues.remove(queue_id);
        }
        let elapsed = now.saturating_duration_since(entry.sent_at);
        Some(Resolved {
            slow: self.timeouts.slow_fulfilled.is_some_and(|t| elapsed >= t),
            command: entry.command,
            elapsed,
        })
    }

    /// Earliest instant at which [`DispatchQueue::poll_deadlines`] has work
    pub fn next_deadline(&self) -> Option<Instant> {
        self.in_flight
            .values()
            .flat_map(|entry| {
                let slow = self
                    .timeouts
                    .slow_fulfilled
                    .filter(|_| !entry.slow_warned)
                    .map(|t| entry.sent_at + t);
                let timeout = self.timeouts.reply_timeout.map(|t| entry.sent_at + t);
                [slow, timeout]
            })
            .flatten()
            .min()
    }

    pub fn poll_deadlines(&mut self, now: Instant) -> Vec<DeadlineEvent<C>> {
        let mut events = Vec::new();

        if let Some(timeout) = self.timeouts.reply_timeout {
            let expired: Vec<CommandToken> = self
                .in_flight
                .iter()
                .filter(|(_, entry)| now >= entry.sent_at + timeout)
                .map(|(token, _)| *token)
                .collect();
            for token in expired {
                if let Some(resolved) = self.resolve(token, now) {
                    events.push(DeadlineEvent::TimedOut {
                        token,
                        command: resolved.command,
                        timeout,
                    });
                }
            }
        }

        if let Some(threshold) = self.timeouts.slow_fulfilled {
            for (token, entry) in self.in_flight.iter_mut() {
                let elapsed = now.saturating_duration_since(entry.sent_at);
                if !entry.slow_warned && elapsed >= threshold {
                    entry.slow_warned = true;
                    events.push(DeadlineEvent::SlowFulfilled {
                        token: *token,
                        command: entry.command.clone(),
                        elapsed,
                    });
                }
            }
        }
        events
    }

    /// Discard everything, waiting and in flight. Returns the number dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.waiting.len() + self.in_flight.len();
        self.waiting.clear();
        self.in_flight.clear();
        self.busy_queues.clear();
        dropped
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::CommandContext;

    fn cmd(name: &str) -> Command<String> {
        Command::new(name.to_string(), CommandContext::new(name, "layer"))
    }

    fn names(dispatched: &[Dispatch<String>]) -> Vec<&str> {
        dispatched.iter().map(|d| d.command.content().as_str()).collect()
    }

    fn policy(slow_sent: Option<u64>, slow_fulfilled: Option<u64>, reply: Option<u64>) -> TimeoutPolicy {
        TimeoutPolicy {
            slow_sent: slow_sent.map(Duration::from_millis),
            slow_fulfilled: slow_fulfilled.map(Duration::from_millis),
            reply_timeout: reply.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_salvo_sends_everything_by_priority() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(ExecutionMode::Salvo, TimeoutPolicy::default());
        queue.enqueue(cmd("a"), now);
        queue.enqueue(cmd("b").with_priority(5), now);
        queue.enqueue(cmd("c"), now);

        let dispatched = queue.pop_ready(now);
        assert_eq!(names(&dispatched), vec!["b", "a", "c"]);
        assert_eq!(queue.in_flight_len(), 3);
        assert!(queue.pop_ready(now).is_empty());
    }

    #[test]
    fn test_sequential_waits_for_resolution() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(ExecutionMode::Sequential, TimeoutPolicy::default());
        queue.enqueue(cmd("a"), now);
        queue.enqueue(cmd("b"), now);

        let first = queue.pop_ready(now);
        assert_eq!(names(&first), vec!["a"]);
        assert!(queue.pop_ready(now).is_empty());

        queue.resolve(first[0].token, now).unwrap();
        assert_eq!(names(&queue.pop_ready(now)), vec!["b"]);
    }

    #[test]
    fn test_named_queue_blocks_head_of_line() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(ExecutionMode::Salvo, TimeoutPolicy::default());
        queue.enqueue(cmd("a").in_queue("q1"), now);
        queue.enqueue(cmd("b").in_queue("q1"), now);
        queue.enqueue(cmd("c"), now);

        let first = queue.pop_ready(now);
        assert_eq!(names(&first), vec!["a", "c"]);
        assert_eq!(queue.waiting_len(), 1);

        queue.resolve(first[0].token, now).unwrap();
        assert_eq!(names(&queue.pop_ready(now)), vec!["b"]);
    }

    #[test]
    fn test_sequential_queue_ordering_against_priority() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(ExecutionMode::Sequential, TimeoutPolicy::default());
        queue.enqueue(cmd("a").in_queue("q1"), now);
        queue.enqueue(cmd("b").in_queue("q1").with_priority(10), now);
        queue.enqueue(cmd("c").with_priority(1), now);

        let mut order = Vec::new();
        while !queue.is_empty() {
            let batch = queue.pop_ready(now);
            assert_eq!(batch.len(), 1);
            order.push(batch[0].command.content().clone());
            queue.resolve(batch[0].token, now);
        }
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_distinct_queues_run_in_parallel() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(ExecutionMode::Salvo, TimeoutPolicy::default());
        queue.enqueue(cmd("a").in_queue("q1"), now);
        queue.enqueue(cmd("b").in_queue("q2"), now);
        assert_eq!(names(&queue.pop_ready(now)), vec!["a", "b"]);
    }

    #[test]
    fn test_slow_sent_flagged_on_dispatch() {
        let start = Instant::now();
        let mut queue = DispatchQueue::new(ExecutionMode::Salvo, policy(Some(100), None, None));
        queue.enqueue(cmd("a"), start);
        let dispatched = queue.pop_ready(start + Duration::from_millis(150));
        assert!(dispatched[0].slow_sent);
        assert_eq!(dispatched[0].waited, Duration::from_millis(150));
    }

    #[test]
    fn test_slow_fulfilled_does_not_release_slot() {
        let start = Instant::now();
        let mut queue =
            DispatchQueue::new(ExecutionMode::Sequential, policy(None, Some(100), None));
        queue.enqueue(cmd("a"), start);
        queue.enqueue(cmd("b"), start);
        let token = queue.pop_ready(start)[0].token;
        assert_eq!(queue.next_deadline(), Some(start + Duration::from_millis(100)));

        let later = start + Duration::from_millis(200);
        let events = queue.poll_deadlines(later);
        assert!(matches!(events[..], [DeadlineEvent::SlowFulfilled { token: t, .. }] if t == token));
        assert!(queue.poll_deadlines(later).is_empty());
        assert!(queue.pop_ready(later).is_empty());

        let resolved = queue.resolve(token, later).unwrap();
        assert!(resolved.slow);
        assert_eq!(names(&queue.pop_ready(later)), vec!["b"]);
    }

    #[test]
    fn test_deadline_fires_when_reached() {
        let start = Instant::now();
        let mut queue =
            DispatchQueue::new(ExecutionMode::Sequential, policy(None, Some(100), Some(1000)));
        queue.enqueue(cmd("a"), start);
        queue.pop_ready(start);

        let slow_at = queue.next_deadline().unwrap();
        assert_eq!(slow_at, start + Duration::from_millis(100));
        let events = queue.poll_deadlines(slow_at);
        assert!(matches!(events[..], [DeadlineEvent::SlowFulfilled { .. }]));

        // Re-armed on the reply timeout, never on the one that just fired
        let timeout_at = queue.next_deadline().unwrap();
        assert_eq!(timeout_at, start + Duration::from_millis(1000));
        let events = queue.poll_deadlines(timeout_at);
        assert!(matches!(events[..], [DeadlineEvent::TimedOut { .. }]));
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_reply_timeout_frees_slot_and_ignores_late_reply() {
        let start = Instant::now();
        let mut queue =
            DispatchQueue::new(ExecutionMode::Sequential, policy(None, None, Some(1000)));
        queue.enqueue(cmd("a").in_queue("q1"), start);
        queue.enqueue(cmd("b").in_queue("q1"), start);
        let token = queue.pop_ready(start)[0].token;

        let later = start + Duration::from_millis(1000);
        let events = queue.poll_deadlines(later);
        assert!(matches!(events[..], [DeadlineEvent::TimedOut { .. }]));
        assert_eq!(names(&queue.pop_ready(later)), vec!["b"]);
        assert!(queue.resolve(token, later).is_none());
    }

    #[test]
    fn test_clear_discards_everything() {
        let now = Instant::now();
        let mut queue = DispatchQueue::new(ExecutionMode::Sequential, TimeoutPolicy::default());
        queue.enqueue(cmd("a").in_queue("q1"), now);
        queue.enqueue(cmd("b").in_queue("q1"), now);
        let token = queue.pop_ready(now)[0].token;

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(queue.resolve(token, now).is_none());

        queue.enqueue(cmd("c").in_queue("q1"), now);
        assert_eq!(names(&queue.pop_ready(now)), vec!["c"]);
    }
}
