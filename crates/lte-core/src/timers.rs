use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: u64,
    generation: u64,
    duration: u32,
}

/// Millisecond timers driven by the TTI clock. All timers of a layer share one
/// priority queue; restarting or stopping a timer invalidates its queued entry.
#[derive(Debug)]
pub struct TimerService<K> {
    now: u64,
    heap: BinaryHeap<Reverse<(u64, u64, K)>>,
    armed: HashMap<K, Armed>,
    next_generation: u64,
}

impl<K> Default for TimerService<K>
where
    K: Copy + Eq + Hash + Ord + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerService<K>
where
    K: Copy + Eq + Hash + Ord + Debug,
{
    pub fn new() -> Self {
        TimerService {
            now: 0,
            heap: BinaryHeap::new(),
            armed: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Milliseconds elapsed since the service was created
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Start a timer, or restart it if already running. Expires `duration_ms` ticks from now.
    pub fn start(&mut self, key: K, duration_ms: u32) {
        let deadline = self.now + duration_ms as u64;
        let generation = self.next_generation;
        self.next_generation += 1;
        self.armed.insert(key, Armed { deadline, generation, duration: duration_ms });
        self.heap.push(Reverse((deadline, generation, key)));
        tracing::trace!("timer {:?} started, {} ms", key, duration_ms);
    }

    pub fn stop(&mut self, key: K) {
        if self.armed.remove(&key).is_some() {
            tracing::trace!("timer {:?} stopped", key);
        }
    }

    pub fn is_running(&self, key: K) -> bool {
        self.armed.contains_key(&key)
    }

    /// Milliseconds left before expiry, if running
    pub fn remaining(&self, key: K) -> Option<u64> {
        self.armed.get(&key).map(|a| a.deadline.saturating_sub(self.now))
    }

    /// Configured duration of a running timer
    pub fn duration(&self, key: K) -> Option<u32> {
        self.armed.get(&key).map(|a| a.duration)
    }

    /// Stop all timers matching the predicate
    pub fn stop_matching(&mut self, pred: impl Fn(&K) -> bool) {
        self.armed.retain(|k, _| !pred(k));
    }

    pub fn stop_all(&mut self) {
        self.armed.clear();
        self.heap.clear();
    }

    /// Advance time by one TTI and return the timers that expired, in expiry order
    pub fn tick(&mut self) -> Vec<K> {
        self.advance(1)
    }

    pub fn advance(&mut self, ms: u64) -> Vec<K> {
        self.now += ms;
        let mut expired = Vec::new();
        while let Some(Reverse((deadline, generation, key))) = self.heap.peek().copied() {
            if deadline > self.now {
                break;
            }
            self.heap.pop();
            // Skip entries superseded by a restart or stop
            let current = matches!(self.armed.get(&key), Some(a) if a.generation == generation);
            if current {
                self.armed.remove(&key);
                tracing::trace!("timer {:?} expired", key);
                expired.push(key);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    enum T {
        A,
        B,
    }

    #[test]
    fn test_expiry_order() {
        let mut svc = TimerService::new();
        svc.start(T::A, 5);
        svc.start(T::B, 3);
        assert!(svc.advance(2).is_empty());
        assert_eq!(svc.tick(), vec![T::B]);
        assert!(svc.is_running(T::A));
        assert_eq!(svc.remaining(T::A), Some(2));
        assert_eq!(svc.advance(2), vec![T::A]);
        assert!(!svc.is_running(T::A));
    }

    #[test]
    fn test_restart_and_stop() {
        let mut svc = TimerService::new();
        svc.start(T::A, 2);
        svc.tick();
        svc.start(T::A, 2);
        assert!(svc.tick().is_empty());
        assert_eq!(svc.tick(), vec![T::A]);

        svc.start(T::B, 1);
        svc.stop(T::B);
        assert!(svc.advance(5).is_empty());
    }

    #[test]
    fn test_stop_matching() {
        let mut svc = TimerService::new();
        svc.start((1u32, T::A), 1);
        svc.start((2u32, T::A), 1);
        svc.stop_matching(|k| k.0 == 1);
        assert_eq!(svc.tick(), vec![(2, T::A)]);
    }
}
