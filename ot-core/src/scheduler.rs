// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A cooperative tasklet/timer scheduler, modeled on
//! `capsules/core/src/virtualizers/virtual_alarm.rs`'s list of
//! `VirtualMuxAlarm`s each holding a `(reference, dt)` deadline and a
//! `now().wrapping_sub(reference) >= dt` firing test.
//!
//! The mesh core has no interrupt controller to multiplex alarms onto —
//! a single host-driven [`Scheduler::run_once`] call walks a
//! fixed-capacity table of armed timers, then a FIFO of posted
//! tasklets, dispatching both to a caller-supplied handler (spec.md
//! §4.1). Callers are expected to call `run_once` whenever
//! [`Scheduler::next_deadline`] indicates a timer is due, or
//! periodically with a short enough period to bound latency.

use ot_hil::time::Millis;

/// One armed deadline: `reference.wrapping_add(dt_ms)` is the fire time.
#[derive(Copy, Clone)]
struct Armed<E> {
    event: E,
    reference: Millis,
    dt_ms: u32,
}

/// A fixed-capacity table of at most `N` concurrently armed timers plus
/// a FIFO of at most `T` posted tasklets, each carrying an arbitrary
/// `Copy` event tag the caller dispatches on.
pub struct Scheduler<E: Copy, const N: usize, const T: usize> {
    slots: [Option<Armed<E>>; N],
    tasklets: heapless::Deque<E, T>,
}

impl<E: Copy, const N: usize, const T: usize> Default for Scheduler<E, N, T> {
    fn default() -> Self {
        Scheduler {
            slots: [None; N],
            tasklets: heapless::Deque::new(),
        }
    }
}

impl<E: Copy, const N: usize, const T: usize> Scheduler<E, N, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer that fires `dt_ms` milliseconds after `reference`
    /// (spec.md §4.1 `alarm_at`). Returns `false` if the table is full.
    pub fn arm(&mut self, event: E, reference: Millis, dt_ms: u32) -> bool {
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(Armed {
                    event,
                    reference,
                    dt_ms,
                });
                return true;
            }
        }
        false
    }

    /// Arm a timer firing `dt_ms` milliseconds from `now`.
    pub fn arm_in(&mut self, event: E, now: Millis, dt_ms: u32) -> bool {
        self.arm(event, now, dt_ms)
    }

    /// Schedule `event` to run once, FIFO, the next time a tasklet
    /// queue is drained (spec.md §4.1 `post`). Returns `false` if the
    /// tasklet queue is full.
    pub fn post(&mut self, event: E) -> bool {
        self.tasklets.push_back(event).is_ok()
    }

    /// Disarm every slot whose event equals `event` (requires
    /// `PartialEq`; callers without it can instead drain and re-arm).
    pub fn cancel(&mut self, event: E)
    where
        E: PartialEq,
    {
        for slot in self.slots.iter_mut() {
            if slot.map(|a| a.event == event).unwrap_or(false) {
                *slot = None;
            }
        }
    }

    /// Whether any timer with this event tag is currently armed.
    pub fn is_armed(&self, event: E) -> bool
    where
        E: PartialEq,
    {
        self.slots
            .iter()
            .any(|s| s.map(|a| a.event == event).unwrap_or(false))
    }

    /// Take every slot whose deadline has passed as of `now`, sorted
    /// lowest-deadline-first.
    fn drain_due_timers(&mut self, now: Millis) -> heapless::Vec<(Millis, E), N> {
        let mut due = heapless::Vec::new();
        for slot in self.slots.iter_mut() {
            let deadline = slot.as_ref().map(|a| a.reference.wrapping_add(a.dt_ms));
            if deadline.map(|d| now.has_elapsed(d)).unwrap_or(false) {
                let a = slot.take().expect("just matched Some");
                let _ = due.push((a.reference.wrapping_add(a.dt_ms), a.event));
            }
        }
        due.sort_unstable_by(|a, b| a.0.signed_delta(b.0).cmp(&0));
        due
    }

    /// Advance the scheduler to `now`, disarming and returning every
    /// timer whose deadline has passed, lowest-deadline-first (spec.md
    /// §4.1). Does not touch the tasklet queue; see [`Self::run_once`]
    /// for draining both in one call.
    pub fn tick<const M: usize>(&mut self, now: Millis) -> heapless::Vec<E, M> {
        let due = self.drain_due_timers(now);
        let mut fired: heapless::Vec<E, M> = heapless::Vec::new();
        for (deadline, event) in due {
            if fired.push(event).is_err() {
                // Caller's output buffer is smaller than the number of
                // due events; re-arm the overflow so the next tick
                // delivers it instead of dropping it.
                let _ = self.arm(event, deadline, 0);
            }
        }
        fired
    }

    /// Run one iteration of the cooperative event loop: drain every
    /// timer whose deadline has passed, lowest-deadline-first, then
    /// drain the tasklet FIFO, calling `handler` for each event as it
    /// fires. A tasklet `handler` posts via [`Self::post`] while the
    /// tasklet queue is draining is still handled before this call
    /// returns, after every tasklet already queued when draining began
    /// — "a tasklet posted from within a tasklet runs in the same
    /// `run_once` call, after all currently-queued tasklets" (spec.md
    /// §4.1). A handler may also re-arm or post further work through
    /// the `&mut Self` it is given. Returns whether a timer is still
    /// armed, i.e. whether more work remains.
    pub fn run_once(&mut self, now: Millis, mut handler: impl FnMut(&mut Self, E)) -> bool {
        let due = self.drain_due_timers(now);
        for (_, event) in due {
            handler(self, event);
        }
        while let Some(event) = self.tasklets.pop_front() {
            handler(self, event);
        }
        self.slots.iter().any(|s| s.is_some())
    }

    /// Milliseconds from `now` until the next deadline, or `None` if no
    /// timer is armed. Saturates at zero for already-due timers.
    pub fn next_deadline(&self, now: Millis) -> Option<u32> {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .map(|a| {
                let elapsed = now.signed_delta(a.reference);
                let remaining = a.dt_ms as i32 - elapsed;
                if remaining < 0 {
                    0
                } else {
                    remaining as u32
                }
            })
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Ev {
        A,
        B,
    }

    #[test]
    fn fires_after_deadline() {
        let mut s: Scheduler<Ev, 4, 4> = Scheduler::new();
        assert!(s.arm(Ev::A, Millis::new(0), 100));
        let fired: heapless::Vec<Ev, 4> = s.tick(Millis::new(50));
        assert!(fired.is_empty());
        let fired: heapless::Vec<Ev, 4> = s.tick(Millis::new(100));
        assert_eq!(fired.as_slice(), &[Ev::A]);
    }

    #[test]
    fn tick_fires_lowest_deadline_first() {
        let mut s: Scheduler<Ev, 4, 4> = Scheduler::new();
        // A is armed first but has the later deadline; B must still
        // fire first.
        s.arm(Ev::A, Millis::new(0), 100);
        s.arm(Ev::B, Millis::new(0), 10);
        let fired: heapless::Vec<Ev, 4> = s.tick(Millis::new(200));
        assert_eq!(fired.as_slice(), &[Ev::B, Ev::A]);
    }

    #[test]
    fn survives_wraparound() {
        let mut s: Scheduler<Ev, 4, 4> = Scheduler::new();
        let near_wrap = Millis::new(u32::MAX - 10);
        assert!(s.arm(Ev::A, near_wrap, 20));
        // deadline = (MAX - 10) + 20, which wraps to 9 past zero.
        let fired: heapless::Vec<Ev, 4> = s.tick(Millis::new(5));
        assert!(fired.is_empty());
        let fired: heapless::Vec<Ev, 4> = s.tick(Millis::new(15));
        assert_eq!(fired.as_slice(), &[Ev::A]);
    }

    #[test]
    fn cancel_removes_timer() {
        let mut s: Scheduler<Ev, 4, 4> = Scheduler::new();
        s.arm(Ev::A, Millis::new(0), 10);
        s.arm(Ev::B, Millis::new(0), 10);
        s.cancel(Ev::A);
        let fired: heapless::Vec<Ev, 4> = s.tick(Millis::new(10));
        assert_eq!(fired.as_slice(), &[Ev::B]);
    }

    #[test]
    fn next_deadline_reports_minimum() {
        let mut s: Scheduler<Ev, 4, 4> = Scheduler::new();
        s.arm(Ev::A, Millis::new(0), 100);
        s.arm(Ev::B, Millis::new(0), 30);
        assert_eq!(s.next_deadline(Millis::new(0)), Some(30));
        assert_eq!(s.next_deadline(Millis::new(40)), Some(0));
    }

    #[test]
    fn run_once_drains_timers_then_tasklets() {
        let mut s: Scheduler<Ev, 4, 4> = Scheduler::new();
        s.arm(Ev::A, Millis::new(0), 10);
        s.post(Ev::B);
        let mut order: heapless::Vec<Ev, 4> = heapless::Vec::new();
        let more = s.run_once(Millis::new(10), |_sched, ev| {
            let _ = order.push(ev);
        });
        assert_eq!(order.as_slice(), &[Ev::A, Ev::B]);
        assert!(!more);
    }

    #[test]
    fn tasklet_posted_within_tasklet_runs_same_call() {
        let mut s: Scheduler<Ev, 4, 4> = Scheduler::new();
        s.post(Ev::A);
        let mut order: heapless::Vec<Ev, 4> = heapless::Vec::new();
        s.run_once(Millis::new(0), |sched, ev| {
            let _ = order.push(ev);
            if ev == Ev::A {
                sched.post(Ev::B);
            }
        });
        assert_eq!(order.as_slice(), &[Ev::A, Ev::B]);
    }
}
