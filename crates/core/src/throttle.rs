//! Leading/trailing rate limiter.
//!
//! The limiter does not own a callback. [`RateLimiter::call`] takes the
//! arguments the wrapped function would receive and returns them back when
//! the call should run *now*; a deferred call is parked behind a host timer
//! and handed back from [`RateLimiter::on_timer`] when it expires. Only one
//! trailing call is ever pending and it carries the most recent arguments.

use crate::host::{TimerEvent, TimerId, Timers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOptions {
    /// Fire on the first call of a window.
    pub leading: bool,
    /// Fire once at the end of a window that absorbed calls.
    pub trailing: bool,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            leading: true,
            trailing: true,
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter<A> {
    interval_ms: f64,
    options: RateLimitOptions,
    previous: Option<f64>,
    trailing: Option<TimerId>,
    pending_args: Option<A>,
}

impl<A> RateLimiter<A> {
    pub fn new(interval_ms: u32, options: RateLimitOptions) -> Self {
        Self {
            interval_ms: f64::from(interval_ms),
            options,
            previous: None,
            trailing: None,
            pending_args: None,
        }
    }

    /// Offer a call. Returns `Some(args)` when it should run immediately.
    ///
    /// `event` is what the host delivers if a trailing timer gets scheduled.
    pub fn call<T: Timers>(&mut self, timers: &mut T, event: TimerEvent, args: A) -> Option<A> {
        let now = timers.now_ms();
        if self.previous.is_none() && !self.options.leading {
            self.previous = Some(now);
        }

        let remaining = match self.previous {
            Some(previous) => self.interval_ms - (now - previous),
            None => 0.0,
        };

        // `remaining > interval` means the clock went backwards.
        if remaining <= 0.0 || remaining > self.interval_ms {
            if let Some(timer) = self.trailing.take() {
                timers.clear_timeout(timer);
            }
            self.pending_args = None;
            self.previous = Some(now);
            return Some(args);
        }

        if self.trailing.is_some() {
            self.pending_args = Some(args);
        } else if self.options.trailing {
            let delay = remaining.ceil() as u32;
            self.trailing = Some(timers.set_timeout(delay, event));
            self.pending_args = Some(args);
        }
        None
    }

    /// The trailing timer fired. Returns the arguments to run with.
    pub fn on_timer<T: Timers>(&mut self, timers: &T) -> Option<A> {
        self.trailing.take()?;
        self.previous = if self.options.leading {
            Some(timers.now_ms())
        } else {
            None
        };
        self.pending_args.take()
    }

    /// Drop any pending trailing call.
    pub fn cancel<T: Timers>(&mut self, timers: &mut T) {
        if let Some(timer) = self.trailing.take() {
            timers.clear_timeout(timer);
        }
        self.pending_args = None;
    }

    pub fn has_pending(&self) -> bool {
        self.trailing.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TimerKind;
    use crate::sim::ManualHost;

    fn trailing_event() -> TimerEvent {
        TimerEvent {
            element: "el".into(),
            generation: 1,
            kind: TimerKind::SampleTrailing,
        }
    }

    /// Drive the limiter through a list of `(at_ms, arg)` calls, returning
    /// `(fired_at_ms, arg)` for every execution, trailing ones included.
    fn run(options: RateLimitOptions, interval: u32, calls: &[(f64, u32)], until: f64) -> Vec<(f64, u32)> {
        let mut host = ManualHost::default();
        let mut limiter = RateLimiter::new(interval, options);
        let mut fired = Vec::new();

        for &(at, arg) in calls {
            while let Some(_event) = host.pop_due(at) {
                if let Some(arg) = limiter.on_timer(&host) {
                    fired.push((host.now_ms(), arg));
                }
            }
            host.set_now(at);
            if let Some(arg) = limiter.call(&mut host, trailing_event(), arg) {
                fired.push((at, arg));
            }
        }
        while let Some(_event) = host.pop_due(until) {
            if let Some(arg) = limiter.on_timer(&host) {
                fired.push((host.now_ms(), arg));
            }
        }
        fired
    }

    #[test]
    fn first_call_fires_immediately() {
        let fired = run(RateLimitOptions::default(), 40, &[(0.0, 1)], 100.0);
        assert_eq!(fired, vec![(0.0, 1)]);
    }

    #[test]
    fn burst_collapses_to_leading_and_trailing() {
        let calls: Vec<(f64, u32)> = (0..10).map(|i| (f64::from(i) * 3.0, i)).collect();
        let fired = run(RateLimitOptions::default(), 40, &calls, 200.0);
        // Leading call at t=0, trailing at the end of the window with the
        // arguments of the last absorbed call.
        assert_eq!(fired, vec![(0.0, 0), (40.0, 9)]);
    }

    #[test]
    fn spaced_calls_each_fire() {
        let fired = run(
            RateLimitOptions::default(),
            40,
            &[(0.0, 1), (50.0, 2), (100.0, 3)],
            200.0,
        );
        assert_eq!(fired, vec![(0.0, 1), (50.0, 2), (100.0, 3)]);
    }

    #[test]
    fn no_trailing_drops_absorbed_calls() {
        let options = RateLimitOptions {
            leading: true,
            trailing: false,
        };
        let fired = run(options, 40, &[(0.0, 1), (10.0, 2), (20.0, 3)], 200.0);
        assert_eq!(fired, vec![(0.0, 1)]);
    }

    #[test]
    fn no_leading_defers_first_call() {
        let options = RateLimitOptions {
            leading: false,
            trailing: true,
        };
        let fired = run(options, 40, &[(0.0, 1), (10.0, 2)], 200.0);
        assert_eq!(fired, vec![(40.0, 2)]);
    }

    #[test]
    fn call_after_window_cancels_stale_trailing_timer() {
        let mut host = ManualHost::default();
        let mut limiter = RateLimiter::new(40, RateLimitOptions::default());
        assert_eq!(limiter.call(&mut host, trailing_event(), 1), Some(1));
        host.set_now(10.0);
        assert_eq!(limiter.call(&mut host, trailing_event(), 2), None);
        assert!(limiter.has_pending());
        assert_eq!(host.pending_timers(), 1);

        // The host was busy and delivers the next call late, before the timer.
        host.set_now(45.0);
        assert_eq!(limiter.call(&mut host, trailing_event(), 3), Some(3));
        assert!(!limiter.has_pending());
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn cancel_clears_pending_call() {
        let mut host = ManualHost::default();
        let mut limiter = RateLimiter::new(40, RateLimitOptions::default());
        assert_eq!(limiter.call(&mut host, trailing_event(), 1), Some(1));
        host.set_now(5.0);
        assert_eq!(limiter.call(&mut host, trailing_event(), 2), None);
        assert!(limiter.has_pending());
        limiter.cancel(&mut host);
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(limiter.on_timer(&host), None);
    }

    #[test]
    fn limiters_are_independent() {
        let mut host = ManualHost::default();
        let mut a = RateLimiter::new(40, RateLimitOptions::default());
        let mut b = RateLimiter::new(40, RateLimitOptions::default());
        assert_eq!(a.call(&mut host, trailing_event(), 1), Some(1));
        assert_eq!(b.call(&mut host, trailing_event(), 2), Some(2));
    }
}
