use std::collections::HashMap;

use childtrack_core::{TimerEvent, TimerId};

struct Pending<C> {
    handle: i32,
    event: TimerEvent,
    /// Kept alive until the timer fires or is cleared.
    _callback: C,
}

/// Scheduled `setTimeout` callbacks, keyed by the [`TimerId`] handed to the
/// core. Each entry owns its callback, so cancelling or firing a timer frees
/// it.
pub(crate) struct TimerTable<C> {
    next_key: u64,
    pending: HashMap<u64, Pending<C>>,
}

impl<C> TimerTable<C> {
    pub(crate) fn new() -> Self {
        Self {
            next_key: 1,
            pending: HashMap::new(),
        }
    }

    /// Key for the next timer. The callback is built around it before the
    /// browser hands out a handle.
    pub(crate) fn reserve(&mut self) -> TimerId {
        let key = self.next_key;
        self.next_key += 1;
        TimerId::new(key)
    }

    pub(crate) fn insert(&mut self, id: TimerId, handle: i32, event: TimerEvent, callback: C) {
        self.pending.insert(
            id.raw(),
            Pending {
                handle,
                event,
                _callback: callback,
            },
        );
    }

    /// Forget a cancelled timer; returns the browser handle to clear.
    pub(crate) fn cancel(&mut self, id: TimerId) -> Option<i32> {
        self.pending.remove(&id.raw()).map(|pending| pending.handle)
    }

    /// Forget a timer that just ran; returns the event to deliver.
    pub(crate) fn fire(&mut self, id: TimerId) -> Option<TimerEvent> {
        self.pending.remove(&id.raw()).map(|pending| pending.event)
    }

    /// Remove everything, returning the browser handles still scheduled.
    pub(crate) fn drain_handles(&mut self) -> Vec<i32> {
        self.pending.drain().map(|(_, pending)| pending.handle).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
