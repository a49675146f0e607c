use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use distance_tracker_core::location_source::{FixCallback, LocationSource, PositionFix};
use distance_tracker_core::scheduler::{Scheduler, TickFn, TimerHandle};

/// Scripted location source. Each request consumes the next outcome in
/// order; `hold_next` keeps one delivery back so a test can replay it after
/// the session is stopped or restarted.
pub struct MockLocationSource {
    available: bool,
    outcomes: VecDeque<Result<PositionFix>>,
    hold_next: bool,
    held: Option<(FixCallback, Result<PositionFix>)>,
    pub requests: usize,
}

impl MockLocationSource {
    pub fn new() -> Arc<Mutex<MockLocationSource>> {
        Arc::new(Mutex::new(MockLocationSource {
            available: true,
            outcomes: VecDeque::new(),
            hold_next: false,
            held: None,
            requests: 0,
        }))
    }

    pub fn unavailable() -> Arc<Mutex<MockLocationSource>> {
        let source = MockLocationSource::new();
        source.lock().unwrap().available = false;
        source
    }

    pub fn push_fix(&mut self, latitude: f64, longitude: f64) {
        self.outcomes.push_back(Ok(PositionFix::new(latitude, longitude)));
    }

    pub fn push_error(&mut self, message: &str) {
        self.outcomes.push_back(Err(anyhow::anyhow!("{}", message)));
    }

    pub fn hold_next(&mut self) {
        self.hold_next = true;
    }
}

impl LocationSource for MockLocationSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn request_once(&mut self, deliver: FixCallback) {
        self.requests += 1;
        let outcome = self
            .outcomes
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted outcome")));
        if self.hold_next {
            self.hold_next = false;
            self.held = Some((deliver, outcome));
        } else {
            deliver(outcome);
        }
    }
}

/// Delivers a held request's outcome, as the platform would for a request
/// that was still in flight when the session went away.
pub fn deliver_held(source: &Arc<Mutex<MockLocationSource>>) {
    let held = source.lock().unwrap().held.take();
    let (deliver, outcome) = held.expect("no held delivery");
    deliver(outcome);
}

struct ManualSchedulerState {
    next_id: u64,
    schedules: HashMap<TimerHandle, TickFn>,
    intervals: HashMap<TimerHandle, Duration>,
    // cancellations arriving while a tick is being fired
    cancelled: HashSet<TimerHandle>,
}

/// Scheduler fired by hand from the test. Cloning shares the underlying
/// state, so the test keeps one clone and hands the other to the tracker.
#[derive(Clone)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualSchedulerState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        ManualScheduler {
            state: Arc::new(Mutex::new(ManualSchedulerState {
                next_id: 0,
                schedules: HashMap::new(),
                intervals: HashMap::new(),
                cancelled: HashSet::new(),
            })),
        }
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().unwrap().schedules.len()
    }

    pub fn intervals(&self) -> Vec<Duration> {
        self.state.lock().unwrap().intervals.values().copied().collect()
    }

    /// Fires every live schedule once, dropping those whose tick asks to
    /// stop. Ticks run without the state lock held so they are free to
    /// schedule or cancel.
    pub fn fire_all(&self) {
        let taken: Vec<(TimerHandle, TickFn)> = {
            let mut state = self.state.lock().unwrap();
            std::mem::take(&mut state.schedules).into_iter().collect()
        };
        let mut keep = Vec::new();
        let mut ended = Vec::new();
        for (handle, mut tick) in taken {
            if tick() {
                keep.push((handle, tick));
            } else {
                ended.push(handle);
            }
        }
        let mut state = self.state.lock().unwrap();
        for handle in ended {
            state.intervals.remove(&handle);
        }
        for (handle, tick) in keep {
            if !state.cancelled.remove(&handle) {
                state.schedules.insert(handle, tick);
            } else {
                state.intervals.remove(&handle);
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&mut self, interval: Duration, tick: TickFn) -> TimerHandle {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let handle = TimerHandle::new(state.next_id);
        state.schedules.insert(handle, tick);
        state.intervals.insert(handle, interval);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut state = self.state.lock().unwrap();
        state.intervals.remove(&handle);
        if state.schedules.remove(&handle).is_none() {
            state.cancelled.insert(handle);
        }
    }
}
