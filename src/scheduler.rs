use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub type TickFn = Box<dyn FnMut() -> bool + Send>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn new(id: u64) -> Self {
        TimerHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Repeating-timer capability. The tracker owns exactly one schedule per
/// session and cancels it on stop/restart, so implementations only need
/// fire-and-forget repetition.
///
/// `tick` returning false ends the schedule from the inside. This is how a
/// session can tear its own timer down (e.g. one-shot arrival) without
/// re-entering the scheduler while a tick is running.
pub trait Scheduler: Send {
    fn schedule_repeating(&mut self, interval: Duration, tick: TickFn) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

/// Production scheduler: one thread per schedule, blocking on a stop channel
/// with a timeout. Cancelling drops the sender, which wakes the thread.
pub struct ThreadScheduler {
    next_id: u64,
    stoppers: HashMap<TimerHandle, mpsc::Sender<()>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        ThreadScheduler {
            next_id: 0,
            stoppers: HashMap::new(),
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_repeating(&mut self, interval: Duration, mut tick: TickFn) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if !tick() {
                            break;
                        }
                    }
                    // explicit cancel, or the whole scheduler was dropped
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("timer thread for {:?} exited", handle);
        });
        self.stoppers.insert(handle, stop_tx);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if self.stoppers.remove(&handle).is_none() {
            debug!("cancel for unknown timer {:?}", handle);
        }
    }
}
