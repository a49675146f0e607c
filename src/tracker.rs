use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use anyhow::Result;

use crate::geodesy::{CompassDirection, Coordinate};
use crate::location_source::{FixCallback, LocationSource, PositionFix, CAPABILITY_UNAVAILABLE};
use crate::scheduler::{Scheduler, TimerHandle};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_ARRIVAL_RADIUS_M: f64 = 10.0;

/// Invoked (with no arguments) when a reading lands inside the arrival
/// radius. Shared so it can be called outside the state lock.
pub type ArriveCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TrackerStatus {
    Idle,
    Polling,
    Completed,
    Stopped,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArrivalPolicy {
    /// The schedule keeps running after arrival and the callback fires again
    /// on every reading inside the radius. A reading back outside the radius
    /// returns the tracker to `Polling`.
    KeepPolling,
    /// The callback fires once and the schedule ends.
    StopTracking,
}

#[derive(Copy, Clone, Debug)]
pub struct TrackerConfig {
    pub arrival_radius_m: f64,
    pub arrival_policy: ArrivalPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            arrival_radius_m: DEFAULT_ARRIVAL_RADIUS_M,
            arrival_policy: ArrivalPolicy::KeepPolling,
        }
    }
}

/// State of one tracking session. Replaced as a whole on every read outcome,
/// never field by field, so the display layer can't observe a half-applied
/// update.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionState {
    pub position: Option<Coordinate>,
    pub distance_m: Option<f64>,
    /// Previous distance minus current distance. Positive means we got
    /// closer. 0 until there have been two successful readings.
    pub distance_delta_m: f64,
    pub bearing_deg: Option<f64>,
    pub error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

impl SessionState {
    fn fresh() -> Self {
        SessionState {
            position: None,
            distance_m: None,
            distance_delta_m: 0.,
            bearing_deg: None,
            error: None,
            last_update: None,
        }
    }
}

/// What the display layer renders from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackingSnapshot {
    pub status: TrackerStatus,
    pub session: SessionState,
}

impl TrackingSnapshot {
    /// The main panel text, e.g. `"55900.12 m NE (3.40 m)"`. None until the
    /// first successful reading.
    pub fn display_line(&self) -> Option<String> {
        let distance = self.session.distance_m?;
        let bearing = self.session.bearing_deg?;
        Some(format!(
            "{:.2} m {} ({:.2} m)",
            distance,
            CompassDirection::from_bearing(bearing),
            self.session.distance_delta_m
        ))
    }

    pub fn last_update_line(&self) -> Option<String> {
        self.session.last_update.map(|time| {
            format!(
                "Last updated: {}",
                time.with_timezone(&Local).format("%H:%M:%S")
            )
        })
    }
}

struct Inner {
    target: Option<Coordinate>,
    config: TrackerConfig,
    status: TrackerStatus,
    session: SessionState,
    // bumped on every start/stop; async deliveries carrying an older value
    // are dropped
    generation: u64,
    on_arrive: Option<ArriveCallback>,
}

/// The polling lifecycle: owns the timer, feeds position readings through the
/// geodesy math, and keeps the current `SessionState`.
pub struct DistanceTracker {
    inner: Arc<Mutex<Inner>>,
    source: Arc<Mutex<dyn LocationSource>>,
    scheduler: Box<dyn Scheduler>,
    timer: Option<TimerHandle>,
}

impl DistanceTracker {
    pub fn new(
        config: TrackerConfig,
        source: Arc<Mutex<dyn LocationSource>>,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        DistanceTracker {
            inner: Arc::new(Mutex::new(Inner {
                target: None,
                config,
                status: TrackerStatus::Idle,
                session: SessionState::fresh(),
                generation: 0,
                on_arrive: None,
            })),
            source,
            scheduler,
            timer: None,
        }
    }

    /// Begins (or restarts) a tracking session. The previous schedule, if
    /// any, is cancelled first so there is never more than one live timer.
    /// The first read happens right away; the schedule only covers the
    /// subsequent ones.
    pub fn start(&mut self, target: Coordinate, interval: Duration, on_arrive: ArriveCallback) {
        self.cancel_timer();

        let available = self.source.lock().unwrap().is_available();
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.generation += 1;
            inner.target = Some(target);
            inner.session = SessionState::fresh();
            if !available {
                warn!("location source unavailable, nothing to schedule");
                inner.session.error = Some(CAPABILITY_UNAVAILABLE.to_string());
                inner.status = TrackerStatus::Idle;
                inner.on_arrive = None;
                return;
            }
            inner.status = TrackerStatus::Polling;
            inner.on_arrive = Some(on_arrive);
            inner.generation
        };

        info!(
            "tracking started: target=({}, {}), interval={:?}",
            target.latitude, target.longitude, interval
        );

        // the immediate read may already end the session (one-shot arrival,
        // or a stop() from inside the callback); only schedule if it didn't
        if poll_once(&self.inner, &self.source, generation) {
            let inner = Arc::clone(&self.inner);
            let source = Arc::clone(&self.source);
            self.timer = Some(self.scheduler.schedule_repeating(
                interval,
                Box::new(move || poll_once(&inner, &source, generation)),
            ));
        }
    }

    /// Ends the session and cancels the schedule. Idempotent; calling it
    /// when nothing is running is a no-op.
    pub fn stop(&mut self) {
        self.cancel_timer();
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        inner.on_arrive = None;
        match inner.status {
            TrackerStatus::Polling | TrackerStatus::Completed => {
                inner.status = TrackerStatus::Stopped;
                info!("tracking stopped");
            }
            TrackerStatus::Idle | TrackerStatus::Stopped => (),
        }
    }

    pub fn status(&self) -> TrackerStatus {
        self.inner.lock().unwrap().status
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        let inner = self.inner.lock().unwrap();
        TrackingSnapshot {
            status: inner.status,
            session: inner.session.clone(),
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            self.scheduler.cancel(handle);
        }
    }
}

impl Drop for DistanceTracker {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

// Whether readings should still be processed / the schedule kept alive.
fn session_live(inner: &Inner) -> bool {
    match inner.status {
        TrackerStatus::Polling => true,
        TrackerStatus::Completed => inner.config.arrival_policy == ArrivalPolicy::KeepPolling,
        TrackerStatus::Idle | TrackerStatus::Stopped => false,
    }
}

// Where a request's outcome stands relative to `request_once` itself: still
// inside the call, delivered during the call, or free to apply directly.
enum Delivery {
    InRequest,
    Deferred(Result<PositionFix>),
    Direct,
}

/// One scheduled (or immediate) read. Returns whether the schedule should
/// keep running.
fn poll_once(
    inner: &Arc<Mutex<Inner>>,
    source: &Arc<Mutex<dyn LocationSource>>,
    generation: u64,
) -> bool {
    {
        let inner = inner.lock().unwrap();
        if inner.generation != generation || !session_live(&inner) {
            return false;
        }
    }

    // A synchronously-delivering source would otherwise run the session
    // update, including the arrival callback, while the source lock is
    // still held. Deliveries landing inside `request_once` are parked and
    // applied once the guard is gone; later (asynchronous) ones apply
    // directly.
    let delivery = Arc::new(Mutex::new(Delivery::InRequest));
    let inner_for_delivery = Arc::clone(inner);
    let delivery_for_callback = Arc::clone(&delivery);
    let deliver: FixCallback = Box::new(move |outcome| {
        let mut delivery = delivery_for_callback.lock().unwrap();
        match &*delivery {
            Delivery::InRequest => *delivery = Delivery::Deferred(outcome),
            Delivery::Direct => {
                drop(delivery);
                apply_outcome(&inner_for_delivery, generation, outcome);
            }
            // a source may only deliver once per request
            Delivery::Deferred(_) => (),
        }
    });
    source.lock().unwrap().request_once(deliver);

    let deferred = {
        let mut delivery = delivery.lock().unwrap();
        match std::mem::replace(&mut *delivery, Delivery::Direct) {
            Delivery::Deferred(outcome) => Some(outcome),
            _ => None,
        }
    };
    if let Some(outcome) = deferred {
        apply_outcome(inner, generation, outcome);
    }

    // the delivery may have ended the session (one-shot arrival)
    let inner = inner.lock().unwrap();
    inner.generation == generation && session_live(&inner)
}

fn apply_outcome(inner: &Arc<Mutex<Inner>>, generation: u64, outcome: Result<PositionFix>) {
    match outcome {
        Ok(fix) => apply_fix(inner, generation, fix),
        Err(err) => apply_error(inner, generation, err.to_string()),
    }
}

fn apply_fix(inner: &Arc<Mutex<Inner>>, generation: u64, fix: PositionFix) {
    let on_arrive = {
        let mut inner = inner.lock().unwrap();
        if inner.generation != generation {
            debug!("discarding position fix from a stale session");
            return;
        }
        let target = match inner.target {
            Some(target) => target,
            None => return,
        };

        let position = fix.coordinate;
        let distance = position.haversine_distance(&target);
        let bearing = position.initial_bearing(&target);
        let delta = match inner.session.distance_m {
            Some(previous) => previous - distance,
            None => 0.,
        };
        let last_update = fix
            .timestamp_ms
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        inner.session = SessionState {
            position: Some(position),
            distance_m: Some(distance),
            distance_delta_m: delta,
            bearing_deg: Some(bearing),
            error: None,
            last_update: Some(last_update),
        };

        if distance < inner.config.arrival_radius_m {
            info!("arrived: {:.2} m from target", distance);
            inner.status = TrackerStatus::Completed;
            match inner.config.arrival_policy {
                ArrivalPolicy::KeepPolling => inner.on_arrive.clone(),
                // taking the callback keeps arrival one-shot even if another
                // reading lands before the schedule winds down
                ArrivalPolicy::StopTracking => inner.on_arrive.take(),
            }
        } else {
            if inner.status == TrackerStatus::Completed {
                inner.status = TrackerStatus::Polling;
            }
            None
        }
    };

    // run the callback without holding the state lock, it may well want to
    // look at the tracker
    if let Some(on_arrive) = on_arrive {
        on_arrive();
    }
}

fn apply_error(inner: &Arc<Mutex<Inner>>, generation: u64, message: String) {
    let mut inner = inner.lock().unwrap();
    if inner.generation != generation {
        debug!("discarding read error from a stale session");
        return;
    }
    warn!("position read failed: {}", message);
    // stale readings stay on display, only the error changes
    let mut session = inner.session.clone();
    session.error = Some(message);
    inner.session = session;
}
