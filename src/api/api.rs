use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::geodesy::Coordinate;
use crate::location_source::LocationSource;
use crate::logs;
use crate::scheduler::ThreadScheduler;
use crate::tracker::{
    ArriveCallback, DistanceTracker, TrackerConfig, TrackingSnapshot, DEFAULT_UPDATE_INTERVAL,
};

struct MainState {
    tracker: Mutex<DistanceTracker>,
}

static MAIN_STATE: OnceLock<MainState> = OnceLock::new();

/// Sets up logging and the tracker. The location source comes from the
/// embedder since only the host app knows how to reach the platform's
/// location service.
pub fn init(
    config: TrackerConfig,
    source: Arc<Mutex<dyn LocationSource>>,
    log_file: Option<&Path>,
) {
    let mut already_initialized = true;
    MAIN_STATE.get_or_init(|| {
        already_initialized = false;
        if let Some(log_file) = log_file {
            logs::init(log_file).expect("Failed to initialize logging");
        }
        info!("initialized");
        MainState {
            tracker: Mutex::new(DistanceTracker::new(
                config,
                source,
                Box::new(ThreadScheduler::new()),
            )),
        }
    });
    if already_initialized {
        warn!("`init` is called multiple times");
    }
}

fn get() -> &'static MainState {
    MAIN_STATE.get().expect("main state is not initialized")
}

pub fn start_tracking(
    target_lat: f64,
    target_lon: f64,
    interval_s: Option<f64>,
    on_arrive: ArriveCallback,
) {
    let interval = interval_s
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_UPDATE_INTERVAL);
    get().tracker.lock().unwrap().start(
        Coordinate {
            latitude: target_lat,
            longitude: target_lon,
        },
        interval,
        on_arrive,
    );
}

pub fn stop_tracking() {
    get().tracker.lock().unwrap().stop();
}

pub fn current_snapshot() -> TrackingSnapshot {
    get().tracker.lock().unwrap().snapshot()
}

/// The main panel text for the display layer, None until the first
/// successful reading.
pub fn display_line() -> Option<String> {
    current_snapshot().display_line()
}
