use anyhow::Result;

use crate::geodesy::Coordinate;

/// Message recorded when `is_available` reports false. Matches what the
/// display layer is expected to show for a host without a location service.
pub const CAPABILITY_UNAVAILABLE: &str = "location service is not available on this device";

/// One reading from the host's location service.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    pub timestamp_ms: Option<i64>,
    pub accuracy: Option<f32>,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        PositionFix {
            coordinate: Coordinate {
                latitude,
                longitude,
            },
            timestamp_ms: None,
            accuracy: None,
        }
    }
}

pub type FixCallback = Box<dyn FnOnce(Result<PositionFix>) + Send>;

/// The host platform's "get current position once" capability. Implementations
/// wrap whatever the host actually provides (browser geolocation, CoreLocation,
/// a GPS daemon); the tracker only ever talks to this trait so it can be tested
/// without a device.
///
/// `request_once` may deliver synchronously or from another thread, and the
/// delivery may arrive after the requesting session has been stopped or
/// restarted. The tracker guards against that with a generation check, so
/// implementations don't need to cancel in-flight requests.
pub trait LocationSource: Send {
    fn is_available(&self) -> bool;
    fn request_once(&mut self, deliver: FixCallback);
}
