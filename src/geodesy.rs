use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumIter;

pub const EARTH_RADIUS: f64 = 6371000.0; // unit: meter

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Great-circle distance in meters, haversine on a spherical earth.
    ///
    /// Inputs are degrees and are not validated. Out-of-range values produce
    /// mathematically defined but meaningless results.
    pub fn haversine_distance(&self, other: &Coordinate) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let delta_phi = (other.latitude - self.latitude).to_radians();
        let delta_lambda = (other.longitude - self.longitude).to_radians();

        let h = (delta_phi / 2.).sin().powi(2)
            + phi1.cos() * phi2.cos() * (delta_lambda / 2.).sin().powi(2);
        2. * EARTH_RADIUS * h.sqrt().atan2((1. - h).sqrt())
    }

    /// Initial bearing in degrees from `self` toward `other` along the
    /// great-circle path, clockwise from true north, in [0, 360).
    /// Equal points yield 0 (atan2(0, 0) convention).
    pub fn initial_bearing(&self, other: &Coordinate) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let delta_lambda = (other.longitude - self.longitude).to_radians();

        let y = delta_lambda.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
        (y.atan2(x).to_degrees() + 360.) % 360.
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, EnumIter, PartialEq, Eq, Hash)]
pub enum CompassDirection {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl CompassDirection {
    // declaration order is compass order, 22.5 degrees apart
    const ORDERED: [CompassDirection; 16] = [
        CompassDirection::N,
        CompassDirection::NNE,
        CompassDirection::NE,
        CompassDirection::ENE,
        CompassDirection::E,
        CompassDirection::ESE,
        CompassDirection::SE,
        CompassDirection::SSE,
        CompassDirection::S,
        CompassDirection::SSW,
        CompassDirection::SW,
        CompassDirection::WSW,
        CompassDirection::W,
        CompassDirection::WNW,
        CompassDirection::NW,
        CompassDirection::NNW,
    ];

    /// Nearest of the 16 compass points for a bearing in degrees.
    pub fn from_bearing(bearing_deg: f64) -> Self {
        // rounding near the top of the circle pushes the index to 16,
        // which has to wrap back around to N
        let index = ((bearing_deg / 22.5).round().rem_euclid(16.)) as usize;
        CompassDirection::ORDERED[index]
    }

    pub fn to_index(&self) -> usize {
        *self as usize
    }

    pub fn of_index(i: usize) -> Result<Self> {
        match CompassDirection::ORDERED.get(i) {
            Some(direction) => Ok(*direction),
            None => bail!("Invalid index for `CompassDirection` {}", i),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompassDirection::N => "N",
            CompassDirection::NNE => "NNE",
            CompassDirection::NE => "NE",
            CompassDirection::ENE => "ENE",
            CompassDirection::E => "E",
            CompassDirection::ESE => "ESE",
            CompassDirection::SE => "SE",
            CompassDirection::SSE => "SSE",
            CompassDirection::S => "S",
            CompassDirection::SSW => "SSW",
            CompassDirection::SW => "SW",
            CompassDirection::WSW => "WSW",
            CompassDirection::W => "W",
            CompassDirection::WNW => "WNW",
            CompassDirection::NW => "NW",
            CompassDirection::NNW => "NNW",
        }
    }
}

impl fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
