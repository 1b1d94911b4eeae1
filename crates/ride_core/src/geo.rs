//! Geographic helpers: coordinates, random ring sampling, bearings and distances.
//!
//! This module provides:
//!
//! - **Coordinate**: plain lat/lng value type used everywhere in the crate
//! - **Annulus sampling**: random points between a minimum and maximum radius
//! - **Bearings**: forward azimuth normalized into `[0, 360)`
//! - **Distances**: Haversine great-circle distance in metres
//! - **BoundingBox**: lat/lng rectangles for viewport fitting
//!
//! Offsets use the small-angle approximation (1° latitude ≈ 111 km), which is
//! only accurate for displacements under about a kilometre.

use std::f64::consts::TAU;

use h3o::{CellIndex, LatLng, Resolution};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Metres per degree of latitude used by the small-angle offset approximation.
pub const METERS_PER_DEGREE_LAT: f64 = 111_000.0;

/// Mean earth radius used by [`distance_meters`].
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build a coordinate, rejecting values outside −90..90 / −180..180.
    pub fn validated(lat: f64, lng: f64) -> Result<Self, GeoError> {
        let in_range = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if in_range {
            Ok(Self { lat, lng })
        } else {
            Err(GeoError::OutOfRange { lat, lng })
        }
    }

    /// H3 cell containing this coordinate, or `None` for non-finite input.
    pub fn to_cell(self, resolution: Resolution) -> Option<CellIndex> {
        LatLng::new(self.lat, self.lng)
            .ok()
            .map(|ll| ll.to_cell(resolution))
    }
}

impl From<LatLng> for Coordinate {
    fn from(value: LatLng) -> Self {
        Self::new(value.lat(), value.lng())
    }
}

/// Move `origin` by the given east/north displacement in metres.
pub fn offset_by_meters(origin: Coordinate, east_m: f64, north_m: f64) -> Coordinate {
    let lat = origin.lat + north_m / METERS_PER_DEGREE_LAT;
    // Clamp so a fix at a pole cannot divide by zero.
    let lng_scale = origin.lat.to_radians().cos().abs().max(1e-9);
    let lng = origin.lng + east_m / (METERS_PER_DEGREE_LAT * lng_scale);
    Coordinate::new(lat, lng)
}

/// Pick a uniformly random point in the ring `[min_m, max_m]` around `center`.
///
/// Bearing is uniform in `[0, 2π)` and distance uniform in the radius band,
/// so points are denser near the inner edge than an area-uniform draw would be.
/// A reversed band is swapped rather than rejected.
pub fn sample_annulus_point<R: Rng + ?Sized>(
    rng: &mut R,
    center: Coordinate,
    min_m: f64,
    max_m: f64,
) -> Coordinate {
    let low = min_m.min(max_m).max(0.0);
    let high = min_m.max(max_m).max(0.0);
    let distance = if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    };
    let theta = rng.gen_range(0.0..TAU);
    offset_by_meters(center, distance * theta.cos(), distance * theta.sin())
}

/// Forward azimuth from `from` to `to` in degrees, normalized into `[0, 360)`.
///
/// Identical points (or non-finite input) yield `0.0` instead of NaN.
pub fn bearing_between(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();

    let bearing = y.atan2(x).to_degrees();
    if !bearing.is_finite() {
        return 0.0;
    }
    let normalized = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Haversine distance between two coordinates in metres.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Axis-aligned lat/lng rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            lat_min: first.lat,
            lat_max: first.lat,
            lng_min: first.lng,
            lng_max: first.lng,
        };
        for point in iter {
            bounds.lat_min = bounds.lat_min.min(point.lat);
            bounds.lat_max = bounds.lat_max.max(point.lat);
            bounds.lng_min = bounds.lng_min.min(point.lng);
            bounds.lng_max = bounds.lng_max.max(point.lng);
        }
        Some(bounds)
    }

    /// Square-ish region of `span_m` metres centred on `center`.
    pub fn around(center: Coordinate, span_m: f64) -> Self {
        let half = span_m.abs() * 0.5;
        let south_west = offset_by_meters(center, -half, -half);
        let north_east = offset_by_meters(center, half, half);
        Self {
            lat_min: south_west.lat,
            lat_max: north_east.lat,
            lng_min: south_west.lng,
            lng_max: north_east.lng,
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            lat_min: self.lat_min.min(other.lat_min),
            lat_max: self.lat_max.max(other.lat_max),
            lng_min: self.lng_min.min(other.lng_min),
            lng_max: self.lng_max.max(other.lng_max),
        }
    }

    /// Push every edge outward by `fraction` of the span in that dimension.
    pub fn inflate(&self, fraction: f64) -> Self {
        let dlat = self.lat_span() * fraction;
        let dlng = self.lng_span() * fraction;
        Self {
            lat_min: self.lat_min - dlat,
            lat_max: self.lat_max + dlat,
            lng_min: self.lng_min - dlng,
            lng_max: self.lng_max + dlng,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lng_span(&self) -> f64 {
        self.lng_max - self.lng_min
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.lat_min + self.lat_max) * 0.5,
            (self.lng_min + self.lng_max) * 0.5,
        )
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lng >= self.lng_min
            && point.lng <= self.lng_max
    }
}
