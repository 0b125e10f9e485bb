//! Great-circle distance and proximity queries over located records.

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        let in_range = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !in_range {
            return Err(AppError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Builds a point without range checks, for values already validated upstream.
    pub const fn unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A record that may carry a coordinate pair.
pub trait Located {
    fn location(&self) -> Option<GeoPoint>;
}

impl Located for GeoPoint {
    fn location(&self) -> Option<GeoPoint> {
        Some(*self)
    }
}

impl Located for Option<GeoPoint> {
    fn location(&self) -> Option<GeoPoint> {
        *self
    }
}

impl<T: Located + ?Sized> Located for &T {
    fn location(&self) -> Option<GeoPoint> {
        (**self).location()
    }
}

/// Haversine distance in kilometres.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // clamp guards sqrt(1 - h) against rounding just above 1 for antipodes
    let h = h.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

pub fn find_within_radius<'a, T: Located>(
    center: GeoPoint,
    radius_km: f64,
    candidates: &'a [T],
) -> Vec<&'a T> {
    candidates
        .iter()
        .filter(|candidate| {
            candidate
                .location()
                .map(|point| distance_km(center, point) <= radius_km)
                .unwrap_or(false)
        })
        .collect()
}

/// Returns the closest located candidate; the earliest one wins ties.
pub fn find_nearest<T: Located>(point: GeoPoint, candidates: &[T]) -> Option<&T> {
    let mut best: Option<(&T, f64)> = None;
    for candidate in candidates {
        let Some(location) = candidate.location() else {
            continue;
        };
        let distance = distance_km(point, location);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[derive(Debug, Clone, Copy)]
pub struct Nearby<R> {
    pub record: R,
    pub distance_km: f64,
}

impl<R> Nearby<R> {
    pub fn display_distance_km(&self) -> f64 {
        round_km(self.distance_km)
    }
}

/// Candidates within `radius_km`, closest first. Distances stay unrounded.
pub fn nearby_sorted<'a, T: Located>(
    center: GeoPoint,
    radius_km: f64,
    candidates: &'a [T],
) -> Vec<Nearby<&'a T>> {
    let mut hits: Vec<Nearby<&'a T>> = candidates
        .iter()
        .filter_map(|candidate| {
            let distance = distance_km(center, candidate.location()?);
            (distance <= radius_km).then_some(Nearby {
                record: candidate,
                distance_km: distance,
            })
        })
        .collect();
    hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    hits
}

pub fn round_km(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
