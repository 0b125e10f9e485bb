use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::distance::{distance_km, nearby_sorted, GeoPoint, Located, Nearby};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    HealthUnit,
    Ngo,
    SocialEquipment,
}

impl FacilityKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            FacilityKind::HealthUnit => "health_unit",
            FacilityKind::Ngo => "ngo",
            FacilityKind::SocialEquipment => "social_equipment",
        }
    }

    /// Accepts the canonical tags and the common Portuguese abbreviations.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "health_unit" | "ubs" => Some(FacilityKind::HealthUnit),
            "ngo" | "ong" => Some(FacilityKind::Ngo),
            "social_equipment" | "equipamento_social" => Some(FacilityKind::SocialEquipment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub kind: FacilityKind,
    pub address: Option<Address>,
    pub coordinates: Option<GeoPoint>,
}

impl Located for Facility {
    fn location(&self) -> Option<GeoPoint> {
        self.coordinates
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub address: Option<Address>,
    pub coordinates: Option<GeoPoint>,
}

impl Located for Patient {
    fn location(&self) -> Option<GeoPoint> {
        self.coordinates
    }
}

/// Closest located health unit to the patient, if both have coordinates.
pub fn nearest_health_unit<'a>(
    patient: &Patient,
    facilities: &'a [Facility],
) -> Option<Nearby<&'a Facility>> {
    let origin = patient.location()?;
    let mut best: Option<Nearby<&'a Facility>> = None;
    for facility in facilities
        .iter()
        .filter(|facility| facility.kind == FacilityKind::HealthUnit)
    {
        let Some(location) = facility.location() else {
            continue;
        };
        let distance = distance_km(origin, location);
        if best.map_or(true, |current| distance < current.distance_km) {
            best = Some(Nearby {
                record: facility,
                distance_km: distance,
            });
        }
    }
    best
}

/// Facilities within `radius_km`, closest first, optionally of a single kind.
pub fn facilities_near<'a>(
    point: GeoPoint,
    radius_km: f64,
    kind: Option<FacilityKind>,
    facilities: &'a [Facility],
) -> Vec<Nearby<&'a Facility>> {
    nearby_sorted(point, radius_km, facilities)
        .into_iter()
        .filter(|hit| kind.map_or(true, |kind| hit.record.kind == kind))
        .collect()
}
