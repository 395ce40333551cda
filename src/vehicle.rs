// Vehicle registry and eligibility
//
// One Vehicle per registered identity (phone number), owned by the
// VehicleRegistry. The registry is plain data; the coordinator holds it
// behind a lock and serializes mutation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Vehicle category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Bike,
    #[default]
    Car,
    Auto,
    Truck,
    Bus,
}

/// A single reported position sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fix {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Server receipt time (Unix seconds)
    pub timestamp: f64,
    /// Reported GPS accuracy in meters
    pub accuracy: Option<f64>,
    /// Reported ground speed in m/s
    pub speed: Option<f64>,
    /// Heading in degrees clockwise from North, [0, 360)
    pub heading: Option<f64>,
    /// Position came from the GPS simulation feature
    pub simulated: bool,
}

/// One monitored vehicle
#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    /// Unique, immutable identity
    pub phone_number: String,
    /// Display label (registration plate analog)
    pub vehicle_id: String,
    pub full_name: String,
    pub vehicle_type: VehicleType,
    /// Registration time (Unix seconds)
    pub registered_at: f64,
    /// Most recent fix; None means "no fix" and excludes the vehicle
    /// from all proximity math
    pub fix: Option<Fix>,
    /// Soft-delete flag; removed vehicles stay in the map with active=false
    pub active: bool,
    /// In-motion flag; stopped vehicles are exempt from proximity checks
    pub driving: bool,
    pub tracking_enabled: bool,
}

impl Vehicle {
    pub fn new(
        phone_number: String,
        vehicle_id: String,
        full_name: String,
        vehicle_type: VehicleType,
        now: f64,
    ) -> Self {
        Vehicle {
            phone_number,
            vehicle_id,
            full_name,
            vehicle_type,
            registered_at: now,
            fix: None,
            active: true,
            driving: true,
            tracking_enabled: false,
        }
    }

    /// Is this vehicle eligible as the subject of an evaluation cycle?
    pub fn eligible_subject(&self) -> bool {
        self.tracking_enabled && self.driving && self.fix.is_some()
    }

    /// Is this vehicle eligible as a peer against the given subject?
    pub fn eligible_peer(&self, subject_id: &str) -> bool {
        self.active
            && self.driving
            && self.tracking_enabled
            && self.fix.is_some()
            && self.phone_number != subject_id
    }
}

impl PartialOrd for Vehicle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Vehicle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.phone_number.cmp(&other.phone_number)
    }
}

impl PartialEq for Vehicle {
    fn eq(&self, other: &Self) -> bool {
        self.phone_number == other.phone_number
    }
}

impl Eq for Vehicle {}

/// Why a position update was dropped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    #[error("unknown vehicle {0}")]
    UnknownVehicle(String),
    #[error("tracking disabled for {0}")]
    TrackingDisabled(String),
}

/// All registered vehicles, keyed by identity
pub struct VehicleRegistry {
    vehicles: HashMap<String, Vehicle>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        VehicleRegistry {
            vehicles: HashMap::new(),
        }
    }

    /// Register a vehicle, or reactivate an existing registration.
    ///
    /// Re-registration keeps the stored profile and position but resets
    /// tracking to disabled; the client must opt back in.
    pub fn register(
        &mut self,
        phone_number: &str,
        vehicle_id: String,
        full_name: String,
        vehicle_type: VehicleType,
        now: f64,
    ) -> &Vehicle {
        match self.vehicles.entry(phone_number.to_string()) {
            std::collections::hash_map::Entry::Occupied(e) => {
                let v = e.into_mut();
                v.active = true;
                v.tracking_enabled = false;
                v
            }
            std::collections::hash_map::Entry::Vacant(e) => e.insert(Vehicle::new(
                phone_number.to_string(),
                vehicle_id,
                full_name,
                vehicle_type,
                now,
            )),
        }
    }

    /// Soft-delete: flips active=false. Returns false for unknown ids.
    pub fn deactivate(&mut self, phone_number: &str) -> bool {
        match self.vehicles.get_mut(phone_number) {
            Some(v) => {
                v.active = false;
                true
            }
            None => false,
        }
    }

    pub fn set_driving(&mut self, phone_number: &str, driving: bool) -> bool {
        match self.vehicles.get_mut(phone_number) {
            Some(v) => {
                v.driving = driving;
                true
            }
            None => false,
        }
    }

    pub fn set_tracking_enabled(&mut self, phone_number: &str, enabled: bool) -> bool {
        match self.vehicles.get_mut(phone_number) {
            Some(v) => {
                v.tracking_enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Apply a position report.
    ///
    /// Updates are dropped for unknown identities and for vehicles with
    /// tracking disabled. A report missing latitude or longitude clears
    /// the stored fix. Headings are normalized into [0, 360).
    #[allow(clippy::too_many_arguments)]
    pub fn update_position(
        &mut self,
        phone_number: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        accuracy: Option<f64>,
        speed: Option<f64>,
        heading: Option<f64>,
        simulated: bool,
        now: f64,
    ) -> Result<&Vehicle, UpdateError> {
        let vehicle = self
            .vehicles
            .get_mut(phone_number)
            .ok_or_else(|| UpdateError::UnknownVehicle(phone_number.to_string()))?;

        if !vehicle.tracking_enabled {
            return Err(UpdateError::TrackingDisabled(phone_number.to_string()));
        }

        vehicle.fix = match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some(Fix {
                latitude: lat,
                longitude: lon,
                timestamp: now,
                accuracy,
                speed,
                heading: heading.map(|h| h.rem_euclid(360.0)),
                simulated,
            }),
            _ => None,
        };

        Ok(vehicle)
    }

    pub fn get(&self, phone_number: &str) -> Option<&Vehicle> {
        self.vehicles.get(phone_number)
    }

    /// Snapshot of active vehicles, sorted by identity for stable output
    pub fn active_vehicles(&self) -> Vec<&Vehicle> {
        let mut out: Vec<&Vehicle> = self.vehicles.values().filter(|v| v.active).collect();
        out.sort();
        out
    }

    /// Vehicles with tracking enabled and a fix, most recent fix first
    pub fn tracked_with_fix(&self) -> Vec<&Vehicle> {
        let mut out: Vec<&Vehicle> = self
            .vehicles
            .values()
            .filter(|v| v.tracking_enabled && v.fix.is_some())
            .collect();
        out.sort_by(|a, b| {
            let ta = a.fix.as_ref().map(|f| f.timestamp).unwrap_or(0.0);
            let tb = b.fix.as_ref().map(|f| f.timestamp).unwrap_or(0.0);
            tb.partial_cmp(&ta).unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    /// The peer set for one subject: every other eligible vehicle
    pub fn peers_for(&self, subject_id: &str) -> Vec<&Vehicle> {
        let mut out: Vec<&Vehicle> = self
            .vehicles
            .values()
            .filter(|v| v.eligible_peer(subject_id))
            .collect();
        out.sort();
        out
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }
}

impl Default for VehicleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
