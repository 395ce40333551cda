// Proximity evaluation and alert aggregation
//
// One evaluation cycle: take the subject vehicle that just reported a
// position, measure it against every eligible peer, and fold the
// results into at most one combined alert for the subject.

use serde::Serialize;

use crate::direction::{self, Direction};
use crate::geomath;
use crate::movement::{Movement, MovementTracker, PairKey};
use crate::vehicle::{Fix, Vehicle, VehicleType};

/// Default collision threshold in meters
pub const DEFAULT_COLLISION_M: f64 = 3.0;

/// Default warning threshold in meters
pub const DEFAULT_WARNING_M: f64 = 5.0;

/// Distance thresholds for alert classification
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub collision_m: f64,
    pub warning_m: f64,
}

impl Thresholds {
    pub fn new(collision_m: f64, warning_m: f64) -> Self {
        Thresholds {
            collision_m,
            warning_m,
        }
    }

    /// Thresholds must be positive and collision strictly below warning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collision_m <= 0.0
            || !self.collision_m.is_finite()
            || !self.warning_m.is_finite()
            || self.collision_m >= self.warning_m
        {
            return Err(ConfigError::InvalidThresholds {
                collision: self.collision_m,
                warning: self.warning_m,
            });
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            collision_m: DEFAULT_COLLISION_M,
            warning_m: DEFAULT_WARNING_M,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("collision threshold {collision} m must be positive and below warning threshold {warning} m")]
    InvalidThresholds { collision: f64, warning: f64 },
}

/// Alert severity; COLLISION whenever any peer is inside the collision
/// threshold, WARNING otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Collision,
    Warning,
}

/// One nearby peer as reported inside an alert
#[derive(Debug, Clone, Serialize)]
pub struct PeerReport {
    pub phone_number: String,
    pub vehicle_id: String,
    pub full_name: String,
    pub vehicle_type: VehicleType,
    /// Distance to the subject in meters
    pub distance: f64,
    /// Absolute bearing from the subject, None when co-located
    pub bearing: Option<f64>,
    pub direction: Direction,
    pub movement: Movement,
    /// The peer's current fix, for map display
    pub location: Fix,
}

/// Combined alert delivered to the subject vehicle
#[derive(Debug, Clone, Serialize)]
pub struct ProximityAlert {
    pub alert_level: AlertLevel,
    pub collision_vehicles: Vec<PeerReport>,
    pub warning_vehicles: Vec<PeerReport>,
    /// Generation time (Unix seconds)
    pub timestamp: f64,
}

/// Run one evaluation cycle for `subject` against `peers`.
///
/// Peers failing the eligibility check are skipped; the rest are
/// measured, classified into collision/warning buckets (ascending
/// distance), and folded into one alert. Returns None when the subject
/// itself is ineligible or no peer is within the warning threshold.
pub fn evaluate(
    subject: &Vehicle,
    peers: &[&Vehicle],
    movement: &mut MovementTracker,
    thresholds: &Thresholds,
    now: f64,
) -> Option<ProximityAlert> {
    if !subject.eligible_subject() {
        return None;
    }
    let subject_fix = subject.fix.as_ref()?;

    let mut collision_vehicles = Vec::new();
    let mut warning_vehicles = Vec::new();

    for peer in peers {
        if !peer.eligible_peer(&subject.phone_number) {
            continue;
        }
        let peer_fix = match peer.fix.as_ref() {
            Some(f) => f,
            None => continue,
        };

        let d = geomath::distance(
            subject_fix.latitude,
            subject_fix.longitude,
            peer_fix.latitude,
            peer_fix.longitude,
        );

        // Trend state is maintained for every eligible peer, not just
        // in-range ones, so the first in-range alert already carries an
        // approaching/receding classification.
        let key = PairKey::new(&subject.phone_number, &peer.phone_number);
        let mv = movement.classify(key, d, now);

        if d > thresholds.warning_m {
            continue;
        }

        // Bearing is undefined for co-located fixes
        let (bearing, dir) = if d == 0.0 {
            (None, Direction::Nearby)
        } else {
            let b = geomath::bearing(
                subject_fix.latitude,
                subject_fix.longitude,
                peer_fix.latitude,
                peer_fix.longitude,
            );
            (Some(b), direction::resolve(subject_fix.heading, b))
        };

        let report = PeerReport {
            phone_number: peer.phone_number.clone(),
            vehicle_id: peer.vehicle_id.clone(),
            full_name: peer.full_name.clone(),
            vehicle_type: peer.vehicle_type,
            distance: d,
            bearing,
            direction: dir,
            movement: mv,
            location: peer_fix.clone(),
        };

        if d <= thresholds.collision_m {
            collision_vehicles.push(report);
        } else {
            warning_vehicles.push(report);
        }
    }

    if collision_vehicles.is_empty() && warning_vehicles.is_empty() {
        return None;
    }

    sort_by_distance(&mut collision_vehicles);
    sort_by_distance(&mut warning_vehicles);

    let alert_level = if collision_vehicles.is_empty() {
        AlertLevel::Warning
    } else {
        AlertLevel::Collision
    };

    Some(ProximityAlert {
        alert_level,
        collision_vehicles,
        warning_vehicles,
        timestamp: now,
    })
}

fn sort_by_distance(reports: &mut [PeerReport]) {
    reports.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
