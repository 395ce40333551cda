// Direction resolution - bearings to coarse direction labels
//
// Turns an absolute bearing (plus the observer's heading, when known)
// into one of eight relative sectors (Front, Front-Right, ...) or an
// eight-point compass label. All sectors are 45 degrees wide, centered
// on the cardinal values, and half-open: [center - 22.5, center + 22.5).

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Eight-point compass label, used when the observer's heading is unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassPoint {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl CompassPoint {
    pub fn label(&self) -> &'static str {
        match self {
            CompassPoint::North => "N",
            CompassPoint::NorthEast => "NE",
            CompassPoint::East => "E",
            CompassPoint::SouthEast => "SE",
            CompassPoint::South => "S",
            CompassPoint::SouthWest => "SW",
            CompassPoint::West => "W",
            CompassPoint::NorthWest => "NW",
        }
    }
}

/// Relative sector as seen from a vehicle with a known heading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sector {
    Front,
    FrontRight,
    Right,
    BackRight,
    Back,
    BackLeft,
    Left,
    FrontLeft,
}

impl Sector {
    pub fn label(&self) -> &'static str {
        match self {
            Sector::Front => "Front",
            Sector::FrontRight => "Front-Right",
            Sector::Right => "Right",
            Sector::BackRight => "Back-Right",
            Sector::Back => "Back",
            Sector::BackLeft => "Back-Left",
            Sector::Left => "Left",
            Sector::FrontLeft => "Front-Left",
        }
    }
}

const SECTORS: [Sector; 8] = [
    Sector::Front,
    Sector::FrontRight,
    Sector::Right,
    Sector::BackRight,
    Sector::Back,
    Sector::BackLeft,
    Sector::Left,
    Sector::FrontLeft,
];

const COMPASS: [CompassPoint; 8] = [
    CompassPoint::North,
    CompassPoint::NorthEast,
    CompassPoint::East,
    CompassPoint::SouthEast,
    CompassPoint::South,
    CompassPoint::SouthWest,
    CompassPoint::West,
    CompassPoint::NorthWest,
];

/// Resolved direction of a peer as seen from a subject vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    /// Heading known: sector relative to the observer's nose, with the
    /// signed relative angle in (-180, 180] for diagnostics
    Relative { sector: Sector, angle: f64 },
    /// Heading unknown: absolute compass point of the bearing
    Compass(CompassPoint),
    /// Zero distance; bearing is undefined
    Nearby,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Relative { sector, .. } => sector.label(),
            Direction::Compass(point) => point.label(),
            Direction::Nearby => "Nearby",
        }
    }

    pub fn angle(&self) -> Option<f64> {
        match self {
            Direction::Relative { angle, .. } => Some(*angle),
            _ => None,
        }
    }
}

// On the wire a direction is always {"label": ..., "angle": ...} with a
// null angle for compass/nearby results, matching the alert payload shape.
impl Serialize for Direction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Direction", 2)?;
        s.serialize_field("label", self.label())?;
        s.serialize_field("angle", &self.angle())?;
        s.end()
    }
}

/// Index into an 8-sector table for an angle in degrees. Sector 0 is
/// centered on 0 and each sector is [center - 22.5, center + 22.5).
fn sector_index(angle: f64) -> usize {
    (((angle + 22.5).rem_euclid(360.0)) / 45.0) as usize % 8
}

/// Resolve the direction of a target at `bearing_to_target` degrees as
/// seen by an observer with the given heading (degrees clockwise from
/// North, if known).
///
/// Zero distance is the caller's responsibility: `bearing_to_target` is
/// assumed to come from two distinct points.
pub fn resolve(heading: Option<f64>, bearing_to_target: f64) -> Direction {
    match heading {
        Some(h) => {
            let rel = (bearing_to_target - h).rem_euclid(360.0);
            // Signed form in (-180, 180]
            let angle = if rel > 180.0 { rel - 360.0 } else { rel };
            Direction::Relative {
                sector: SECTORS[sector_index(rel)],
                angle,
            }
        }
        None => Direction::Compass(COMPASS[sector_index(bearing_to_target)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compass_when_heading_unknown() {
        assert_eq!(resolve(None, 0.0), Direction::Compass(CompassPoint::North));
        assert_eq!(resolve(None, 45.0), Direction::Compass(CompassPoint::NorthEast));
        assert_eq!(resolve(None, 90.0), Direction::Compass(CompassPoint::East));
        assert_eq!(resolve(None, 180.0), Direction::Compass(CompassPoint::South));
        assert_eq!(resolve(None, 270.0), Direction::Compass(CompassPoint::West));
    }

    #[test]
    fn test_compass_boundaries_half_open() {
        // [337.5, 360) and [0, 22.5) are both North
        assert_eq!(resolve(None, 337.5), Direction::Compass(CompassPoint::North));
        assert_eq!(resolve(None, 22.4), Direction::Compass(CompassPoint::North));
        // Exactly 22.5 tips into the next sector
        assert_eq!(resolve(None, 22.5), Direction::Compass(CompassPoint::NorthEast));
        assert_eq!(resolve(None, 337.4), Direction::Compass(CompassPoint::NorthWest));
    }

    #[test]
    fn test_relative_sectors() {
        let cases = [
            (0.0, Sector::Front),
            (44.0, Sector::FrontRight),
            (90.0, Sector::Right),
            (135.0, Sector::BackRight),
            (180.0, Sector::Back),
            (225.0, Sector::BackLeft),
            (270.0, Sector::Left),
            (315.0, Sector::FrontLeft),
        ];

        for (bearing, expected) in cases {
            match resolve(Some(0.0), bearing) {
                Direction::Relative { sector, .. } => {
                    assert_eq!(sector, expected, "bearing {}", bearing)
                }
                other => panic!("expected relative direction, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_relative_sector_boundaries() {
        // 22.5 is the first Front-Right angle; -22.5 (337.5) is still Front
        match resolve(Some(0.0), 22.5) {
            Direction::Relative { sector, .. } => assert_eq!(sector, Sector::FrontRight),
            other => panic!("unexpected {:?}", other),
        }
        match resolve(Some(0.0), 337.5) {
            Direction::Relative { sector, angle } => {
                assert_eq!(sector, Sector::Front);
                assert!((angle - (-22.5)).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_relative_heading_wraparound() {
        // Observer heading 350, target bearing 10 -> 20 degrees to the right
        match resolve(Some(350.0), 10.0) {
            Direction::Relative { sector, angle } => {
                assert_eq!(sector, Sector::Front);
                assert!((angle - 20.0).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_signed_angle_range() {
        // Directly behind is +180, not -180
        match resolve(Some(0.0), 180.0) {
            Direction::Relative { angle, .. } => assert_eq!(angle, 180.0),
            other => panic!("unexpected {:?}", other),
        }
        // Just left of the nose is negative
        match resolve(Some(90.0), 60.0) {
            Direction::Relative { sector, angle } => {
                assert_eq!(sector, Sector::FrontLeft);
                assert!((angle - (-30.0)).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_serialized_shape() {
        let d = resolve(Some(0.0), 44.0);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["label"], "Front-Right");
        assert!((json["angle"].as_f64().unwrap() - 44.0).abs() < 1e-9);

        let nearby = serde_json::to_value(Direction::Nearby).unwrap();
        assert_eq!(nearby["label"], "Nearby");
        assert!(nearby["angle"].is_null());
    }
}
