// JSON message type definitions
// Defines client <-> server message protocol

use serde::{Deserialize, Serialize};

use crate::proximity::ProximityAlert;
use crate::vehicle::{Vehicle, VehicleType};

/// Messages sent from client to server (line-delimited JSON, "type" tag)
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Register (or reactivate) the vehicle behind this connection
    #[serde(rename = "register")]
    Register {
        phone_number: String,
        vehicle_id: String,
        full_name: String,
        #[serde(default)]
        vehicle_type: VehicleType,
    },

    /// Soft-delete the vehicle
    #[serde(rename = "remove")]
    Remove { phone_number: String },

    /// Flip the in-motion flag
    #[serde(rename = "toggle-driving")]
    ToggleDriving {
        phone_number: String,
        is_driving: bool,
    },

    /// Opt in or out of location tracking
    #[serde(rename = "toggle-tracking")]
    ToggleTracking { phone_number: String, enabled: bool },

    /// Request the current active vehicle list
    #[serde(rename = "get-vehicles")]
    GetVehicles {},

    /// Request the list of vehicles currently tracking with a fix
    #[serde(rename = "get-tracked-vehicles")]
    GetTrackedVehicles {},

    /// Periodic position report. Missing coordinates clear the stored fix.
    #[serde(rename = "position")]
    Position {
        phone_number: String,
        #[serde(default)]
        latitude: Option<f64>,
        #[serde(default)]
        longitude: Option<f64>,
        #[serde(default)]
        accuracy: Option<f64>,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        heading: Option<f64>,
        #[serde(default)]
        simulated: bool,
    },

    /// Keep-alive heartbeat
    #[serde(rename = "heartbeat")]
    Heartbeat {},
}

/// Messages sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Registration accepted
    #[serde(rename = "registered")]
    Registered {
        motd: String,
        vehicle: Vehicle,
        #[serde(skip_serializing_if = "Option::is_none")]
        reconnect_in: Option<u32>,
    },

    /// Registration rejected
    #[serde(rename = "register-failed")]
    RegisterFailed { deny: Vec<String>, reconnect_in: u32 },

    /// Broadcast snapshot of all active vehicles
    #[serde(rename = "vehicles-update")]
    VehiclesUpdate { vehicles: Vec<Vehicle> },

    /// Broadcast snapshot of vehicles tracking with a fix, most recent first
    #[serde(rename = "tracked-vehicles-update")]
    TrackedVehiclesUpdate { vehicles: Vec<Vehicle> },

    /// Acknowledgement of a toggle-tracking request
    #[serde(rename = "tracking-updated")]
    TrackingUpdated {
        phone_number: String,
        enabled: bool,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Combined proximity alert, delivered only to the subject vehicle
    #[serde(rename = "collision-alert")]
    CollisionAlert {
        #[serde(flatten)]
        alert: ProximityAlert,
    },

    /// Heartbeat message
    #[serde(rename = "heartbeat")]
    Heartbeat { server_time: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_register() {
        let json = r#"{
            "type": "register",
            "phone_number": "5550001",
            "vehicle_id": "KA-01-AB-1234",
            "full_name": "Asha",
            "vehicle_type": "bike"
        }"#;

        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Register {
                phone_number,
                vehicle_id,
                vehicle_type,
                ..
            } => {
                assert_eq!(phone_number, "5550001");
                assert_eq!(vehicle_id, "KA-01-AB-1234");
                assert_eq!(vehicle_type, VehicleType::Bike);
            }
            _ => panic!("Expected Register"),
        }
    }

    #[test]
    fn test_deserialize_register_defaults_vehicle_type() {
        let json = r#"{
            "type": "register",
            "phone_number": "5550001",
            "vehicle_id": "KA-01",
            "full_name": "Asha"
        }"#;

        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Register { vehicle_type, .. } => {
                assert_eq!(vehicle_type, VehicleType::Car);
            }
            _ => panic!("Expected Register"),
        }
    }

    #[test]
    fn test_deserialize_position() {
        let json = r#"{
            "type": "position",
            "phone_number": "5550001",
            "latitude": 40.7128,
            "longitude": -74.0060,
            "heading": 90.0
        }"#;

        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Position {
                phone_number,
                latitude,
                longitude,
                heading,
                accuracy,
                simulated,
                ..
            } => {
                assert_eq!(phone_number, "5550001");
                assert_eq!(latitude, Some(40.7128));
                assert_eq!(longitude, Some(-74.0060));
                assert_eq!(heading, Some(90.0));
                assert_eq!(accuracy, None);
                assert!(!simulated);
            }
            _ => panic!("Expected Position"),
        }
    }

    #[test]
    fn test_deserialize_position_missing_coordinates() {
        let json = r#"{"type": "position", "phone_number": "5550001"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Position {
                latitude, longitude, ..
            } => {
                assert_eq!(latitude, None);
                assert_eq!(longitude, None);
            }
            _ => panic!("Expected Position"),
        }
    }

    #[test]
    fn test_deserialize_toggles() {
        let json = r#"{"type": "toggle-driving", "phone_number": "5550001", "is_driving": false}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::ToggleDriving {
                is_driving: false,
                ..
            }
        ));

        let json = r#"{"type": "toggle-tracking", "phone_number": "5550001", "enabled": true}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::ToggleTracking { enabled: true, .. }
        ));
    }

    #[test]
    fn test_serialize_registered() {
        let vehicle = Vehicle::new(
            "5550001".to_string(),
            "KA-01".to_string(),
            "Asha".to_string(),
            VehicleType::Car,
            1000.0,
        );
        let msg = ServerMessage::Registered {
            motd: "Welcome!".to_string(),
            vehicle,
            reconnect_in: Some(10),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"registered\""));
        assert!(json.contains("\"motd\":\"Welcome!\""));
        assert!(json.contains("\"phone_number\":\"5550001\""));
        assert!(json.contains("\"reconnect_in\":10"));
    }

    #[test]
    fn test_deserialize_get_tracked_vehicles() {
        let json = r#"{"type": "get-tracked-vehicles"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::GetTrackedVehicles {}));
    }

    #[test]
    fn test_serialize_tracked_vehicles_update() {
        let msg = ServerMessage::TrackedVehiclesUpdate { vehicles: vec![] };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"tracked-vehicles-update\""));
        assert!(json.contains("\"vehicles\":[]"));
    }

    #[test]
    fn test_serialize_register_failed() {
        let msg = ServerMessage::RegisterFailed {
            deny: vec!["Invalid phone number".to_string()],
            reconnect_in: 900,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"register-failed\""));
        assert!(json.contains("Invalid phone number"));
    }

    #[test]
    fn test_serialize_tracking_updated_skips_empty_error() {
        let msg = ServerMessage::TrackingUpdated {
            phone_number: "5550001".to_string(),
            enabled: true,
            success: true,
            error: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"tracking-updated\""));
        assert!(!json.contains("error"));
    }
}
