// Coordinator - top level glue between vehicle registry, movement
// tracking, proximity evaluation, and the network layer

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::movement::MovementTracker;
use crate::net::messages::ServerMessage;
use crate::proximity::{self, Thresholds};
use crate::vehicle::{Vehicle, VehicleRegistry, VehicleType};

/// Seconds between stale pair-record sweeps
const SWEEP_INTERVAL_SECS: u64 = 30;

/// Current Unix time in seconds
pub fn unix_time() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Coordinator for the proximity server
///
/// Top-level object that connects the network layer to the vehicle
/// registry and the proximity pipeline. One evaluation cycle runs per
/// position report, under the write locks, so cycles for the same
/// vehicle pair never interleave.
pub struct Coordinator {
    registry: Arc<RwLock<VehicleRegistry>>,
    movement: Arc<RwLock<MovementTracker>>,
    /// Map identity -> message channel so we enforce one connection per vehicle
    client_channels: Arc<RwLock<HashMap<String, mpsc::Sender<ServerMessage>>>>,

    thresholds: Thresholds,
    pair_max_age: f64,

    /// Work directory for the vehicles.json snapshot. Empty = no file writes.
    work_dir: String,
    /// Status log interval in seconds. <= 0 = disabled.
    status_interval_secs: i32,

    // Stats
    pub total_position_updates: Arc<RwLock<usize>>,
    pub total_alerts: Arc<RwLock<usize>>,
}

impl Coordinator {
    /// Create a new coordinator with defaults (no status logging; for tests).
    pub fn new() -> Self {
        Self::with_options(
            Thresholds::default(),
            MovementTracker::default(),
            crate::movement::DEFAULT_PAIR_MAX_AGE,
            String::new(),
            -1,
        )
    }

    /// Create a new coordinator with explicit stores and limits (for production).
    /// When status_interval > 0, logs a status line every status_interval seconds.
    pub fn with_options(
        thresholds: Thresholds,
        movement: MovementTracker,
        pair_max_age: f64,
        work_dir: String,
        status_interval: i32,
    ) -> Self {
        Coordinator {
            registry: Arc::new(RwLock::new(VehicleRegistry::new())),
            movement: Arc::new(RwLock::new(movement)),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
            thresholds,
            pair_max_age,
            work_dir,
            status_interval_secs: status_interval,
            total_position_updates: Arc::new(RwLock::new(0)),
            total_alerts: Arc::new(RwLock::new(0)),
        }
    }

    /// Register a client's message channel.
    ///
    /// Returns Err when the identity already has a live connection;
    /// position reports stay ordered because each identity has exactly
    /// one connection task feeding the pipeline.
    pub async fn register_client(
        &self,
        phone_number: &str,
        tx: mpsc::Sender<ServerMessage>,
    ) -> Result<(), String> {
        let mut channels = self.client_channels.write().await;
        if channels.contains_key(phone_number) {
            return Err(format!("Vehicle {} is already connected", phone_number));
        }
        channels.insert(phone_number.to_string(), tx);
        Ok(())
    }

    /// Unregister a client's message channel. The vehicle itself stays
    /// registered so a reconnect picks up the same record.
    pub async fn unregister_client(&self, phone_number: &str) {
        self.client_channels.write().await.remove(phone_number);
    }

    /// Register (or reactivate) a vehicle. Returns a snapshot of the record.
    pub async fn register_vehicle(
        &self,
        phone_number: &str,
        vehicle_id: String,
        full_name: String,
        vehicle_type: VehicleType,
    ) -> Vehicle {
        let snapshot = {
            let mut registry = self.registry.write().await;
            registry
                .register(phone_number, vehicle_id, full_name, vehicle_type, unix_time())
                .clone()
        };
        info!(
            "Registered vehicle {}: id={} type={:?}",
            snapshot.phone_number, snapshot.vehicle_id, snapshot.vehicle_type
        );
        self.broadcast_vehicles().await;
        snapshot
    }

    /// Soft-delete a vehicle and drop its movement pair records.
    /// Returns false for unknown identities.
    pub async fn remove_vehicle(&self, phone_number: &str) -> bool {
        let removed = self.registry.write().await.deactivate(phone_number);
        if removed {
            let evicted = self.movement.write().await.evict_vehicle(phone_number);
            debug!(
                "Removed vehicle {} ({} pair records evicted)",
                phone_number, evicted
            );
            self.broadcast_vehicles().await;
        }
        removed
    }

    /// Flip the in-motion flag for a vehicle.
    pub async fn set_driving(&self, phone_number: &str, driving: bool) -> bool {
        let changed = self.registry.write().await.set_driving(phone_number, driving);
        if changed {
            self.broadcast_vehicles().await;
        }
        changed
    }

    /// Opt a vehicle in or out of location tracking. The acknowledgement
    /// goes to the requesting connection (which may be toggling another
    /// identity); the vehicle list is re-broadcast on success.
    pub async fn set_tracking_enabled(&self, requester: &str, phone_number: &str, enabled: bool) {
        let changed = self
            .registry
            .write()
            .await
            .set_tracking_enabled(phone_number, enabled);

        let ack = ServerMessage::TrackingUpdated {
            phone_number: phone_number.to_string(),
            enabled,
            success: changed,
            error: if changed {
                None
            } else {
                Some(format!("unknown vehicle {}", phone_number))
            },
        };
        self.send_to(requester, ack).await;

        if changed {
            self.broadcast_vehicles().await;
            self.broadcast_tracked().await;
        }
    }

    /// Snapshot of all active vehicles, sorted by identity.
    pub async fn vehicles_snapshot(&self) -> Vec<Vehicle> {
        self.registry
            .read()
            .await
            .active_vehicles()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Snapshot of vehicles with tracking enabled and a fix, most recent
    /// fix first.
    pub async fn tracked_snapshot(&self) -> Vec<Vehicle> {
        self.registry
            .read()
            .await
            .tracked_with_fix()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Send the current vehicle list to one client.
    pub async fn send_vehicle_list_to(&self, phone_number: &str) {
        let vehicles = self.vehicles_snapshot().await;
        self.send_to(phone_number, ServerMessage::VehiclesUpdate { vehicles })
            .await;
    }

    /// Send the currently-tracked vehicle list to one client.
    pub async fn send_tracked_list_to(&self, phone_number: &str) {
        let vehicles = self.tracked_snapshot().await;
        self.send_to(phone_number, ServerMessage::TrackedVehiclesUpdate { vehicles })
            .await;
    }

    /// Broadcast the currently-tracked vehicle list to all connected clients.
    pub async fn broadcast_tracked(&self) {
        let vehicles = self.tracked_snapshot().await;
        let msg = ServerMessage::TrackedVehiclesUpdate { vehicles };
        let channels = self.client_channels.read().await;
        for tx in channels.values() {
            let _ = tx.send(msg.clone()).await;
        }
    }

    /// Broadcast the current vehicle list to all connected clients.
    pub async fn broadcast_vehicles(&self) {
        let vehicles = self.vehicles_snapshot().await;
        let msg = ServerMessage::VehiclesUpdate { vehicles };
        let channels = self.client_channels.read().await;
        for tx in channels.values() {
            let _ = tx.send(msg.clone()).await;
        }
    }

    /// Handle a position report from a vehicle.
    ///
    /// Updates the stored fix, runs one proximity evaluation cycle, and
    /// delivers any resulting alert to the reporting vehicle only.
    /// Reports for unknown identities or vehicles with tracking disabled
    /// are dropped.
    #[allow(clippy::too_many_arguments)]
    pub async fn handle_position_update(
        &self,
        phone_number: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        accuracy: Option<f64>,
        speed: Option<f64>,
        heading: Option<f64>,
        simulated: bool,
    ) {
        let now = unix_time();
        *self.total_position_updates.write().await += 1;

        // Update the registry, then clone what the evaluation needs so
        // the read lock is not held across delivery.
        let (subject, peers) = {
            let mut registry = self.registry.write().await;
            let subject = match registry.update_position(
                phone_number,
                latitude,
                longitude,
                accuracy,
                speed,
                heading,
                simulated,
                now,
            ) {
                Ok(v) => v.clone(),
                Err(e) => {
                    debug!("Dropping position report: {}", e);
                    return;
                }
            };
            let peers: Vec<Vehicle> = registry
                .peers_for(phone_number)
                .into_iter()
                .cloned()
                .collect();
            (subject, peers)
        };

        let alert = {
            let peer_refs: Vec<&Vehicle> = peers.iter().collect();
            let mut movement = self.movement.write().await;
            proximity::evaluate(&subject, &peer_refs, &mut movement, &self.thresholds, now)
        };

        if let Some(alert) = alert {
            *self.total_alerts.write().await += 1;
            debug!(
                "Alert for {}: {:?} ({} collision, {} warning)",
                phone_number,
                alert.alert_level,
                alert.collision_vehicles.len(),
                alert.warning_vehicles.len()
            );
            self.send_to(phone_number, ServerMessage::CollisionAlert { alert })
                .await;
        }

        self.broadcast_vehicles().await;
        self.broadcast_tracked().await;
    }

    /// Send a message to one client, if connected.
    async fn send_to(&self, phone_number: &str, msg: ServerMessage) {
        let channels = self.client_channels.read().await;
        if let Some(tx) = channels.get(phone_number) {
            let _ = tx.send(msg).await;
        }
    }

    pub async fn vehicle_count(&self) -> usize {
        self.registry.read().await.vehicle_count()
    }

    pub async fn client_count(&self) -> usize {
        self.client_channels.read().await.len()
    }

    /// Create work_dir and an initial empty snapshot. Call once at startup.
    pub async fn init_work_dir(&self) {
        if self.work_dir.is_empty() {
            return;
        }
        let dir = Path::new(&self.work_dir);
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Failed to create work_dir {}: {}", self.work_dir, e);
            return;
        }
        let p = dir.join("vehicles.json");
        if let Err(e) = std::fs::write(&p, "[]") {
            warn!("Failed to write {}: {}", p.display(), e);
        }
    }

    /// Write vehicles.json to work_dir (tmp file + rename so readers
    /// never see a partial snapshot).
    async fn write_state(&self) {
        if self.work_dir.is_empty() {
            return;
        }
        let vehicles = self.vehicles_snapshot().await;
        let dir = Path::new(&self.work_dir);
        let tmp = dir.join("vehicles.json.tmp");
        let path = dir.join("vehicles.json");
        if let Ok(s) = serde_json::to_string(&vehicles) {
            if let Err(e) = std::fs::write(&tmp, s) {
                warn!("write_state: failed to write {}: {}", tmp.display(), e);
            } else if let Err(e) = std::fs::rename(&tmp, &path) {
                let _ = std::fs::remove_file(&tmp);
                warn!(
                    "write_state: failed to rename {} -> {}: {}",
                    tmp.display(),
                    path.display(),
                    e
                );
            }
        }
    }

    /// Log status line
    async fn log_status(&self) {
        let (total, active, tracked) = {
            let registry = self.registry.read().await;
            let active = registry.active_vehicles().len();
            let tracked = registry.tracked_with_fix().len();
            (registry.vehicle_count(), active, tracked)
        };
        let clients = self.client_count().await;
        let pairs = self.movement.read().await.pair_count();
        let updates = *self.total_position_updates.read().await;
        let alerts = *self.total_alerts.read().await;
        info!(
            "Status: ({} clients {} vehicles {} active {} tracked) ({} pairs) ({} updates {} alerts)",
            clients, total, active, tracked, pairs, updates, alerts
        );
    }

    /// Run periodic tasks for the coordinator (status log, vehicles.json
    /// snapshot when enabled, stale pair sweep).
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let status_secs = self.status_interval_secs;
        let mut next_status = if status_secs > 0 {
            Some(tokio::time::Instant::now() + Duration::from_secs(status_secs as u64))
        } else {
            None
        };
        // Write state: first time after 2s (let clients connect), then every 5s
        let write_interval_secs = 5u64;
        let mut next_write_state = if !self.work_dir.is_empty() {
            Some(tokio::time::Instant::now() + Duration::from_secs(2))
        } else {
            None
        };
        let mut next_sweep =
            tokio::time::Instant::now() + Duration::from_secs(SWEEP_INTERVAL_SECS);

        loop {
            ticker.tick().await;
            if let Some(ref mut next) = next_status {
                if tokio::time::Instant::now() >= *next {
                    *next += Duration::from_secs(status_secs as u64);
                    self.log_status().await;
                }
            }
            if let Some(ref mut next) = next_write_state {
                if tokio::time::Instant::now() >= *next {
                    *next += Duration::from_secs(write_interval_secs);
                    self.write_state().await;
                }
            }
            if tokio::time::Instant::now() >= next_sweep {
                next_sweep += Duration::from_secs(SWEEP_INTERVAL_SECS);
                let swept = self
                    .movement
                    .write()
                    .await
                    .sweep(unix_time(), self.pair_max_age);
                if swept > 0 {
                    debug!("Swept {} stale pair records", swept);
                }
            }
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
