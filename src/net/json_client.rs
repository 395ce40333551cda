// JSON client handler
// Manages individual JSON client connections

use rand::Rng;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::messages::{ClientMessage, ServerMessage};
use crate::coordinator::unix_time;

/// Random value in [0.9*t, 1.1*t] rounded to integer. Used for reconnect_in
/// so a fleet of clients does not reconnect in lockstep.
fn fuzzy(t: f64) -> u32 {
    let r = rand::thread_rng().gen_range(0.9 * t..=1.1 * t);
    r.round() as u32
}

/// State of a JSON client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Waiting for the initial register message
    AwaitingRegistration,
    /// Registered and ready to exchange messages
    Registered,
    /// Connection closed
    Closed,
}

/// JSON client handler
pub struct JsonClient {
    connection: Connection,
    state: ClientState,
    phone_number: Option<String>,
    last_message_time: Instant,
    motd: String,
    coordinator: Arc<crate::coordinator::Coordinator>,
}

impl JsonClient {
    /// Create a new JSON client
    pub fn new(
        connection: Connection,
        motd: String,
        coordinator: Arc<crate::coordinator::Coordinator>,
    ) -> Self {
        JsonClient {
            connection,
            state: ClientState::AwaitingRegistration,
            phone_number: None,
            last_message_time: Instant::now(),
            motd,
            coordinator,
        }
    }

    /// Get the current state
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Run the client handler loop
    ///
    /// This processes the registration, then enters the message loop.
    /// Returns when the connection is closed or an error occurs.
    pub async fn run(&mut self) -> io::Result<()> {
        // Channel for messages pushed by the coordinator
        let (tx, mut rx) = tokio::sync::mpsc::channel(100);

        if !self.process_registration(tx).await? {
            return Ok(()); // Registration failed, connection closed
        }

        let heartbeat_interval = Duration::from_secs(30);
        let read_timeout = Duration::from_secs(150);

        let result = loop {
            if self.last_message_time.elapsed() > read_timeout {
                info!("No recent messages seen, closing connection");
                self.state = ClientState::Closed;
                break Ok(());
            }

            tokio::select! {
                result = self.connection.read_line() => {
                    match result {
                        Ok(line) => {
                            if line.is_empty() {
                                debug!("Client EOF");
                                self.state = ClientState::Closed;
                                break Ok(());
                            }

                            self.last_message_time = Instant::now();
                            self.handle_message(&line).await?;
                        }
                        Err(e) => {
                            warn!("Read error: {}", e);
                            self.state = ClientState::Closed;
                            break Err(e);
                        }
                    }
                }
                Some(srv_msg) = rx.recv() => {
                    let json = serde_json::to_value(&srv_msg)?;
                    self.connection.write_json(&json).await?;
                }
                _ = time::sleep(heartbeat_interval) => {
                    self.send_heartbeat().await?;
                }
            }
        };

        // Disconnect keeps the vehicle registered; only the channel goes away
        if let Some(phone) = self.phone_number.take() {
            info!("Disconnected: {}", phone);
            self.coordinator.unregister_client(&phone).await;
        }

        result
    }

    /// Process the initial registration message
    ///
    /// Returns true if registration succeeded, false if it failed.
    async fn process_registration(
        &mut self,
        tx: tokio::sync::mpsc::Sender<ServerMessage>,
    ) -> io::Result<bool> {
        // Read first line with timeout
        let line = match time::timeout(Duration::from_secs(15), self.connection.read_line()).await
        {
            Ok(Ok(l)) => l,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!("Registration failed: timeout");
                return Ok(false);
            }
        };

        let msg: ClientMessage = match serde_json::from_str(&line) {
            Ok(m) => m,
            Err(_) => {
                warn!("Registration failed: invalid message format");
                self.send_register_error("Invalid registration format").await?;
                return Ok(false);
            }
        };

        let (phone_number, vehicle_id, full_name, vehicle_type) = match msg {
            ClientMessage::Register {
                phone_number,
                vehicle_id,
                full_name,
                vehicle_type,
            } => (phone_number, vehicle_id, full_name, vehicle_type),
            _ => {
                warn!("Registration failed: first message must be register");
                self.send_register_error("Expected register message").await?;
                return Ok(false);
            }
        };

        if phone_number.is_empty() || vehicle_id.is_empty() {
            self.send_register_error("Missing phone_number or vehicle_id")
                .await?;
            return Ok(false);
        }

        // One live connection per identity
        if let Err(e) = self.coordinator.register_client(&phone_number, tx).await {
            self.send_register_error(&e).await?;
            return Ok(false);
        }

        let vehicle = self
            .coordinator
            .register_vehicle(&phone_number, vehicle_id, full_name, vehicle_type)
            .await;

        info!(
            "Registration successful ({} from {})",
            phone_number,
            self.connection.peer_addr()
        );

        let response = ServerMessage::Registered {
            motd: self.motd.clone(),
            vehicle,
            reconnect_in: Some(fuzzy(10.0)),
        };
        let json = serde_json::to_value(&response)?;
        self.connection.write_json(&json).await?;

        self.phone_number = Some(phone_number);
        self.state = ClientState::Registered;
        self.last_message_time = Instant::now();

        Ok(true)
    }

    /// Send a registration error message
    async fn send_register_error(&mut self, error: &str) -> io::Result<()> {
        let msg = ServerMessage::RegisterFailed {
            deny: vec![error.to_string()],
            reconnect_in: fuzzy(900.0),
        };
        let json = serde_json::to_value(&msg)?;
        self.connection.write_json(&json).await
    }

    /// Handle a message from the client
    async fn handle_message(&mut self, line: &str) -> io::Result<()> {
        let msg: ClientMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                debug!("Failed to parse message: {}", e);
                return Ok(());
            }
        };

        match msg {
            ClientMessage::Heartbeat {} => {}
            ClientMessage::Register { .. } => {
                debug!("Unexpected register after registration");
            }
            ClientMessage::Remove { phone_number } => {
                self.coordinator.remove_vehicle(&phone_number).await;
            }
            ClientMessage::ToggleDriving {
                phone_number,
                is_driving,
            } => {
                self.coordinator.set_driving(&phone_number, is_driving).await;
            }
            ClientMessage::ToggleTracking {
                phone_number,
                enabled,
            } => {
                if let Some(ref requester) = self.phone_number {
                    self.coordinator
                        .set_tracking_enabled(requester, &phone_number, enabled)
                        .await;
                }
            }
            ClientMessage::GetVehicles {} => {
                if let Some(ref phone) = self.phone_number {
                    self.coordinator.send_vehicle_list_to(phone).await;
                }
            }
            ClientMessage::GetTrackedVehicles {} => {
                if let Some(ref phone) = self.phone_number {
                    self.coordinator.send_tracked_list_to(phone).await;
                }
            }
            ClientMessage::Position {
                phone_number,
                latitude,
                longitude,
                accuracy,
                speed,
                heading,
                simulated,
            } => {
                self.coordinator
                    .handle_position_update(
                        &phone_number,
                        latitude,
                        longitude,
                        accuracy,
                        speed,
                        heading,
                        simulated,
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Send a heartbeat message
    async fn send_heartbeat(&mut self) -> io::Result<()> {
        let msg = ServerMessage::Heartbeat {
            server_time: unix_time(),
        };
        let json = serde_json::to_value(&msg)?;
        self.connection.write_json(&json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_state() {
        assert_eq!(
            ClientState::AwaitingRegistration,
            ClientState::AwaitingRegistration
        );
        assert_ne!(ClientState::AwaitingRegistration, ClientState::Registered);
    }

    #[test]
    fn test_fuzzy_range() {
        for _ in 0..100 {
            let v = fuzzy(10.0);
            assert!((9..=11).contains(&v), "out of range: {}", v);
        }
    }
}
