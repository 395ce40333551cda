
pub mod config;
pub mod coordinator;
pub mod direction;
pub mod geomath;
pub mod movement;
pub mod net;
pub mod proximity;
pub mod vehicle;
