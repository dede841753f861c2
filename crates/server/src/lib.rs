//! Live scores server — REST reads, WebSocket fan-out, match simulation.

pub mod api;
pub mod config;
pub mod db;
pub mod realtime;
