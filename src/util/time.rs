//! Time utilities for the room simulation

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Simulation ticks per second
pub const SIMULATION_TPS: u32 = 60;

/// Wall-clock period of one simulation tick
pub const TICK_DURATION: Duration = Duration::from_nanos(1_000_000_000 / SIMULATION_TPS as u64);
