//! WebSocket transport: wire types and the per-player connection pump

pub mod handler;
pub mod protocol;
