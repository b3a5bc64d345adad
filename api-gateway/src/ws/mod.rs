//! WebSocket support

pub mod handler;
pub mod message;
