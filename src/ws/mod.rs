//! WebSocket transport and the wire protocol

pub mod handler;
pub mod protocol;
