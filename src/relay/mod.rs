//! Server side: session registry and the relay task that owns it

pub mod authority;
pub mod registry;
pub mod service;

pub use authority::{Authority, TrustClient};
pub use registry::SessionRegistry;
pub use service::{Relay, RelayCommand, RelayHandle, RelayStats};
