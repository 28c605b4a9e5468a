//! Client side: transport, local simulation, remote mirror, collision engine

pub mod engine;
pub mod mirror;
pub mod outbound;
pub mod session;
pub mod simulation;
pub mod transport;

pub use mirror::RemoteMirror;
pub use outbound::MoveThrottle;
pub use session::{Frame, FrameReport, GameSession, Outcome, Phase, SessionError};
pub use simulation::{LocalPlayer, Target};
pub use transport::{Connection, TransportConfig, TransportEvent, TransportKind};
