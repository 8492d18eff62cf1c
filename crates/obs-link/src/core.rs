mod connection;
mod correlator;
mod events;
mod handshake;
mod retry;
mod state;

pub use connection::{ConnectError, Connection};
pub use correlator::{RequestCorrelator, RequestError};
pub use events::{EventDispatcher, Subscription};
pub use handshake::{Handshake, HandshakeStep};
pub use retry::ReconnectPolicy;
pub use state::{ConnectionPhase, ConnectionStatus, LinkState, PhaseTransition};
