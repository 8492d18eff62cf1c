mod error;
mod types;
mod websocket;

pub use error::TransportError;
pub use types::{CloseInfo, TransportEvent};
pub use websocket::TransportSession;
