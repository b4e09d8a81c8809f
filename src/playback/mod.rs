pub mod engine;
pub mod rodio_transport;
pub mod state;
pub mod transport;

pub use engine::PlaybackEngine;
pub use rodio_transport::RodioTransport;
pub use state::{PlaybackState, TransportPhase};
pub use transport::{MediaTransport, TransportCommand, TransportEvent};
