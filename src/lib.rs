// Clippy allows for reasonable defaults
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::derivable_impls)] // Explicit Default impls can be clearer
#![allow(clippy::unnecessary_map_or)] // map_or can be clearer than alternatives

// Module declarations
pub mod config;
pub mod events;
pub mod models;
pub mod parsers;
pub mod session;
pub mod shutdown;
pub mod transport;

// Server module (HTTP/WebSocket UI bridge)
pub mod server;

pub use events::ResearchEvent;
pub use models::*;
pub use session::{ControllerOptions, ResearchController, ResearchSnapshot};
pub use transport::{ChannelTransport, EventTransport, HttpTransport};

use std::sync::Arc;

use config::ClientConfig;
use transport::TransportError;

/// Build a controller talking to the configured HTTP backend
pub fn controller_from_config(config: &ClientConfig) -> Result<ResearchController, TransportError> {
    let transport = HttpTransport::new(&config.backend)?;
    Ok(ResearchController::new(
        Arc::new(transport),
        ControllerOptions {
            idle_timeout: config.stream.idle_timeout(),
        },
    ))
}
