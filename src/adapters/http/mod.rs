//! Local HTTP event listener and its client.

pub mod events_client;
pub mod events_server;

pub use events_client::EventsHttpClient;
pub use events_server::{EmitResponse, ErrorResponse, EventsHttpConfig, EventsHttpServer, HealthResponse};
