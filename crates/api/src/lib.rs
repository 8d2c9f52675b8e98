//! Reflex server library.
//!
//! Exposes the building blocks (config, logging, state, engine, routes,
//! WebSocket transport) so integration tests and the binary entrypoint can
//! both access them.

pub mod config;
pub mod engine;
pub mod logging;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
