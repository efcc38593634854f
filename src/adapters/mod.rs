//! Adapters implementing the domain ports against external systems.

pub mod bird;
pub mod delivery;
pub mod http;
pub mod sqlite;
