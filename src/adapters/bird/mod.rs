//! Mention feed adapter over the `bird` command-line client.

pub mod cli;

pub use cli::{classify_failure, BirdCliConfig, BirdCliFetcher};
