//! hookwise - event-to-task automation core
//!
//! hookwise turns inbound events into agent tasks:
//!
//! - **Trigger engine**: rules matched against events from sources such as
//!   email or webhooks, with conditions, cooldowns and a firing history.
//! - **Task ingress**: creates at most one task per session key, even under
//!   concurrent callers, and provisions temp workspaces.
//! - **Mention bridge**: polls an external mention CLI and turns allowlisted
//!   `do:` commands into tasks.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): trigger engine, ingress, bridge
//! - **Adapters** (`adapters`): SQLite persistence, the mention CLI, webhook delivery
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and setup
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{Config, Trigger, TriggerAction, TriggerEvent};
pub use domain::{DomainError, DomainResult};
pub use services::{IngressCoordinator, MentionBridge, TriggerEngine};
