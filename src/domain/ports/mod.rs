//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces adapters implement:
//! - TriggerRepository, HookSessionRepository, WorkspaceRepository: persistence
//! - TaskCreator: hand-off to the agent task executor
//! - ConditionEvaluator: trigger condition matching
//! - ChannelDelivery, AgentWaker: outbound trigger actions
//! - MentionFetcher: the external mention command
//! - BridgeSettingsSource: live bridge settings

pub mod bridge_settings;
pub mod condition_evaluator;
pub mod delivery;
pub mod mention_fetcher;
pub mod session_repository;
pub mod task_creator;
pub mod trigger_repository;
pub mod workspace_repository;

pub use bridge_settings::BridgeSettingsSource;
pub use condition_evaluator::{ConditionError, ConditionEvaluator};
pub use delivery::{AgentWaker, ChannelDelivery};
pub use mention_fetcher::{MentionFetchError, MentionFetchOutput, MentionFetchRequest, MentionFetcher};
pub use session_repository::HookSessionRepository;
pub use task_creator::TaskCreator;
pub use trigger_repository::TriggerRepository;
pub use workspace_repository::WorkspaceRepository;
