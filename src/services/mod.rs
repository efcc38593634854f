//! Application services: trigger evaluation, idempotent ingress and the mention bridge.

pub mod bridge;
pub mod condition_evaluator;
pub mod ingress;
pub mod mention_command;
pub mod mention_source;
pub mod template;
pub mod trigger_engine;
pub mod workspace_manager;

pub use bridge::{BridgeState, BridgeStatus, MentionBridge, PollOutcome, PollSummary, StaticBridgeSettings};
pub use condition_evaluator::FieldConditionEvaluator;
pub use ingress::{IngressCoordinator, IngressSettings};
pub use mention_command::{build_mention_task_prompt, build_mention_task_title, parse_mention_trigger_command};
pub use mention_source::{fetch_mentions_with_retry, parse_bird_mentions, sort_mentions_oldest_first};
pub use template::substitute_template;
pub use trigger_engine::{event_from_pairs, TriggerEngine};
pub use workspace_manager::TempWorkspaceManager;
