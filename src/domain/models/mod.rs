pub mod config;
pub mod mention;
pub mod session;
pub mod task;
pub mod trigger;
pub mod workspace;

pub use config::{
    BridgeConfig, Config, DatabaseConfig, DeliveryConfig, IngressConfig, LoggingConfig,
    ServerConfig, TriggersConfig,
};
pub use mention::{
    normalize_handle, BirdMentionRecord, MentionRejectReason, MentionTriggerSettings,
    ParsedMentionCommand,
};
pub use session::{normalize_session_key, HookSessionRecord, SessionLock};
pub use task::{
    AgentAction, CreateTaskOptions, CreatedTask, IngressOutcome, TaskRequest, TaskStatus,
    TaskSummary,
};
pub use trigger::{
    ConditionLogic, ConditionOperator, NewTrigger, Trigger, TriggerAction, TriggerCondition,
    TriggerEvent, TriggerHistoryEntry, TriggerUpdate, DEFAULT_COOLDOWN_MS, DEFAULT_HISTORY_LIMIT,
};
pub use workspace::{sanitize_segment, TempWorkspaceKey, Workspace, WorkspacePermissions};
