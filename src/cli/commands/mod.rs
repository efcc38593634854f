pub mod bridge;
pub mod event;
pub mod init;
pub mod run;
pub mod session;
pub mod task;
pub mod trigger;
