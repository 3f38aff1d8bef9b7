pub mod capture;
pub mod config;
pub mod control;
pub mod desktop;
pub mod dispatch;
pub mod error;
pub mod modes;
pub mod orchestrator;
pub mod prompt;
pub mod selection;
