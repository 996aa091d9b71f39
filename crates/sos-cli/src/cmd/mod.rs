//! CLI command implementations

pub mod add;
pub mod branch;
pub mod changes;
pub mod commit;
pub mod config;
pub mod delete;
pub mod diff;
pub mod log;
pub mod ls;
pub mod mv;
pub mod offline;
pub mod online;
pub mod remove;
pub mod switch;
pub mod update;
