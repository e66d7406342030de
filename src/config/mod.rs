//! Configuration module for Stratus.
//!
//! Handles cache lifetimes, query time budgets, and engine session defaults.

mod settings;

pub use settings::{
    expand_env_vars, DriverSettings, EngineSettings, MetadataSettings, Settings, SettingsError,
};
