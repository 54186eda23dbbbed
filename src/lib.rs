// Public API - data model, analysis engines and the executor boundary
pub mod analysis;
pub mod cidr;
pub mod classify;
pub mod export;
pub mod lookup;
pub mod policy;
pub mod probe;
pub mod state;

// Binary support - command line, runtime config and saved preferences
pub mod cli;
pub mod config;
pub mod prefs;
