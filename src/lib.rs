// Event model and bus
pub mod event;

// Virtual clock and scheduling loop
pub mod clock;

// Sensor models and registry
pub mod sensors;

// Typed operation errors
pub mod error;

// Simulation statistics
pub mod metrics;

// TOML configuration
pub mod config;

// Project save/load and log export
pub mod project;
