//! Hearth Component Manager - lifecycle orchestration for system components.
//!
//! This crate runs the long-lived system components of a Hearth deployment
//! (API server, database server, MQTT broker, web interface) and supervises
//! them through an explicit status state machine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ComponentManager               │
//! │  - start / stop / restart                │
//! │  - status aggregation                    │
//! │  - log retrieval                         │
//! └─────────────────────────────────────────┘
//!          ↓ spawns, per component
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │    Worker    │→ │  LogMonitor  │→ │   EventBus   │
//! │  (task body) │  │ (line parse) │  │ (fan-out)    │
//! └──────────────┘  └──────────────┘  └──────────────┘
//!          ↑
//!     Supervisor (flags unexpected exits)
//! ```
//!
//! # Core Types
//!
//! - [`ComponentManager`] - owns the component table and drives transitions
//! - [`Worker`](workers::Worker) - trait a component backend implements
//! - [`ComponentStatus`](component::ComponentStatus) - the five-state
//!   lifecycle machine
//!
//! Status changes and parsed log lines are published as
//! [`Event`](hearth::event::Event)s on the shared bus; nothing in this crate
//! shares mutable memory with the simulation tick loop.

pub mod component;
pub mod config;
pub mod manager;
pub mod monitor;
pub mod workers;

// Re-export public types
pub use component::{ComponentDefinition, ComponentStatus, ComponentType, StatusInfo};
pub use config::ManagerConfig;
pub use manager::ComponentManager;
pub use workers::{Worker, WorkerContext};
