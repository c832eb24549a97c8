//! Kiln: build-worker coordination core.
//!
//! Kiln pairs queued build tasks with remote builder machines. Builders
//! register, declare the platforms and feature tags they can build for, and
//! poll the coordinator with heartbeats. A periodic scheduler assigns each
//! pending task to one idle, live builder whose capabilities satisfy the
//! task's requirements, and the next idle heartbeat from that builder
//! delivers it.
//!
//! # Architecture
//!
//! Kiln follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence and external lookups
//! - **Adapters**: Concrete implementations of ports (database, git, files)
//!
//! # Modules
//!
//! - [`builder`]: Builder registration, tokens and liveness
//! - [`matrix`]: Capability entries and candidate matching
//! - [`task`]: Task creation, lifecycle and archival
//! - [`dispatch`]: Assignment scheduling and the heartbeat protocol
//! - [`store`]: In-memory and `PostgreSQL` storage adapters
//! - [`config`]: Coordinator configuration

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod matrix;
pub mod store;
pub mod task;
