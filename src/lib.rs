//! Core library for the light_daq acquisition engine.
//!
//! A light sensor reports one integer reading per serial line or UDP datagram.
//! This crate keeps a connection to the sensor alive for as long as the host
//! runs, decodes and normalizes every reading, and hands the results to a
//! consumer through a non-blocking queue.
//!
//! ```text
//! device -> TransportSession -> AcquisitionLoop -> ValueQueue -> consumer
//! ```
//!
//! [`manager::CommunicationManager`] is the entry point: it builds sessions from
//! [`config::Settings`], runs one [`acquisition::AcquisitionLoop`] per transport
//! (or one failover loop), and tears everything down on `shutdown`.

pub mod acquisition;
pub mod adapters;
pub mod config;
pub mod data;
pub mod error;
pub mod error_recovery;
pub mod logging;
pub mod manager;
pub mod shutdown;

pub use acquisition::{AcquisitionLoop, LoopState};
pub use config::{PriorityPolicy, Settings, TransportConfig, TransportKind};
pub use data::{Sample, ValueQueue};
pub use error::{AppResult, DaqError, TransportError};
pub use manager::CommunicationManager;
