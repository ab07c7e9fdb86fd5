//! # arcomd - Remote Control Daemon for Arcom RC210 Repeater Controllers
//!
//! arcomd sits between remote operators and an Arcom RC210 repeater
//! controller attached over a serial line. Operators call named operations
//! over authenticated HTTP(S); the daemon turns them into controller command
//! codes, keeps the logical port state, and records who did what.
//!
//! ## Features
//!
//! - **Serialized device access**: one command/response exchange on the wire at a time.
//! - **Port control**: disable/enable Port 1 with an optional auto-enable timer, bridge or unbridge Port 3, restart, set the controller clock.
//! - **Audit trail**: bounded, persisted history of authenticated actions.
//! - **Authentication**: HTTP Basic against a salted SHA-224 credential store.
//! - **Simulation mode**: run without a device for testing front ends.
//! - **Interference reports**: optional submission to an external web form.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arcomd::config::Config;
//! use arcomd::daemon::Daemon;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("arcomd.toml").await?;
//!     let daemon = Daemon::start(&config, false)?;
//!     daemon.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`serial`] - RC210 line protocol, serial and simulated transports
//! - [`controller`] - command gate and the Port 1 / Port 3 state machine
//! - [`audit`] - bounded, persisted action history
//! - [`auth`] - credential store and Basic authentication
//! - [`rpc`] - RPC facade, HTTP routing and the listener
//! - [`weblog`] - interference reports to a web form
//! - [`config`] - configuration management and validation
//! - [`daemon`] - startup wiring and shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RPC Server    │ ← HTTP(S), Basic auth, JSON calls
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Port Controller │ ← state, auto-enable timer, audit
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  Command Gate   │ ← one exchange at a time
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  Serial Link    │ ← RC210 line protocol
//! └─────────────────┘
//! ```

pub mod audit;
pub mod auth;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod logutil;
pub mod pidfile;
pub mod rpc;
pub mod serial;
pub mod weblog;
