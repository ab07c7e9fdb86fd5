//! # Controller Command Engine
//!
//! Everything that changes the repeater goes through here:
//!
//! ```text
//! ┌──────────────────┐   state lock (one mutation at a time)
//! │  PortController  │ ← RPC calls and the auto-enable timer
//! └──────────────────┘
//!          │
//! ┌──────────────────┐   gate lock (one exchange on the wire)
//! │   CommandGate    │
//! └──────────────────┘
//!          │
//! ┌──────────────────┐
//! │    Transport     │ ← serial link or simulation
//! └──────────────────┘
//! ```
//!
//! Lock order is always state lock first, then the gate, and the gate is
//! released before the state lock.

pub mod gate;
pub mod port;

pub use gate::CommandGate;
pub use port::{PortController, PortState, StatusSnapshot};

/// The fixed command set understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Port1Disable,
    Port1Enable,
    Port3Unbridge,
    Port3Bridge,
    Restart,
    SetDate,
    SetTime,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Port1Disable,
        Command::Port1Enable,
        Command::Port3Unbridge,
        Command::Port3Bridge,
        Command::Restart,
        Command::SetDate,
        Command::SetTime,
    ];

    /// Name used in configuration errors and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Port1Disable => "port1Disable",
            Command::Port1Enable => "port1Enable",
            Command::Port3Unbridge => "port3Unbridge",
            Command::Port3Bridge => "port3Bridge",
            Command::Restart => "restart",
            Command::SetDate => "setDate",
            Command::SetTime => "setTime",
        }
    }
}
