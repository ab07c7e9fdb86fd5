//! # RPC Facade
//!
//! Named operations exposed to remote operators. A call arrives as a JSON
//! document `{"method": "...", "params": {...}}` and is answered with
//! `{"result": ...}` or, for malformed input, `{"error": "..."}`.
//!
//! Every call names the `caller` it acts for. That identity is used for
//! audit attribution only; who may call at all is decided by the
//! [`crate::auth::AuthGate`] in front of the [`router::Router`].
//!
//! ## Methods
//!
//! | method            | params                          | result         |
//! |-------------------|---------------------------------|----------------|
//! | `port1Disable`    | `caller`, `interval` (sec, 0)   | outcome        |
//! | `port1Enable`     | `caller`                        | outcome        |
//! | `port3Unbridge`   | `caller`                        | outcome        |
//! | `port3Bridge`     | `caller`                        | outcome        |
//! | `restart`         | `caller`                        | outcome        |
//! | `setDateTime`     | `caller`                        | outcome        |
//! | `status`          | `caller`                        | status object  |
//! | `getLog`          | `caller`, `count`               | history list   |
//! | `getIdentity`     | `caller`                        | string         |
//! | `logInterference` | `caller`, `location`, `minutes` | outcome        |
//! | `system.listMethods` |                              | string list    |

pub mod files;
pub mod router;
pub mod server;

pub use router::{HttpReply, Inbound, Router, Verb};
pub use server::{RpcServer, ShutdownHandle};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::HistoryEntry;
use crate::controller::{PortController, StatusSnapshot};
use crate::serial::Outcome;
use crate::weblog::WebFormLogger;

/// Method names accepted by [`RpcFacade::dispatch`].
pub const METHODS: &[&str] = &[
    "port1Disable",
    "port1Enable",
    "port3Unbridge",
    "port3Bridge",
    "restart",
    "setDateTime",
    "status",
    "getLog",
    "getIdentity",
    "logInterference",
    "system.listMethods",
];

/// One decoded RPC call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Call {
    Port1Disable {
        caller: String,
        #[serde(default)]
        interval: u64,
    },
    Port1Enable {
        caller: String,
    },
    Port3Unbridge {
        caller: String,
    },
    Port3Bridge {
        caller: String,
    },
    Restart {
        caller: String,
    },
    SetDateTime {
        caller: String,
    },
    Status {
        caller: String,
    },
    GetLog {
        caller: String,
        count: usize,
    },
    GetIdentity {
        caller: String,
    },
    LogInterference {
        caller: String,
        location: String,
        minutes: u32,
    },
    #[serde(rename = "system.listMethods")]
    ListMethods,
}

/// Result value of a call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Outcome(Outcome),
    Status(StatusSnapshot),
    History(Vec<HistoryEntry>),
    Identity(String),
    Methods(Vec<String>),
}

pub struct RpcFacade {
    controller: Arc<PortController>,
    weblog: WebFormLogger,
}

impl RpcFacade {
    pub fn new(controller: Arc<PortController>, weblog: WebFormLogger) -> Self {
        Self { controller, weblog }
    }

    pub fn controller(&self) -> &Arc<PortController> {
        &self.controller
    }

    pub async fn dispatch(&self, call: Call) -> Reply {
        let audit = self.controller.audit();
        match call {
            Call::Port1Disable { caller, interval } => {
                Reply::Outcome(self.controller.disable(&caller, interval).await)
            }
            Call::Port1Enable { caller } => Reply::Outcome(self.controller.enable(&caller).await),
            Call::Port3Unbridge { caller } => {
                Reply::Outcome(self.controller.unbridge(&caller).await)
            }
            Call::Port3Bridge { caller } => Reply::Outcome(self.controller.bridge(&caller).await),
            Call::Restart { caller } => Reply::Outcome(self.controller.restart(&caller).await),
            Call::SetDateTime { caller } => {
                Reply::Outcome(self.controller.set_date_time(&caller).await)
            }
            Call::Status { caller } => {
                audit.note(&caller, "Status Request");
                Reply::Status(self.controller.status().await)
            }
            Call::GetLog { caller, count } => {
                audit.record(&caller, &format!("Log Request - {count} entries"));
                Reply::History(audit.recent(count))
            }
            Call::GetIdentity { caller } => {
                audit.note(&caller, "Identity");
                Reply::Identity(self.controller.identity().to_string())
            }
            Call::LogInterference {
                caller,
                location,
                minutes,
            } => {
                audit.record(
                    &caller,
                    &format!("Log Interference ({location}, {minutes} min)"),
                );
                Reply::Outcome(self.weblog.log(&caller, &location, minutes).await)
            }
            Call::ListMethods => Reply::Methods(METHODS.iter().map(|m| m.to_string()).collect()),
        }
    }

    /// Decode a request body, dispatch it, and encode the answer.
    ///
    /// Returns the HTTP status to use alongside the JSON body.
    pub async fn serve(&self, body: &[u8]) -> (u16, String) {
        let call: Call = match serde_json::from_slice(body) {
            Ok(call) => call,
            Err(e) => {
                log::debug!("Rejecting RPC body: {}", e);
                return (400, json!({ "error": format!("invalid call: {e}") }).to_string());
            }
        };
        let reply = self.dispatch(call).await;
        (200, json!({ "result": reply }).to_string())
    }
}
