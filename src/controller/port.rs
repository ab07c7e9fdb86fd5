use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{Command, CommandGate};
use crate::audit::{epoch_seconds, AuditLog};
use crate::config::CommandCodes;
use crate::error::LinkError;
use crate::logutil::escape_log;
use crate::serial::Outcome;

/// Longest auto-enable interval accepted by `disable`.
pub const MAX_AUTO_ENABLE_SECS: u64 = 7 * 24 * 60 * 60;

/// Pause between the set-date and set-time commands.
pub const DATE_TIME_SETTLE: Duration = Duration::from_millis(500);

/// Logical state of Port 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Enabled,
    DisabledNoTimer,
    DisabledWithTimer { deadline: DateTime<Utc> },
}

/// Point-in-time view returned by the `status` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub identity: String,
    pub port1_enabled: bool,
    pub port3_bridged: bool,
    /// No controller attached; commands are not reaching the device.
    pub simulation: bool,
    /// Seconds since the epoch at which Port 1 will be re-enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_enable_deadline: Option<f64>,
}

struct AutoEnable {
    id: u64,
    deadline: DateTime<Utc>,
    handle: JoinHandle<()>,
}

impl AutoEnable {
    fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        let ms = (self.deadline - now).num_milliseconds().max(0);
        (ms + 999) / 1000
    }
}

struct ControllerState {
    port1_enabled: bool,
    port3_bridged: bool,
    /// Present exactly while an auto-enable timer is outstanding.
    auto_enable: Option<AutoEnable>,
}

/// Port 1 / Port 3 state machine in front of the command gate.
///
/// Every transition holds the state lock for its whole read-modify-write,
/// including the wire exchange, so flags always mirror the last confirmed
/// controller reply. The auto-enable timer re-enters through the same
/// [`PortController::enable`] path and the same lock.
pub struct PortController {
    identity: String,
    codes: CommandCodes,
    gate: CommandGate,
    audit: Arc<AuditLog>,
    state: Mutex<ControllerState>,
    next_timer_id: AtomicU64,
    date_time_settle: Duration,
}

impl PortController {
    pub fn new(identity: &str, codes: CommandCodes, gate: CommandGate, audit: Arc<AuditLog>) -> Self {
        Self {
            identity: identity.to_string(),
            codes,
            gate,
            audit,
            state: Mutex::new(ControllerState {
                port1_enabled: true,
                port3_bridged: true,
                auto_enable: None,
            }),
            next_timer_id: AtomicU64::new(1),
            date_time_settle: DATE_TIME_SETTLE,
        }
    }

    pub fn with_date_time_settle(mut self, settle: Duration) -> Self {
        self.date_time_settle = settle;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    async fn exchange(&self, command: Command, suffix: &str) -> Result<Outcome, LinkError> {
        let code = format!("{}{}", self.codes.code(command), suffix);
        self.gate.execute(&code).await
    }

    /// Exchange a command, folding link errors into a failed outcome.
    async fn issue(&self, command: Command, suffix: &str) -> Outcome {
        match self.exchange(command, suffix).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("{} failed: {}", command.label(), e);
                Outcome::failure(format!("{} failed: {}", command.label(), e))
            }
        }
    }

    /// Disable the Port 1 transmitter, optionally re-enabling it after
    /// `interval_secs`.
    ///
    /// Refused while an auto-enable timer is pending: the existing timer and
    /// deadline stay as they are and nothing is sent.
    pub async fn disable(self: &Arc<Self>, caller: &str, interval_secs: u64) -> Outcome {
        let mut state = self.state.lock().await;

        if let Some(pending) = &state.auto_enable {
            let remaining = pending.remaining_secs(Utc::now());
            info!(
                "[{}] Port 1 disable refused, auto-enable pending in {} seconds",
                escape_log(caller),
                remaining
            );
            return Outcome::failure(format!(
                "Port 1 already disabled, auto-enable in {remaining} seconds"
            ));
        }
        if interval_secs > MAX_AUTO_ENABLE_SECS {
            return Outcome::failure(format!(
                "Interval of {interval_secs} seconds exceeds the {MAX_AUTO_ENABLE_SECS} second limit"
            ));
        }

        let mut entry = "Port 1 OFF".to_string();
        if interval_secs > 0 {
            entry.push_str(&format!(" (with {interval_secs} second timer)"));
        }
        self.audit.record(caller, &entry);

        let outcome = self.issue(Command::Port1Disable, "").await;
        if !outcome.succeeded {
            return outcome;
        }
        state.port1_enabled = false;
        if interval_secs > 0 {
            state.auto_enable = Some(self.arm_auto_enable(caller, interval_secs));
        }
        outcome
    }

    fn arm_auto_enable(self: &Arc<Self>, caller: &str, interval_secs: u64) -> AutoEnable {
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        // interval_secs is bounded by MAX_AUTO_ENABLE_SECS
        let deadline = Utc::now() + chrono::Duration::seconds(interval_secs as i64);
        info!(
            "[{}] Setting enable timer for {} seconds",
            escape_log(caller),
            interval_secs
        );

        let controller = Arc::clone(self);
        let owner = caller.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            controller.enable_inner(&owner, Some(id)).await;
        });
        AutoEnable {
            id,
            deadline,
            handle,
        }
    }

    /// Enable the Port 1 transmitter and cancel any pending auto-enable.
    pub async fn enable(&self, caller: &str) -> Outcome {
        self.enable_inner(caller, None).await
    }

    async fn enable_inner(&self, caller: &str, fired_timer: Option<u64>) -> Outcome {
        let mut state = self.state.lock().await;
        if fired_timer.is_some() {
            info!("[{}] Timer expired, re-enabling repeater", escape_log(caller));
        }
        self.audit.record(caller, "Port 1 ON");

        let outcome = self.issue(Command::Port1Enable, "").await;
        if outcome.succeeded {
            state.port1_enabled = true;
        }

        match fired_timer {
            Some(id) => {
                // The firing timer is spent whatever the reply was.
                if state.auto_enable.as_ref().map(|p| p.id) == Some(id) {
                    state.auto_enable = None;
                } else {
                    debug!("Auto-enable timer {} fired after being superseded", id);
                }
                if !outcome.succeeded {
                    warn!(
                        "[{}] Auto-enable failed, Port 1 remains disabled: {}",
                        escape_log(caller),
                        outcome.message
                    );
                }
            }
            None if outcome.succeeded => {
                if let Some(pending) = state.auto_enable.take() {
                    info!("[{}] Timer cancelled", escape_log(caller));
                    pending.handle.abort();
                }
            }
            None => {}
        }
        outcome
    }

    pub async fn bridge(&self, caller: &str) -> Outcome {
        self.set_bridge(caller, true).await
    }

    pub async fn unbridge(&self, caller: &str) -> Outcome {
        self.set_bridge(caller, false).await
    }

    async fn set_bridge(&self, caller: &str, bridged: bool) -> Outcome {
        let mut state = self.state.lock().await;
        let (entry, command) = if bridged {
            ("Bridge Port 1-3", Command::Port3Bridge)
        } else {
            ("Unbridge Port 1-3", Command::Port3Unbridge)
        };
        self.audit.record(caller, entry);

        let outcome = self.issue(command, "").await;
        if outcome.succeeded {
            state.port3_bridged = bridged;
        }
        outcome
    }

    /// Restart the controller.
    ///
    /// The controller reboots instead of answering, so any reply counts as
    /// success once the command was written.
    pub async fn restart(&self, caller: &str) -> Outcome {
        let _state = self.state.lock().await;
        self.audit.record(caller, "Restart");
        match self.exchange(Command::Restart, "").await {
            Ok(reply) => {
                if !reply.succeeded {
                    debug!("Ignoring restart reply: {}", reply.message);
                }
                Outcome::success("Restart issued")
            }
            Err(e) => {
                error!("restart failed: {}", e);
                Outcome::failure(format!("restart failed: {e}"))
            }
        }
    }

    /// Set the controller clock from local time: date first, then time.
    ///
    /// The state lock is held across both exchanges so no other command
    /// reaches the wire between them.
    pub async fn set_date_time(&self, caller: &str) -> Outcome {
        let _state = self.state.lock().await;
        self.audit.record(caller, "Set Date/Time");

        let date = Local::now().format("%m%d%y").to_string();
        let outcome = self.issue(Command::SetDate, &date).await;
        if !outcome.succeeded {
            return outcome;
        }

        tokio::time::sleep(self.date_time_settle).await;
        let time = Local::now().format("%H%M%S").to_string();
        let outcome = self.issue(Command::SetTime, &time).await;
        if !outcome.succeeded {
            return outcome;
        }
        Outcome::success(format!("Date/Time set to ({date}, {time})"))
    }

    pub async fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().await;
        StatusSnapshot {
            identity: self.identity.clone(),
            port1_enabled: state.port1_enabled,
            port3_bridged: state.port3_bridged,
            simulation: self.gate.is_simulated(),
            auto_enable_deadline: state
                .auto_enable
                .as_ref()
                .map(|pending| epoch_seconds(pending.deadline)),
        }
    }

    pub async fn port1_state(&self) -> PortState {
        let state = self.state.lock().await;
        match (&state.auto_enable, state.port1_enabled) {
            (Some(pending), _) => PortState::DisabledWithTimer {
                deadline: pending.deadline,
            },
            (None, true) => PortState::Enabled,
            (None, false) => PortState::DisabledNoTimer,
        }
    }

    /// Drop any pending auto-enable without firing it (used at shutdown).
    pub async fn abandon_auto_enable(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.auto_enable.take() {
            Some(pending) => {
                pending.handle.abort();
                warn!("Pending auto-enable abandoned, Port 1 stays disabled");
                true
            }
            None => false,
        }
    }
}
