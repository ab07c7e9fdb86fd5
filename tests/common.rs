//! Test utilities & fixtures.
//! A scripted stand-in for the RC210 plus helpers that wire it into a
//! controller, facade and router the way the daemon does.
#![allow(dead_code)] // each test binary uses a different subset

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arcomd::audit::AuditLog;
use arcomd::auth::{AuthGate, CredentialTable};
use arcomd::config::{CommandCodes, WeblogConfig};
use arcomd::controller::{CommandGate, PortController};
use arcomd::error::LinkError;
use arcomd::rpc::{Inbound, RpcFacade, Router, Verb};
use arcomd::serial::{Outcome, Transport};
use arcomd::weblog::WebFormLogger;

pub const IDENTITY: &str = "W1ABC/R";

/// `N0CALL:hunter2`
pub const GOOD_AUTH: &str = "Basic TjBDQUxMOmh1bnRlcjI=";
/// `N0CALL:wrong`
pub const BAD_AUTH: &str = "Basic TjBDQUxMOndyb25n";
pub const N0CALL_LINE: &str = "N0CALL:2b0ec4ec25af88956d87f35393cef44180f8e9048be50ad77d6265e2";

/// Fake controller link. Clones share state, so a test keeps one clone to
/// steer replies and inspect what was sent.
#[derive(Clone, Default)]
pub struct FakeLink {
    sent: Arc<Mutex<Vec<String>>>,
    rejecting: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
}

impl FakeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codes sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Answer every following command with `-`.
    pub fn reject(&self, on: bool) {
        self.rejecting.store(on, Ordering::SeqCst);
    }

    /// Take `delay` over every following exchange, like a real serial round trip.
    pub fn slow(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fail every following write at the I/O level.
    pub fn break_link(&self, on: bool) {
        self.broken.store(on, Ordering::SeqCst);
    }
}

impl Transport for FakeLink {
    fn send(&mut self, code: &str) -> Result<Outcome, LinkError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(LinkError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "unplugged",
            )));
        }
        self.sent.lock().unwrap().push(code.to_string());
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.rejecting.load(Ordering::SeqCst) {
            Ok(Outcome::failure(format!("failed: 1*{code}")))
        } else {
            Ok(Outcome::success("succeeded"))
        }
    }
}

pub fn controller(link: &FakeLink) -> Arc<PortController> {
    controller_with_settle(link, Duration::from_millis(10))
}

pub fn controller_with_settle(link: &FakeLink, settle: Duration) -> Arc<PortController> {
    Arc::new(
        PortController::new(
            IDENTITY,
            CommandCodes::default(),
            CommandGate::new(Box::new(link.clone())),
            Arc::new(AuditLog::in_memory()),
        )
        .with_date_time_settle(settle),
    )
}

pub fn router(link: &FakeLink) -> Router {
    let facade = RpcFacade::new(
        controller(link),
        WebFormLogger::new(WeblogConfig::default(), false),
    );
    let auth = AuthGate::new(CredentialTable::parse(N0CALL_LINE));
    Router::new(auth, facade, None)
}

pub fn post(body: &str, authorization: Option<&str>) -> Inbound {
    Inbound {
        verb: Verb::Post,
        path: "/RPC2".to_string(),
        authorization: authorization.map(str::to_string),
        body: body.as_bytes().to_vec(),
        peer: None,
    }
}

pub fn get(path: &str) -> Inbound {
    Inbound {
        verb: Verb::Get,
        path: path.to_string(),
        authorization: Some(GOOD_AUTH.to_string()),
        body: Vec::new(),
        peer: None,
    }
}

/// JSON body of an authenticated call.
pub fn call(method: &str, params: serde_json::Value) -> String {
    serde_json::json!({ "method": method, "params": params }).to_string()
}
