//! What a refused request leaves on the `security` log target.

mod common;

use std::sync::Mutex;

use common::{call, post, router, FakeLink, BAD_AUTH};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;

struct Capture;

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.target() == "security" {
            RECORDS
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: Capture = Capture;

#[tokio::test]
async fn refused_request_is_logged_once_with_peer_and_reason() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let link = FakeLink::new();
    let router = router(&link);
    let mut request = post(&call("port1Disable", json!({"caller": "N0CALL"})), Some(BAD_AUTH));
    request.peer = Some("192.0.2.7:5100".parse().unwrap());

    assert_eq!(router.route(request).await.status, 401);

    let refusals: Vec<String> = RECORDS
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, _)| *level <= Level::Info)
        .map(|(_, line)| line.clone())
        .collect();
    assert_eq!(refusals.len(), 1, "{refusals:?}");
    let line = &refusals[0];
    assert!(line.contains("/RPC2"), "{line}");
    assert!(line.contains("192.0.2.7:5100"), "{line}");
    assert!(line.contains("bad password for N0CALL"), "{line}");
    assert!(line.contains("Basic <redacted>"), "{line}");
    assert!(!line.contains("TjBDQUxM"), "{line}");
}
