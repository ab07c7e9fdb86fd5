//! HTTP(S) listener for the RPC surface.
//!
//! `tiny_http` accepts connections on its own threads; the accept loop here
//! runs on a blocking worker and hands each request to another blocking
//! worker, which drives the async [`Router`] through the runtime handle.
//! A slow client therefore never holds up the others.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::runtime::Handle;

use super::router::{HttpReply, Inbound, Router, Verb, MAX_BODY};
use crate::config::TlsConfig;
use crate::error::StartupError;

pub struct RpcServer {
    server: Arc<Server>,
    router: Arc<Router>,
    local_addr: SocketAddr,
    stopping: Arc<AtomicBool>,
}

/// Stops a running [`RpcServer::serve`] loop from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    server: Arc<Server>,
    stopping: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.server.unblock();
    }
}

impl RpcServer {
    /// Bind the listener; HTTPS when `tls` is given.
    pub fn bind(addr: &str, tls: Option<&TlsConfig>, router: Arc<Router>) -> Result<Self, StartupError> {
        let server = match tls {
            Some(tls) => bind_tls(addr, tls)?,
            None => Server::http(addr).map_err(|e| StartupError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?,
        };
        let local_addr = server.server_addr().to_ip().ok_or_else(|| StartupError::Bind {
            addr: addr.to_string(),
            reason: "listener has no IP address".to_string(),
        })?;
        info!(
            "Listening for {} on {}",
            if tls.is_some() { "HTTPS" } else { "HTTP" },
            local_addr
        );

        Ok(Self {
            server: Arc::new(server),
            router,
            local_addr,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server: Arc::clone(&self.server),
            stopping: Arc::clone(&self.stopping),
        }
    }

    /// Accept and answer requests until [`ShutdownHandle::shutdown`] is called.
    pub async fn serve(self) -> Result<()> {
        let runtime = Handle::current();
        let Self {
            server,
            router,
            stopping,
            ..
        } = self;

        tokio::task::spawn_blocking(move || loop {
            match server.recv() {
                Ok(request) => {
                    let router = Arc::clone(&router);
                    let runtime_for_request = runtime.clone();
                    runtime.spawn_blocking(move || handle(request, &router, &runtime_for_request));
                }
                Err(_) if stopping.load(Ordering::SeqCst) => {
                    info!("RPC listener stopped");
                    break;
                }
                Err(e) => {
                    warn!("Listener error: {}", e);
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        })
        .await
        .map_err(|e| anyhow!("listener task failed: {}", e))
    }
}

#[cfg(feature = "tls")]
fn bind_tls(addr: &str, tls: &TlsConfig) -> Result<Server, StartupError> {
    let certificate = std::fs::read(&tls.certificate)
        .map_err(|e| StartupError::Tls(format!("certificate {}: {}", tls.certificate, e)))?;
    let private_key = std::fs::read(&tls.private_key)
        .map_err(|e| StartupError::Tls(format!("private key {}: {}", tls.private_key, e)))?;
    Server::https(
        addr,
        tiny_http::SslConfig {
            certificate,
            private_key,
        },
    )
    .map_err(|e| StartupError::Tls(e.to_string()))
}

#[cfg(not(feature = "tls"))]
fn bind_tls(_addr: &str, _tls: &TlsConfig) -> Result<Server, StartupError> {
    Err(StartupError::Tls(
        "[server.tls] is set but this build has no TLS support".to_string(),
    ))
}

fn inbound(request: &mut Request) -> Result<Inbound, std::io::Error> {
    let verb = match request.method() {
        Method::Get => Verb::Get,
        Method::Post => Verb::Post,
        _ => Verb::Other,
    };
    let authorization = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .map(|h| h.value.as_str().to_string());

    let mut body = Vec::new();
    if verb == Verb::Post {
        request
            .as_reader()
            .take(MAX_BODY as u64 + 1)
            .read_to_end(&mut body)?;
    }

    Ok(Inbound {
        verb,
        path: request.url().to_string(),
        authorization,
        body,
        peer: request.remote_addr().copied(),
    })
}

fn handle(mut request: Request, router: &Router, runtime: &Handle) {
    let reply = match inbound(&mut request) {
        Ok(inbound) => runtime.block_on(router.route(inbound)),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            HttpReply::text(400, "Unreadable request body")
        }
    };
    respond(request, reply);
}

fn respond(request: Request, reply: HttpReply) {
    let status = reply.status;
    let mut response = Response::from_data(reply.body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response = response.with_header(header);
    }
    if reply.challenge {
        let value = HttpReply::challenge_value();
        if let Ok(header) = Header::from_bytes(&b"WWW-Authenticate"[..], value.as_bytes()) {
            response = response.with_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        debug!("Client went away before {} reply: {}", status, e);
    }
}
