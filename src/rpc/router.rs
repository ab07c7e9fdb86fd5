use std::net::SocketAddr;

use log::{debug, info};
use serde_json::json;

use super::files::StaticFiles;
use super::{RpcFacade, METHODS};
use crate::auth::AuthGate;
use crate::logutil::{escape_log, redact_authorization};

/// Largest RPC body accepted.
pub const MAX_BODY: usize = 64 * 1024;

/// Realm announced in the Basic challenge.
pub const REALM: &str = "Arcom";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Other,
}

/// A request stripped down to what routing needs.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub verb: Verb,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
    pub peer: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Send `WWW-Authenticate: Basic realm="Arcom"`.
    pub challenge: bool,
}

impl HttpReply {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.into_bytes(),
            challenge: false,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
            challenge: false,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            challenge: true,
            ..Self::text(401, "Not authenticated")
        }
    }

    pub fn challenge_value() -> String {
        format!("Basic realm=\"{REALM}\"")
    }
}

/// Authenticates every request, then hands it to the RPC facade, the
/// introspection pages or the static file tree.
pub struct Router {
    auth: AuthGate,
    rpc: RpcFacade,
    files: Option<StaticFiles>,
}

impl Router {
    pub fn new(auth: AuthGate, rpc: RpcFacade, files: Option<StaticFiles>) -> Self {
        Self { auth, rpc, files }
    }

    pub fn facade(&self) -> &RpcFacade {
        &self.rpc
    }

    pub async fn route(&self, request: Inbound) -> HttpReply {
        let peer = request
            .peer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let user = match self.auth.authenticate(request.authorization.as_deref()) {
            Ok(user) => user,
            Err(reason) => {
                info!(
                    target: "security",
                    "Refused {:?} {} from {}: {} (authorization {})",
                    request.verb,
                    escape_log(&request.path),
                    peer,
                    reason,
                    redact_authorization(request.authorization.as_deref())
                );
                return HttpReply::unauthorized();
            }
        };
        debug!(
            "{:?} {} from {} as {}",
            request.verb,
            escape_log(&request.path),
            peer,
            escape_log(&user)
        );

        let path = request.path.split('?').next().unwrap_or("");
        match (request.verb, path) {
            (Verb::Post, "/RPC2") | (Verb::Post, "/") => {
                if request.body.len() > MAX_BODY {
                    return HttpReply::text(413, "Request body too large");
                }
                let (status, body) = self.rpc.serve(&request.body).await;
                HttpReply::json(status, body)
            }
            (Verb::Post, _) => HttpReply::text(404, "Not found"),
            (Verb::Get, "/methods") => HttpReply::json(200, json!(METHODS).to_string()),
            (Verb::Get, "/status") => {
                self.rpc
                    .controller()
                    .audit()
                    .note(&user, "Status Request");
                let status = self.rpc.controller().status().await;
                HttpReply::json(200, json!(status).to_string())
            }
            (Verb::Get, _) => self.serve_file(path).await,
            (Verb::Other, _) => HttpReply::text(405, "Method not allowed"),
        }
    }

    async fn serve_file(&self, path: &str) -> HttpReply {
        let Some(files) = &self.files else {
            return HttpReply::text(404, "Not found");
        };
        match files.read(path).await {
            Some((body, content_type)) => HttpReply {
                status: 200,
                content_type,
                body,
                challenge: false,
            },
            None => HttpReply::text(404, "Not found"),
        }
    }
}
