//! Process wiring: builds every component from the configuration, serves
//! until interrupted, then shuts down.
//!
//! Startup order matters. The PID lock is taken first so a second instance
//! never touches the serial device; the listener is bound last so no request
//! arrives before the controller, history and credentials are ready.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use crate::audit::AuditLog;
use crate::auth::{AuthGate, CredentialTable};
use crate::config::Config;
use crate::controller::{CommandGate, PortController};
use crate::error::StartupError;
use crate::pidfile::PidLock;
use crate::rpc::files::StaticFiles;
use crate::rpc::{RpcFacade, RpcServer, Router};
use crate::serial::open_transport;
use crate::weblog::WebFormLogger;

pub struct Daemon {
    controller: Arc<PortController>,
    server: RpcServer,
    pid_lock: Option<PidLock>,
}

impl Daemon {
    /// Bring every component up. `simulate` forces simulation regardless of
    /// the configuration.
    pub fn start(config: &Config, simulate: bool) -> Result<Self, StartupError> {
        config
            .validate()
            .map_err(|e| StartupError::Config(e.to_string()))?;

        let pid_lock = match &config.server.pid_file {
            Some(path) => Some(PidLock::acquire(path)?),
            None => None,
        };

        let simulate = simulate || config.serial.simulate;
        let gate = CommandGate::new(open_transport(&config.serial, simulate)?);
        if gate.is_simulated() {
            warn!("Running in simulation mode: the repeater will not be touched");
        }

        let audit = Arc::new(AuditLog::open(&config.storage.history_file));
        let controller = Arc::new(PortController::new(
            &config.server.identity,
            config.commands.clone(),
            gate.clone(),
            audit,
        ));

        let credentials = CredentialTable::load(Path::new(&config.server.password_file))
            .map_err(|e| StartupError::Config(e.to_string()))?;
        let weblog = WebFormLogger::new(config.weblog.clone(), gate.is_simulated());
        let files = config.server.static_dir.as_ref().map(StaticFiles::new);
        let router = Arc::new(Router::new(
            AuthGate::new(credentials),
            RpcFacade::new(Arc::clone(&controller), weblog),
            files,
        ));

        let addr = format!("{}:{}", config.server.bind_address, config.server.port);
        let server = RpcServer::bind(&addr, config.server.tls.as_ref(), router)?;

        info!(
            "{} controller ready on {}",
            config.server.identity,
            server.local_addr()
        );
        Ok(Self {
            controller,
            server,
            pid_lock,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn controller(&self) -> &Arc<PortController> {
        &self.controller
    }

    /// Serve until Ctrl-C. A pending auto-enable is abandoned, not fired,
    /// and the history is flushed before the PID lock is released.
    pub async fn run(self) -> Result<()> {
        let Self {
            controller,
            server,
            pid_lock,
        } = self;
        let shutdown = server.shutdown_handle();
        let serve = server.serve();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                controller.abandon_auto_enable().await;
                shutdown.shutdown();
                serve.await?;
            }
        }

        let audit = Arc::clone(controller.audit());
        tokio::task::spawn_blocking(move || audit.flush()).await?;
        drop(pid_lock);
        info!("Shutdown complete");
        Ok(())
    }
}
