//! Daemon orchestrator for wiring together all components.
//!
//! This module provides the `DaemonOrchestrator` that prepares the sandbox,
//! builds the file components and serves the HTTP router until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::files::SandboxRoot;
use crate::router::{router, AppState};

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Binding the listener.
    Starting,
    /// Running and accepting requests.
    Running,
    /// Draining in-flight requests.
    ShuttingDown,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Orchestrator state changed.
    StateChanged(OrchestratorState),
    /// The HTTP listener is bound.
    Listening { addr: SocketAddr },
    /// Error occurred.
    Error { message: String },
}

/// Daemon orchestrator that owns the HTTP server.
pub struct DaemonOrchestrator {
    /// Configuration.
    config: Config,
    /// Components shared with every request.
    app_state: AppState,
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
    /// Event sender.
    event_tx: broadcast::Sender<OrchestratorEvent>,
    /// Running server task.
    server: Option<JoinHandle<std::io::Result<()>>>,
    /// Address the listener is bound to, once started.
    local_addr: Option<SocketAddr>,
}

impl DaemonOrchestrator {
    /// Creates a new daemon orchestrator.
    ///
    /// The sandbox root is created if it does not exist yet.
    pub fn new(config: Config) -> Result<Self> {
        let sandbox = SandboxRoot::open_or_create(&config.file.sandbox_root).with_context(|| {
            format!(
                "Failed to prepare sandbox root: {}",
                config.file.sandbox_root.display()
            )
        })?;
        info!("Sandbox root: {}", sandbox.path().display());

        let app_state = AppState::new(
            sandbox,
            config.file.max_in_flight,
            config.file.hash_buffer_size,
        );

        let (event_tx, _) = broadcast::channel(64);

        Ok(Self {
            config,
            app_state,
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            shutdown_token: CancellationToken::new(),
            event_tx,
            server: None,
            local_addr: None,
        })
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Returns a receiver for orchestrator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.event_tx.subscribe()
    }

    /// Binds the listener and starts serving requests in the background.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 is requested.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            *state = OrchestratorState::Starting;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Starting));

        let listen_addr = self.config.listen_addr();
        let listener = match TcpListener::bind(&listen_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.set_state(OrchestratorState::Stopped).await;
                self.emit_event(OrchestratorEvent::Error {
                    message: format!("Failed to bind {listen_addr}: {e}"),
                });
                return Err(e).with_context(|| format!("Failed to bind {listen_addr}"));
            }
        };
        let addr = listener
            .local_addr()
            .context("Failed to read listener address")?;
        self.local_addr = Some(addr);

        let app = router(self.app_state.clone());
        let shutdown = self.shutdown_token.clone().cancelled_owned();
        let event_tx = self.event_tx.clone();

        self.server = Some(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await;
            if let Err(ref e) = result {
                error!("HTTP server error: {}", e);
                let _ = event_tx.send(OrchestratorEvent::Error {
                    message: e.to_string(),
                });
            }
            result
        }));

        self.set_state(OrchestratorState::Running).await;
        self.emit_event(OrchestratorEvent::Listening { addr });
        info!("Server running at http://{}", addr);

        Ok(addr)
    }

    /// Stops accepting requests and waits for in-flight ones to finish.
    pub async fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }
        self.emit_event(OrchestratorEvent::StateChanged(
            OrchestratorState::ShuttingDown,
        ));

        info!("Stopping daemon orchestrator...");
        self.shutdown_token.cancel();

        if let Some(server) = self.server.take() {
            match server.await {
                Ok(Ok(())) => debug!("HTTP server drained"),
                Ok(Err(e)) => error!("HTTP server exited with error: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
            }
        }

        self.set_state(OrchestratorState::Stopped).await;
        info!("Daemon orchestrator stopped");
        Ok(())
    }

    async fn set_state(&self, new_state: OrchestratorState) {
        *self.state.write().await = new_state;
        self.emit_event(OrchestratorEvent::StateChanged(new_state));
    }

    /// Emits an orchestrator event.
    fn emit_event(&self, event: OrchestratorEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns the shared request state.
    pub fn app_state(&self) -> &AppState {
        &self.app_state
    }

    /// Returns the bound address, if the server has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
