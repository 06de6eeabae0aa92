//! Service wiring and the main event loop

use anyhow::{Context, Result};
use kidmode_api::{
    ErrorCode, ErrorInfo, Event, EventPayload, Request, Response, API_VERSION,
};
use kidmode_config::Settings;
use kidmode_core::{RequestArbiter, TickOutcome};
use kidmode_host_api::{TimerToken, TokioScheduler};
use kidmode_ipc::{IpcServer, ServerMessage};
use kidmode_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use kidmode_util::{ClientId, MonotonicInstant, RateLimiter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{handle_command, IpcNotifier};

/// Database file inside the data directory
pub const DB_FILE_NAME: &str = "kidmoded.db";

/// How often unanswered challenges are checked for timeout
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

/// Main service state
pub struct Service {
    arbiter: RequestArbiter,
    store: Arc<dyn Store>,
    ipc: Arc<IpcServer>,
    ticks: mpsc::UnboundedReceiver<TimerToken>,
    rate_limiter: RateLimiter,
}

impl Service {
    pub async fn new(settings: Settings) -> Result<Self> {
        let data_dir = settings.service.data_dir.clone();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DB_FILE_NAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let mut ipc = IpcServer::new(&settings.service.socket_path);
        ipc.start().await.with_context(|| {
            format!(
                "Failed to start IPC server at {:?}",
                settings.service.socket_path
            )
        })?;

        let (scheduler, ticks) = TokioScheduler::new();
        let notifier = IpcNotifier::new(ipc.event_sender());

        let arbiter = RequestArbiter::new(
            settings,
            store.clone(),
            Arc::new(scheduler),
            Arc::new(notifier),
        )?;

        // 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            arbiter,
            store,
            ipc: Arc::new(ipc),
            ticks,
            rate_limiter,
        })
    }

    /// Run until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ipc_messages = self
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = self.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        tokio::pin!(shutdown);

        info!("Service running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    break;
                }

                // Countdown ticks
                Some(token) = self.ticks.recv() => {
                    match self.arbiter.on_tick(token) {
                        TickOutcome::Ticked { .. } | TickOutcome::Expired => {
                            self.broadcast_session();
                        }
                        TickOutcome::Stale => {}
                    }
                }

                // Challenge timeout
                _ = housekeeping.tick() => {
                    if self.arbiter.expire_stale_challenge(MonotonicInstant::now()) {
                        self.broadcast_session();
                    }
                }

                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        info!("Shutting down kidmoded");

        self.arbiter.shutdown();
        self.ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        self.ipc.shutdown();
        info!("Shutdown complete");
        Ok(())
    }

    fn broadcast_session(&self) {
        self.ipc
            .broadcast_event(Event::new(EventPayload::SessionChanged(self.arbiter.view())));
    }

    async fn handle_ipc_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let response = self.handle_request(client_id, request);
                if let Err(e) = self.ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(client_id = %client_id, uid = ?info.uid, "Client connected");

                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::ClientConnected {
                        client_id: client_id.to_string(),
                        uid: info.uid,
                    },
                ));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let _ = self.store.append_audit(AuditEvent::new(
                    AuditEventType::ClientDisconnected {
                        client_id: client_id.to_string(),
                    },
                ));

                self.rate_limiter.remove_client(&client_id);
            }
        }
    }

    fn handle_request(&mut self, client_id: ClientId, request: Request) -> Response {
        if !self.rate_limiter.check(&client_id) {
            return Response::error(
                request.request_id,
                ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
            );
        }

        if request.api_version != API_VERSION {
            return Response::error(
                request.request_id,
                ErrorInfo::new(
                    ErrorCode::InvalidRequest,
                    format!(
                        "Unsupported API version {} (expected {})",
                        request.api_version, API_VERSION
                    ),
                ),
            );
        }

        let dispatched = handle_command(
            &mut self.arbiter,
            self.store.as_ref(),
            client_id,
            request.request_id,
            request.command,
        );

        if dispatched.session_changed {
            self.broadcast_session();
        }

        dispatched.response
    }
}
