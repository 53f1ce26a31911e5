//! Feed monitor.
//!
//! Subscribes to every well-known event kind on an injected connection
//! manager, keeps the platform board current, and periodically logs the
//! connection status until shutdown or terminal connection failure.

use crate::board::PlatformBoard;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use sigfeed_core::{
    AgentSignal, AgentStatusUpdate, EventKind, MarketEvent, PlatformStatusUpdate, TradeExecution,
};
use sigfeed_telemetry::FeedMetrics;
use sigfeed_ws::ConnectionManager;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Headless dashboard feed monitor.
pub struct Monitor {
    config: AppConfig,
    connection: ConnectionManager,
    board: Arc<PlatformBoard>,
    failed_rx: mpsc::Receiver<()>,
    status_reports: u64,
}

impl Monitor {
    /// Create a monitor over `connection` and register its subscribers.
    pub fn new(config: AppConfig, connection: ConnectionManager) -> Self {
        let board = Arc::new(PlatformBoard::new());
        let (failed_tx, failed_rx) = mpsc::channel(1);
        register_subscribers(&connection, board.clone(), failed_tx);

        Self {
            config,
            connection,
            board,
            failed_rx,
            status_reports: 0,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn board(&self) -> &PlatformBoard {
        &self.board
    }

    /// Status lines logged so far.
    pub fn status_reports(&self) -> u64 {
        self.status_reports
    }

    /// Run until Ctrl-C or connection failure.
    pub async fn run(&mut self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Run until `shutdown` completes or reconnection is exhausted.
    ///
    /// The connection is closed on either exit path.
    pub async fn run_until<F>(&mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            client_id = %self.connection.client_id(),
            url = %self.connection.endpoint_url(),
            "Starting monitor"
        );

        if self.config.request_status_on_start {
            if let Err(e) = self.connection.get_status().await {
                warn!(error = %e, "Initial status request failed");
            }
        }

        let mut status_interval = tokio::time::interval(self.config.status_interval());
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = status_interval.tick() => {
                    self.report_status();
                }

                Some(()) = self.failed_rx.recv() => {
                    error!("Connection failed, giving up");
                    break Err(AppError::ConnectionFailed);
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
            }
        };

        self.connection.close();
        self.report_status();
        match FeedMetrics::render() {
            Ok(metrics) => debug!(%metrics, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }
        info!(status_reports = self.status_reports, "Monitor stopped");
        result
    }

    fn report_status(&mut self) {
        self.status_reports += 1;
        info!(
            status = %self.connection.connection_status(),
            attempts = self.connection.reconnect_attempts(),
            platforms = self.board.len(),
            online = self.board.online_count(),
            board = %self.board.summary(),
            events = delivered_events(),
            "Connection status"
        );
    }
}

/// Events delivered to a subscriber so far, across every known kind.
fn delivered_events() -> u64 {
    EventKind::ALL
        .iter()
        .map(|kind| FeedMetrics::event_count(kind.as_str()))
        .sum()
}

fn register_subscribers(
    connection: &ConnectionManager,
    board: Arc<PlatformBoard>,
    failed_tx: mpsc::Sender<()>,
) {
    let dispatch = connection.dispatch();

    dispatch.on_market_event(|event: MarketEvent| {
        debug!(
            symbol = %event.symbol,
            price = %event.price,
            source = %event.source,
            news = event.has_news(),
            "Market event"
        );
    });

    dispatch.on_agent_signal(|signal: AgentSignal| {
        info!(
            agent = %signal.agent,
            signal = ?signal.signal,
            confidence = signal.confidence_clamped(),
            actionable = signal.is_actionable(),
            "Agent signal"
        );
    });

    dispatch.on_trade_update(|trade: TradeExecution| {
        info!(
            id = %trade.id,
            symbol = %trade.symbol,
            direction = ?trade.direction,
            status = ?trade.status,
            pnl = ?trade.realized_pnl(),
            "Trade update"
        );
    });

    dispatch.on_agent_status(|update: AgentStatusUpdate| {
        info!(
            agents = update.agents.len(),
            online = update.online_count(),
            "Agent status"
        );
    });

    // Occupies the system_event slot
    dispatch.on_platform_status(move |update: PlatformStatusUpdate| {
        let names: Vec<&String> = update.platforms.keys().collect();
        debug!(platforms = ?names, "Platform status");
        board.apply(update);
    });

    dispatch.on_agent_output(|event| {
        debug!(kind = event.kind(), payload = %event.payload(), "Agent output");
    });

    dispatch.on_task_update(|event| {
        debug!(kind = event.kind(), payload = %event.payload(), "Task update");
    });

    dispatch.on_connection_failed(move || {
        let _ = failed_tx.try_send(());
    });
}
