//! Stream Session - one monitored structure, one pipeline.
//!
//! Samples arrive sequentially and each completed window runs the whole
//! chain (QC -> features -> anomaly/comparative -> alerts) before the next
//! window is accepted, so the dispatcher's debounce state and the active
//! baseline pointer never race. Sessions share nothing mutable with each
//! other; the model manager is read-only across them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::CoreError;
use crate::logic::alerts::{Alert, AlertDispatcher};
use crate::logic::baseline::BaselineManager;
use crate::logic::events::{BaselineSummary, InboundMessage, OutboundEvent, SensorSummary, WindowMetrics};
use crate::logic::features::{self, layout};
use crate::logic::model::ModelManager;
use crate::logic::quality::{QualityEvaluator, SnrBand};
use crate::logic::window::{SensorSample, Window, WindowBuffer};
use crate::transport::reconnect::{ConnStateMachine, ReconnectPolicy};
use crate::transport::{Connector, TransportReader, TransportWriter};

/// Session state shared with the operator surface.
pub struct SessionContext {
    pub structure_id: String,
    pub baselines: Arc<BaselineManager>,
    pub last_window: RwLock<Option<Arc<Window>>>,
    pub recent_alerts: RwLock<Vec<Alert>>,
    pub halted: AtomicBool,
    notify_tx: mpsc::Sender<OutboundEvent>,
}

impl SessionContext {
    pub fn new(structure_id: String) -> (Arc<Self>, mpsc::Receiver<OutboundEvent>) {
        let (notify_tx, notify_rx) = mpsc::channel(64);
        let ctx = Arc::new(Self {
            structure_id,
            baselines: Arc::new(BaselineManager::new()),
            last_window: RwLock::new(None),
            recent_alerts: RwLock::new(Vec::new()),
            halted: AtomicBool::new(false),
            notify_tx,
        });
        (ctx, notify_rx)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    /// Queue a control event for the outbound stream (operator-surface ops).
    pub fn notify(&self, event: OutboundEvent) {
        if let Err(e) = self.notify_tx.try_send(event) {
            debug!(structure = %self.structure_id, error = %e, "notify queue full or closed, event dropped");
        }
    }
}

pub struct StreamSession {
    ctx: Arc<SessionContext>,
    model: Arc<ModelManager>,
    buffer: WindowBuffer,
    quality: QualityEvaluator,
    dispatcher: AlertDispatcher,
}

impl StreamSession {
    pub fn new(ctx: Arc<SessionContext>, model: Arc<ModelManager>, config: &Config) -> Self {
        Self {
            ctx,
            model,
            buffer: WindowBuffer::new(config.window.clone()),
            quality: QualityEvaluator::new(config.full_scale_g),
            dispatcher: AlertDispatcher::new(config.alert_ttl_secs),
        }
    }

    pub fn context(&self) -> Arc<SessionContext> {
        self.ctx.clone()
    }

    /// Parse and dispatch one inbound line. Malformed lines are dropped with
    /// a logged warning, never fatal.
    pub fn handle_line(&mut self, line: &str) -> Vec<OutboundEvent> {
        match serde_json::from_str::<InboundMessage>(line) {
            Ok(msg) => self.handle_message(msg),
            Err(e) => {
                warn!(structure = %self.ctx.structure_id, error = %e, "dropping malformed inbound message");
                Vec::new()
            }
        }
    }

    pub fn handle_message(&mut self, msg: InboundMessage) -> Vec<OutboundEvent> {
        match msg {
            InboundMessage::Sample {
                sensor_id,
                timestamp,
                x,
                y,
                z,
            } => self.handle_sample(SensorSample {
                sensor_id,
                timestamp,
                x,
                y,
                z,
            }),

            InboundMessage::MarkBaseline { name, description } => {
                let window = self.ctx.last_window.read().clone();
                match window {
                    Some(w) => {
                        let baseline = self.ctx.baselines.mark(&name, &description, &w);
                        vec![OutboundEvent::BaselineMarked {
                            baseline_id: baseline.id,
                            name: baseline.name.clone(),
                        }]
                    }
                    None => vec![OutboundEvent::Error {
                        message: "no completed window available to mark".into(),
                    }],
                }
            }

            InboundMessage::SelectBaseline { baseline_id } => {
                match self.ctx.baselines.select(baseline_id) {
                    Ok(_) => vec![OutboundEvent::BaselineSelected { baseline_id }],
                    Err(e) => vec![OutboundEvent::Error {
                        message: e.to_string(),
                    }],
                }
            }

            InboundMessage::ListBaselines => {
                let baselines = self
                    .ctx
                    .baselines
                    .list()
                    .iter()
                    .map(|b| BaselineSummary::from(b.as_ref()))
                    .collect();
                vec![OutboundEvent::BaselineList { baselines }]
            }
        }
    }

    fn handle_sample(&mut self, sample: SensorSample) -> Vec<OutboundEvent> {
        if self.ctx.is_halted() {
            return Vec::new();
        }
        match self.buffer.ingest(sample) {
            Ok(Some(window)) => self.process_window(window),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(structure = %self.ctx.structure_id, error = %e, "sample dropped");
                Vec::new()
            }
        }
    }

    /// Run one completed window through QC -> features -> scoring -> alerts.
    fn process_window(&mut self, window: Window) -> Vec<OutboundEvent> {
        let window = Arc::new(window);
        *self.ctx.last_window.write() = Some(window.clone());

        let qc = self.quality.evaluate(&window);
        if qc.snr_band == SnrBand::Poor {
            debug!(structure = %self.ctx.structure_id, snr_db = qc.snr_db, "poor window SNR");
        }

        let fv = match features::extract(&window) {
            Ok(fv) => fv,
            Err(e) => return self.fail_window(e),
        };

        let ml_anomaly = match self.model.score(&fv) {
            Ok(result) => result,
            Err(e) => return self.fail_window(e),
        };

        let comparative = self.ctx.baselines.compare_active(&window);

        let now = Utc::now();
        let alerts = self
            .dispatcher
            .evaluate(now, &qc, &ml_anomaly, comparative.as_ref());
        *self.ctx.recent_alerts.write() = self.dispatcher.active_alerts(now);

        let sensors = window
            .sensor_ids()
            .into_iter()
            .enumerate()
            .map(|(slot, sensor_id)| SensorSummary {
                sensor_id,
                rms: fv.get(layout::sensor_feature_index(slot, 0)).unwrap_or(0.0),
                peak_frequency_hz: fv.get(layout::sensor_feature_index(slot, 14)).unwrap_or(0.0),
            })
            .collect();

        vec![OutboundEvent::WindowResult {
            ts: window.end_ts,
            qc,
            metrics: WindowMetrics {
                feature_version: fv.version,
                layout_hash: fv.layout_hash,
                features: fv.values.clone(),
                sensors,
            },
            comparative,
            ml_anomaly,
            alerts,
        }]
    }

    fn fail_window(&mut self, err: CoreError) -> Vec<OutboundEvent> {
        if err.is_fatal_for_session() {
            self.ctx.halted.store(true, Ordering::Relaxed);
            warn!(structure = %self.ctx.structure_id, error = %err, "session halted on schema mismatch");
        } else {
            warn!(structure = %self.ctx.structure_id, error = %err, "window processing failed");
        }
        vec![OutboundEvent::Error {
            message: err.to_string(),
        }]
    }

    /// Timer tick: discard stale partial windows.
    pub fn sweep(&mut self) {
        self.buffer.sweep();
    }

    /// Drop buffered partial windows (disconnect or cancellation).
    pub fn release(&mut self) {
        self.buffer.release();
    }
}

enum ConnEnd {
    Disconnected,
    Shutdown,
}

/// Drive one session against its gateway: dial, pump, reconnect with
/// backoff, park after repeated failures, stop on shutdown.
pub async fn run_session(
    mut session: StreamSession,
    connector: Box<dyn Connector>,
    mut notify_rx: mpsc::Receiver<OutboundEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let structure_id = session.ctx.structure_id.clone();
    let mut machine = ConnStateMachine::new(ReconnectPolicy::default());

    loop {
        if *shutdown.borrow() {
            break;
        }
        machine.on_connect_start();
        match connector.connect().await {
            Ok((mut reader, mut writer)) => {
                machine.on_connected();
                info!(structure = %structure_id, "gateway connected");
                let end = pump_connection(
                    &mut session,
                    reader.as_mut(),
                    writer.as_mut(),
                    &mut notify_rx,
                    &mut shutdown,
                )
                .await;
                // A dropped connection must not leak a half-built window
                session.release();
                match end {
                    ConnEnd::Shutdown => break,
                    ConnEnd::Disconnected => machine.on_disconnected(),
                }
            }
            Err(e) => {
                machine.on_failure();
                warn!(structure = %structure_id, error = %e, state = ?machine.state(), "gateway dial failed");
            }
        }

        if let Some(wait) = machine.next_wait() {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }
        }
    }

    session.release();
    info!(structure = %structure_id, "session stopped");
}

async fn pump_connection(
    session: &mut StreamSession,
    reader: &mut dyn TransportReader,
    writer: &mut dyn TransportWriter,
    notify_rx: &mut mpsc::Receiver<OutboundEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> ConnEnd {
    let mut sweep = tokio::time::interval(std::time::Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = shutdown.changed() => return ConnEnd::Shutdown,

            _ = sweep.tick() => session.sweep(),

            maybe = notify_rx.recv() => {
                if let Some(event) = maybe {
                    if publish(writer, &event).await.is_err() {
                        return ConnEnd::Disconnected;
                    }
                }
            }

            result = reader.recv() => match result {
                Ok(Some(line)) => {
                    for event in session.handle_line(&line) {
                        if publish(writer, &event).await.is_err() {
                            return ConnEnd::Disconnected;
                        }
                    }
                }
                Ok(None) => {
                    info!(structure = %session.ctx.structure_id, "gateway closed the stream");
                    return ConnEnd::Disconnected;
                }
                Err(e) => {
                    warn!(structure = %session.ctx.structure_id, error = %e, "transport error");
                    return ConnEnd::Disconnected;
                }
            },
        }
    }
}

async fn publish(writer: &mut dyn TransportWriter, event: &OutboundEvent) -> Result<(), CoreError> {
    let line = serde_json::to_string(event)
        .map_err(|e| CoreError::Transport(format!("event encode: {}", e)))?;
    writer.send(&line).await
}
