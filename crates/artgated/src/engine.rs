//! The gate engine: a dedicated OS thread owning the camera, the
//! feature extractor, and the loaded reference record.
//!
//! Requests arrive over an mpsc channel from the D-Bus handlers and are
//! processed strictly one at a time, so no two verification attempts
//! can ever touch the camera concurrently. The handle adds an atomic
//! in-flight flag on top, making a second Scan trigger a cheap no-op
//! instead of a queued duplicate.

use crate::config::Config;
use artgate_core::{
    verify_capture, ExtractorError, FeatureExtractor, GateSession, GateState, ReferenceError,
    ReferenceRecord, ScanStart, VerifyError, EXTRACTOR_INPUT_SIZE,
};
use artgate_hw::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("extractor error: {0}")]
    Extractor(#[from] ExtractorError),
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),
    #[error("verify error: {0}")]
    Verify(#[from] VerifyError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of one scan request, as surfaced to callers.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub accepted: bool,
    pub similarity: f32,
    pub message: String,
    pub state: GateState,
}

impl ScanOutcome {
    fn rejected(message: impl Into<String>, state: GateState) -> Self {
        Self {
            accepted: false,
            similarity: 0.0,
            message: message.into(),
            state,
        }
    }
}

/// Snapshot of engine state for Status calls.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub state: GateState,
    pub reference_dims: usize,
    pub threshold: f32,
    pub last_similarity: Option<f32>,
}

enum EngineRequest {
    Scan {
        reply: oneshot::Sender<Result<ScanOutcome, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    in_flight: Arc<AtomicBool>,
    /// Snapshot of the session state, kept current by the engine thread
    /// so rejected duplicate triggers report the real state.
    state: Arc<Mutex<GateState>>,
}

impl EngineHandle {
    /// Trigger one scan. If a scan is already in flight the trigger is
    /// ignored and reported as such — it never queues a second attempt.
    pub async fn scan(&self) -> Result<ScanOutcome, EngineError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("scan trigger ignored: one already in flight");
            let state = *self.state.lock().expect("gate state lock poisoned");
            return Ok(ScanOutcome::rejected("Scan already in progress", state));
        }

        let result = async {
            let (reply_tx, reply_rx) = oneshot::channel();
            self.tx
                .send(EngineRequest::Scan { reply: reply_tx })
                .await
                .map_err(|_| EngineError::ChannelClosed)?;
            reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
        }
        .await;

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Everything the verifier session needs, owned in one place and passed
/// explicitly — no long-lived globals.
struct EngineContext {
    session: GateSession,
    camera: Option<Camera>,
    /// Why the session is denied, when it is.
    denied_reason: Option<String>,
    extractor: FeatureExtractor,
    reference: ReferenceRecord,
    /// Mirror of `session.state()` shared with the handle.
    state_snapshot: Arc<Mutex<GateState>>,
}

impl EngineContext {
    fn sync_state(&self) {
        *self
            .state_snapshot
            .lock()
            .expect("gate state lock poisoned") = self.session.state();
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.session.state(),
            reference_dims: self.reference.dims(),
            threshold: self.session.threshold(),
            last_similarity: self.session.last_similarity(),
        }
    }

    fn run_scan(&mut self) -> Result<ScanOutcome, EngineError> {
        match self.session.begin_scan() {
            ScanStart::Started => self.sync_state(),
            ScanStart::AlreadyVerifying => {
                return Ok(ScanOutcome::rejected(
                    "Scan already in progress",
                    self.session.state(),
                ));
            }
            ScanStart::NotReady => {
                let message = match self.session.state() {
                    GateState::Authenticated => "Already authenticated".to_string(),
                    GateState::Denied => self
                        .denied_reason
                        .clone()
                        .unwrap_or_else(|| "Gate session denied".to_string()),
                    _ => "Camera not ready yet".to_string(),
                };
                return Ok(ScanOutcome::rejected(message, self.session.state()));
            }
        }

        let Some(camera) = self.camera.as_ref() else {
            self.session.abort_scan();
            return Ok(ScanOutcome::rejected(
                "No frame source available",
                self.session.state(),
            ));
        };

        let frame = match camera.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                // Recoverable: surface the message, keep the device for retry.
                tracing::warn!(error = %e, "frame capture failed");
                self.session.abort_scan();
                return Ok(ScanOutcome::rejected(e.to_string(), self.session.state()));
            }
        };

        let brightness = frame.avg_brightness();
        tracing::debug!(
            sequence = frame.sequence,
            brightness,
            "captured scan frame"
        );
        if brightness < 24.0 {
            tracing::warn!(brightness, "scan frame is very dark; expect a low match");
        }

        let rgb = frame.to_rgb_square(EXTRACTOR_INPUT_SIZE as u32);

        match verify_capture(
            &mut self.extractor,
            &self.reference,
            &rgb,
            self.session.threshold(),
        ) {
            Ok(attempt) => {
                let state = self.session.complete_scan(&attempt);
                if state == GateState::Authenticated {
                    // Terminal success: release the capture device.
                    self.camera.take();
                    tracing::info!(similarity = attempt.similarity, "scan accepted, camera released");
                } else {
                    tracing::info!(similarity = attempt.similarity, "scan rejected");
                }
                Ok(ScanOutcome {
                    accepted: attempt.accepted(),
                    similarity: attempt.similarity,
                    message: attempt.message,
                    state,
                })
            }
            Err(e @ VerifyError::IncompatibleReference { .. }) => {
                // Deployment mismatch: dead-end the session rather than
                // report a misleading no-match.
                tracing::error!(error = %e, "reference incompatible; denying session");
                self.denied_reason = Some(e.to_string());
                self.session.deny();
                Err(EngineError::Verify(e))
            }
            Err(e) => {
                tracing::warn!(error = %e, "scan failed");
                self.session.abort_scan();
                Ok(ScanOutcome::rejected(e.to_string(), self.session.state()))
            }
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads the reference record and the embedding model synchronously —
/// either failing is fatal, the daemon cannot verify without them. A
/// camera failure is not fatal to the process: the session starts
/// Denied with the classified error as its reason, and the user retries
/// externally (fix permissions, free the device) and restarts.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let reference = ReferenceRecord::load(&config.reference_path)?;
    tracing::info!(dims = reference.dims(), "reference loaded");

    let extractor = FeatureExtractor::load(&config.model_path())?;

    let mut session = GateSession::new(config.similarity_threshold);
    let mut denied_reason = None;

    let camera = match Camera::open(&config.camera_device) {
        Ok(camera) => {
            tracing::info!(
                device = %config.camera_device,
                width = camera.width,
                height = camera.height,
                fourcc = ?camera.fourcc,
                "camera opened"
            );
            camera.warm_up(config.warmup_frames);
            session.frame_source_ready();
            Some(camera)
        }
        Err(e) => {
            tracing::warn!(error = %e, "camera unavailable; gate starts denied");
            denied_reason = Some(e.to_string());
            session.deny();
            None
        }
    };

    let state_snapshot = Arc::new(Mutex::new(session.state()));

    let mut ctx = EngineContext {
        session,
        camera,
        denied_reason,
        extractor,
        reference,
        state_snapshot: Arc::clone(&state_snapshot),
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("artgate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Scan { reply } => {
                        let _ = reply.send(ctx.run_scan());
                        ctx.sync_state();
                    }
                    EngineRequest::Status { reply } => {
                        let _ = reply.send(ctx.status());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle {
        tx,
        in_flight: Arc::new(AtomicBool::new(false)),
        state: state_snapshot,
    })
}
