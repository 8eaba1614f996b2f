use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::timer::AutoStopTimer;
use crate::audio::format::candidates_from;
use crate::audio::{
    select_format, validate_artifact, ArtifactCheck, AudioArtifact, DeviceCapture, FormatId,
    PermissionState, RecorderFacility, StreamConstraints,
};
use crate::capture::{
    CapturePhase, CaptureStrategy, HighLevelRecorder, RawSignalFallback, StrategyKind,
};
use crate::config::RecordingConfig;
use crate::error::{DeviceError, RecordingError};
use crate::session::{Session, SharedSession};

/// Result of a successful [`RecordingController::toggle_recording`] call
#[derive(Debug, Clone)]
pub enum ToggleOutcome {
    /// Capture is running with the given strategy
    Started(StrategyKind),
    /// Capture finished with a non-empty artifact, now staged for the current item
    Completed {
        artifact: AudioArtifact,
        strategy: StrategyKind,
        /// Also written to the recordings map (only on the last item)
        stored: bool,
    },
    /// The high-level recorder produced nothing; capture was restarted on the fallback
    SwitchingMethod,
}

/// Status notifications for the UI glue
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    Started(StrategyKind),
    AutoStopped,
    SwitchingMethod,
    Completed { bytes: usize, strategy: StrategyKind },
    Failed(RecordingError),
}

struct ControllerState {
    phase: CapturePhase,
    active: Option<Box<dyn CaptureStrategy>>,
    /// Format chosen on first use; `Some(None)` means nothing is supported
    negotiated: Option<Option<FormatId>>,
    /// One-way switch to the raw-signal fallback
    degraded: bool,
    silent_faults: u32,
    timer: AutoStopTimer,
    /// Bumped on every start so a stale timer can recognise itself
    generation: u64,
}

/// Single entry point for starting and stopping recordings.
///
/// Chooses the capture strategy, arms the auto-stop timer, detects silent
/// recordings and degrades permanently to [`RawSignalFallback`] once the
/// high-level recorder is known not to work in this environment.
pub struct RecordingController {
    session: SharedSession,
    device: Arc<dyn DeviceCapture>,
    facility: Arc<dyn RecorderFacility>,
    config: RecordingConfig,
    format_candidates: Vec<FormatId>,
    state: Mutex<ControllerState>,
    events: Option<mpsc::UnboundedSender<RecordingEvent>>,
}

impl RecordingController {
    pub fn new(
        session: SharedSession,
        device: Arc<dyn DeviceCapture>,
        facility: Arc<dyn RecorderFacility>,
        config: RecordingConfig,
    ) -> Self {
        let format_candidates = candidates_from(&config.format_candidates);

        Self {
            session,
            device,
            facility,
            config,
            format_candidates,
            state: Mutex::new(ControllerState {
                phase: CapturePhase::Idle,
                active: None,
                negotiated: None,
                degraded: false,
                silent_faults: 0,
                timer: AutoStopTimer::new(),
                generation: 0,
            }),
            events: None,
        }
    }

    /// Publish [`RecordingEvent`]s to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<RecordingEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Start recording if idle, stop if recording
    pub async fn toggle_recording(self: &Arc<Self>) -> Result<ToggleOutcome, RecordingError> {
        let mut state = self.state.lock().await;

        if state.phase == CapturePhase::Recording {
            self.stop_locked(&mut state).await
        } else {
            self.start_locked(&mut state).await
        }
    }

    pub async fn phase(&self) -> CapturePhase {
        self.state.lock().await.phase
    }

    /// Strategy of the capture currently running, if any
    pub async fn active_strategy(&self) -> Option<StrategyKind> {
        self.state.lock().await.active.as_ref().map(|s| s.kind())
    }

    /// Whether the controller has switched permanently to the fallback
    pub async fn is_degraded(&self) -> bool {
        self.state.lock().await.degraded
    }

    pub async fn silent_fault_count(&self) -> u32 {
        self.state.lock().await.silent_faults
    }

    pub async fn auto_stop_pending(&self) -> bool {
        self.state.lock().await.timer.is_pending()
    }

    /// Abandon any running capture and return to idle; used on survey restart.
    ///
    /// The fallback decision is kept: it reflects the environment, not the pass.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;

        state.timer.disarm();
        if let Some(strategy) = state.active.take() {
            info!("Abandoning {} capture on reset", strategy.kind().name());
            drop(strategy);
        }
        state.phase = CapturePhase::Idle;
        state.generation += 1;

        self.session.lock().await.end_recording();
    }

    /// Drop the held microphone stream whenever permission is no longer granted
    pub fn watch_permissions(&self) -> Option<JoinHandle<()>> {
        let mut changes = self.device.permission_changes()?;
        let session = Arc::clone(&self.session);

        Some(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let permission = *changes.borrow();
                if permission != PermissionState::Granted {
                    warn!("Microphone permission is now {:?}, dropping stream", permission);
                    session.lock().await.release_microphone();
                }
            }
            debug!("Permission watch ended");
        }))
    }

    async fn start_locked(
        self: &Arc<Self>,
        state: &mut ControllerState,
    ) -> Result<ToggleOutcome, RecordingError> {
        state.phase = CapturePhase::Starting;

        let mut session = self.session.lock().await;

        match self.try_start(state, &mut session).await {
            Ok(kind) => {
                state.phase = CapturePhase::Recording;
                state.generation += 1;
                self.arm_auto_stop(state);

                info!(
                    "Session {}: recording '{}' with {}",
                    session.session_id(),
                    session.current_phoneme().unwrap_or_default(),
                    kind.name()
                );
                self.emit(RecordingEvent::Started(kind));

                Ok(ToggleOutcome::Started(kind))
            }
            Err(e) => {
                error!("Failed to start recording: {}", e);
                session.end_recording();
                state.phase = CapturePhase::Idle;
                self.emit(RecordingEvent::Failed(e.clone()));

                Err(e)
            }
        }
    }

    async fn try_start(
        &self,
        state: &mut ControllerState,
        session: &mut Session,
    ) -> Result<StrategyKind, RecordingError> {
        if session.current_phoneme().is_none() {
            return Err(RecordingError::NoActiveItem);
        }
        session.begin_recording()?;

        if session.usable_microphone().is_none() {
            if session.has_microphone() {
                info!("Microphone stream is stale or faulty, requesting a new one");
            } else {
                info!("No microphone stream, requesting access");
            }
            session.release_microphone();

            let stream = self
                .device
                .request_stream(&StreamConstraints::default())
                .await?;
            session.set_microphone(stream);
        }

        let stream = session
            .usable_microphone()
            .ok_or(DeviceError::StreamInactive)?;

        let mut strategy = self.select_strategy(state);

        if let Err(e) = strategy.start(stream).await {
            match (strategy.kind(), e) {
                (StrategyKind::HighLevelRecorder, DeviceError::Facility(reason)) => {
                    warn!(
                        "High-level recorder failed to start ({}), using raw signal fallback",
                        reason
                    );
                    strategy = self.fallback_strategy();
                    strategy.start(stream).await?;
                }
                (_, e) => return Err(e.into()),
            }
        }

        let kind = strategy.kind();
        state.active = Some(strategy);

        Ok(kind)
    }

    async fn stop_locked(
        self: &Arc<Self>,
        state: &mut ControllerState,
    ) -> Result<ToggleOutcome, RecordingError> {
        state.timer.disarm();
        state.phase = CapturePhase::Stopping;

        let Some(mut strategy) = state.active.take() else {
            warn!("Stop requested with no active capture");
            self.session.lock().await.end_recording();
            state.phase = CapturePhase::Idle;
            return Err(RecordingError::Device(DeviceError::StreamInactive));
        };

        let kind = strategy.kind();
        let artifact = strategy.stop().await;
        drop(strategy);

        let mut session = self.session.lock().await;
        session.end_recording();

        match validate_artifact(&artifact) {
            ArtifactCheck::Ok => {
                state.phase = CapturePhase::Complete;

                session.stage_artifact(artifact.clone());
                let stored = session.is_last_item() && session.commit_active();

                info!(
                    "Recording complete: {} bytes ({}) via {}{}",
                    artifact.len(),
                    artifact.format(),
                    kind.name(),
                    if stored { ", stored" } else { "" }
                );
                self.emit(RecordingEvent::Completed {
                    bytes: artifact.len(),
                    strategy: kind,
                });

                Ok(ToggleOutcome::Completed {
                    artifact,
                    strategy: kind,
                    stored,
                })
            }
            ArtifactCheck::SilentRecordingFault => {
                state.silent_faults += 1;
                state.phase = CapturePhase::Idle;

                match kind {
                    StrategyKind::HighLevelRecorder => {
                        warn!(
                            "High-level recorder produced an empty recording (fault #{}), switching to raw signal fallback",
                            state.silent_faults
                        );
                        state.degraded = true;
                        session.mark_microphone_faulty();
                        drop(session);

                        self.emit(RecordingEvent::SwitchingMethod);
                        tokio::time::sleep(self.config.restart_delay()).await;

                        self.start_locked(state).await?;
                        Ok(ToggleOutcome::SwitchingMethod)
                    }
                    StrategyKind::RawSignalFallback => {
                        error!("Raw signal fallback produced an empty recording");
                        let err = RecordingError::SilentRecording;
                        self.emit(RecordingEvent::Failed(err.clone()));
                        Err(err)
                    }
                }
            }
        }
    }

    fn select_strategy(&self, state: &mut ControllerState) -> Box<dyn CaptureStrategy> {
        if !state.degraded {
            let format = state
                .negotiated
                .get_or_insert_with(|| {
                    select_format(&self.format_candidates, self.facility.as_ref())
                })
                .clone();

            match format {
                Some(format) => {
                    return Box::new(HighLevelRecorder::new(
                        Arc::clone(&self.facility),
                        format,
                        self.config.timeslice(),
                        self.config.stop_grace(),
                    ));
                }
                None => {
                    info!("No supported high-level format, using raw signal fallback from now on");
                    state.degraded = true;
                }
            }
        }

        self.fallback_strategy()
    }

    fn fallback_strategy(&self) -> Box<dyn CaptureStrategy> {
        Box::new(RawSignalFallback::new(
            self.config.fallback_sample_rate,
            self.config.stop_grace(),
        ))
    }

    fn arm_auto_stop(self: &Arc<Self>, state: &mut ControllerState) {
        let controller = Arc::downgrade(self);
        let generation = state.generation;

        state.timer.arm(self.config.auto_stop(), async move {
            if let Some(controller) = controller.upgrade() {
                controller.auto_stop(generation).await;
            }
        });
    }

    async fn auto_stop(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock().await;

        if state.generation != generation || state.phase != CapturePhase::Recording {
            debug!("Ignoring stale auto-stop (generation {})", generation);
            return;
        }

        // This task is the timer; aborting it here would cancel the stop itself
        state.timer.release();

        info!("Auto-stop after {:?}", self.config.auto_stop());
        self.emit(RecordingEvent::AutoStopped);

        if let Err(e) = self.stop_locked(&mut state).await {
            warn!("Auto-stop ended with error: {}", e);
        }
    }

    fn emit(&self, event: RecordingEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
