// Shared in-memory fakes for device capture and the survey backend
#![allow(dead_code)]

use phoneme_survey::audio::{
    ChunkFeed, DeviceCapture, DeviceStream, FormatId, FormatProbe, PermissionState,
    RecorderControl, RecorderFacility, SignalTap, StreamConstraints, TapNode,
};
use phoneme_survey::backend::{BulkResponse, ContactResponse, SurveyBackend, UploadItem};
use phoneme_survey::config::RecordingConfig;
use phoneme_survey::{AudioArtifact, BackendError, DeviceError, Session, SharedSession};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

// ============================================================================
// Device
// ============================================================================

/// Counters shared by every stream/tap a `FakeDevice` hands out
#[derive(Default)]
pub struct DeviceCounters {
    pub streams_requested: AtomicUsize,
    pub streams_stopped: AtomicUsize,
    pub open_taps: AtomicUsize,
    pub taps_opened: AtomicUsize,
}

pub struct FakeDevice {
    pub deny: AtomicBool,
    /// Sample buffers each raw tap delivers
    pub tap_buffers: Mutex<Vec<Vec<f32>>>,
    pub counters: Arc<DeviceCounters>,
    /// Handle to the most recently issued stream's liveness flag
    pub last_stream_active: Mutex<Option<Arc<AtomicBool>>>,
    permission: Option<watch::Receiver<PermissionState>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            deny: AtomicBool::new(false),
            tap_buffers: Mutex::new(vec![vec![0.25; 441]; 10]),
            counters: Arc::new(DeviceCounters::default()),
            last_stream_active: Mutex::new(None),
            permission: None,
        }
    }

    pub fn denying() -> Self {
        let device = Self::new();
        device.deny.store(true, Ordering::SeqCst);
        device
    }

    pub fn with_tap_buffers(self, buffers: Vec<Vec<f32>>) -> Self {
        *self.tap_buffers.lock().unwrap() = buffers;
        self
    }

    pub fn with_permission_channel(mut self) -> (Self, watch::Sender<PermissionState>) {
        let (tx, rx) = watch::channel(PermissionState::Granted);
        self.permission = Some(rx);
        (self, tx)
    }

    /// Simulate the track ending underneath the held stream
    pub fn end_last_stream(&self) {
        if let Some(active) = self.last_stream_active.lock().unwrap().as_ref() {
            active.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl DeviceCapture for FakeDevice {
    async fn request_stream(
        &self,
        _constraints: &StreamConstraints,
    ) -> Result<Box<dyn DeviceStream>, DeviceError> {
        self.counters.streams_requested.fetch_add(1, Ordering::SeqCst);

        if self.deny.load(Ordering::SeqCst) {
            return Err(DeviceError::PermissionDenied);
        }

        let active = Arc::new(AtomicBool::new(true));
        *self.last_stream_active.lock().unwrap() = Some(Arc::clone(&active));

        Ok(Box::new(FakeStream {
            active,
            buffers: self.tap_buffers.lock().unwrap().clone(),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn permission_changes(&self) -> Option<watch::Receiver<PermissionState>> {
        self.permission.clone()
    }
}

pub struct FakeStream {
    pub active: Arc<AtomicBool>,
    pub buffers: Vec<Vec<f32>>,
    pub counters: Arc<DeviceCounters>,
}

impl FakeStream {
    pub fn live(buffers: Vec<Vec<f32>>) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
            buffers,
            counters: Arc::new(DeviceCounters::default()),
        }
    }
}

impl DeviceStream for FakeStream {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn track_count(&self) -> usize {
        if self.is_active() {
            1
        } else {
            0
        }
    }

    fn open_tap(&self, _sample_rate: u32) -> Result<SignalTap, DeviceError> {
        let (tx, rx) = mpsc::channel(self.buffers.len().max(1));
        for buffer in &self.buffers {
            tx.try_send(buffer.clone())
                .map_err(|e| DeviceError::Facility(e.to_string()))?;
        }

        self.counters.open_taps.fetch_add(1, Ordering::SeqCst);
        self.counters.taps_opened.fetch_add(1, Ordering::SeqCst);

        Ok(SignalTap {
            samples: rx,
            node: Box::new(FakeNode {
                tx: Some(tx),
                counters: Arc::clone(&self.counters),
            }),
        })
    }

    fn stop_tracks(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.counters.streams_stopped.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeNode {
    tx: Option<mpsc::Sender<Vec<f32>>>,
    counters: Arc<DeviceCounters>,
}

impl TapNode for FakeNode {
    fn disconnect(&mut self) {
        if self.tx.take().is_some() {
            self.counters.open_taps.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// High-level recorder facility
// ============================================================================

pub struct FakeFacility {
    pub supported: Vec<String>,
    /// Chunks each recording delivers; an empty list models the silent-output bug
    pub chunks: Mutex<Vec<Vec<u8>>>,
    pub fail_open: AtomicBool,
    pub opened: AtomicUsize,
    pub running: Arc<AtomicUsize>,
    pub formats_used: Mutex<Vec<FormatId>>,
}

impl FakeFacility {
    pub fn supporting(formats: &[&str]) -> Self {
        Self {
            supported: formats.iter().map(|f| f.to_string()).collect(),
            chunks: Mutex::new(vec![vec![1, 2, 3], vec![4, 5], vec![6]]),
            fail_open: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
            formats_used: Mutex::new(Vec::new()),
        }
    }

    /// Supports webm but always records nothing
    pub fn silent() -> Self {
        let facility = Self::supporting(&["audio/webm"]);
        facility.chunks.lock().unwrap().clear();
        facility
    }

    pub fn unsupported() -> Self {
        Self::supporting(&[])
    }
}

impl FormatProbe for FakeFacility {
    fn is_type_supported(&self, format: &FormatId) -> bool {
        self.supported.iter().any(|s| s == format.as_str())
    }
}

impl RecorderFacility for FakeFacility {
    fn open(
        &self,
        _stream: &dyn DeviceStream,
        format: &FormatId,
        _timeslice: Duration,
    ) -> Result<ChunkFeed, DeviceError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(DeviceError::Facility("recorder construction failed".to_string()));
        }

        let chunks = self.chunks.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            tx.try_send(chunk)
                .map_err(|e| DeviceError::Facility(e.to_string()))?;
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.running.fetch_add(1, Ordering::SeqCst);
        self.formats_used.lock().unwrap().push(format.clone());

        Ok(ChunkFeed {
            chunks: rx,
            control: Box::new(FakeControl {
                tx: Some(tx),
                running: Arc::clone(&self.running),
            }),
        })
    }
}

struct FakeControl {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    running: Arc<AtomicUsize>,
}

impl RecorderControl for FakeControl {
    fn stop(&mut self) {
        if self.tx.take().is_some() {
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

pub struct FakeBackend {
    pub phonemes: Vec<String>,
    pub missing_references: HashSet<String>,
    /// Scripted bulk answers; `Stored` once exhausted
    pub bulk_results: Mutex<VecDeque<Result<BulkResponse, BackendError>>>,
    /// Remaining failures per phoneme for single uploads; `u32::MAX` fails forever
    pub item_failures: Mutex<HashMap<String, u32>>,
    /// Scripted contact answers; `Registered` once exhausted
    pub contact_results: Mutex<VecDeque<Result<ContactResponse, BackendError>>>,
    pub bulk_delay: Option<Duration>,
    /// Remaining stalls per phoneme for single uploads, and how long each lasts
    pub item_stalls: Mutex<HashMap<String, (u32, Duration)>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(phonemes: &[&str]) -> Self {
        Self {
            phonemes: phonemes.iter().map(|p| p.to_string()).collect(),
            missing_references: HashSet::new(),
            bulk_results: Mutex::new(VecDeque::new()),
            item_failures: Mutex::new(HashMap::new()),
            contact_results: Mutex::new(VecDeque::new()),
            bulk_delay: None,
            item_stalls: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script_bulk(&self, result: Result<BulkResponse, BackendError>) {
        self.bulk_results.lock().unwrap().push_back(result);
    }

    pub fn fail_item(&self, phoneme: &str, times: u32) {
        self.item_failures
            .lock()
            .unwrap()
            .insert(phoneme.to_string(), times);
    }

    /// Hold the next `times` single uploads of `phoneme` for `delay`
    pub fn stall_item(&self, phoneme: &str, times: u32, delay: Duration) {
        self.item_stalls
            .lock()
            .unwrap()
            .insert(phoneme.to_string(), (times, delay));
    }

    pub fn script_contact(&self, result: Result<ContactResponse, BackendError>) {
        self.contact_results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn network_error() -> BackendError {
    BackendError::Network("connection reset".to_string())
}

#[async_trait::async_trait]
impl SurveyBackend for FakeBackend {
    async fn fetch_phonemes(&self) -> Result<Vec<String>, BackendError> {
        self.record("phonemes".to_string());
        Ok(self.phonemes.clone())
    }

    async fn fetch_reference_audio(&self, phoneme: &str) -> Result<Vec<u8>, BackendError> {
        self.record(format!("reference:{}", phoneme));
        if self.missing_references.contains(phoneme) {
            return Err(BackendError::Status {
                status: 404,
                detail: None,
            });
        }
        Ok(format!("mp3:{}", phoneme).into_bytes())
    }

    async fn upload_one(&self, item: &UploadItem) -> Result<(), BackendError> {
        self.record(format!("one:{}", item.phoneme));

        let stall = {
            let mut stalls = self.item_stalls.lock().unwrap();
            match stalls.get_mut(&item.phoneme) {
                Some((remaining, delay)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(*delay)
                }
                _ => None,
            }
        };
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        let mut failures = self.item_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&item.phoneme) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(network_error());
            }
        }
        Ok(())
    }

    async fn upload_bulk(&self, items: &[UploadItem]) -> Result<BulkResponse, BackendError> {
        self.record(format!("bulk:{}", items.len()));
        if let Some(delay) = self.bulk_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.bulk_results.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(BulkResponse::Stored))
    }

    async fn register_contact(&self, email: &str) -> Result<ContactResponse, BackendError> {
        self.record(format!("contact:{}", email));
        let scripted = self.contact_results.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(ContactResponse::Registered))
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn recording_config() -> RecordingConfig {
    RecordingConfig {
        auto_stop_ms: 5_000,
        timeslice_ms: 100,
        fallback_sample_rate: 44_100,
        stop_grace_ms: 200,
        restart_delay_ms: 500,
        ..RecordingConfig::default()
    }
}

pub fn artifact(len: usize) -> AudioArtifact {
    AudioArtifact::new(vec![7u8; len], FormatId::new("audio/webm"))
}

/// Session with `phonemes` loaded and one artifact stored per item
pub async fn session_with_recordings(phonemes: &[&str], bytes_each: usize) -> SharedSession {
    let session = Session::shared();
    {
        let mut s = session.lock().await;
        s.set_phonemes(phonemes.iter().map(|p| p.to_string()).collect());
        for index in 0..phonemes.len() {
            s.stage_artifact(artifact(bytes_each));
            s.commit_active();
            if index + 1 < phonemes.len() {
                s.advance();
            }
        }
    }
    session
}

pub async fn session_with_phonemes(phonemes: &[&str]) -> SharedSession {
    let session = Session::shared();
    session
        .lock()
        .await
        .set_phonemes(phonemes.iter().map(|p| p.to_string()).collect());
    session
}
