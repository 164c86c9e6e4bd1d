//! # Capture Session Module
//!
//! The one stateful component of the measurement: a state machine that
//! plays the sweep, records the microphone for the sweep duration plus a
//! guard interval, folds the recording to mono and hands it to the
//! reducer. Exactly one session runs at a time; a start request while a
//! run is live is rejected synchronously, never queued.
//!
//! ## State machine
//! Idle -> Priming -> SweepingAndRecording -> Decoding -> Reducing ->
//! Complete, with any stage able to fall to Failed. Failed is not
//! sticky: the next start request runs again from scratch. The only
//! automatic retry in the system is the single relaxed-constraints
//! retry when the strict capture configuration is rejected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::StreamTrait;
use crossbeam_channel::Sender;
use thiserror::Error;

use crate::audio::{self, CaptureConstraints, CaptureStream};
use crate::response;
use crate::{GUARD_INTERVAL_MS, PcmBuffer, ResponseCurve, SweepSpec};

/// Everything that can take a session down, plus the synchronous
/// start-request rejection.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    #[error("no capture device found")]
    DeviceNotFound,
    #[error("capture constraints not supported: {0}")]
    ConstraintsUnsupported(String),
    #[error("failed to decode the recording: {0}")]
    DecodeFailure(String),
    #[error("a measurement is already running")]
    AlreadyRunning,
    #[error("oscillator failure: {0}")]
    Oscillator(String),
    #[error("invalid sweep parameters: {0}")]
    InvalidSweep(String),
    #[error("audio backend failure: {0}")]
    Backend(String),
}

/// Lifecycle of one measurement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Priming,
    SweepingAndRecording,
    Decoding,
    Reducing,
    Complete,
    Failed,
}

impl SessionState {
    /// Whether a new run may start from this state.
    fn can_start(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Complete | SessionState::Failed
        )
    }
}

/// Process-wide flag marking a live session. Managers are freely
/// constructible, but at most one session may run system-wide; the
/// flag is what enforces that across managers.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Holds the process-wide active flag for the duration of one run.
/// Released on drop, so failure paths and panics both clear it.
struct ActiveGuard;

impl ActiveGuard {
    fn acquire() -> Result<Self, SessionError> {
        if SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(ActiveGuard)
        } else {
            eprintln!("[SESSION] Start rejected: another session is active in this process");
            Err(SessionError::AlreadyRunning)
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// A state transition paired with its human-readable status line.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub state: SessionState,
    pub message: String,
}

/// Owns the session state and the cached capture device.
///
/// The capture device handle is reused across sequential runs so the
/// operating system is not asked for microphone access on every run; it
/// is dropped only when a strict configuration is rejected and the
/// relaxed retry re-acquires from scratch. Runs are serialized through
/// `&mut self` within a manager and through [`SESSION_ACTIVE`] across
/// managers, so two managers cannot run sessions concurrently.
pub struct SessionManager {
    state: SessionState,
    cached_device: Option<cpal::Device>,
    guard_interval: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        SessionManager {
            state: SessionState::Idle,
            cached_device: None,
            guard_interval: Duration::from_millis(GUARD_INTERVAL_MS),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs one complete measurement.
    ///
    /// Blocks for the sweep duration plus the guard interval; callers
    /// that need a responsive front end run this on a dedicated thread
    /// and listen on the status channel, the same way the audio worker
    /// threads in this workspace's front end do.
    ///
    /// # Arguments
    /// * `spec` - Sweep parameters for this run
    /// * `width` - Target number of response points (plot width)
    /// * `status_tx` - Optional sink for state transitions
    ///
    /// # Returns
    /// * `Ok(curve)` - The measured response
    /// * `Err(e)` - `AlreadyRunning` if a run is live (state untouched),
    ///   otherwise the failure that ended the session
    pub fn run(
        &mut self,
        spec: &SweepSpec,
        width: u32,
        status_tx: Option<&Sender<StatusUpdate>>,
    ) -> Result<ResponseCurve, SessionError> {
        if !self.state.can_start() {
            eprintln!("[SESSION] Start rejected: a measurement is already running");
            return Err(SessionError::AlreadyRunning);
        }
        let _active = ActiveGuard::acquire()?;

        let result = self.run_stages(spec, width, status_tx);
        match &result {
            Ok(curve) => {
                self.set_state(
                    SessionState::Complete,
                    format!(
                        "Process complete: {} response points. Ready for next run.",
                        curve.peak.len()
                    ),
                    status_tx,
                );
            }
            Err(e) => {
                self.set_state(SessionState::Failed, format!("Error: {e}"), status_tx);
            }
        }
        result
    }

    fn run_stages(
        &mut self,
        spec: &SweepSpec,
        width: u32,
        status_tx: Option<&Sender<StatusUpdate>>,
    ) -> Result<ResponseCurve, SessionError> {
        spec.validate()?;

        // --- Priming: acquire the microphone and start recording ---
        self.set_state(SessionState::Priming, "Initializing...".to_string(), status_tx);
        let (chunk_tx, chunk_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
        let capture = with_constraint_fallback(|constraints| {
            self.start_capture_with(constraints, chunk_tx.clone())
        })?;
        let CaptureStream {
            stream: capture_stream,
            sample_rate,
            channels,
        } = capture;
        let capture_started = Instant::now();

        // --- Sweeping and recording ---
        self.set_state(
            SessionState::SweepingAndRecording,
            format!("Playing {}s chirp & recording...", spec.duration_s),
            status_tx,
        );
        let playback_stream = audio::start_playback(spec)?;

        // Both stops hang off one shared start instant so the sweep as
        // generated and the sweep as recorded agree on timing. The
        // recorder has been delivering samples since Priming; everything
        // captured before this instant precedes the sweep and is trimmed
        // off during decoding, so sample index 0 lines up with t = 0.
        let started = Instant::now();
        let preroll = started.duration_since(capture_started);
        let deadline = started + Duration::from_secs_f32(spec.duration_s) + self.guard_interval;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        drop(playback_stream);
        if let Err(e) = capture_stream.pause() {
            eprintln!("[SESSION] Error pausing capture stream: {e}");
        }
        drop(capture_stream);

        // --- Decoding: drain the recorded chunks and fold to mono ---
        self.set_state(
            SessionState::Decoding,
            "Processing recorded audio...".to_string(),
            status_tx,
        );
        drop(chunk_tx);
        let buffer = decode_capture(chunk_rx, sample_rate, channels, preroll)?;

        // --- Reducing ---
        self.set_state(
            SessionState::Reducing,
            format!("Reducing {} samples to response points...", buffer.samples.len()),
            status_tx,
        );
        Ok(response::reduce(&buffer, spec, width))
    }

    /// Starts capture on the cached device, or acquires one first.
    ///
    /// A relaxed attempt always re-acquires the device from scratch:
    /// the strict rejection that precedes it may have been tied to the
    /// cached handle.
    fn start_capture_with(
        &mut self,
        constraints: CaptureConstraints,
        chunk_tx: Sender<Vec<f32>>,
    ) -> Result<CaptureStream, SessionError> {
        if constraints == CaptureConstraints::Relaxed {
            self.cached_device = None;
        }
        if self.cached_device.is_none() {
            self.cached_device = Some(audio::default_input_device()?);
        }
        let device = self
            .cached_device
            .as_ref()
            .ok_or(SessionError::DeviceNotFound)?;
        audio::start_capture(device, constraints, chunk_tx)
    }

    fn set_state(
        &mut self,
        state: SessionState,
        message: String,
        status_tx: Option<&Sender<StatusUpdate>>,
    ) {
        eprintln!("[SESSION] {state:?}: {message}");
        self.state = state;
        if let Some(tx) = status_tx {
            let _ = tx.send(StatusUpdate { state, message });
        }
    }
}

/// Runs a priming attempt with strict constraints and retries exactly
/// once with relaxed constraints if the strict configuration is
/// rejected. No other failure kind retries, and a second rejection is
/// terminal.
fn with_constraint_fallback<T>(
    mut attempt: impl FnMut(CaptureConstraints) -> Result<T, SessionError>,
) -> Result<T, SessionError> {
    match attempt(CaptureConstraints::Strict) {
        Err(SessionError::ConstraintsUnsupported(msg)) => {
            eprintln!("[SESSION] Strict capture constraints rejected ({msg}); trying fallback...");
            attempt(CaptureConstraints::Relaxed)
        }
        other => other,
    }
}

/// Folds the captured interleaved chunks into a mono `PcmBuffer`.
///
/// Matches the single-channel analysis of the measurement: for
/// multi-channel captures only the first channel of each frame is kept.
/// The `preroll` is the time the recorder ran before playback started;
/// that many samples are dropped from the head so the buffer's sample
/// index 0 coincides with sweep time 0. Without the trim every point
/// would be mislabelled toward higher frequencies.
fn decode_capture(
    chunk_rx: crossbeam_channel::Receiver<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
    preroll: Duration,
) -> Result<PcmBuffer, SessionError> {
    let mut interleaved = Vec::new();
    for chunk in chunk_rx.try_iter() {
        interleaved.extend_from_slice(&chunk);
    }
    if interleaved.is_empty() {
        return Err(SessionError::DecodeFailure(
            "no audio data was captured".to_string(),
        ));
    }

    let mut samples: Vec<f32> = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .iter()
            .step_by(channels as usize)
            .copied()
            .collect()
    };

    let skip = (preroll.as_secs_f64() * sample_rate as f64).round() as usize;
    samples.drain(..skip.min(samples.len()));
    if samples.is_empty() {
        return Err(SessionError::DecodeFailure(
            "capture ended before sweep playback started".to_string(),
        ));
    }

    Ok(PcmBuffer {
        sample_rate,
        samples,
    })
}
