use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, mpsc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    audio::{AudioCodec, HoundCodec},
    config::InterpolatorConfig,
    error::Error,
    interpolator::{InterpolationOutput, InterpolationParams, Interpolator},
    model::InterpolationModel,
};

/// Represents the current state of the interpolation engine.
#[derive(Clone, Debug, PartialEq)]
pub enum InterpolationEngineState {
    /// The engine is idle and ready to accept new runs.
    Idle,
    /// The engine is currently running an interpolation.
    Processing,
}

impl InterpolationEngineState {
    /// Returns the state as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationEngineState::Idle => "idle",
            InterpolationEngineState::Processing => "processing",
        }
    }
}

/// Lightweight description of a run, kept without cloning the seed image.
#[derive(Clone, Debug, PartialEq)]
pub struct RunMetadata {
    pub start_prompt: String,
    pub end_prompt: String,
    pub step_count: usize,
    pub seed_image: String,
}

impl From<&InterpolationParams> for RunMetadata {
    fn from(params: &InterpolationParams) -> Self {
        Self {
            start_prompt: params.start.text.clone(),
            end_prompt: params.end.text.clone(),
            step_count: params.schedule.step_count,
            seed_image: params.seed_image.name().to_string(),
        }
    }
}

struct InterpolationJob {
    id: u64,
    params: InterpolationParams,
    cancel: Arc<AtomicBool>,
}

/// Cancel flags of the runs that are queued or in flight, by id.
type CancelTokens = Arc<Mutex<HashMap<u64, Arc<AtomicBool>>>>;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Finished run, successful or not, with telemetry.
pub struct InterpolationEngineResponse<T> {
    /// Identifier returned when the run was scheduled.
    pub id: u64,
    /// Timestamp when the run started.
    pub start_time: Instant,
    /// Total time taken by the run.
    pub duration: Duration,
    pub metadata: RunMetadata,
    pub output: T,
}

/// Result type returned when polling for runs.
pub enum InterpolationEngineResult {
    /// A run completed with its output.
    Success(InterpolationEngineResponse<InterpolationOutput>),
    /// A run failed or was cancelled.
    Failure(InterpolationEngineResponse<Error>),
    /// No result available yet, with current engine state.
    Empty(InterpolationEngineState),
    /// The engine itself is broken.
    Error(String),
}

type EngineReceiver = Arc<Mutex<mpsc::Receiver<InterpolationEngineResult>>>;

/// Runs interpolations on a background thread.
///
/// Runs are queued and executed one at a time in submission order. Results are
/// collected by polling, so a UI or HTTP layer never blocks on the model.
pub struct InterpolationEngine {
    state: Arc<Mutex<InterpolationEngineState>>,
    req_tx: Option<mpsc::Sender<InterpolationJob>>,
    rep_rx: EngineReceiver,
    worker_handle: Option<JoinHandle<()>>,
    cancel_tokens: CancelTokens,
    id_counter: AtomicU64,
}

impl InterpolationEngine {
    /// Creates an engine that owns `interpolator` on a worker thread.
    pub fn new<M, C>(mut interpolator: Interpolator<M, C>) -> Self
    where
        M: InterpolationModel + Send + 'static,
        C: AudioCodec + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<InterpolationJob>();
        let (rep_tx, rep_rx) = mpsc::channel::<InterpolationEngineResult>();
        let state = Arc::new(Mutex::new(InterpolationEngineState::Idle));
        let cancel_tokens = CancelTokens::default();

        let worker_handle = thread::spawn({
            let state = state.clone();
            let cancel_tokens = cancel_tokens.clone();
            move || {
                while let Ok(job) = req_rx.recv() {
                    log::debug!("Starting interpolation {}", job.id);

                    let metadata = RunMetadata::from(&job.params);
                    *state.lock().unwrap() = InterpolationEngineState::Processing;
                    let start_time = Instant::now();

                    let result = interpolator.run_with_cancel(&job.params, &job.cancel);
                    let duration = start_time.elapsed();
                    cancel_tokens.lock().unwrap().remove(&job.id);

                    let reply = match result {
                        Ok(output) => {
                            log::debug!("Interpolation {} completed", job.id);
                            InterpolationEngineResult::Success(InterpolationEngineResponse {
                                id: job.id,
                                start_time,
                                duration,
                                metadata,
                                output,
                            })
                        }
                        Err(error) => {
                            log::debug!("Interpolation {} failed: {error}", job.id);
                            InterpolationEngineResult::Failure(InterpolationEngineResponse {
                                id: job.id,
                                start_time,
                                duration,
                                metadata,
                                output: error,
                            })
                        }
                    };
                    *state.lock().unwrap() = InterpolationEngineState::Idle;
                    let _ = rep_tx.send(reply);
                }
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            rep_rx: Arc::new(Mutex::new(rep_rx)),
            worker_handle: Some(worker_handle),
            cancel_tokens,
            id_counter: AtomicU64::new(0),
        }
    }

    /// Creates an engine around a model with the default codec.
    pub fn with_model<M>(model: M, config: InterpolatorConfig) -> Self
    where
        M: InterpolationModel + Send + 'static,
    {
        Self::new(Interpolator::<M, HoundCodec>::new(model, config))
    }

    /// Returns the current state of the engine.
    pub fn state(&self) -> InterpolationEngineState {
        self.state.lock().unwrap().clone()
    }

    /// Attempts to retrieve a finished run without blocking.
    pub fn try_poll_response(&self) -> InterpolationEngineResult {
        match self.rep_rx.lock().unwrap().try_recv() {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => InterpolationEngineResult::Empty(self.state()),
            Err(mpsc::TryRecvError::Disconnected) => {
                log::error!("Response channel disconnected");
                InterpolationEngineResult::Error("Response channel disconnected".to_string())
            }
        }
    }

    /// Blocks until the next run finishes or `timeout` elapses.
    ///
    /// Polls in short intervals, so concurrent [`Self::try_poll_response`]
    /// calls never wait on it.
    pub fn wait_response(&self, timeout: Duration) -> InterpolationEngineResult {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_poll_response() {
                InterpolationEngineResult::Empty(state) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return InterpolationEngineResult::Empty(state);
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                result => return result,
            }
        }
    }

    /// Queues a run and returns its id, `None` once the engine is stopped.
    pub fn schedule_interpolation(&self, params: InterpolationParams) -> Option<u64> {
        let tx = self.req_tx.as_ref()?;
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_tokens.lock().unwrap().insert(id, cancel.clone());
        if tx.send(InterpolationJob { id, params, cancel }).is_err() {
            self.cancel_tokens.lock().unwrap().remove(&id);
            return None;
        }
        Some(id)
    }

    /// Cancels every queued or running run, each finishes with [`Error::Cancelled`].
    pub fn cancel(&self) {
        for token in self.cancel_tokens.lock().unwrap().values() {
            token.store(true, Ordering::SeqCst);
        }
    }

    /// Cancels one run, returns false when it already finished or never existed.
    pub fn cancel_run(&self, id: u64) -> bool {
        match self.cancel_tokens.lock().unwrap().get(&id) {
            Some(token) => {
                token.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Stops the engine and waits for queued runs to drain.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InterpolationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
