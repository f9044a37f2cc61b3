use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::{PipelineError, RemoteError, TransportError, UnsupportedFamily};
use crate::fallback::summarize_locally;
use crate::family::{ModelFamily, classify};
use crate::http::{DEFAULT_TIMEOUT, RetryPolicy};
use crate::interpret::{DEFAULT_MAX_KEY_POINTS, Interpreter};
use crate::prompt::build_prompt;
use crate::request::{self, GenerationConfig, InferenceRequest};
use crate::response::{self, InferenceResponse};
use crate::transport::InferenceTransport;
use crate::types::{Provenance, StructuredSummary, TranscriptSegment};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Observable states of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Classifying,
    BuildingRequest,
    Invoking,
    Parsing,
    Interpreting,
    RemoteSucceeded,
    FallbackInvoked,
    Done,
}

/// Why the local summarizer was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    Disabled,
    Remote(RemoteError),
}

impl FallbackReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FallbackReason::Disabled => "disabled",
            FallbackReason::Remote(err) => err.kind(),
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Disabled => {
                f.write_str("remote summarization disabled; using local summary")
            }
            FallbackReason::Remote(err) => {
                write!(f, "remote summarization failed: {err}; using local summary")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub summary: StructuredSummary,
    pub provenance: Provenance,
    /// Family that produced the summary; set on the remote path only.
    pub family: Option<ModelFamily>,
    pub fallback: Option<FallbackReason>,
    /// Number of transport calls made, retries included.
    pub attempts: u32,
    pub states: Vec<PipelineState>,
}

impl SummaryOutcome {
    /// Warning text for the user when the fallback was used.
    pub fn diagnostic(&self) -> Option<String> {
        self.fallback.as_ref().map(ToString::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model_id: String,
    pub generation: GenerationConfig,
    pub retry: RetryPolicy,
    /// Upper bound on a single transport call, separate from backoff delays.
    pub call_timeout: Duration,
    pub max_key_points: usize,
    pub remote_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_id: "amazon.nova-lite-v1:0".to_string(),
            generation: GenerationConfig::default(),
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_TIMEOUT,
            max_key_points: DEFAULT_MAX_KEY_POINTS,
            remote_enabled: true,
        }
    }
}

/// Classify, build, invoke, parse and interpret, falling back to the local
/// summarizer on any failure.
pub struct Pipeline {
    config: PipelineConfig,
    transport: Arc<dyn InferenceTransport>,
    interpreter: Interpreter,
    cancel: CancelToken,
}

enum Step {
    Start,
    Classifying,
    BuildingRequest(ModelFamily),
    Invoking {
        family: ModelFamily,
        request: InferenceRequest,
        retry: u32,
    },
    Parsing {
        family: ModelFamily,
        response: InferenceResponse,
    },
    Interpreting {
        family: ModelFamily,
        text: String,
    },
    RemoteSucceeded {
        family: ModelFamily,
        summary: StructuredSummary,
    },
    FallbackInvoked(FallbackReason),
}

impl Step {
    fn state(&self) -> PipelineState {
        match self {
            Step::Start => PipelineState::Start,
            Step::Classifying => PipelineState::Classifying,
            Step::BuildingRequest(_) => PipelineState::BuildingRequest,
            Step::Invoking { .. } => PipelineState::Invoking,
            Step::Parsing { .. } => PipelineState::Parsing,
            Step::Interpreting { .. } => PipelineState::Interpreting,
            Step::RemoteSucceeded { .. } => PipelineState::RemoteSucceeded,
            Step::FallbackInvoked(_) => PipelineState::FallbackInvoked,
        }
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig, transport: Arc<dyn InferenceTransport>) -> Self {
        let interpreter = Interpreter::new(config.max_key_points);
        Self {
            config,
            transport,
            interpreter,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Summarize `segments`. Always yields a summary unless the local
    /// summarizer itself produced an invalid one.
    pub fn run(&self, segments: &[TranscriptSegment]) -> Result<SummaryOutcome, PipelineError> {
        let mut states = Vec::new();
        let mut attempts = 0;
        let mut step = Step::Start;

        loop {
            let state = step.state();
            tracing::debug!(?state, "pipeline transition");
            states.push(state);

            step = match step {
                Step::Start => {
                    if self.config.remote_enabled {
                        Step::Classifying
                    } else {
                        Step::FallbackInvoked(FallbackReason::Disabled)
                    }
                }
                Step::Classifying => {
                    let family = classify(&self.config.model_id);
                    if family.is_known() {
                        Step::BuildingRequest(family)
                    } else {
                        fail(
                            UnsupportedFamily {
                                model_id: self.config.model_id.clone(),
                            }
                            .into(),
                        )
                    }
                }
                Step::BuildingRequest(family) => {
                    let prompt = build_prompt(segments, self.config.max_key_points);
                    match request::build(
                        family,
                        &self.config.model_id,
                        &prompt,
                        &self.config.generation,
                    ) {
                        Ok(request) => Step::Invoking {
                            family,
                            request,
                            retry: 0,
                        },
                        Err(err) => fail(err.into()),
                    }
                }
                Step::Invoking { .. } if self.cancel.is_cancelled() => fail(RemoteError::Cancelled),
                Step::Invoking {
                    family,
                    request,
                    retry,
                } => {
                    attempts += 1;
                    match self.invoke(&request) {
                        Ok(response) => Step::Parsing { family, response },
                        Err(RemoteError::Transport(err))
                            if err.is_retryable() && retry < self.config.retry.max_retries =>
                        {
                            let delay = self.config.retry.delay(retry);
                            tracing::info!(
                                attempt = attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "rate limited; retrying"
                            );
                            match self.backoff(delay) {
                                Ok(()) => Step::Invoking {
                                    family,
                                    request,
                                    retry: retry + 1,
                                },
                                Err(err) => fail(err),
                            }
                        }
                        Err(err) => fail(err),
                    }
                }
                Step::Parsing { family, response } => match response::parse(family, &response) {
                    Ok(text) => Step::Interpreting { family, text },
                    Err(err) => fail(err.into()),
                },
                Step::Interpreting { family, text } => {
                    match self.interpreter.interpret(&text, segments) {
                        Ok(summary) => Step::RemoteSucceeded { family, summary },
                        Err(err) => fail(err.into()),
                    }
                }
                Step::RemoteSucceeded { family, summary } => {
                    states.push(PipelineState::Done);
                    tracing::debug!(%family, attempts, "remote summary ready");
                    return Ok(SummaryOutcome {
                        summary,
                        provenance: Provenance::Remote,
                        family: Some(family),
                        fallback: None,
                        attempts,
                        states,
                    });
                }
                Step::FallbackInvoked(reason) => {
                    tracing::warn!(kind = reason.kind(), "{reason}");
                    let summary = summarize_locally(segments, self.config.max_key_points);
                    if let Err(err) = summary.validate() {
                        tracing::error!(error = %err, "local summary is invalid");
                        return Err(PipelineError::InvalidSummary(err));
                    }
                    states.push(PipelineState::Done);
                    return Ok(SummaryOutcome {
                        summary,
                        provenance: Provenance::Fallback,
                        family: None,
                        fallback: Some(reason),
                        attempts,
                        states,
                    });
                }
            };
        }
    }

    /// Run one transport call on a worker thread, bounded by the call timeout
    /// and abandoned as soon as the cancel token is set.
    fn invoke(&self, request: &InferenceRequest) -> Result<InferenceResponse, RemoteError> {
        let (tx, rx) = mpsc::channel();
        let transport = Arc::clone(&self.transport);
        let model_id = self.config.model_id.clone();
        let request = request.clone();
        thread::Builder::new()
            .name("recap-invoke".into())
            .spawn(move || {
                let _ = tx.send(transport.invoke(&model_id, &request));
            })
            .map_err(|e| TransportError::Unknown(format!("invoke thread spawn failed: {e}")))?;

        let deadline = Instant::now() + self.config.call_timeout;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Network(format!(
                    "no response from {} within {:?}",
                    self.transport.name(),
                    self.config.call_timeout
                ))
                .into());
            }
            match rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                Ok(result) => return result.map_err(RemoteError::from),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::Unknown(
                        "transport worker exited without a response".into(),
                    )
                    .into());
                }
            }
        }
    }

    fn backoff(&self, delay: Duration) -> Result<(), RemoteError> {
        let deadline = Instant::now() + delay;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

fn fail(err: RemoteError) -> Step {
    Step::FallbackInvoked(FallbackReason::Remote(err))
}
