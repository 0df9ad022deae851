//! Session orchestration
//!
//! The driver owns the ports (interpreter, capture manager) and the state
//! container. Intents and async results both funnel through the pure
//! transition functions; the driver's only job is to execute the effects they
//! request. Long-running work (the shuffle, interpretation calls) is spawned
//! and reports back through the outcome channel; device operations run
//! inline.

mod state;
mod transition;

pub use state::{InterviewPhase, PendingOp, Phase, RecordingBinding, SessionError, SessionState};
pub use transition::{Effect, Intent, Outcome};

use crate::capture::{CaptureError, CaptureManager};
use crate::cards;
use crate::export;
use crate::interpret::Interpreter;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Drives one session against real or fake ports.
pub struct SessionDriver {
    state: SessionState,
    interpreter: Arc<dyn Interpreter>,
    capture: Box<dyn CaptureManager>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    reveal_delay: Duration,
}

impl SessionDriver {
    pub fn new(
        interpreter: Arc<dyn Interpreter>,
        capture: Box<dyn CaptureManager>,
        reveal_delay: Duration,
        outcomes: mpsc::UnboundedSender<Outcome>,
    ) -> Self {
        Self {
            state: SessionState::new(),
            interpreter,
            capture,
            outcomes,
            reveal_delay,
        }
    }

    /// Read-only snapshot for the presentation layer.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply one user intent and execute whatever it asks for.
    pub async fn dispatch(&mut self, intent: Intent) {
        let effects = transition::apply_intent(&mut self.state, intent);
        self.run_effects(effects).await;
    }

    /// Apply one asynchronous result delivered through the outcome channel.
    pub async fn resolve(&mut self, outcome: Outcome) {
        let effects = transition::apply_outcome(&mut self.state, outcome);
        self.run_effects(effects).await;
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        // Device operations complete inline and may request follow-up work,
        // so effects are drained as a queue rather than recursively.
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::DrawCards { token } => {
                    let tx = self.outcomes.clone();
                    let delay = self.reveal_delay;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let draw = cards::draw();
                        let _ = tx.send(Outcome::CardsDrawn { token, draw });
                    });
                }
                Effect::AnalyzeStory { token, draw, story } => {
                    let interpreter = Arc::clone(&self.interpreter);
                    let tx = self.outcomes.clone();
                    tokio::spawn(async move {
                        let result = interpreter.interpret_story(&draw, &story).await;
                        let _ = tx.send(Outcome::StoryAnalyzed { token, result });
                    });
                }
                Effect::AnalyzeAnswer {
                    token,
                    context,
                    text,
                } => {
                    let interpreter = Arc::clone(&self.interpreter);
                    let tx = self.outcomes.clone();
                    tokio::spawn(async move {
                        let result = interpreter.interpret_answer(&text, &context).await;
                        let _ = tx.send(Outcome::AnswerAnalyzed {
                            token,
                            round: context.round,
                            result,
                        });
                    });
                }
                Effect::AcquireCapture { token } => {
                    let result = self.capture.acquire().await;
                    let more = transition::apply_outcome(
                        &mut self.state,
                        Outcome::CaptureReady { token, result },
                    );
                    queue.extend(more);
                }
                Effect::StartRecording { round } => match self.capture.start_recording(round) {
                    Ok(()) => {}
                    Err(e @ CaptureError::AlreadyRecording)
                    | Err(e @ CaptureError::NotRecording) => {
                        // Contract-misuse guards from rapid double intents are
                        // recoverable; the existing recording is untouched.
                        warn!("Ignoring capture guard on start: {}", e);
                    }
                    Err(e) => {
                        let more = transition::apply_outcome(
                            &mut self.state,
                            Outcome::CaptureFault {
                                message: e.to_string(),
                            },
                        );
                        queue.extend(more);
                    }
                },
                Effect::StopRecording => {
                    let artifact = match self.capture.stop_recording() {
                        Ok(artifact) => Some(artifact),
                        Err(CaptureError::NotRecording) => {
                            warn!("Stop requested with no active recording");
                            None
                        }
                        Err(e) => {
                            error!("Failed to finalize recording: {}", e);
                            None
                        }
                    };
                    let more = transition::apply_outcome(
                        &mut self.state,
                        Outcome::RecordingFinished { artifact },
                    );
                    queue.extend(more);
                }
                Effect::ReleaseCapture => {
                    self.capture.release();
                }
                Effect::ExportArtifact { round } => {
                    if let Some(artifact) = self.state.artifact(round) {
                        match export::save_artifact(artifact) {
                            Ok(path) => info!("Saved recording to {:?}", path),
                            Err(e) => error!("Failed to export recording: {}", e),
                        }
                    }
                }
            }
        }
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        // The device must not outlive the session on any teardown path.
        self.capture.release();
    }
}
