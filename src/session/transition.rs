//! Pure session transitions
//!
//! Every user intent and every asynchronous result passes through the two
//! functions here. They mutate the state container deterministically and
//! return the side effects to perform; nothing in this module touches the
//! network or a device, which is what makes the whole flow testable without
//! either.

use crate::capture::{CaptureError, RecordingArtifact};
use crate::cards::DrawResult;
use crate::error::AnalysisError;
use crate::interpret::{InterviewAnswer, Round, RoundContext, StoryAnalysis};
use crate::session::state::{
    InterviewPhase, PendingOp, Phase, RecordingBinding, SessionError, SessionState,
};
use tracing::{debug, warn};

/// User intents, forwarded verbatim by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Draw,
    SubmitStory(String),
    BeginInterview,
    StartRecording,
    StopRecording,
    SubmitAnswer(String),
    DownloadArtifact(Round),
    CloseInterview,
}

/// Results of asynchronous work, fed back by the driver
///
/// Each carries the session token captured when the work was started; a
/// mismatch means the session was redrawn in the meantime and the result is
/// discarded.
#[derive(Debug)]
pub enum Outcome {
    CardsDrawn {
        token: u64,
        draw: DrawResult,
    },
    StoryAnalyzed {
        token: u64,
        result: Result<StoryAnalysis, AnalysisError>,
    },
    AnswerAnalyzed {
        token: u64,
        round: Round,
        result: Result<InterviewAnswer, AnalysisError>,
    },
    CaptureReady {
        token: u64,
        result: Result<(), CaptureError>,
    },
    RecordingFinished {
        artifact: Option<RecordingArtifact>,
    },
    CaptureFault {
        message: String,
    },
}

/// Side effects a transition asks the driver to perform
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    DrawCards { token: u64 },
    AnalyzeStory { token: u64, draw: DrawResult, story: String },
    AnalyzeAnswer { token: u64, context: RoundContext, text: String },
    AcquireCapture { token: u64 },
    StartRecording { round: Round },
    StopRecording,
    ReleaseCapture,
    ExportArtifact { round: Round },
}

/// Apply one user intent.
///
/// Invalid or mistimed intents are rejected without changing phase; blank
/// submissions never produce a remote call.
pub fn apply_intent(state: &mut SessionState, intent: Intent) -> Vec<Effect> {
    match intent {
        Intent::Draw => draw(state),
        Intent::SubmitStory(text) => submit_story(state, text),
        Intent::BeginInterview => begin_interview(state),
        Intent::StartRecording => start_recording(state),
        Intent::StopRecording => stop_recording(state),
        Intent::SubmitAnswer(text) => submit_answer(state, text),
        Intent::DownloadArtifact(round) => download_artifact(state, round),
        Intent::CloseInterview => close_interview(state),
    }
}

/// Apply one asynchronous result.
///
/// A result is applied only if its token matches the current session and the
/// machine is still waiting in the matching busy phase; anything else is a
/// stale completion and is dropped.
pub fn apply_outcome(state: &mut SessionState, outcome: Outcome) -> Vec<Effect> {
    match outcome {
        Outcome::CardsDrawn { token, draw } => cards_drawn(state, token, draw),
        Outcome::StoryAnalyzed { token, result } => story_analyzed(state, token, result),
        Outcome::AnswerAnalyzed {
            token,
            round,
            result,
        } => answer_analyzed(state, token, round, result),
        Outcome::CaptureReady { token, result } => capture_ready(state, token, result),
        Outcome::RecordingFinished { artifact } => recording_finished(state, artifact),
        Outcome::CaptureFault { message } => capture_fault(state, message),
    }
}

fn draw(state: &mut SessionState) -> Vec<Effect> {
    match state.phase {
        Phase::Idle | Phase::Reflecting | Phase::Analyzing | Phase::Result => {}
        Phase::Drawing => {
            debug!("Draw ignored: shuffle already in progress");
            return Vec::new();
        }
    }

    let mut effects = Vec::new();
    // Implicit interview close: the device must never survive into the next
    // session.
    if state.interview_active() || matches!(state.pending, Some(PendingOp::AcquireCapture)) {
        effects.push(Effect::ReleaseCapture);
    }

    let mut fresh = SessionState::reseed(state.token + 1);
    fresh.phase = Phase::Drawing;
    fresh.pending = Some(PendingOp::Draw);
    effects.push(Effect::DrawCards { token: fresh.token });
    *state = fresh;
    effects
}

fn submit_story(state: &mut SessionState, text: String) -> Vec<Effect> {
    if state.phase != Phase::Reflecting {
        debug!(phase = ?state.phase, "Story submission ignored outside Reflecting");
        return Vec::new();
    }
    if text.trim().is_empty() {
        state.last_error = Some(SessionError::EmptyInput);
        return Vec::new();
    }
    let Some(draw) = state.draw.clone() else {
        warn!("Reflecting without a draw; story submission dropped");
        return Vec::new();
    };

    state.story = text.clone();
    state.phase = Phase::Analyzing;
    state.pending = Some(PendingOp::AnalyzeStory);
    state.last_error = None;
    vec![Effect::AnalyzeStory {
        token: state.token,
        draw,
        story: text,
    }]
}

fn begin_interview(state: &mut SessionState) -> Vec<Effect> {
    if state.phase != Phase::Result
        || state.interview != InterviewPhase::Inactive
        || state.pending.is_some()
    {
        debug!("Begin-interview ignored in current state");
        return Vec::new();
    }

    state.pending = Some(PendingOp::AcquireCapture);
    vec![Effect::AcquireCapture { token: state.token }]
}

fn start_recording(state: &mut SessionState) -> Vec<Effect> {
    if state.recording.is_some() {
        warn!("Start-recording rejected: a recording is already active");
        return Vec::new();
    }

    // The round and the phase to land in after stopping are bound here, at
    // start time; stop handling never reads the then-current phase.
    let (recording_phase, binding) = match state.interview {
        InterviewPhase::Preview1 => (
            InterviewPhase::Recording1,
            RecordingBinding {
                round: Round::One,
                next: InterviewPhase::Input1,
            },
        ),
        InterviewPhase::Feedback1 => (
            InterviewPhase::Recording2,
            RecordingBinding {
                round: Round::Two,
                next: InterviewPhase::Input2,
            },
        ),
        _ => {
            debug!(interview = ?state.interview, "Start-recording ignored in this sub-phase");
            return Vec::new();
        }
    };

    state.interview = recording_phase;
    state.recording = Some(binding);
    state.answer_draft.clear();
    vec![Effect::StartRecording {
        round: binding.round,
    }]
}

fn stop_recording(state: &mut SessionState) -> Vec<Effect> {
    if state.interview.recording_round().is_none() {
        debug!("Stop-recording ignored: nothing is recording");
        return Vec::new();
    }
    vec![Effect::StopRecording]
}

fn submit_answer(state: &mut SessionState, text: String) -> Vec<Effect> {
    let Some(round) = state.interview.input_round() else {
        debug!(interview = ?state.interview, "Answer submission ignored in this sub-phase");
        return Vec::new();
    };
    if text.trim().is_empty() {
        state.last_error = Some(SessionError::EmptyInput);
        return Vec::new();
    }

    let context = match round {
        Round::One => {
            let Some(analysis) = state.analysis.as_ref() else {
                warn!("Interview running without a story analysis; answer dropped");
                return Vec::new();
            };
            RoundContext {
                round,
                question: analysis.follow_up_question.clone(),
                previous_answer: None,
            }
        }
        Round::Two => {
            let Some(first) = state.answer(Round::One) else {
                warn!("Round 2 without a round 1 answer; answer dropped");
                return Vec::new();
            };
            let Some(question) = first.next_question.clone() else {
                warn!("Round 1 answer without a next question; answer dropped");
                return Vec::new();
            };
            RoundContext {
                round,
                question,
                previous_answer: Some(first.transcription.clone()),
            }
        }
    };

    state.answer_draft = text.clone();
    state.interview = match round {
        Round::One => InterviewPhase::Analyzing1,
        Round::Two => InterviewPhase::Analyzing2,
    };
    state.pending = Some(PendingOp::AnalyzeAnswer {
        round,
        text: text.clone(),
    });
    state.last_error = None;
    vec![Effect::AnalyzeAnswer {
        token: state.token,
        context,
        text,
    }]
}

fn download_artifact(state: &mut SessionState, round: Round) -> Vec<Effect> {
    if state.phase != Phase::Result || state.artifact(round).is_none() {
        debug!(round = %round, "Download ignored: no artifact for this round");
        return Vec::new();
    }
    vec![Effect::ExportArtifact { round }]
}

fn close_interview(state: &mut SessionState) -> Vec<Effect> {
    let acquiring = matches!(state.pending, Some(PendingOp::AcquireCapture));
    let analyzing_answer = matches!(state.pending, Some(PendingOp::AnalyzeAnswer { .. }));
    if !state.interview_active() && !acquiring {
        debug!("Close-interview ignored: interview is not active");
        return Vec::new();
    }

    // Completed answers and artifacts stay available inside Result until the
    // session is redrawn; only interview-transient state is dropped.
    state.interview = InterviewPhase::Inactive;
    state.recording = None;
    state.answer_draft.clear();
    state.last_error = None;
    if acquiring || analyzing_answer {
        state.pending = None;
    }
    vec![Effect::ReleaseCapture]
}

fn cards_drawn(state: &mut SessionState, token: u64, draw: DrawResult) -> Vec<Effect> {
    let expected =
        token == state.token && state.phase == Phase::Drawing && state.pending == Some(PendingOp::Draw);
    if !expected {
        warn!(token, current = state.token, "Discarding stale draw result");
        return Vec::new();
    }

    state.draw = Some(draw);
    state.phase = Phase::Reflecting;
    state.pending = None;
    Vec::new()
}

fn story_analyzed(
    state: &mut SessionState,
    token: u64,
    result: Result<StoryAnalysis, AnalysisError>,
) -> Vec<Effect> {
    let expected = token == state.token
        && state.phase == Phase::Analyzing
        && state.pending == Some(PendingOp::AnalyzeStory);
    if !expected {
        warn!(token, current = state.token, "Discarding stale story analysis");
        return Vec::new();
    }

    state.pending = None;
    match result {
        Ok(analysis) => {
            state.analysis = Some(analysis);
            state.phase = Phase::Result;
            state.last_error = None;
        }
        Err(e) => {
            // The story text is untouched so the user can retry.
            state.phase = Phase::Reflecting;
            state.last_error = Some(SessionError::Analysis(e.to_string()));
        }
    }
    Vec::new()
}

fn answer_analyzed(
    state: &mut SessionState,
    token: u64,
    round: Round,
    result: Result<InterviewAnswer, AnalysisError>,
) -> Vec<Effect> {
    let submitted = match &state.pending {
        Some(PendingOp::AnalyzeAnswer {
            round: pending_round,
            text,
        }) if *pending_round == round => text.clone(),
        _ => {
            warn!(round = %round, "Discarding answer analysis with no matching pending op");
            return Vec::new();
        }
    };
    if token != state.token || state.interview.analyzing_round() != Some(round) {
        warn!(token, current = state.token, "Discarding stale answer analysis");
        return Vec::new();
    }

    state.pending = None;
    match result {
        Ok(mut answer) => {
            // The transcription is by contract the literal submitted text.
            answer.transcription = submitted;
            state.answers[round.index()] = Some(answer);
            state.interview = match round {
                Round::One => InterviewPhase::Feedback1,
                Round::Two => InterviewPhase::FinalFeedback,
            };
            state.answer_draft.clear();
            state.last_error = None;
        }
        Err(e) => {
            // Revert to the input phase with the typed text preserved.
            state.interview = match round {
                Round::One => InterviewPhase::Input1,
                Round::Two => InterviewPhase::Input2,
            };
            state.last_error = Some(SessionError::Analysis(e.to_string()));
        }
    }
    Vec::new()
}

fn capture_ready(
    state: &mut SessionState,
    token: u64,
    result: Result<(), CaptureError>,
) -> Vec<Effect> {
    let expected = token == state.token
        && state.pending == Some(PendingOp::AcquireCapture)
        && state.phase == Phase::Result
        && state.interview == InterviewPhase::Inactive;
    if !expected {
        warn!(token, current = state.token, "Discarding stale capture acquisition");
        // A device acquired for an abandoned session must not stay open.
        return if result.is_ok() {
            vec![Effect::ReleaseCapture]
        } else {
            Vec::new()
        };
    }

    state.pending = None;
    match result {
        Ok(()) => {
            state.interview = InterviewPhase::Preview1;
            state.last_error = None;
        }
        Err(e) => {
            // The interview never starts; the text-only Result stays usable.
            state.last_error = Some(SessionError::Capture(e.to_string()));
        }
    }
    Vec::new()
}

fn recording_finished(
    state: &mut SessionState,
    artifact: Option<RecordingArtifact>,
) -> Vec<Effect> {
    let Some(binding) = state.recording.take() else {
        warn!("Discarding recording result with no active binding");
        return Vec::new();
    };

    // Attribution uses the binding captured at start time. The phase may
    // already have drifted past the recording sub-phase; in that case the
    // artifact is still stored, but the phase is left alone.
    if let Some(artifact) = artifact {
        state.artifacts[binding.round.index()] = Some(artifact);
    }
    if state.interview.recording_round() == Some(binding.round) {
        state.interview = binding.next;
    }
    Vec::new()
}

fn capture_fault(state: &mut SessionState, message: String) -> Vec<Effect> {
    let reverted = match state.interview {
        InterviewPhase::Recording1 => Some(InterviewPhase::Preview1),
        InterviewPhase::Recording2 => Some(InterviewPhase::Feedback1),
        _ => None,
    };
    let Some(phase) = reverted else {
        warn!("Capture fault outside a recording phase: {}", message);
        return Vec::new();
    };

    state.interview = phase;
    state.recording = None;
    state.last_error = Some(SessionError::Capture(message));
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{ImageCard, WordCard};

    fn fixture_draw() -> DrawResult {
        DrawResult {
            word: WordCard { id: 31, text: "恐惧" },
            image: ImageCard {
                id: 7,
                image_url: "https://picsum.photos/seed/106/300/450".into(),
            },
        }
    }

    fn fixture_analysis() -> StoryAnalysis {
        StoryAnalysis {
            summary: "A bird sits in a cage with the door ajar.".into(),
            interpretation: "The bird feels trapped even though the door is open.".into(),
            guidance: "Sit with what the open door could mean.".into(),
            follow_up_question: "What cage are you in?".into(),
        }
    }

    fn round1_answer() -> InterviewAnswer {
        InterviewAnswer {
            transcription: "model-side transcript".into(),
            emotional_feedback: "There is tension in how briefly this is said.".into(),
            next_question: Some("What would freedom look like?".into()),
            final_closing: None,
        }
    }

    fn round2_answer() -> InterviewAnswer {
        InterviewAnswer {
            transcription: "model-side transcript".into(),
            emotional_feedback: "A note of longing.".into(),
            next_question: None,
            final_closing: Some("You already know the direction.".into()),
        }
    }

    fn artifact(round: Round) -> RecordingArtifact {
        RecordingArtifact::new(round, vec![0x52, 0x49, 0x46, 0x46])
    }

    /// Drive a fresh session to `Result` through the happy story path.
    fn drive_to_result() -> SessionState {
        let mut state = SessionState::new();
        let effects = apply_intent(&mut state, Intent::Draw);
        assert_eq!(effects, vec![Effect::DrawCards { token: state.token }]);
        assert_eq!(state.phase, Phase::Drawing);

        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.phase, Phase::Reflecting);

        let effects = apply_intent(&mut state, Intent::SubmitStory("a caged bird".into()));
        assert_eq!(state.phase, Phase::Analyzing);
        assert!(matches!(effects[..], [Effect::AnalyzeStory { .. }]));

        let __outcome =
            Outcome::StoryAnalyzed {
                token: state.token,
                result: Ok(fixture_analysis()),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.phase, Phase::Result);
        state
    }

    /// Open the interview from `Result` with a successful acquisition.
    fn open_interview(state: &mut SessionState) {
        let effects = apply_intent(state, Intent::BeginInterview);
        assert_eq!(effects, vec![Effect::AcquireCapture { token: state.token }]);
        apply_outcome(
            state,
            Outcome::CaptureReady {
                token: state.token,
                result: Ok(()),
            },
        );
        assert_eq!(state.interview, InterviewPhase::Preview1);
    }

    /// Record and stop for the current round.
    fn record_and_stop(state: &mut SessionState, round: Round) {
        let effects = apply_intent(state, Intent::StartRecording);
        assert_eq!(effects, vec![Effect::StartRecording { round }]);
        let effects = apply_intent(state, Intent::StopRecording);
        assert_eq!(effects, vec![Effect::StopRecording]);
        apply_outcome(
            state,
            Outcome::RecordingFinished {
                artifact: Some(artifact(round)),
            },
        );
    }

    #[test]
    fn test_blank_story_is_rejected_without_effects() {
        let mut state = SessionState::new();
        apply_intent(&mut state, Intent::Draw);
        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);

        let effects = apply_intent(&mut state, Intent::SubmitStory("   \n\t".into()));
        assert!(effects.is_empty());
        assert_eq!(state.phase, Phase::Reflecting);
        assert_eq!(state.last_error, Some(SessionError::EmptyInput));
    }

    #[test]
    fn test_story_failure_reverts_with_text_preserved() {
        let mut state = SessionState::new();
        apply_intent(&mut state, Intent::Draw);
        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);
        apply_intent(&mut state, Intent::SubmitStory("a caged bird".into()));

        let __outcome =
            Outcome::StoryAnalyzed {
                token: state.token,
                result: Err(AnalysisError::InvalidResponse("empty payload".into())),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.phase, Phase::Reflecting);
        assert_eq!(state.story, "a caged bird");
        assert!(matches!(state.last_error, Some(SessionError::Analysis(_))));
        assert!(state.analysis.is_none());

        // Retrying clears the error on success.
        apply_intent(&mut state, Intent::SubmitStory("a caged bird".into()));
        let __outcome =
            Outcome::StoryAnalyzed {
                token: state.token,
                result: Ok(fixture_analysis()),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.phase, Phase::Result);
        assert_eq!(state.last_error, None);
    }

    #[test]
    fn test_duplicate_submit_while_analyzing_is_ignored() {
        let mut state = SessionState::new();
        apply_intent(&mut state, Intent::Draw);
        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);
        apply_intent(&mut state, Intent::SubmitStory("a caged bird".into()));

        let effects = apply_intent(&mut state, Intent::SubmitStory("another story".into()));
        assert!(effects.is_empty());
        assert_eq!(state.phase, Phase::Analyzing);
        assert_eq!(state.story, "a caged bird");
    }

    #[test]
    fn test_full_interview_sequence_in_order() {
        let mut state = drive_to_result();
        open_interview(&mut state);

        record_and_stop(&mut state, Round::One);
        assert_eq!(state.interview, InterviewPhase::Input1);
        assert_eq!(state.current_question(), Some("What cage are you in?"));

        apply_intent(&mut state, Intent::SubmitAnswer("my job".into()));
        assert_eq!(state.interview, InterviewPhase::Analyzing1);
        let __outcome =
            Outcome::AnswerAnalyzed {
                token: state.token,
                round: Round::One,
                result: Ok(round1_answer()),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.interview, InterviewPhase::Feedback1);
        assert_eq!(state.current_question(), Some("What would freedom look like?"));

        record_and_stop(&mut state, Round::Two);
        assert_eq!(state.interview, InterviewPhase::Input2);

        apply_intent(&mut state, Intent::SubmitAnswer("quit and travel".into()));
        assert_eq!(state.interview, InterviewPhase::Analyzing2);
        let __outcome =
            Outcome::AnswerAnalyzed {
                token: state.token,
                round: Round::Two,
                result: Ok(round2_answer()),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.interview, InterviewPhase::FinalFeedback);

        // Both transcriptions echo the literal submitted text.
        assert_eq!(state.answer(Round::One).unwrap().transcription, "my job");
        assert_eq!(
            state.answer(Round::Two).unwrap().transcription,
            "quit and travel"
        );
        assert_eq!(
            state.answer(Round::Two).unwrap().final_closing.as_deref(),
            Some("You already know the direction.")
        );
        assert!(state.artifact(Round::One).is_some());
        assert!(state.artifact(Round::Two).is_some());
        assert_eq!(state.phase, Phase::Result);
    }

    #[test]
    fn test_round2_context_carries_round1_answer() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        record_and_stop(&mut state, Round::One);
        apply_intent(&mut state, Intent::SubmitAnswer("my job".into()));
        let __outcome =
            Outcome::AnswerAnalyzed {
                token: state.token,
                round: Round::One,
                result: Ok(round1_answer()),
            };
        apply_outcome(&mut state, __outcome);
        record_and_stop(&mut state, Round::Two);

        let effects = apply_intent(&mut state, Intent::SubmitAnswer("quit and travel".into()));
        match &effects[..] {
            [Effect::AnalyzeAnswer { context, text, .. }] => {
                assert_eq!(context.round, Round::Two);
                assert_eq!(context.question, "What would freedom look like?");
                assert_eq!(context.previous_answer.as_deref(), Some("my job"));
                assert_eq!(text, "quit and travel");
            }
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_acquire_failure_keeps_interview_inactive() {
        let mut state = drive_to_result();
        apply_intent(&mut state, Intent::BeginInterview);
        let __outcome =
            Outcome::CaptureReady {
                token: state.token,
                result: Err(CaptureError::PermissionDenied),
            };
        apply_outcome(&mut state, __outcome);

        assert_eq!(state.interview, InterviewPhase::Inactive);
        assert_eq!(state.phase, Phase::Result);
        assert!(matches!(state.last_error, Some(SessionError::Capture(_))));
        assert!(state.pending.is_none());
    }

    #[test]
    fn test_second_start_recording_is_rejected() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        apply_intent(&mut state, Intent::StartRecording);
        let binding = state.recording;

        let effects = apply_intent(&mut state, Intent::StartRecording);
        assert!(effects.is_empty());
        assert_eq!(state.interview, InterviewPhase::Recording1);
        assert_eq!(state.recording, binding);
    }

    #[test]
    fn test_stop_without_recording_is_a_noop() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        let effects = apply_intent(&mut state, Intent::StopRecording);
        assert!(effects.is_empty());
        assert_eq!(state.interview, InterviewPhase::Preview1);
    }

    #[test]
    fn test_round_binding_survives_phase_drift() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        apply_intent(&mut state, Intent::StartRecording);
        assert_eq!(
            state.recording,
            Some(RecordingBinding {
                round: Round::One,
                next: InterviewPhase::Input1,
            })
        );

        // Simulate the stop landing after the phase has already advanced.
        state.interview = InterviewPhase::Analyzing1;
        let __outcome =
            Outcome::RecordingFinished {
                artifact: Some(artifact(Round::One)),
            };
        apply_outcome(&mut state, __outcome);

        assert!(state.artifact(Round::One).is_some());
        assert!(state.artifact(Round::Two).is_none());
        // The drifted phase is left alone.
        assert_eq!(state.interview, InterviewPhase::Analyzing1);
    }

    #[test]
    fn test_stop_without_artifact_still_advances() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        apply_intent(&mut state, Intent::StartRecording);
        apply_intent(&mut state, Intent::StopRecording);
        apply_outcome(&mut state, Outcome::RecordingFinished { artifact: None });

        assert_eq!(state.interview, InterviewPhase::Input1);
        assert!(state.artifact(Round::One).is_none());
    }

    #[test]
    fn test_answer_failure_reverts_with_draft_preserved() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        record_and_stop(&mut state, Round::One);
        apply_intent(&mut state, Intent::SubmitAnswer("my job".into()));

        let __outcome =
            Outcome::AnswerAnalyzed {
                token: state.token,
                round: Round::One,
                result: Err(AnalysisError::MissingField("nextQuestion")),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.interview, InterviewPhase::Input1);
        assert_eq!(state.answer_draft, "my job");
        assert!(matches!(state.last_error, Some(SessionError::Analysis(_))));
        assert!(state.answer(Round::One).is_none());
    }

    #[test]
    fn test_blank_answer_is_rejected_without_effects() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        record_and_stop(&mut state, Round::One);

        let effects = apply_intent(&mut state, Intent::SubmitAnswer("  ".into()));
        assert!(effects.is_empty());
        assert_eq!(state.interview, InterviewPhase::Input1);
        assert_eq!(state.last_error, Some(SessionError::EmptyInput));
    }

    #[test]
    fn test_close_releases_device_and_keeps_result_state() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        record_and_stop(&mut state, Round::One);
        apply_intent(&mut state, Intent::SubmitAnswer("my job".into()));
        let __outcome =
            Outcome::AnswerAnalyzed {
                token: state.token,
                round: Round::One,
                result: Ok(round1_answer()),
            };
        apply_outcome(&mut state, __outcome);

        let effects = apply_intent(&mut state, Intent::CloseInterview);
        assert_eq!(effects, vec![Effect::ReleaseCapture]);
        assert_eq!(state.interview, InterviewPhase::Inactive);
        assert_eq!(state.phase, Phase::Result);
        // Completed work survives until redraw.
        assert!(state.answer(Round::One).is_some());
        assert!(state.artifact(Round::One).is_some());
        assert!(state.analysis.is_some());
    }

    #[test]
    fn test_close_from_every_active_subphase_releases() {
        for steps in 0..=3 {
            let mut state = drive_to_result();
            open_interview(&mut state);
            if steps >= 1 {
                apply_intent(&mut state, Intent::StartRecording);
            }
            if steps >= 2 {
                apply_intent(&mut state, Intent::StopRecording);
                let __outcome =
                    Outcome::RecordingFinished {
                        artifact: Some(artifact(Round::One)),
                    };
                apply_outcome(&mut state, __outcome);
            }
            if steps >= 3 {
                apply_intent(&mut state, Intent::SubmitAnswer("my job".into()));
            }

            let effects = apply_intent(&mut state, Intent::CloseInterview);
            assert_eq!(effects, vec![Effect::ReleaseCapture], "steps={}", steps);
            assert_eq!(state.interview, InterviewPhase::Inactive);
            assert_eq!(state.phase, Phase::Result);
        }
    }

    #[test]
    fn test_close_while_acquiring_cancels_the_acquisition() {
        let mut state = drive_to_result();
        apply_intent(&mut state, Intent::BeginInterview);
        assert_eq!(state.pending, Some(PendingOp::AcquireCapture));

        let effects = apply_intent(&mut state, Intent::CloseInterview);
        assert_eq!(effects, vec![Effect::ReleaseCapture]);
        assert!(state.pending.is_none());

        // The acquisition resolving afterwards is stale; a successful one
        // must still release the device it opened.
        let __outcome =
            Outcome::CaptureReady {
                token: state.token,
                result: Ok(()),
            };
        let effects = apply_outcome(&mut state, __outcome);
        assert_eq!(effects, vec![Effect::ReleaseCapture]);
        assert_eq!(state.interview, InterviewPhase::Inactive);
    }

    #[test]
    fn test_redraw_resets_everything() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        record_and_stop(&mut state, Round::One);
        apply_intent(&mut state, Intent::SubmitAnswer("my job".into()));
        let __outcome =
            Outcome::AnswerAnalyzed {
                token: state.token,
                round: Round::One,
                result: Ok(round1_answer()),
            };
        apply_outcome(&mut state, __outcome);
        let old_token = state.token;

        let effects = apply_intent(&mut state, Intent::Draw);
        assert_eq!(
            effects,
            vec![
                Effect::ReleaseCapture,
                Effect::DrawCards { token: old_token + 1 },
            ]
        );
        assert_eq!(state.token, old_token + 1);
        assert_eq!(state.phase, Phase::Drawing);
        assert_eq!(state.interview, InterviewPhase::Inactive);
        assert!(state.draw.is_none());
        assert!(state.story.is_empty());
        assert!(state.analysis.is_none());
        assert!(state.answers.iter().all(Option::is_none));
        assert!(state.artifacts.iter().all(Option::is_none));
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_stale_story_result_is_discarded_after_redraw() {
        let mut state = SessionState::new();
        apply_intent(&mut state, Intent::Draw);
        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);
        apply_intent(&mut state, Intent::SubmitStory("a caged bird".into()));
        let old_token = state.token;

        // Redraw while the analysis is in flight.
        apply_intent(&mut state, Intent::Draw);
        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.phase, Phase::Reflecting);

        let __outcome =
            Outcome::StoryAnalyzed {
                token: old_token,
                result: Ok(fixture_analysis()),
            };
        let effects = apply_outcome(&mut state, __outcome);
        assert!(effects.is_empty());
        assert_eq!(state.phase, Phase::Reflecting);
        assert!(state.analysis.is_none());
    }

    #[test]
    fn test_unexpected_cards_outcome_is_discarded() {
        let mut state = drive_to_result();
        let before = state.clone();
        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state, before);
    }

    #[test]
    fn test_download_requires_an_artifact() {
        let mut state = drive_to_result();
        assert!(apply_intent(&mut state, Intent::DownloadArtifact(Round::One)).is_empty());

        open_interview(&mut state);
        record_and_stop(&mut state, Round::One);
        let effects = apply_intent(&mut state, Intent::DownloadArtifact(Round::One));
        assert_eq!(effects, vec![Effect::ExportArtifact { round: Round::One }]);
        assert!(apply_intent(&mut state, Intent::DownloadArtifact(Round::Two)).is_empty());
    }

    #[test]
    fn test_capture_fault_reverts_recording_phase() {
        let mut state = drive_to_result();
        open_interview(&mut state);
        apply_intent(&mut state, Intent::StartRecording);

        let __outcome =
            Outcome::CaptureFault {
                message: "stream died".into(),
            };
        apply_outcome(&mut state, __outcome);
        assert_eq!(state.interview, InterviewPhase::Preview1);
        assert!(state.recording.is_none());
        assert!(matches!(state.last_error, Some(SessionError::Capture(_))));
    }

    #[test]
    fn test_begin_interview_requires_result_phase() {
        let mut state = SessionState::new();
        assert!(apply_intent(&mut state, Intent::BeginInterview).is_empty());

        apply_intent(&mut state, Intent::Draw);
        let __outcome =
            Outcome::CardsDrawn {
                token: state.token,
                draw: fixture_draw(),
            };
        apply_outcome(&mut state, __outcome);
        assert!(apply_intent(&mut state, Intent::BeginInterview).is_empty());
        assert_eq!(state.pending, None);
    }
}
