//! Session state container
//!
//! The single source of truth for one session. Every read the presentation
//! layer makes derives from this struct; no component keeps its own copy. A
//! redraw replaces the whole container and bumps the session token so that
//! async results from the previous session can be recognized and discarded.

use crate::capture::RecordingArtifact;
use crate::cards::DrawResult;
use crate::interpret::{InterviewAnswer, Round, StoryAnalysis};

/// Primary session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Drawing,
    Reflecting,
    Analyzing,
    Result,
}

/// Guided-interview sub-phase, meaningful only inside `Phase::Result`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterviewPhase {
    Inactive,
    Preview1,
    Recording1,
    Input1,
    Analyzing1,
    Feedback1,
    Recording2,
    Input2,
    Analyzing2,
    FinalFeedback,
}

impl InterviewPhase {
    /// The round being recorded, if this is a recording phase.
    pub fn recording_round(self) -> Option<Round> {
        match self {
            InterviewPhase::Recording1 => Some(Round::One),
            InterviewPhase::Recording2 => Some(Round::Two),
            _ => None,
        }
    }

    /// The round whose answer is typed in, if this is an input phase.
    pub fn input_round(self) -> Option<Round> {
        match self {
            InterviewPhase::Input1 => Some(Round::One),
            InterviewPhase::Input2 => Some(Round::Two),
            _ => None,
        }
    }

    /// The round being analyzed, if this is a busy phase.
    pub fn analyzing_round(self) -> Option<Round> {
        match self {
            InterviewPhase::Analyzing1 => Some(Round::One),
            InterviewPhase::Analyzing2 => Some(Round::Two),
            _ => None,
        }
    }
}

/// The async operation the session is currently waiting on
///
/// Exactly one may be outstanding; its tag is matched against the arriving
/// result so late or duplicate completions cannot corrupt the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    /// The shuffle delay plus card draw.
    Draw,
    /// Device acquisition for the interview.
    AcquireCapture,
    /// The story interpretation call.
    AnalyzeStory,
    /// An answer interpretation call; keeps the submitted text so the
    /// transcription can be echoed and the draft restored on failure.
    AnalyzeAnswer { round: Round, text: String },
}

/// Round binding captured when a recording starts
///
/// Stop handling consults this, never the current phase: by the time a stop
/// lands the phase may have moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingBinding {
    pub round: Round,
    pub next: InterviewPhase,
}

/// User-visible session error, at most one at a time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Write a few words first")]
    EmptyInput,

    #[error("The reading could not be completed: {0}")]
    Analysis(String),

    #[error("Camera/microphone unavailable: {0}")]
    Capture(String),
}

/// All state of one active session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Monotonic token identifying this session for staleness checks.
    pub token: u64,
    pub phase: Phase,
    pub interview: InterviewPhase,
    pub draw: Option<DrawResult>,
    pub story: String,
    pub analysis: Option<StoryAnalysis>,
    /// One slot per interview round.
    pub answers: [Option<InterviewAnswer>; 2],
    /// One slot per completed recording.
    pub artifacts: [Option<RecordingArtifact>; 2],
    /// The answer text being retried after a failed analysis.
    pub answer_draft: String,
    pub pending: Option<PendingOp>,
    pub recording: Option<RecordingBinding>,
    pub last_error: Option<SessionError>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::reseed(0)
    }

    /// A fresh session under the given token. Used for the initial state and
    /// for the wholesale replacement a redraw performs.
    pub fn reseed(token: u64) -> Self {
        Self {
            token,
            phase: Phase::Idle,
            interview: InterviewPhase::Inactive,
            draw: None,
            story: String::new(),
            analysis: None,
            answers: [None, None],
            artifacts: [None, None],
            answer_draft: String::new(),
            pending: None,
            recording: None,
            last_error: None,
        }
    }

    pub fn answer(&self, round: Round) -> Option<&InterviewAnswer> {
        self.answers[round.index()].as_ref()
    }

    pub fn artifact(&self, round: Round) -> Option<&RecordingArtifact> {
        self.artifacts[round.index()].as_ref()
    }

    pub fn interview_active(&self) -> bool {
        self.interview != InterviewPhase::Inactive
    }

    /// The question currently put to the user, derived from the sub-phase:
    /// round 1 shows the story analysis's follow-up, round 2 shows the
    /// question generated from answer 1.
    pub fn current_question(&self) -> Option<&str> {
        use InterviewPhase::*;
        match self.interview {
            Preview1 | Recording1 | Input1 | Analyzing1 => self
                .analysis
                .as_ref()
                .map(|a| a.follow_up_question.as_str()),
            Feedback1 | Recording2 | Input2 | Analyzing2 => self
                .answer(Round::One)
                .and_then(|a| a.next_question.as_deref()),
            Inactive | FinalFeedback => None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
