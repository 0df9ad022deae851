//! Interpretation service port
//!
//! Defines the interface the session core uses to reach the remote
//! generative-language service, together with the value types it returns.
//! The production implementation lives in `gemini`; tests substitute fakes.

use crate::cards::DrawResult;
use crate::error::AnalysisError;
use async_trait::async_trait;

/// One of the two guided-interview rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    One,
    Two,
}

impl Round {
    /// Zero-based slot for per-round storage.
    pub fn index(self) -> usize {
        match self {
            Round::One => 0,
            Round::Two => 1,
        }
    }

    /// Stable label used when exporting this round's recording.
    pub fn label(self) -> &'static str {
        match self {
            Round::One => "part-1",
            Round::Two => "part-2",
        }
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Round::One => write!(f, "1"),
            Round::Two => write!(f, "2"),
        }
    }
}

/// The service's reading of the user's story
///
/// Produced exactly once per session. `interpretation` speaks about the
/// story's protagonist in the third person; `follow_up_question` is the only
/// field addressed directly to the user and seeds the guided interview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryAnalysis {
    pub summary: String,
    pub interpretation: String,
    pub guidance: String,
    pub follow_up_question: String,
}

/// The service's reading of one interview answer
///
/// Round 1 carries `next_question` (and never `final_closing`); round 2
/// carries `final_closing` (and never `next_question`). `transcription`
/// echoes the literal text the user submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewAnswer {
    pub transcription: String,
    pub emotional_feedback: String,
    pub next_question: Option<String>,
    pub final_closing: Option<String>,
}

/// Context for interpreting one interview answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundContext {
    /// Which round the answer belongs to.
    pub round: Round,
    /// The question the user was answering.
    pub question: String,
    /// Round 1's transcription, supplied for round 2 only.
    pub previous_answer: Option<String>,
}

/// Port trait for the generative-language service
///
/// Both operations are at-most-once per invocation: a failure is surfaced as
/// a single `AnalysisError` for the caller to handle, never retried here.
/// Implementations must not touch session state; they return values only.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Interpret the user's story about a drawn card pair.
    async fn interpret_story(
        &self,
        draw: &DrawResult,
        story: &str,
    ) -> Result<StoryAnalysis, AnalysisError>;

    /// Interpret one guided-interview answer in its round context.
    async fn interpret_answer(
        &self,
        answer: &str,
        context: &RoundContext,
    ) -> Result<InterviewAnswer, AnalysisError>;
}
