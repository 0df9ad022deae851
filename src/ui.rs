//! Terminal presentation
//!
//! Renders whatever the session state machine currently exposes and turns
//! typed commands into intents. Pure forwarding; no invariants live here.

use crate::interpret::Round;
use crate::session::{Intent, InterviewPhase, Phase, SessionState};

/// A parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    Help,
    Quit,
}

/// Parse one input line into a command.
///
/// Returns `None` for anything unrecognized.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };

    match head.to_ascii_lowercase().as_str() {
        "draw" => Some(Command::Intent(Intent::Draw)),
        "story" => Some(Command::Intent(Intent::SubmitStory(rest.to_string()))),
        "interview" => Some(Command::Intent(Intent::BeginInterview)),
        "record" => Some(Command::Intent(Intent::StartRecording)),
        "stop" => Some(Command::Intent(Intent::StopRecording)),
        "answer" => Some(Command::Intent(Intent::SubmitAnswer(rest.to_string()))),
        "download" => match rest {
            "1" => Some(Command::Intent(Intent::DownloadArtifact(Round::One))),
            "2" => Some(Command::Intent(Intent::DownloadArtifact(Round::Two))),
            _ => None,
        },
        "close" => Some(Command::Intent(Intent::CloseInterview)),
        "help" => Some(Command::Help),
        "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

pub fn print_welcome() {
    println!("MindMirror: draw a card pair and see the story you carry.");
    println!("Type 'draw' to begin, 'help' for commands.");
}

pub fn print_help() {
    println!("Commands:");
    println!("  draw               draw a fresh card pair (restarts the session)");
    println!("  story <text>       tell the story you see in the cards");
    println!("  interview          begin the recorded reflection");
    println!("  record / stop      start or finish a recording");
    println!("  answer <text>      answer the current reflection question");
    println!("  download <1|2>     save a round's recording to disk");
    println!("  close              leave the reflection, keep the reading");
    println!("  quit               exit");
}

/// Render the current session snapshot.
pub fn render(state: &SessionState) {
    if let Some(error) = &state.last_error {
        println!("! {}", error);
    }

    match state.phase {
        Phase::Idle => println!("Ready when you are. ('draw')"),
        Phase::Drawing => println!("Shuffling the decks..."),
        Phase::Reflecting => {
            if let Some(draw) = &state.draw {
                println!("Word card: {}", draw.word.text);
                println!("Image card: {}", draw.image.image_url);
            }
            println!("Looking at these two cards, what story do you see? ('story <text>')");
        }
        Phase::Analyzing => println!("Listening for what the story carries..."),
        Phase::Result => render_result(state),
    }
}

fn render_result(state: &SessionState) {
    match state.interview {
        InterviewPhase::Inactive => {
            if let Some(analysis) = &state.analysis {
                println!("Summary: {}", analysis.summary);
                println!("Interpretation: {}", analysis.interpretation);
                println!("Guidance: {}", analysis.guidance);
            }
            println!("Type 'interview' to reflect on camera, or 'draw' to start over.");
        }
        InterviewPhase::Preview1 | InterviewPhase::Feedback1 => {
            if state.interview == InterviewPhase::Feedback1 {
                if let Some(answer) = state.answer(Round::One) {
                    println!("Feedback: {}", answer.emotional_feedback);
                }
            }
            if let Some(question) = state.current_question() {
                println!("Question: {}", question);
            }
            println!("'record' to capture your answer, or 'answer <text>' after recording.");
        }
        InterviewPhase::Recording1 | InterviewPhase::Recording2 => {
            if let Some(question) = state.current_question() {
                println!("Question: {}", question);
            }
            println!("Recording... 'stop' when you are done.");
        }
        InterviewPhase::Input1 | InterviewPhase::Input2 => {
            if let Some(question) = state.current_question() {
                println!("Question: {}", question);
            }
            println!("Put your answer into words. ('answer <text>')");
        }
        InterviewPhase::Analyzing1 | InterviewPhase::Analyzing2 => {
            println!("Sitting with your answer...");
        }
        InterviewPhase::FinalFeedback => {
            if let Some(answer) = state.answer(Round::Two) {
                println!("Feedback: {}", answer.emotional_feedback);
                if let Some(closing) = &answer.final_closing {
                    println!("Closing: {}", closing);
                }
            }
            println!("'download 1' / 'download 2' to keep your recordings, 'draw' to begin again.");
        }
    }
}
