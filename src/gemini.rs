//! Direct Gemini client for story and interview interpretation.
//!
//! This module provides a client that connects to Google's generative
//! language API (`generateContent`) with a JSON response schema. Users
//! provide their own API key.

use crate::cards::DrawResult;
use crate::error::AnalysisError;
use crate::interpret::{Interpreter, InterviewAnswer, Round, RoundContext, StoryAnalysis};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, instrument};
use zeroize::Zeroize;

/// Interpreter section of the embedded config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct InterpreterConfig {
    pub model: String,
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Client for Gemini `generateContent` calls.
///
/// Both operations are single-shot: any transport, server, or schema failure
/// surfaces as one `AnalysisError` and the caller decides what to do.
pub struct GeminiClient {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

/// Request body for the generateContent API.
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

/// Response from the generateContent API.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Structured payload of a story reading.
#[derive(Debug, Deserialize)]
struct StoryPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    interpretation: String,
    #[serde(default)]
    guidance: String,
    #[serde(rename = "followUpQuestion", default)]
    follow_up_question: String,
}

/// Structured payload of an interview-answer reading.
#[derive(Debug, Deserialize)]
struct AnswerPayload {
    #[serde(default)]
    transcription: String,
    #[serde(rename = "emotionalFeedback", default)]
    emotional_feedback: String,
    #[serde(rename = "nextQuestion")]
    next_question: Option<String>,
    #[serde(rename = "finalClosing")]
    final_closing: Option<String>,
}

/// System instruction framing the counselor persona for story readings.
const STORY_SYSTEM_INSTRUCTION: &str = "You are a warm, empathetic, and insightful \
psychological counselor using OH Cards. Your interpretation must strictly analyze \
the story's protagonist in the third person.";

/// Prompt template for the story reading.
/// Placeholders: `{word}`, `{story}`.
const STORY_PROMPT_TEMPLATE: &str = r#"You are an expert OH Card facilitator and psychological counselor.
The user has drawn two cards (one abstract image, one word) and told a story based on them.

The Word Card is: "{word}".

The user's story is: "{story}".

(Note: the user is looking at an abstract image card. Their story describes what they see. You do not see the image; rely entirely on their projection of it.)

Your task:
1. Summarize the story.
2. Interpret the subconscious projection. Do NOT use the second person ("You", "Your") in the 'interpretation' field. ALWAYS refer to the protagonist or object of the story in the third person (e.g., "The bird", "The child", "She"). Instead of "You feel trapped", say "The bird in the story feels trapped".
3. Provide warm, non-judgmental guidance.
4. Generate a follow-up question: a direct, thought-provoking question addressing the user (second person is okay here) that deepens their self-awareness. It will be put to them as a recorded-reflection prompt.

Output MUST be JSON matching the schema.
Respond in the same language as the user's story."#;

/// Prompt template for a round-1 answer.
/// Placeholders: `{question}`, `{answer}`.
const ROUND_ONE_PROMPT_TEMPLATE: &str = r#"The user has answered this reflective question: "{question}".
User's answer: "{answer}"

Please:
1. Analyze their emotional tone and content.
2. Provide brief, empathetic feedback.
3. Generate a deeper, second follow-up question ('nextQuestion') to explore their answer further.

Output must be JSON matching the schema.
For 'transcription', simply echo the user's answer.
Respond in the same language as the user's answer."#;

/// Prompt template for a round-2 answer.
/// Placeholders: `{question}`, `{answer}`, `{previous}`.
const ROUND_TWO_PROMPT_TEMPLATE: &str = r#"The user has answered the second reflective question: "{question}".
User's answer: "{answer}"
Previous context (answer 1): "{previous}"

Please:
1. Analyze their emotional tone.
2. Provide a 'finalClosing' statement that summarizes their journey and offers encouragement.

Output must be JSON matching the schema.
For 'transcription', simply echo the user's answer.
Respond in the same language as the user's answer."#;

/// Response schema for story readings, all four fields required.
fn story_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "interpretation": { "type": "STRING" },
            "guidance": { "type": "STRING" },
            "followUpQuestion": { "type": "STRING" }
        },
        "required": ["summary", "interpretation", "guidance", "followUpQuestion"]
    })
}

/// Response schema for answer readings.
///
/// `nextQuestion`/`finalClosing` stay optional at the wire level; which one is
/// required for the current round is enforced after parsing.
fn answer_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "transcription": { "type": "STRING" },
            "emotionalFeedback": { "type": "STRING" },
            "nextQuestion": { "type": "STRING" },
            "finalClosing": { "type": "STRING" }
        },
        "required": ["transcription", "emotionalFeedback"]
    })
}

fn story_prompt(draw: &DrawResult, story: &str) -> String {
    STORY_PROMPT_TEMPLATE
        .replace("{word}", draw.word.text)
        .replace("{story}", story)
}

fn answer_prompt(answer: &str, context: &RoundContext) -> String {
    match context.round {
        Round::One => ROUND_ONE_PROMPT_TEMPLATE
            .replace("{question}", &context.question)
            .replace("{answer}", answer),
        Round::Two => ROUND_TWO_PROMPT_TEMPLATE
            .replace("{question}", &context.question)
            .replace("{answer}", answer)
            .replace("{previous}", context.previous_answer.as_deref().unwrap_or("")),
    }
}

fn require(value: String, name: &'static str) -> Result<String, AnalysisError> {
    if value.trim().is_empty() {
        Err(AnalysisError::MissingField(name))
    } else {
        Ok(value)
    }
}

impl GeminiClient {
    /// Create a new Gemini client from an API key and config.
    pub fn new(api_key: String, config: &InterpreterConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client for GeminiClient")?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.clone(),
            client,
        })
    }

    /// Run one generateContent call and return the raw JSON text payload.
    async fn generate(
        &self,
        prompt: String,
        system_instruction: Option<&str>,
        response_schema: Value,
    ) -> Result<String, AnalysisError> {
        let request_body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema,
            },
            system_instruction: system_instruction.map(|text| Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }),
        };

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Service { status, message });
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            AnalysisError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
        })?;

        Self::extract_text(&body)
    }

    /// Extract the first non-empty text part from the response structure.
    fn extract_text(response: &GenerateContentResponse) -> Result<String, AnalysisError> {
        response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AnalysisError::InvalidResponse("Empty payload from Gemini".into()))
    }

    fn parse_story(text: &str) -> Result<StoryAnalysis, AnalysisError> {
        let payload: StoryPayload = serde_json::from_str(text).map_err(|e| {
            AnalysisError::InvalidResponse(format!("Story payload is not valid JSON: {}", e))
        })?;

        Ok(StoryAnalysis {
            summary: require(payload.summary, "summary")?,
            interpretation: require(payload.interpretation, "interpretation")?,
            guidance: require(payload.guidance, "guidance")?,
            follow_up_question: require(payload.follow_up_question, "followUpQuestion")?,
        })
    }

    fn parse_answer(text: &str, round: Round) -> Result<InterviewAnswer, AnalysisError> {
        let payload: AnswerPayload = serde_json::from_str(text).map_err(|e| {
            AnalysisError::InvalidResponse(format!("Answer payload is not valid JSON: {}", e))
        })?;

        // The wire schema leaves both per-round fields optional, but the flow
        // cannot proceed without the one belonging to the current round.
        let (next_question, final_closing) = match round {
            Round::One => {
                let next = payload
                    .next_question
                    .filter(|q| !q.trim().is_empty())
                    .ok_or(AnalysisError::MissingField("nextQuestion"))?;
                (Some(next), None)
            }
            Round::Two => {
                let closing = payload
                    .final_closing
                    .filter(|c| !c.trim().is_empty())
                    .ok_or(AnalysisError::MissingField("finalClosing"))?;
                (None, Some(closing))
            }
        };

        Ok(InterviewAnswer {
            transcription: payload.transcription,
            emotional_feedback: require(payload.emotional_feedback, "emotionalFeedback")?,
            next_question,
            final_closing,
        })
    }
}

#[async_trait]
impl Interpreter for GeminiClient {
    #[instrument(skip(self, draw, story), fields(word = draw.word.text, story_len = story.len()))]
    async fn interpret_story(
        &self,
        draw: &DrawResult,
        story: &str,
    ) -> Result<StoryAnalysis, AnalysisError> {
        let prompt = story_prompt(draw, story);
        let text = self
            .generate(prompt, Some(STORY_SYSTEM_INSTRUCTION), story_schema())
            .await?;
        let analysis = Self::parse_story(&text)?;
        info!(model = %self.model, "Story analysis completed");
        Ok(analysis)
    }

    #[instrument(skip(self, answer, context), fields(round = %context.round, answer_len = answer.len()))]
    async fn interpret_answer(
        &self,
        answer: &str,
        context: &RoundContext,
    ) -> Result<InterviewAnswer, AnalysisError> {
        let prompt = answer_prompt(answer, context);
        let text = self.generate(prompt, None, answer_schema()).await?;
        let mut parsed = Self::parse_answer(&text, context.round)?;
        // No speech-to-text happens here; the transcription is by contract the
        // literal text the user submitted.
        parsed.transcription = answer.to_string();
        info!(model = %self.model, round = %context.round, "Answer analysis completed");
        Ok(parsed)
    }
}

impl Drop for GeminiClient {
    fn drop(&mut self) {
        // Clear API key from memory
        self.api_key.zeroize();
    }
}
