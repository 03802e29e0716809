//! Minimal Gemini client for our use-cases.
//!
//! We only call three provider surfaces: generateContent for plain text
//! (tutor replies, assignment solutions), generateContent with a response
//! schema for strict-JSON quizzes, and predictLongRunning plus operation
//! polling for videos. Calls are instrumented and log model names, latencies,
//! and usage counts (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{ChatMessage, QuizQuestion, Role};
use crate::util::{fill_template, trunc_for_log};

/// Shown instead of an empty model reply so the chat never goes silent.
const EMPTY_TUTOR_REPLY: &str = "I'm having trouble thinking of a response right now. Try again?";
const EMPTY_SOLUTION: &str = "Could not generate a solution.";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub video_model: String,
  pub poll_interval: Duration,
  pub poll_limit: u32,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok()?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let fast_model =
      std::env::var("GEMINI_FAST_MODEL").unwrap_or_else(|_| "gemini-3-flash-preview".into());
    let strong_model =
      std::env::var("GEMINI_STRONG_MODEL").unwrap_or_else(|_| "gemini-3-pro-preview".into());
    let video_model =
      std::env::var("GEMINI_VIDEO_MODEL").unwrap_or_else(|_| "veo-3.1-fast-generate-preview".into());
    let poll_interval = std::env::var("VIDEO_POLL_SECS")
      .ok()
      .and_then(|v| v.parse::<u64>().ok())
      .map(Duration::from_secs)
      .unwrap_or_else(|| Duration::from_secs(5));
    let poll_limit = std::env::var("VIDEO_POLL_LIMIT")
      .ok()
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(120);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;

    Some(Self {
      client,
      api_key,
      base_url,
      fast_model,
      strong_model,
      video_model,
      poll_interval,
      poll_limit,
    })
  }

  /// Plain-text generation. Used for tutor replies and assignment solutions.
  #[instrument(level = "info", skip(self, system, contents), fields(model = %model, turns = contents.len()))]
  async fn generate_plain(
    &self,
    model: &str,
    system: Option<&str>,
    contents: Vec<Content>,
  ) -> Result<String, String> {
    let req = GenerateContentRequest {
      contents,
      system_instruction: system.map(Content::system),
      generation_config: None,
    };
    self.generate(model, &req).await
  }

  /// Schema-constrained JSON generation. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, contents, schema), fields(model = %model))]
  async fn generate_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: Option<&str>,
    contents: Vec<Content>,
    schema: Schema,
  ) -> Result<T, String> {
    let req = GenerateContentRequest {
      contents,
      system_instruction: system.map(Content::system),
      generation_config: Some(GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: schema,
      }),
    };
    let text = self.generate(model, &req).await?;
    serde_json::from_str::<T>(&text).map_err(|e| {
      error!(raw = %trunc_for_log(&text, 200), "Gemini returned unparseable JSON");
      format!("JSON parse error: {}", e)
    })
  }

  /// POST :generateContent and extract the first candidate's text.
  async fn generate(&self, model: &str, req: &GenerateContentRequest) -> Result<String, String> {
    let url = format!("{}/models/{}:generateContent", self.base_url, model);
    let res = self.client.post(&url)
      .header(USER_AGENT, "smartstudy-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or_else(|| body);
      return Err(format!("Gemini HTTP {}: {}", status, msg));
    }

    let body: GenerateContentResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, response_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    let text = body.candidates.first()
      .and_then(|c| c.content.as_ref())
      .and_then(|c| c.parts.first())
      .map(|p| p.text.clone())
      .unwrap_or_default()
      .trim()
      .to_string();

    Ok(text)
  }

  // --- High-level helpers (domain-specialized) ---

  /// Tutor reply: prior transcript plus the new user message, with the tutor
  /// system instruction (document context appended when a document is set).
  #[instrument(
    level = "info",
    skip(self, prompts, history, message, document_name),
    fields(model = %self.fast_model, turns = history.len(), msg_len = message.len(), has_document = document_name.is_some())
  )]
  pub async fn tutor_reply(
    &self,
    prompts: &Prompts,
    history: &[ChatMessage],
    message: &str,
    document_name: Option<&str>,
  ) -> Result<String, String> {
    let mut system = prompts.tutor_system.clone();
    if let Some(doc) = document_name {
      system.push('\n');
      system.push_str(&fill_template(&prompts.tutor_context_template, &[("document", doc)]));
    }

    let mut contents = to_contents(history);
    contents.push(Content::user(message));

    let text = self.generate_plain(&self.fast_model, Some(&system), contents).await?;
    if text.is_empty() {
      return Ok(EMPTY_TUTOR_REPLY.into());
    }
    Ok(text)
  }

  /// Generate a five-question multiple-choice quiz as strict JSON.
  /// The result is validated structurally before it reaches a session.
  #[instrument(level = "info", skip(self, prompts, topic), fields(model = %self.fast_model, topic_len = topic.len()))]
  pub async fn generate_quiz(
    &self,
    prompts: &Prompts,
    topic: &str,
  ) -> Result<Vec<QuizQuestion>, String> {
    let user = fill_template(&prompts.quiz_user_template, &[("topic", topic)]);
    let start = std::time::Instant::now();
    let result = self
      .generate_json::<Vec<QuizQuestion>>(
        &self.fast_model,
        None,
        vec![Content::user(&user)],
        quiz_schema(),
      )
      .await;
    let elapsed = start.elapsed();

    let questions = match result {
      Ok(qs) => qs,
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during quiz generation");
        return Err(format!("Quiz generation failed: {e}"));
      }
    };

    if questions.is_empty() {
      return Err("Model returned an empty quiz".into());
    }
    for q in &questions {
      if q.question.trim().is_empty() || q.options.len() < 2 {
        return Err("Model returned a malformed quiz question".into());
      }
      if !q.options.iter().any(|o| o == &q.correct_answer) {
        return Err("Model returned a question whose correct answer is not among its options".into());
      }
    }

    info!(?elapsed, question_count = questions.len(), "Quiz successfully generated");
    Ok(questions)
  }

  /// Step-by-step solution on the strong model.
  #[instrument(level = "info", skip(self, prompts, question), fields(model = %self.strong_model, question_len = question.len()))]
  pub async fn solve_assignment(&self, prompts: &Prompts, question: &str) -> Result<String, String> {
    let text = self
      .generate_plain(&self.strong_model, Some(&prompts.solver_system), vec![Content::user(question)])
      .await?;
    if text.is_empty() {
      return Ok(EMPTY_SOLUTION.into());
    }
    Ok(text)
  }

  /// Kick off a video job and poll it at a fixed interval until done.
  /// Returns a download URL: the provider URI with the API key appended,
  /// which is what the provider requires for fetching the file.
  #[instrument(level = "info", skip(self, prompts, topic), fields(model = %self.video_model, topic_len = topic.len()))]
  pub async fn generate_video(&self, prompts: &Prompts, topic: &str) -> Result<String, String> {
    let prompt = fill_template(&prompts.video_prompt_template, &[("topic", topic)]);
    let url = format!("{}/models/{}:predictLongRunning", self.base_url, self.video_model);
    let req = PredictLongRunningRequest {
      instances: vec![VideoInstance { prompt }],
      parameters: VideoParameters {
        aspect_ratio: "16:9".into(),
        resolution: "720p".into(),
        sample_count: 1,
      },
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "smartstudy-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or_else(|| body);
      return Err(format!("Gemini HTTP {}: {}", status, msg));
    }

    let mut op: VideoOperation = res.json().await.map_err(|e| e.to_string())?;
    info!(operation = %op.name, "Video job created");

    // The job runs for minutes; re-read the operation at a fixed interval.
    let mut polls = 0u32;
    while !op.done {
      if polls >= self.poll_limit {
        error!(operation = %op.name, polls, "Video job still pending after poll budget");
        return Err(format!("Video generation did not finish after {} polls", polls));
      }
      tokio::time::sleep(self.poll_interval).await;
      polls += 1;
      op = self.get_video_operation(&op.name).await?;
    }

    if let Some(err) = op.error {
      return Err(format!("Video job failed: {}", err.message));
    }

    let uri = op
      .response
      .and_then(VideoOperationResponse::first_video_uri)
      .ok_or_else(|| "Video job finished without a video".to_string())?;

    info!(elapsed = ?start.elapsed(), polls, "Video successfully generated");

    // Provider download links require the key as a query parameter.
    let sep = if uri.contains('?') { '&' } else { '?' };
    Ok(format!("{uri}{sep}key={}", self.api_key))
  }

  /// GET one long-running operation by its fully-qualified name.
  async fn get_video_operation(&self, name: &str) -> Result<VideoOperation, String> {
    let url = format!("{}/{}", self.base_url, name);
    let res = self.client.get(&url)
      .header(USER_AGENT, "smartstudy-backend/0.1")
      .header("x-goog-api-key", &self.api_key)
      .send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or_else(|| body);
      return Err(format!("Gemini HTTP {}: {}", status, msg));
    }

    res.json::<VideoOperation>().await.map_err(|e| e.to_string())
  }
}

/// Convert a tutor transcript into the provider's contents array.
fn to_contents(history: &[ChatMessage]) -> Vec<Content> {
  history
    .iter()
    .map(|m| Content {
      role: Some(
        match m.role {
          Role::User => "user",
          Role::Model => "model",
        }
        .to_string(),
      ),
      parts: vec![Part { text: m.text.clone() }],
    })
    .collect()
}

// --- generateContent DTOs ---

#[derive(Serialize)]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
  generation_config: Option<GenerationConfig>,
}

#[derive(Clone, Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  parts: Vec<Part>,
}

impl Content {
  fn user(text: &str) -> Self {
    Self { role: Some("user".into()), parts: vec![Part { text: text.into() }] }
  }

  // System instructions carry no role.
  fn system(text: &str) -> Self {
    Self { role: None, parts: vec![Part { text: text.into() }] }
  }
}

#[derive(Clone, Serialize, Deserialize)]
struct Part {
  text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
  #[serde(rename = "responseMimeType")]
  response_mime_type: String,
  #[serde(rename = "responseSchema")]
  response_schema: Schema,
}

/// Subset of the provider's schema language, enough for the quiz shape.
#[derive(Clone, Serialize)]
struct Schema {
  #[serde(rename = "type")]
  kind: SchemaType,
  #[serde(skip_serializing_if = "Option::is_none")]
  items: Option<Box<Schema>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  properties: Option<BTreeMap<String, Schema>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  required: Option<Vec<String>>,
  #[serde(rename = "propertyOrdering", skip_serializing_if = "Option::is_none")]
  property_ordering: Option<Vec<String>>,
}

#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum SchemaType {
  String,
  Array,
  Object,
}

impl Schema {
  fn string() -> Self {
    Self { kind: SchemaType::String, items: None, properties: None, required: None, property_ordering: None }
  }

  fn array(items: Schema) -> Self {
    Self {
      kind: SchemaType::Array,
      items: Some(Box::new(items)),
      properties: None,
      required: None,
      property_ordering: None,
    }
  }
}

/// Response schema for quiz generation: an array of question objects with
/// the exact field names `QuizQuestion` deserializes.
fn quiz_schema() -> Schema {
  let fields = ["question", "options", "correctAnswer", "explanation"];
  let mut properties = BTreeMap::new();
  properties.insert("question".to_string(), Schema::string());
  properties.insert("options".to_string(), Schema::array(Schema::string()));
  properties.insert("correctAnswer".to_string(), Schema::string());
  properties.insert("explanation".to_string(), Schema::string());

  Schema::array(Schema {
    kind: SchemaType::Object,
    items: None,
    properties: Some(properties),
    required: Some(fields.iter().map(|s| s.to_string()).collect()),
    property_ordering: Some(fields.iter().map(|s| s.to_string()).collect()),
  })
}

#[derive(Deserialize)]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default, rename = "usageMetadata")]
  usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Deserialize)]
struct UsageMetadata {
  #[serde(default, rename = "promptTokenCount")]
  prompt_token_count: Option<u32>,
  #[serde(default, rename = "candidatesTokenCount")]
  candidates_token_count: Option<u32>,
  #[serde(default, rename = "totalTokenCount")]
  total_token_count: Option<u32>,
}

// --- Video job DTOs ---

#[derive(Serialize)]
struct PredictLongRunningRequest {
  instances: Vec<VideoInstance>,
  parameters: VideoParameters,
}

#[derive(Serialize)]
struct VideoInstance {
  prompt: String,
}

#[derive(Serialize)]
struct VideoParameters {
  #[serde(rename = "aspectRatio")]
  aspect_ratio: String,
  resolution: String,
  #[serde(rename = "sampleCount")]
  sample_count: u32,
}

/// Long-running operation envelope returned by job creation and polling.
#[derive(Deserialize)]
struct VideoOperation {
  name: String,
  #[serde(default)]
  done: bool,
  #[serde(default)]
  error: Option<OperationError>,
  #[serde(default)]
  response: Option<VideoOperationResponse>,
}

#[derive(Deserialize)]
struct OperationError {
  #[serde(default)]
  message: String,
}

#[derive(Deserialize)]
struct VideoOperationResponse {
  #[serde(default, rename = "generateVideoResponse")]
  generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize)]
struct GenerateVideoResponse {
  // Older operation payloads used "generatedVideos" for the same list.
  #[serde(default, rename = "generatedSamples", alias = "generatedVideos")]
  generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize)]
struct GeneratedSample {
  #[serde(default)]
  video: Option<VideoRef>,
}

#[derive(Deserialize)]
struct VideoRef {
  #[serde(default)]
  uri: String,
}

impl VideoOperationResponse {
  fn first_video_uri(self) -> Option<String> {
    self
      .generate_video_response?
      .generated_samples
      .into_iter()
      .find_map(|s| s.video)
      .map(|v| v.uri)
      .filter(|u| !u.is_empty())
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::Server;
  use serde_json::json;

  fn test_client(base_url: &str) -> Gemini {
    Gemini {
      client: reqwest::Client::new(),
      api_key: "test-key".into(),
      base_url: base_url.to_string(),
      fast_model: "gemini-3-flash-preview".into(),
      strong_model: "gemini-3-pro-preview".into(),
      video_model: "veo-3.1-fast-generate-preview".into(),
      poll_interval: Duration::from_millis(1),
      poll_limit: 3,
    }
  }

  fn chat_body(text: &str) -> String {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }] })
      .to_string()
  }

  #[test]
  fn quiz_schema_serializes_with_provider_field_names() {
    let v = serde_json::to_value(quiz_schema()).expect("schema json");
    assert_eq!(v["type"], "ARRAY");
    assert_eq!(v["items"]["type"], "OBJECT");
    assert_eq!(v["items"]["properties"]["options"]["type"], "ARRAY");
    assert_eq!(v["items"]["properties"]["options"]["items"]["type"], "STRING");
    assert_eq!(
      v["items"]["propertyOrdering"],
      json!(["question", "options", "correctAnswer", "explanation"])
    );
    assert_eq!(
      v["items"]["required"],
      json!(["question", "options", "correctAnswer", "explanation"])
    );
  }

  #[test]
  fn request_omits_empty_optional_sections() {
    let req = GenerateContentRequest {
      contents: vec![Content::user("hi")],
      system_instruction: None,
      generation_config: None,
    };
    let v = serde_json::to_value(&req).expect("request json");
    assert!(v.get("systemInstruction").is_none());
    assert!(v.get("generationConfig").is_none());
    assert_eq!(v["contents"][0]["role"], "user");
    assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
  }

  #[test]
  fn system_instruction_carries_no_role() {
    let req = GenerateContentRequest {
      contents: vec![Content::user("hi")],
      system_instruction: Some(Content::system("be kind")),
      generation_config: None,
    };
    let v = serde_json::to_value(&req).expect("request json");
    assert!(v["systemInstruction"].get("role").is_none());
    assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be kind");
  }

  #[test]
  fn transcript_roles_map_to_provider_roles() {
    let history = vec![
      ChatMessage::model("welcome".into()),
      ChatMessage::user("question".into()),
    ];
    let contents = to_contents(&history);
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0].role.as_deref(), Some("model"));
    assert_eq!(contents[1].role.as_deref(), Some("user"));
  }

  #[test]
  fn candidate_text_parses_from_response_body() {
    let body = json!({
      "candidates": [
        { "content": { "parts": [{ "text": "The mitochondria." }], "role": "model" } }
      ],
      "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 5, "totalTokenCount": 17 }
    });
    let parsed: GenerateContentResponse = serde_json::from_value(body).expect("parse");
    let text = parsed.candidates.first()
      .and_then(|c| c.content.as_ref())
      .and_then(|c| c.parts.first())
      .map(|p| p.text.clone());
    assert_eq!(text.as_deref(), Some("The mitochondria."));
    assert_eq!(parsed.usage_metadata.and_then(|u| u.total_token_count), Some(17));
  }

  #[test]
  fn pending_and_finished_operations_parse() {
    let pending: VideoOperation = serde_json::from_value(json!({
      "name": "models/veo-3.1-fast-generate-preview/operations/abc123"
    }))
    .expect("pending");
    assert!(!pending.done);
    assert!(pending.response.is_none());

    let finished: VideoOperation = serde_json::from_value(json!({
      "name": "models/veo-3.1-fast-generate-preview/operations/abc123",
      "done": true,
      "response": {
        "generateVideoResponse": {
          "generatedSamples": [
            { "video": { "uri": "https://files.example/v1/files/xyz:download?alt=media" } }
          ]
        }
      }
    }))
    .expect("finished");
    assert!(finished.done);
    let uri = finished.response.and_then(VideoOperationResponse::first_video_uri);
    assert_eq!(uri.as_deref(), Some("https://files.example/v1/files/xyz:download?alt=media"));
  }

  #[test]
  fn older_generated_videos_key_is_accepted() {
    let resp: VideoOperationResponse = serde_json::from_value(json!({
      "generateVideoResponse": {
        "generatedVideos": [ { "video": { "uri": "https://files.example/clip" } } ]
      }
    }))
    .expect("parse");
    assert_eq!(resp.first_video_uri().as_deref(), Some("https://files.example/clip"));
  }

  #[test]
  fn provider_error_bodies_reduce_to_their_message() {
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_gemini_error(body).as_deref(), Some("API key not valid."));
    assert_eq!(extract_gemini_error("not json"), None);
  }

  #[tokio::test]
  async fn tutor_reply_round_trips_through_the_chat_endpoint() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/models/gemini-3-flash-preview:generateContent")
      .match_header("x-goog-api-key", "test-key")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(chat_body("Osmosis is the movement of water."))
      .create_async()
      .await;

    let g = test_client(&server.url());
    let history = vec![ChatMessage::model("Hi!".into())];
    let reply = g
      .tutor_reply(&Prompts::default(), &history, "What is osmosis?", Some("Bio.pdf"))
      .await
      .expect("reply");
    assert_eq!(reply, "Osmosis is the movement of water.");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn provider_http_errors_carry_status_and_message() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/models/gemini-3-pro-preview:generateContent")
      .with_status(403)
      .with_header("content-type", "application/json")
      .with_body(r#"{"error":{"code":403,"message":"API key not valid.","status":"PERMISSION_DENIED"}}"#)
      .create_async()
      .await;

    let g = test_client(&server.url());
    let err = g
      .solve_assignment(&Prompts::default(), "Prove it")
      .await
      .err()
      .expect("should fail");
    assert!(err.contains("Gemini HTTP 403"));
    assert!(err.contains("API key not valid."));
  }

  #[tokio::test]
  async fn quiz_whose_answer_is_missing_from_its_options_is_rejected() {
    let mut server = Server::new_async().await;
    let quiz_json = json!([
      { "question": "Q", "options": ["a", "b"], "correctAnswer": "z", "explanation": "e" }
    ])
    .to_string();
    let _mock = server
      .mock("POST", "/models/gemini-3-flash-preview:generateContent")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(chat_body(&quiz_json))
      .create_async()
      .await;

    let g = test_client(&server.url());
    let err = g
      .generate_quiz(&Prompts::default(), "Cells")
      .await
      .err()
      .expect("should fail");
    assert!(err.contains("correct answer is not among its options"));
  }

  #[tokio::test]
  async fn video_job_polls_until_done_and_appends_the_key() {
    let mut server = Server::new_async().await;
    let op_name = "models/veo-3.1-fast-generate-preview/operations/op1";
    let _create = server
      .mock("POST", "/models/veo-3.1-fast-generate-preview:predictLongRunning")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(json!({ "name": op_name, "done": false }).to_string())
      .create_async()
      .await;
    let _poll = server
      .mock("GET", format!("/{op_name}").as_str())
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        json!({
          "name": op_name,
          "done": true,
          "response": {
            "generateVideoResponse": {
              "generatedSamples": [
                { "video": { "uri": "https://files.example/clip?alt=media" } }
              ]
            }
          }
        })
        .to_string(),
      )
      .create_async()
      .await;

    let g = test_client(&server.url());
    let url = g.generate_video(&Prompts::default(), "Gravity").await.expect("video");
    assert_eq!(url, "https://files.example/clip?alt=media&key=test-key");
  }

  #[tokio::test]
  async fn a_job_that_never_finishes_exhausts_the_poll_budget() {
    let mut server = Server::new_async().await;
    let op_name = "models/veo-3.1-fast-generate-preview/operations/op2";
    let _create = server
      .mock("POST", "/models/veo-3.1-fast-generate-preview:predictLongRunning")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(json!({ "name": op_name, "done": false }).to_string())
      .create_async()
      .await;
    let _poll = server
      .mock("GET", format!("/{op_name}").as_str())
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(json!({ "name": op_name, "done": false }).to_string())
      .expect_at_least(3)
      .create_async()
      .await;

    let g = test_client(&server.url());
    let err = g.generate_video(&Prompts::default(), "Gravity").await.err().expect("should fail");
    assert!(err.contains("did not finish"));
  }
}
