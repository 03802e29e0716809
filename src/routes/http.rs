//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs include parameters and basic result info.
//!
//! Session-scoped endpoints read the token from `Authorization: Bearer <token>`.

use std::sync::Arc;
use axum::{extract::State, http::{header, HeaderMap}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::protocol::*;
use crate::state::AppState;
use crate::logic::*;

/// Pull the session token out of the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".into()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LoginIn>,
) -> Result<Json<LoginOut>, ApiError> {
  let (token, user) = do_login(&state, &body.email, body.password.as_deref()).await?;
  info!(target: "study", user_id = %user.id, "HTTP login served");
  Ok(Json(LoginOut { token, user }))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_post_logout(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<LogoutOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let removed = do_logout(&state, token).await;
  info!(target: "study", removed, "HTTP logout served");
  Ok(Json(LogoutOut { ok: true }))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_me(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<MeOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let user = do_me(&state, token).await?;
  Ok(Json(MeOut { user }))
}

#[instrument(level = "info", skip(state, headers, body), fields(has_document = body.document_name.is_some()))]
pub async fn http_post_tutor_session(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<TutorStartIn>,
) -> Result<Json<TutorSessionOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let session = do_tutor_start(&state, token, body.document_name).await?;
  Ok(Json(tutor_out(&session)))
}

#[instrument(level = "info", skip(state, headers, body), fields(msg_len = body.text.len()))]
pub async fn http_post_tutor_message(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<TutorMessageIn>,
) -> Result<Json<TutorReplyOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let (message, user) = do_tutor_message(&state, token, &body.text).await?;
  info!(target: "study", reply_len = message.text.len(), "HTTP tutor reply served");
  Ok(Json(TutorReplyOut { message, user }))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_post_tutor_reset(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<TutorResetOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let cleared = do_tutor_reset(&state, token).await?;
  Ok(Json(TutorResetOut { cleared }))
}

#[instrument(level = "info", skip(state, headers, body), fields(topic_len = body.topic.len()))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<QuizIn>,
) -> Result<Json<QuizStateOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let quiz = do_quiz_generate(&state, token, &body.topic).await?;
  info!(target: "study", topic = %quiz.topic, questions = quiz.questions.len(), "HTTP quiz served");
  Ok(Json(quiz_out(&quiz)))
}

#[instrument(level = "info", skip(state, headers, body), fields(option = body.option))]
pub async fn http_post_quiz_answer(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<QuizAnswerIn>,
) -> Result<Json<QuizAnswerOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let outcome = do_quiz_answer(&state, token, body.option).await?;
  Ok(Json(QuizAnswerOut {
    correct: outcome.correct,
    correct_answer: outcome.correct_answer,
    explanation: outcome.explanation,
    score: outcome.score,
  }))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_post_quiz_next(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<QuizNextOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let out = match do_quiz_next(&state, token).await? {
    QuizProgress::Next(quiz) => QuizNextOut {
      finished: false,
      quiz: Some(quiz_out(&quiz)),
      score: None,
      total: None,
      user: None,
    },
    QuizProgress::Finished { score, total, user } => {
      info!(target: "study", score, total, "HTTP quiz finished");
      QuizNextOut {
        finished: true,
        quiz: None,
        score: Some(score),
        total: Some(total),
        user: Some(user),
      }
    }
  };
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, headers, body), fields(question_len = body.question.len()))]
pub async fn http_post_solver(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<SolveIn>,
) -> Result<Json<SolveOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let solution = do_solve(&state, token, &body.question).await?;
  Ok(Json(SolveOut { solution }))
}

#[instrument(level = "info", skip(state, headers, body), fields(topic_len = body.topic.len()))]
pub async fn http_post_video(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<VideoIn>,
) -> Result<Json<VideoOut>, ApiError> {
  let token = bearer_token(&headers)?;
  let url = do_video(&state, token, &body.topic).await?;
  info!(target: "study", "HTTP video served");
  Ok(Json(VideoOut { url }))
}
