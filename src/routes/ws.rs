//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! The socket itself is unauthenticated; session-scoped messages carry their
//! token, so API errors become `{"type":"error"}` payloads instead of closes.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{quiz_out, tutor_out, ApiError, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "smartstudy_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "smartstudy_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target = "smartstudy_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "smartstudy_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "smartstudy_backend", "WebSocket disconnected");
}

fn err_msg(e: ApiError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.message().to_string() }
}

#[instrument(level = "info", skip(msg, state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Login { email, password } => {
      match do_login(state, &email, password.as_deref()).await {
        Ok((token, user)) => {
          tracing::info!(target: "study", user_id = %user.id, "WS login served");
          ServerWsMessage::LoggedIn { token, user }
        }
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::Logout { token } => {
      do_logout(state, &token).await;
      ServerWsMessage::LoggedOut
    }

    ClientWsMessage::Me { token } => match do_me(state, &token).await {
      Ok(user) => ServerWsMessage::Me { user },
      Err(e) => err_msg(e),
    },

    ClientWsMessage::TutorStart { token, document_name } => {
      match do_tutor_start(state, &token, document_name).await {
        Ok(session) => ServerWsMessage::TutorSession { session: tutor_out(&session) },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::TutorMessage { token, text } => {
      match do_tutor_message(state, &token, &text).await {
        Ok((message, user)) => ServerWsMessage::TutorReply { message, user },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::TutorReset { token } => match do_tutor_reset(state, &token).await {
      Ok(cleared) => ServerWsMessage::TutorReset { cleared },
      Err(e) => err_msg(e),
    },

    ClientWsMessage::QuizGenerate { token, topic } => {
      match do_quiz_generate(state, &token, &topic).await {
        Ok(quiz) => {
          tracing::info!(target: "study", topic = %quiz.topic, questions = quiz.questions.len(), "WS quiz served");
          ServerWsMessage::Quiz { quiz: quiz_out(&quiz) }
        }
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::QuizAnswer { token, option } => {
      match do_quiz_answer(state, &token, option).await {
        Ok(o) => ServerWsMessage::QuizAnswer {
          correct: o.correct,
          correct_answer: o.correct_answer,
          explanation: o.explanation,
          score: o.score,
        },
        Err(e) => err_msg(e),
      }
    }

    ClientWsMessage::QuizNext { token } => match do_quiz_next(state, &token).await {
      Ok(QuizProgress::Next(quiz)) => ServerWsMessage::QuizNext { quiz: quiz_out(&quiz) },
      Ok(QuizProgress::Finished { score, total, user }) => {
        tracing::info!(target: "study", score, total, "WS quiz finished");
        ServerWsMessage::QuizFinished { score, total, user }
      }
      Err(e) => err_msg(e),
    },

    ClientWsMessage::Solve { token, question } => match do_solve(state, &token, &question).await {
      Ok(solution) => ServerWsMessage::Solution { solution },
      Err(e) => err_msg(e),
    },

    ClientWsMessage::VideoGenerate { token, topic } => match do_video(state, &token, &topic).await {
      Ok(url) => ServerWsMessage::Video { url },
      Err(e) => err_msg(e),
    },
  }
}
