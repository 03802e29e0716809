//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, QuizError, QuizSession, TutorSession, User};

/// Messages the client can send over WebSocket. Session-scoped messages
/// carry the token explicitly so one socket can serve any login.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Login {
        email: String,
        // Accepted and ignored; authentication is simulated.
        #[serde(default)]
        password: Option<String>,
    },
    Logout {
        token: String,
    },
    Me {
        token: String,
    },
    TutorStart {
        token: String,
        #[serde(rename = "documentName")]
        document_name: Option<String>,
    },
    TutorMessage {
        token: String,
        text: String,
    },
    TutorReset {
        token: String,
    },
    QuizGenerate {
        token: String,
        topic: String,
    },
    QuizAnswer {
        token: String,
        option: usize,
    },
    QuizNext {
        token: String,
    },
    Solve {
        token: String,
        question: String,
    },
    VideoGenerate {
        token: String,
        topic: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    LoggedIn {
        token: String,
        user: User,
    },
    LoggedOut,
    Me {
        user: User,
    },
    TutorSession {
        session: TutorSessionOut,
    },
    TutorReply {
        message: ChatMessage,
        user: User,
    },
    TutorReset {
        cleared: bool,
    },
    Quiz {
        quiz: QuizStateOut,
    },
    QuizAnswer {
        correct: bool,
        #[serde(rename = "correctAnswer")]
        correct_answer: String,
        explanation: String,
        score: u32,
    },
    QuizNext {
        quiz: QuizStateOut,
    },
    QuizFinished {
        score: u32,
        total: usize,
        user: User,
    },
    Solution {
        solution: String,
    },
    Video {
        url: String,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for tutor session delivery.
#[derive(Debug, Serialize)]
pub struct TutorSessionOut {
    #[serde(rename = "documentName")]
    pub document_name: Option<String>,
    pub messages: Vec<ChatMessage>,
}

/// Convert the internal session to the public DTO.
pub fn tutor_out(s: &TutorSession) -> TutorSessionOut {
    TutorSessionOut {
        document_name: s.document_name.clone(),
        messages: s.messages.clone(),
    }
}

/// One question as the client sees it while answering.
#[derive(Debug, Serialize)]
pub struct QuizQuestionOut {
    pub question: String,
    pub options: Vec<String>,
}

/// DTO used by both WS and HTTP for quiz delivery. Never carries the
/// correct answer or the explanation; those travel back only after grading.
#[derive(Debug, Serialize)]
pub struct QuizStateOut {
    pub topic: String,
    pub index: usize,
    pub total: usize,
    pub question: QuizQuestionOut,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
    pub checked: bool,
    pub finished: bool,
}

/// Convert internal quiz progress to the public DTO.
pub fn quiz_out(q: &QuizSession) -> QuizStateOut {
    let question = q.current_question();
    QuizStateOut {
        topic: q.topic.clone(),
        index: q.current,
        total: q.questions.len(),
        question: QuizQuestionOut {
            question: question.question.clone(),
            options: question.options.clone(),
        },
        score: q.score,
        selected: q.selected,
        checked: q.checked,
        finished: q.finished,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Deserialize)]
pub struct LoginIn {
    pub email: String,
    // Accepted and ignored; authentication is simulated.
    #[serde(default)]
    pub password: Option<String>,
}
#[derive(Serialize)]
pub struct LoginOut {
    pub token: String,
    pub user: User,
}

#[derive(Serialize)]
pub struct LogoutOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct MeOut {
    pub user: User,
}

#[derive(Deserialize)]
pub struct TutorStartIn {
    #[serde(rename = "documentName")]
    pub document_name: Option<String>,
}

#[derive(Deserialize)]
pub struct TutorMessageIn {
    pub text: String,
}

#[derive(Serialize)]
pub struct TutorReplyOut {
    pub message: ChatMessage,
    pub user: User,
}

#[derive(Serialize)]
pub struct TutorResetOut {
    pub cleared: bool,
}

#[derive(Deserialize)]
pub struct QuizIn {
    pub topic: String,
}

#[derive(Deserialize)]
pub struct QuizAnswerIn {
    pub option: usize,
}

#[derive(Serialize)]
pub struct QuizAnswerOut {
    pub correct: bool,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    pub explanation: String,
    pub score: u32,
}

/// Either the next question or the final result, depending on `finished`.
#[derive(Serialize)]
pub struct QuizNextOut {
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizStateOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Deserialize)]
pub struct SolveIn {
    pub question: String,
}

#[derive(Serialize)]
pub struct SolveOut {
    pub solution: String,
}

#[derive(Deserialize)]
pub struct VideoIn {
    pub topic: String,
}

#[derive(Serialize)]
pub struct VideoOut {
    pub url: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Error response body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error type shared by the HTTP handlers; the WebSocket loop folds it
/// into a `ServerWsMessage::Error` instead.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Upstream(String),
}

impl ApiError {
    pub fn unknown_token() -> Self {
        Self::Unauthorized("Unknown session token".into())
    }

    /// The user-facing text, for surfaces that cannot carry a status code.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::Unauthorized(m) | Self::NotFound(m) | Self::Upstream(m) => m,
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(e: QuizError) -> Self {
        match e {
            QuizError::NoActiveQuiz => Self::NotFound(e.message().into()),
            _ => Self::BadRequest(e.message().into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
        };
        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuizQuestion;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"tutor_start","token":"t1","documentName":"Biology Ch4.pdf"}"#,
        )
        .expect("parse");
        match msg {
            ClientWsMessage::TutorStart { token, document_name } => {
                assert_eq!(token, "t1");
                assert_eq!(document_name.as_deref(), Some("Biology Ch4.pdf"));
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"quiz_answer","token":"t1","option":2}"#).expect("parse");
        assert!(matches!(msg, ClientWsMessage::QuizAnswer { option: 2, .. }));
    }

    #[test]
    fn quiz_out_never_leaks_the_answer() {
        let quiz = QuizSession::new(
            "Photosynthesis".into(),
            vec![QuizQuestion {
                question: "What do plants absorb?".into(),
                options: vec!["CO2".into(), "Gold".into()],
                correct_answer: "CO2".into(),
                explanation: "Plants fix carbon dioxide.".into(),
            }],
        )
        .expect("quiz");

        let v = serde_json::to_value(quiz_out(&quiz)).expect("json");
        assert_eq!(v["question"]["question"], "What do plants absorb?");
        assert!(v["question"].get("correctAnswer").is_none());
        assert!(v["question"].get("explanation").is_none());
        assert_eq!(v["total"], 1);
        assert_eq!(v["checked"], false);
        // No selection yet, so the key is omitted entirely.
        assert!(v.get("selected").is_none());
    }

    #[test]
    fn server_messages_carry_snake_case_type_tags() {
        let json = serde_json::to_string(&ServerWsMessage::QuizFinished {
            score: 4,
            total: 5,
            user: User::new("sam@school.edu".into(), "sam".into()),
        })
        .expect("json");
        assert!(json.contains(r#""type":"quiz_finished""#));
        assert!(json.contains(r#""score":4"#));
    }
}
