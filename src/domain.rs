//! Domain models used by the backend: users, tutor transcripts, and quiz sessions.
//!
//! Everything here lives in process memory for the lifetime of a login; there
//! is no persistence layer. Quiz progression rules (index bounds, score at
//! most once per question) are enforced by `QuizSession` methods rather than
//! by whoever renders the UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a chat message. Wire values match the provider's roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  User,
  Model,
}

/// A signed-in user. Exists only as long as the session token does.
#[derive(Clone, Debug, Serialize)]
pub struct User {
  pub id: String,
  pub email: String,
  pub name: String,
  pub points: u32,
}

impl User {
  pub fn new(email: String, name: String) -> Self {
    Self { id: Uuid::new_v4().to_string(), email, name, points: 0 }
  }
}

/// One turn in a tutor conversation.
#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
  pub id: String,
  pub role: Role,
  pub text: String,
  pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
  pub fn new(role: Role, text: String) -> Self {
    Self { id: Uuid::new_v4().to_string(), role, text, timestamp: Utc::now() }
  }

  pub fn user(text: String) -> Self {
    Self::new(Role::User, text)
  }

  pub fn model(text: String) -> Self {
    Self::new(Role::Model, text)
  }
}

/// Tutor chat session: a document placeholder plus the ordered transcript.
/// The document is a file name only; its contents are never uploaded.
#[derive(Clone, Debug)]
pub struct TutorSession {
  pub document_name: Option<String>,
  pub messages: Vec<ChatMessage>,
}

impl TutorSession {
  /// Open a session. The greeting is always the first message.
  pub fn new(document_name: Option<String>, greeting: ChatMessage) -> Self {
    Self { document_name, messages: vec![greeting] }
  }

  pub fn push(&mut self, msg: ChatMessage) {
    self.messages.push(msg);
  }
}

/// One generated multiple-choice question. `correct_answer` holds the text
/// (not the index) of the correct option, matching the provider's schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizQuestion {
  pub question: String,
  pub options: Vec<String>,
  #[serde(rename = "correctAnswer")]
  pub correct_answer: String,
  pub explanation: String,
}

/// Why a quiz operation was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizError {
  NoActiveQuiz,
  OptionOutOfRange,
  AlreadyChecked,
  NotYetChecked,
  AlreadyFinished,
}

impl QuizError {
  pub fn message(&self) -> &'static str {
    match self {
      QuizError::NoActiveQuiz => "No active quiz. Generate one first.",
      QuizError::OptionOutOfRange => "That option does not exist for this question.",
      QuizError::AlreadyChecked => "This question has already been checked.",
      QuizError::NotYetChecked => "Check an answer before moving on.",
      QuizError::AlreadyFinished => "The quiz is already finished.",
    }
  }
}

/// Result of grading the current question.
#[derive(Clone, Debug, PartialEq)]
pub struct AnswerOutcome {
  pub correct: bool,
  pub correct_answer: String,
  pub explanation: String,
  pub score: u32,
}

/// Result of advancing past a checked question.
#[derive(Clone, Debug, PartialEq)]
pub enum AdvanceOutcome {
  Next { index: usize },
  Finished { score: u32, total: usize },
}

/// Progress through one generated quiz.
///
/// Invariants: `current` stays within `0..questions.len()`; `checked` gates
/// grading so a question can never add to `score` twice; once `finished` is
/// set no further transition is accepted.
#[derive(Clone, Debug)]
pub struct QuizSession {
  pub topic: String,
  pub questions: Vec<QuizQuestion>,
  pub current: usize,
  pub score: u32,
  pub selected: Option<usize>,
  pub checked: bool,
  pub finished: bool,
}

impl QuizSession {
  /// Build a session from generated questions. Empty question lists are not
  /// representable; the caller validates provider output before this point.
  pub fn new(topic: String, questions: Vec<QuizQuestion>) -> Option<Self> {
    if questions.is_empty() {
      return None;
    }
    Some(Self {
      topic,
      questions,
      current: 0,
      score: 0,
      selected: None,
      checked: false,
      finished: false,
    })
  }

  /// The question at `current`. Always in bounds (see struct invariants).
  pub fn current_question(&self) -> &QuizQuestion {
    &self.questions[self.current]
  }

  /// Record a selection and grade it. Scores at most once per question.
  pub fn answer(&mut self, option: usize) -> Result<AnswerOutcome, QuizError> {
    if self.finished {
      return Err(QuizError::AlreadyFinished);
    }
    if self.checked {
      return Err(QuizError::AlreadyChecked);
    }
    let q = self.current_question();
    if option >= q.options.len() {
      return Err(QuizError::OptionOutOfRange);
    }
    let correct = q.options[option] == q.correct_answer;
    let correct_answer = q.correct_answer.clone();
    let explanation = q.explanation.clone();
    self.selected = Some(option);
    self.checked = true;
    if correct {
      self.score += 1;
    }
    Ok(AnswerOutcome { correct, correct_answer, explanation, score: self.score })
  }

  /// Move to the next question, or finish after the last one.
  pub fn advance(&mut self) -> Result<AdvanceOutcome, QuizError> {
    if self.finished {
      return Err(QuizError::AlreadyFinished);
    }
    if !self.checked {
      return Err(QuizError::NotYetChecked);
    }
    if self.current + 1 < self.questions.len() {
      self.current += 1;
      self.selected = None;
      self.checked = false;
      Ok(AdvanceOutcome::Next { index: self.current })
    } else {
      self.finished = true;
      Ok(AdvanceOutcome::Finished { score: self.score, total: self.questions.len() })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn two_question_quiz() -> QuizSession {
    let questions = vec![
      QuizQuestion {
        question: "2 + 2 = ?".into(),
        options: vec!["3".into(), "4".into(), "5".into()],
        correct_answer: "4".into(),
        explanation: "Basic addition.".into(),
      },
      QuizQuestion {
        question: "Capital of France?".into(),
        options: vec!["Paris".into(), "Lyon".into()],
        correct_answer: "Paris".into(),
        explanation: "Paris has been the capital since 987.".into(),
      },
    ];
    QuizSession::new("warmup".into(), questions).expect("non-empty quiz")
  }

  #[test]
  fn empty_question_list_is_not_a_quiz() {
    assert!(QuizSession::new("void".into(), vec![]).is_none());
  }

  #[test]
  fn correct_answer_scores_exactly_once() {
    let mut quiz = two_question_quiz();
    let outcome = quiz.answer(1).expect("first grade");
    assert!(outcome.correct);
    assert_eq!(outcome.score, 1);
    assert_eq!(outcome.correct_answer, "4");
    // A second grade of the same question must be rejected, not rescored.
    assert_eq!(quiz.answer(1), Err(QuizError::AlreadyChecked));
    assert_eq!(quiz.score, 1);
  }

  #[test]
  fn wrong_answer_reveals_the_right_one_without_scoring() {
    let mut quiz = two_question_quiz();
    let outcome = quiz.answer(0).expect("grade");
    assert!(!outcome.correct);
    assert_eq!(outcome.correct_answer, "4");
    assert_eq!(outcome.explanation, "Basic addition.");
    assert_eq!(quiz.score, 0);
  }

  #[test]
  fn option_index_must_be_in_range() {
    let mut quiz = two_question_quiz();
    assert_eq!(quiz.answer(3), Err(QuizError::OptionOutOfRange));
    // A rejected selection leaves the question ungraded.
    assert!(!quiz.checked);
    assert!(quiz.answer(1).is_ok());
  }

  #[test]
  fn advance_requires_a_checked_answer() {
    let mut quiz = two_question_quiz();
    assert_eq!(quiz.advance(), Err(QuizError::NotYetChecked));
    quiz.answer(1).expect("grade");
    assert_eq!(quiz.advance(), Ok(AdvanceOutcome::Next { index: 1 }));
    assert!(!quiz.checked);
    assert_eq!(quiz.selected, None);
  }

  #[test]
  fn finishing_reports_score_and_refuses_further_moves() {
    let mut quiz = two_question_quiz();
    quiz.answer(1).expect("q1");
    quiz.advance().expect("to q2");
    quiz.answer(0).expect("q2");
    assert_eq!(quiz.advance(), Ok(AdvanceOutcome::Finished { score: 2, total: 2 }));
    assert!(quiz.finished);
    assert_eq!(quiz.answer(0), Err(QuizError::AlreadyFinished));
    assert_eq!(quiz.advance(), Err(QuizError::AlreadyFinished));
    // Index never left the question range on the way through.
    assert_eq!(quiz.current, 1);
  }

  #[test]
  fn tutor_session_keeps_greeting_first_and_appends_in_order() {
    let greeting = ChatMessage::model("I've analyzed \"notes.pdf\".".into());
    let mut session = TutorSession::new(Some("notes.pdf".into()), greeting);
    session.push(ChatMessage::user("What is osmosis?".into()));
    session.push(ChatMessage::model("Let's find out together.".into()));
    assert_eq!(session.messages.len(), 3);
    assert_eq!(session.messages[0].role, Role::Model);
    assert_eq!(session.messages[1].text, "What is osmosis?");
    assert_eq!(session.messages[2].role, Role::Model);
  }
}
