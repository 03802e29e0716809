//! Application state: in-memory session store, prompts, and the Gemini client.
//!
//! This module owns:
//!   - the account store (session token -> signed-in student)
//!   - each student's tutor and quiz sessions
//!   - the prompts struct (from TOML or defaults)
//!   - optional Gemini client
//!
//! Everything lives behind one RwLock'd map; a server restart clears it.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{load_study_config_from_env, Prompts};
use crate::domain::{
    AdvanceOutcome, AnswerOutcome, ChatMessage, QuizError, QuizSession, TutorSession, User,
};
use crate::gemini::Gemini;

/// One signed-in student: profile plus per-tool sessions.
#[derive(Clone, Debug)]
pub struct Account {
    pub user: User,
    pub tutor: Option<TutorSession>,
    pub quiz: Option<QuizSession>,
}

impl Account {
    pub fn new(user: User) -> Self {
        Self { user, tutor: None, quiz: None }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<RwLock<HashMap<String, Account>>>,
    pub gemini: Option<Gemini>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load prompt config and init the Gemini client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg_opt = load_study_config_from_env();
        let prompts = cfg_opt.map(|c| c.prompts).unwrap_or_default();

        let gemini = Gemini::from_env();
        if let Some(g) = &gemini {
            info!(target: "smartstudy_backend", base_url = %g.base_url, fast_model = %g.fast_model, strong_model = %g.strong_model, video_model = %g.video_model, "Gemini enabled.");
        } else {
            warn!(target: "smartstudy_backend", "Gemini disabled (no GEMINI_API_KEY). AI tools will report the missing key.");
        }

        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            gemini,
            prompts,
        }
    }

    /// Insert a freshly logged-in account under its session token.
    #[instrument(level = "debug", skip(self, token, user), fields(user_id = %user.id))]
    pub async fn insert_account(&self, token: String, user: User) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(token, Account::new(user));
        debug!(target: "study", total = accounts.len(), "Account stored");
    }

    /// Drop the account behind a token. Returns whether one existed.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn remove_account(&self, token: &str) -> bool {
        let mut accounts = self.accounts.write().await;
        let removed = accounts.remove(token).is_some();
        debug!(target: "study", removed, total = accounts.len(), "Account removed");
        removed
    }

    /// Snapshot of the full account behind a token.
    pub async fn account(&self, token: &str) -> Option<Account> {
        let accounts = self.accounts.read().await;
        accounts.get(token).cloned()
    }

    /// Snapshot of just the user profile behind a token.
    pub async fn user(&self, token: &str) -> Option<User> {
        let accounts = self.accounts.read().await;
        accounts.get(token).map(|a| a.user.clone())
    }

    /// Add points to the running total; returns the updated profile.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn award_points(&self, token: &str, points: u32) -> Option<User> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(token)?;
        account.user.points = account.user.points.saturating_add(points);
        info!(target: "study", user_id = %account.user.id, awarded = points, total = account.user.points, "Points awarded");
        Some(account.user.clone())
    }

    /// Replace the tutor session with a fresh one; returns the stored copy.
    #[instrument(level = "debug", skip(self, token, session), fields(has_document = session.document_name.is_some()))]
    pub async fn set_tutor(&self, token: &str, session: TutorSession) -> Option<TutorSession> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(token)?;
        account.tutor = Some(session);
        account.tutor.clone()
    }

    /// Append a graded user/model exchange to the tutor transcript.
    /// Returns None when the token or the session is gone.
    pub async fn push_tutor_exchange(
        &self,
        token: &str,
        user_msg: ChatMessage,
        model_msg: ChatMessage,
    ) -> Option<ChatMessage> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(token)?;
        let tutor = account.tutor.as_mut()?;
        tutor.push(user_msg);
        tutor.push(model_msg.clone());
        debug!(target: "study", turns = tutor.messages.len(), "Tutor exchange stored");
        Some(model_msg)
    }

    /// Clear the tutor session. Returns whether one existed; None for bad token.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn reset_tutor(&self, token: &str) -> Option<bool> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(token)?;
        Some(account.tutor.take().is_some())
    }

    /// Replace the quiz session with a freshly generated one.
    #[instrument(level = "debug", skip(self, token, session), fields(topic = %session.topic, questions = session.questions.len()))]
    pub async fn set_quiz(&self, token: &str, session: QuizSession) -> Option<QuizSession> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(token)?;
        account.quiz = Some(session);
        account.quiz.clone()
    }

    /// Grade the selected option against the current question.
    /// Outer None means the token is unknown.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn answer_quiz(
        &self,
        token: &str,
        option: usize,
    ) -> Option<Result<AnswerOutcome, QuizError>> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(token)?;
        let Some(quiz) = account.quiz.as_mut() else {
            return Some(Err(QuizError::NoActiveQuiz));
        };
        Some(quiz.answer(option))
    }

    /// Move a graded quiz to its next question, or finish it.
    /// Outer None means the token is unknown.
    #[instrument(level = "debug", skip(self, token))]
    pub async fn advance_quiz(&self, token: &str) -> Option<Result<AdvanceOutcome, QuizError>> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(token)?;
        let Some(quiz) = account.quiz.as_mut() else {
            return Some(Err(QuizError::NoActiveQuiz));
        };
        Some(quiz.advance())
    }
}
