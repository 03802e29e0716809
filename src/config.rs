//! Loading study configuration (prompt overrides) from TOML.
//!
//! See `StudyConfig` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StudyConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the Gemini client plus canned tutor copy. Defaults cover
/// the whole platform; override them in TOML to tune tone or structure.
/// Templates use `{topic}` / `{document}` placeholders.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Tutor chat
  pub tutor_system: String,
  pub tutor_context_template: String,
  pub tutor_greeting_template: String,
  pub tutor_greeting_no_document: String,
  // Quiz generation (structured JSON)
  pub quiz_user_template: String,
  // Assignment solver
  pub solver_system: String,
  // Video generation
  pub video_prompt_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      tutor_system: "You are a friendly, human-like AI tutor for the SmartStudy AI platform.\n\
        Your goal is to help students learn.\n\n\
        Behavior:\n\
        - Ask probing questions to check understanding.\n\
        - If the student answers correctly, praise them and explain *why* it's correct.\n\
        - If wrong, give a helpful hint, do not just give the answer immediately.\n\
        - Keep responses concise and encouraging.".into(),
      tutor_context_template: "The user is studying a document with the following context: \
        Document Name: {document} (Assume standard textbook content for this topic)".into(),
      tutor_greeting_template: "I've analyzed \"{document}\". I'm ready to help you study! \
        What specific topic from this document would you like to review?".into(),
      tutor_greeting_no_document: "I'm ready to help you study! \
        What topic would you like to review today?".into(),
      quiz_user_template: "Generate a 5-question multiple choice quiz about: {topic}.".into(),
      solver_system: "You are an expert academic tutor. Provide clear, step-by-step solutions \
        to the following assignment question. Show your work details and explain complex \
        concepts simply.".into(),
      video_prompt_template: "A high quality, educational, cinematic video explaining the \
        concept of: {topic}. Abstract visualization, clear imagery, 16:9 aspect ratio.".into(),
    }
  }
}

/// Attempt to load `StudyConfig` from STUDY_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_study_config_from_env() -> Option<StudyConfig> {
  let path = std::env::var("STUDY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<StudyConfig>(&s) {
      Ok(cfg) => {
        info!(target: "smartstudy_backend", %path, "Loaded study config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "smartstudy_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "smartstudy_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_templates_carry_their_placeholders() {
    let p = Prompts::default();
    assert!(p.quiz_user_template.contains("{topic}"));
    assert!(p.video_prompt_template.contains("{topic}"));
    assert!(p.tutor_context_template.contains("{document}"));
    assert!(p.tutor_greeting_template.contains("{document}"));
    assert!(p.tutor_system.contains("SmartStudy"));
  }

  #[test]
  fn toml_prompts_table_overrides_defaults() {
    let toml_src = r#"
      [prompts]
      tutor_system = "system"
      tutor_context_template = "ctx {document}"
      tutor_greeting_template = "hello {document}"
      tutor_greeting_no_document = "hello"
      quiz_user_template = "quiz {topic}"
      solver_system = "solve"
      video_prompt_template = "video {topic}"
    "#;
    let cfg: StudyConfig = toml::from_str(toml_src).expect("parse");
    assert_eq!(cfg.prompts.quiz_user_template, "quiz {topic}");
    assert_eq!(cfg.prompts.tutor_greeting_no_document, "hello");
  }

  #[test]
  fn missing_prompts_table_falls_back_to_defaults() {
    let cfg: StudyConfig = toml::from_str("").expect("parse");
    assert!(cfg.prompts.tutor_system.contains("SmartStudy"));
  }
}
