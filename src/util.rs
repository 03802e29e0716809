//! Small utility helpers used across modules.

use base64::Engine;
use rand::RngCore;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Mint an opaque session token: 32 random bytes, URL-safe base64.
/// Tokens are only ever compared for equality; there is nothing to decode.
pub fn new_session_token() -> String {
  let mut bytes = [0u8; 32];
  rand::thread_rng().fill_bytes(&mut bytes);
  base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Display name shown in the navbar: the part of the email before '@'.
pub fn display_name_from_email(email: &str) -> String {
  let trimmed = email.trim();
  trimmed.split('@').next().unwrap_or(trimmed).to_string()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_occurrence() {
    let out = fill_template("{topic} and {topic} at {level}", &[("topic", "algebra"), ("level", "101")]);
    assert_eq!(out, "algebra and algebra at 101");
  }

  #[test]
  fn fill_template_leaves_unknown_keys_alone() {
    let out = fill_template("explain {concept}", &[("topic", "x")]);
    assert_eq!(out, "explain {concept}");
  }

  #[test]
  fn session_tokens_are_distinct_and_urlsafe() {
    let a = new_session_token();
    let b = new_session_token();
    assert_ne!(a, b);
    assert!(a.len() >= 42);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
  }

  #[test]
  fn display_name_takes_email_local_part() {
    assert_eq!(display_name_from_email("student@example.com"), "student");
    assert_eq!(display_name_from_email("  ada@cs.edu "), "ada");
    assert_eq!(display_name_from_email("no-at-sign"), "no-at-sign");
  }

  #[test]
  fn trunc_for_log_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let t = trunc_for_log("光合作用 is photosynthesis", 5);
    assert!(t.starts_with('光'));
    assert!(t.contains("bytes total"));
  }
}
