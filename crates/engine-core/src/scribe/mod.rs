//! Scribe: Markovian rolling session summary
//!
//! Prevents context overflow and coherence loss by compressing the
//! conversation into a bounded summary, injected ahead of every
//! generation request via Context Weaving.

use crate::model::{SessionState, SESSION_SUMMARY_HARD_CAP};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

const MAX_TURNS_CONSIDERED: usize = 10;

const COMPRESSION_PROMPT_PREAMBLE: &str = "Summarize the following conversation in 200 words or fewer, preserving facts and open threads:\n\n";

/// An external language model invoked for summary generation and chat.
/// A narrow `generate(prompt) -> text` contract that keeps the inference
/// process itself out of this crate.
pub trait Generator {
    fn generate(&self, prompt: &str) -> crate::error::Result<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum ScribeError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

pub type Result<T> = std::result::Result<T, ScribeError>;

pub struct Scribe<'a> {
    store: &'a Store,
}

impl<'a> Scribe<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get_state(&self) -> Result<String> {
        Ok(self.store.get_session_state()?.map(|s| s.summary).unwrap_or_default())
    }

    pub fn clear_state(&self) -> Result<()> {
        self.store.clear_session_state()?;
        Ok(())
    }

    /// Compress `recent_turns` (last ≤10) into a new summary via
    /// `generator`. A generator failure leaves the previous state intact
    ///.
    pub fn update_state(&self, recent_turns: &[Turn], generator: &dyn Generator) -> Result<String> {
        let windowed = &recent_turns[recent_turns.len().saturating_sub(MAX_TURNS_CONSIDERED)..];
        let prompt = build_compression_prompt(windowed);

        match generator.generate(&prompt) {
            Ok(summary) => {
                let capped = cap_summary(&summary);
                let state = SessionState {
                    summary: capped.clone(),
                    updated_at: crate::store::now_millis(),
                };
                self.store.put_session_state(&state)?;
                Ok(capped)
            }
            Err(_) => self.get_state(),
        }
    }
}

fn build_compression_prompt(turns: &[Turn]) -> String {
    let mut prompt = String::from(COMPRESSION_PROMPT_PREAMBLE);
    for turn in turns {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        prompt.push_str(&format!("{role}: {}\n", turn.content));
    }
    prompt
}

fn cap_summary(summary: &str) -> String {
    if summary.len() <= SESSION_SUMMARY_HARD_CAP {
        return summary.to_string();
    }
    let mut end = SESSION_SUMMARY_HARD_CAP;
    while end > 0 && !summary.is_char_boundary(end) {
        end -= 1;
    }
    summary[..end].to_string()
}

/// Wrap `user_message` with the current session state, per the Context
/// Weaving format.
pub fn weave(session_summary: &str, user_message: &str) -> String {
    if session_summary.is_empty() {
        return user_message.to_string();
    }
    format!("[SESSION STATE]\n{session_summary}\n[/SESSION STATE]\n\n{user_message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubGenerator {
        response: crate::error::Result<String>,
    }

    impl Generator for StubGenerator {
        fn generate(&self, _prompt: &str) -> crate::error::Result<String> {
            match &self.response {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(crate::error::EngineError::Generator("stub failure".to_string())),
            }
        }
    }

    #[test]
    fn update_state_replaces_summary_on_success() {
        let store = Store::open_in_memory().unwrap();
        let scribe = Scribe::new(&store);
        let generator = StubGenerator {
            response: Ok("user discussed the context engine design".to_string()),
        };

        let turns = vec![Turn { role: Role::User, content: "let's talk design".into() }];
        let summary = scribe.update_state(&turns, &generator).unwrap();
        assert_eq!(summary, "user discussed the context engine design");
        assert_eq!(scribe.get_state().unwrap(), summary);
    }

    #[test]
    fn generator_failure_preserves_previous_state() {
        let store = Store::open_in_memory().unwrap();
        let scribe = Scribe::new(&store);
        let ok_generator = StubGenerator { response: Ok("first summary".to_string()) };
        scribe.update_state(&[], &ok_generator).unwrap();

        let failing = StubGenerator { response: Err(crate::error::EngineError::Generator("boom".into())) };
        let result = scribe.update_state(&[], &failing).unwrap();
        assert_eq!(result, "first summary");
    }

    #[test]
    fn clear_state_empties_summary() {
        let store = Store::open_in_memory().unwrap();
        let scribe = Scribe::new(&store);
        let generator = StubGenerator { response: Ok("something".to_string()) };
        scribe.update_state(&[], &generator).unwrap();
        scribe.clear_state().unwrap();
        assert_eq!(scribe.get_state().unwrap(), "");
    }

    #[test]
    fn weave_prepends_session_state_block() {
        let woven = weave("prior summary", "hello there");
        assert!(woven.starts_with("[SESSION STATE]\nprior summary\n[/SESSION STATE]"));
        assert!(woven.ends_with("hello there"));
    }

    #[test]
    fn weave_passes_through_when_no_state() {
        assert_eq!(weave("", "hello there"), "hello there");
    }

    #[test]
    fn cap_summary_truncates_at_hard_cap() {
        let long = "a".repeat(SESSION_SUMMARY_HARD_CAP + 500);
        let capped = cap_summary(&long);
        assert_eq!(capped.len(), SESSION_SUMMARY_HARD_CAP);
    }
}
