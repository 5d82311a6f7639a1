//! Scripted Engine
//!
//! A deterministic implementation of the generation-engine capability set
//! that replays canned fragment sequences instead of running a model.
//! Each `create_session` call consumes the next scripted response. Used
//! by the CLI for development and by tests, which also rely on its error
//! injection and release counting.

use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::engine::EngineError;
use crate::types::{EngineSession, GenerationEngine, GenerationOptions};

/// Default reply when the script queue is exhausted, so an interactive
/// session keeps answering.
fn fallback_fragments() -> Vec<String> {
    vec![
        ">".to_string(),
        "!".to_string(),
        "I have ".to_string(),
        "nothing more ".to_string(),
        "scripted to say.".to_string(),
        ">".to_string(),
        "END".to_string(),
    ]
}

pub struct ScriptedEngine {
    scripts: Mutex<VecDeque<Vec<String>>>,
    context_window: usize,
    fail_at: Option<usize>,
    cancel_at: Mutex<Option<(usize, CancellationToken)>>,
    releases: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    /// Engine that replays the given responses, one per session, each
    /// pre-split into delta fragments.
    pub fn from_fragments(responses: Vec<Vec<String>>) -> Self {
        Self {
            scripts: Mutex::new(responses.into_iter().collect()),
            context_window: 2048,
            fail_at: None,
            cancel_at: Mutex::new(None),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Engine that replays the given responses, splitting each into
    /// word-sized fragments the way a tokenizer stream would.
    pub fn from_responses(responses: &[&str]) -> Self {
        Self::from_fragments(responses.iter().map(|r| split_fragments(r)).collect())
    }

    /// Load a script from a JSON file: an array whose entries are either
    /// strings (split into fragments) or arrays of pre-split fragments.
    /// A missing or malformed file is a fatal initialization error.
    pub fn from_script_file(path: &str) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|e| EngineError::Init {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&contents).map_err(|e| EngineError::Init {
                path: path.to_string(),
                reason: format!("invalid script JSON: {}", e),
            })?;

        let mut responses: Vec<Vec<String>> = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                serde_json::Value::String(s) => responses.push(split_fragments(&s)),
                serde_json::Value::Array(parts) => {
                    let fragments = parts
                        .into_iter()
                        .map(|p| match p {
                            serde_json::Value::String(s) => Ok(s),
                            other => Err(EngineError::Init {
                                path: path.to_string(),
                                reason: format!("non-string fragment: {}", other),
                            }),
                        })
                        .collect::<Result<Vec<String>, EngineError>>()?;
                    responses.push(fragments);
                }
                other => {
                    return Err(EngineError::Init {
                        path: path.to_string(),
                        reason: format!("script entry must be string or array, got {}", other),
                    })
                }
            }
        }

        Ok(Self::from_fragments(responses))
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    /// Fail the Nth generation step (1-based) with a generation error.
    pub fn failing_at(mut self, step: usize) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Cancel `token` from inside the Nth generation step (1-based).
    /// The step itself still completes, matching the one-in-flight-step
    /// cancellation contract.
    pub fn cancelling_at(self, step: usize, token: CancellationToken) -> Self {
        *self.cancel_at.lock().unwrap() = Some((step, token));
        self
    }

    /// How many sessions have been released so far.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl GenerationEngine for ScriptedEngine {
    fn context_window(&self) -> usize {
        self.context_window
    }

    fn encode(&self, text: &str) -> Result<Vec<i64>, EngineError> {
        Ok(text.bytes().map(i64::from).collect())
    }

    fn create_session(
        &self,
        _tokens: Vec<i64>,
        _options: &GenerationOptions,
    ) -> Result<Box<dyn EngineSession>, EngineError> {
        let fragments = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(fallback_fragments);

        Ok(Box::new(ScriptedSession {
            fragments,
            pos: 0,
            latest: None,
            fail_at: self.fail_at,
            cancel_at: self.cancel_at.lock().unwrap().take(),
            releases: Arc::clone(&self.releases),
        }))
    }
}

struct ScriptedSession {
    fragments: Vec<String>,
    pos: usize,
    latest: Option<String>,
    fail_at: Option<usize>,
    cancel_at: Option<(usize, CancellationToken)>,
    releases: Arc<AtomicUsize>,
}

impl EngineSession for ScriptedSession {
    fn is_done(&self) -> bool {
        self.pos >= self.fragments.len()
    }

    fn generate(&mut self) -> Result<(), EngineError> {
        let step = self.pos + 1;

        if self.fail_at == Some(step) {
            return Err(EngineError::Generation(format!(
                "scripted failure at step {}",
                step
            )));
        }
        if let Some((cancel_step, token)) = &self.cancel_at {
            if *cancel_step == step {
                token.cancel();
            }
        }

        self.latest = Some(self.fragments[self.pos].clone());
        self.pos += 1;
        Ok(())
    }

    fn decode_latest(&mut self) -> Result<String, EngineError> {
        Ok(self.latest.take().unwrap_or_default())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Split text into word-sized fragments with trailing whitespace kept,
/// approximating a tokenizer's decode stream.
pub fn split_fragments(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fragments_keeps_trailing_space() {
        assert_eq!(split_fragments("Hello world"), vec!["Hello ", "world"]);
        assert_eq!(split_fragments("> ! hi"), vec!["> ", "! ", "hi"]);
    }

    #[test]
    fn test_session_replays_fragments() {
        let engine = ScriptedEngine::from_responses(&["ab cd"]);
        let tokens = engine.encode("prompt").unwrap();
        let mut session = engine
            .create_session(tokens, &GenerationOptions::default())
            .unwrap();

        let mut decoded = String::new();
        while !session.is_done() {
            session.generate().unwrap();
            decoded.push_str(&session.decode_latest().unwrap());
        }
        assert_eq!(decoded, "ab cd");
    }

    #[test]
    fn test_release_counted_on_drop() {
        let engine = ScriptedEngine::from_responses(&["x"]);
        {
            let _session = engine
                .create_session(vec![], &GenerationOptions::default())
                .unwrap();
            assert_eq!(engine.releases(), 0);
        }
        assert_eq!(engine.releases(), 1);
    }

    #[test]
    fn test_failure_injection() {
        let engine = ScriptedEngine::from_responses(&["a b c"]).failing_at(2);
        let mut session = engine
            .create_session(vec![], &GenerationOptions::default())
            .unwrap();

        assert!(session.generate().is_ok());
        assert!(matches!(
            session.generate(),
            Err(EngineError::Generation(_))
        ));
    }

    #[test]
    fn test_missing_script_file_is_init_error() {
        let result = ScriptedEngine::from_script_file("/nonexistent/script.json");
        assert!(matches!(result, Err(EngineError::Init { .. })));
    }
}
