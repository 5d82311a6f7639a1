//! Inference Loop
//!
//! Drives a generation engine from a compiled prompt to a lazy sequence
//! of decoded text deltas. The two CPU-heavy phases -- prefill and the
//! per-token generation step -- run on the blocking pool so the caller's
//! executor never stalls; decoding a produced token to text is cheap and
//! stays on the async task. Cancellation is observed before every
//! generation step, so at most one in-flight step completes after a
//! cancel request.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::EngineError;
use crate::types::{EngineSession, GenerationEngine, GenerationOptions};

/// One event on the delta pipeline. The terminal `Done` event always
/// arrives last, exactly once.
#[derive(Debug)]
pub enum StreamEvent {
    Delta(String),
    Done(StreamEnd),
}

/// How the stream finished. Cancellation is distinct from both normal
/// completion and failure.
#[derive(Debug)]
pub enum StreamEnd {
    Completed,
    Cancelled,
    Failed(EngineError),
}

/// Consumer half of the delta pipeline: a single-producer single-consumer
/// sequence of deltas followed by a terminal event.
pub struct TokenStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl TokenStream {
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

/// Start a generation stream for `prompt`. Deltas are produced in
/// generation order; engine-held session resources are released on every
/// exit path before the terminal event is delivered.
pub fn spawn_stream(
    engine: Arc<dyn GenerationEngine>,
    prompt: String,
    options: GenerationOptions,
    cancel: CancellationToken,
) -> TokenStream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let end = run_stream(engine, prompt, options, cancel, &tx).await;
        let _ = tx.send(StreamEvent::Done(end));
    });

    TokenStream { rx }
}

async fn run_stream(
    engine: Arc<dyn GenerationEngine>,
    prompt: String,
    options: GenerationOptions,
    cancel: CancellationToken,
    tx: &mpsc::UnboundedSender<StreamEvent>,
) -> StreamEnd {
    // Configuration errors are caught before any heavy work starts.
    let window = engine.context_window();
    if options.max_length > window {
        return StreamEnd::Failed(EngineError::ContextWindow {
            requested: options.max_length,
            window,
        });
    }

    if cancel.is_cancelled() {
        return StreamEnd::Cancelled;
    }

    // Prefill: tokenize the prompt and ingest it into the generator.
    let prefill = {
        let engine = Arc::clone(&engine);
        let options = options.clone();
        tokio::task::spawn_blocking(move || -> Result<Box<dyn EngineSession>, EngineError> {
            let tokens = engine.encode(&prompt)?;
            engine.create_session(tokens, &options)
        })
        .await
    };

    let mut session = match prefill {
        Ok(Ok(session)) => session,
        Ok(Err(err)) => return StreamEnd::Failed(err),
        Err(join) => {
            return StreamEnd::Failed(EngineError::Generation(format!(
                "prefill task failed: {}",
                join
            )))
        }
    };

    loop {
        if cancel.is_cancelled() {
            debug!("generation cancelled before next step");
            return StreamEnd::Cancelled;
        }
        if session.is_done() {
            return StreamEnd::Completed;
        }

        // Generate exactly one token off-context. The session moves into
        // the blocking task and back out so it is dropped here on every
        // exit path.
        let step = tokio::task::spawn_blocking(move || {
            let result = session.generate();
            (session, result)
        })
        .await;

        let (returned, result) = match step {
            Ok(pair) => pair,
            Err(join) => {
                return StreamEnd::Failed(EngineError::Generation(format!(
                    "generation task failed: {}",
                    join
                )))
            }
        };
        session = returned;

        if let Err(err) = result {
            return StreamEnd::Failed(err);
        }

        match session.decode_latest() {
            Ok(delta) => {
                if !delta.is_empty() && tx.send(StreamEvent::Delta(delta)).is_err() {
                    // Consumer went away; nothing left to produce for.
                    return StreamEnd::Cancelled;
                }
            }
            Err(err) => return StreamEnd::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::ScriptedEngine;

    async fn collect(mut stream: TokenStream) -> (Vec<String>, StreamEnd) {
        let mut deltas = Vec::new();
        loop {
            match stream.next().await {
                Some(StreamEvent::Delta(d)) => deltas.push(d),
                Some(StreamEvent::Done(end)) => return (deltas, end),
                None => panic!("stream closed without terminal event"),
            }
        }
    }

    #[tokio::test]
    async fn test_stream_yields_all_deltas_then_completes() {
        let engine = Arc::new(ScriptedEngine::from_responses(&["Hello world"]));
        let stream = spawn_stream(
            Arc::clone(&engine) as Arc<dyn GenerationEngine>,
            "prompt".to_string(),
            GenerationOptions::default(),
            CancellationToken::new(),
        );

        let (deltas, end) = collect(stream).await;
        assert_eq!(deltas, vec!["Hello ", "world"]);
        assert!(matches!(end, StreamEnd::Completed));
        assert_eq!(engine.releases(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_before_start_yields_no_deltas() {
        let engine = Arc::new(ScriptedEngine::from_responses(&["never seen"]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stream = spawn_stream(
            Arc::clone(&engine) as Arc<dyn GenerationEngine>,
            "prompt".to_string(),
            GenerationOptions::default(),
            cancel,
        );

        let (deltas, end) = collect(stream).await;
        assert!(deltas.is_empty());
        assert!(matches!(end, StreamEnd::Cancelled));
        // Cancelled before prefill: no session was ever created.
        assert_eq!(engine.releases(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_mid_stream_lets_inflight_step_finish() {
        let cancel = CancellationToken::new();
        let engine = Arc::new(
            ScriptedEngine::from_responses(&["a b c d e f"]).cancelling_at(3, cancel.clone()),
        );

        let stream = spawn_stream(
            Arc::clone(&engine) as Arc<dyn GenerationEngine>,
            "prompt".to_string(),
            GenerationOptions::default(),
            cancel,
        );

        let (deltas, end) = collect(stream).await;
        // The cancel fires during step 3, which still completes; no
        // further steps are issued.
        assert_eq!(deltas.len(), 3);
        assert!(matches!(end, StreamEnd::Cancelled));
        assert_eq!(engine.releases(), 1);
    }

    #[tokio::test]
    async fn test_context_window_violation_fails_before_prefill() {
        let engine = Arc::new(ScriptedEngine::from_responses(&["x"]).with_context_window(128));
        let options = GenerationOptions {
            temperature: 0.0,
            max_length: 4096,
        };

        let stream = spawn_stream(
            Arc::clone(&engine) as Arc<dyn GenerationEngine>,
            "prompt".to_string(),
            options,
            CancellationToken::new(),
        );

        let (deltas, end) = collect(stream).await;
        assert!(deltas.is_empty());
        assert!(matches!(
            end,
            StreamEnd::Failed(EngineError::ContextWindow { .. })
        ));
        assert_eq!(engine.releases(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_fatal_and_releases_session() {
        let engine = Arc::new(ScriptedEngine::from_responses(&["a b c"]).failing_at(2));
        let stream = spawn_stream(
            Arc::clone(&engine) as Arc<dyn GenerationEngine>,
            "prompt".to_string(),
            GenerationOptions::default(),
            CancellationToken::new(),
        );

        let (deltas, end) = collect(stream).await;
        assert_eq!(deltas, vec!["a "]);
        assert!(matches!(
            end,
            StreamEnd::Failed(EngineError::Generation(_))
        ));
        assert_eq!(engine.releases(), 1);
    }
}
