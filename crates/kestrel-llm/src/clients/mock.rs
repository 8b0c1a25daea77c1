//! Scripted generator for tests and hermetic local runs.
//!
//! Pops scripted responses first, then falls back to a handler closure.
//! Call counts are observable so tests can assert coalescing and retry
//! behavior.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{GenerationOutput, GenerationRequest, Generator, LlmError};

type Handler = dyn Fn(&GenerationRequest) -> Result<GenerationOutput, LlmError> + Send + Sync;

pub struct MockGenerator {
    scripted: Mutex<VecDeque<Result<GenerationOutput, LlmError>>>,
    handler: Box<Handler>,
    calls: AtomicU64,
}

impl MockGenerator {
    /// Echoes the prompt tail back, which is enough for pipeline plumbing
    /// tests.
    pub fn echo() -> Self {
        Self::with_handler(|request| {
            let tail: String = request.prompt.chars().rev().take(64).collect::<String>();
            let tail: String = tail.chars().rev().collect();
            Ok(GenerationOutput::from_text(&request.prompt, format!("MOCK: {tail}")))
        })
    }

    /// Every call goes through the handler.
    pub fn with_handler(
        handler: impl Fn(&GenerationRequest) -> Result<GenerationOutput, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            handler: Box::new(handler),
            calls: AtomicU64::new(0),
        }
    }

    /// Scripted responses are consumed in order before the fallback handler
    /// takes over.
    pub fn scripted(responses: Vec<Result<GenerationOutput, LlmError>>) -> Self {
        let mock = Self::echo();
        *mock.scripted.lock().expect("scripted mutex poisoned") = responses.into();
        mock
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(response) = self
            .scripted
            .lock()
            .expect("scripted mutex poisoned")
            .pop_front()
        {
            return response;
        }
        (self.handler)(request)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model_key: "phi-local".into(),
            prompt: "say hi".into(),
            temperature: 0.2,
            max_tokens: 32,
            n_samples: 1,
        }
    }

    #[tokio::test]
    async fn scripted_responses_run_out_then_handler_takes_over() {
        let mock = MockGenerator::scripted(vec![
            Err(LlmError::Unavailable("first".into())),
            Ok(GenerationOutput::from_text("p", "second")),
        ]);

        assert!(mock.generate(&request()).await.is_err());
        assert_eq!(mock.generate(&request()).await.unwrap().texts[0], "second");
        let echoed = mock.generate(&request()).await.unwrap();
        assert!(echoed.texts[0].starts_with("MOCK:"));
        assert_eq!(mock.calls(), 3);
    }
}
