//! Scripted brain - a fixed answer plus a record of every request.

use std::sync::Mutex;

use async_trait::async_trait;
use brain_core::{Brain, BrainError, Completion, CompletionRequest};

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Empty,
    Fail(String),
}

/// A brain whose answer is fixed up front.
///
/// Every request is recorded so tests can assert on the prompt the
/// orchestrator assembled, or that no completion call happened at all.
#[derive(Debug)]
pub struct ScriptedBrain {
    script: Script,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBrain {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(text.into()))
    }

    /// Always return a completion with no content.
    pub fn empty() -> Self {
        Self::with_script(Script::Empty)
    }

    /// Always fail with [`BrainError::Unavailable`].
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(reason.into()))
    }

    /// Number of completion calls received.
    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    /// Copies of every request received, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CompletionRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BrainError> {
        self.lock().push(request);
        match &self.script {
            Script::Reply(text) => Ok(Completion::text(text.clone())),
            Script::Empty => Ok(Completion::empty()),
            Script::Fail(reason) => Err(BrainError::Unavailable(reason.clone())),
        }
    }

    fn name(&self) -> &str {
        "ScriptedBrain"
    }
}
