// ABOUTME: Scripted model client used by unit tests.
// ABOUTME: Replays queued replies in order and records every request it sees.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{LlmClient, Request, Response};
use crate::error::LlmError;

pub(crate) enum Reply {
    Respond(Response),
    Fail(String),
}

/// Replays `replies` front to back; once empty, answers with `fallback`
/// (or fails if there is none).
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Response>,
    delay: Duration,
    pub requests: Mutex<Vec<Request>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responses(responses: Vec<Response>) -> Self {
        Self::new(responses.into_iter().map(Reply::Respond).collect())
    }

    /// Always answer with the same reply.
    pub fn repeating(response: Response) -> Self {
        Self::new(Vec::new()).fallback(response)
    }

    pub fn fallback(mut self, response: Response) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Sleep before every reply.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn generate(&self, request: &Request) -> Result<Response, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(LlmError::Api {
                status: 500,
                message,
            }),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::Configuration("script exhausted".to_string())),
        }
    }
}
