// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Scripted Provider - deterministic ProviderAdapter for tests and demos
//
// Plays back a queue of outcomes, one per call, and then repeats a default
// outcome forever. Counts invocations so callers can assert retry and
// fallback behaviour exactly.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::domain::llm::{
    estimate_tokens, last_content, ChatCompletion, ChatMessage, ProviderAdapter, ProviderError,
};

#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Echo the last input message as `"<name> reply: <last>"`
    Echo,
    /// Fixed reply text with explicit usage counts
    Reply { text: String, tokens_in: u32, tokens_out: u32 },
    Fail(ProviderError),
}

pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<ScriptStep>>,
    default_step: ScriptStep,
    latency: Duration,
    calls: AtomicU32,
    contexts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    /// Provider that always echoes
    pub fn echo(name: impl Into<String>) -> Self {
        Self::new(name, ScriptStep::Echo)
    }

    /// Provider that always fails with `err`
    pub fn failing(name: impl Into<String>, err: ProviderError) -> Self {
        Self::new(name, ScriptStep::Fail(err))
    }

    pub fn new(name: impl Into<String>, default_step: ScriptStep) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            default_step,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Queue `step` ahead of the default outcome
    pub fn then(self, step: ScriptStep) -> Self {
        self.script.lock().push_back(step);
        self
    }

    /// Every call sleeps for `latency` before producing its outcome
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Model contexts received so far, in call order
    pub fn contexts(&self) -> Vec<Vec<ChatMessage>> {
        self.contexts.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().push(messages.to_vec());
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default_step.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let latency_ms = self.latency.as_millis() as u64;

        match step {
            ScriptStep::Echo => {
                let last = last_content(messages);
                let text = format!("{} reply: {}", self.name, last);
                Ok(ChatCompletion {
                    tokens_in: estimate_tokens(last),
                    tokens_out: estimate_tokens(&text),
                    text,
                    latency_ms,
                })
            }
            ScriptStep::Reply {
                text,
                tokens_in,
                tokens_out,
            } => Ok(ChatCompletion {
                text,
                tokens_in,
                tokens_out,
                latency_ms,
            }),
            ScriptStep::Fail(err) => Err(err),
        }
    }
}
