//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use geminibuddy::{
    models::ModelClient,
    tools::{ToolCallRequest, ToolSchema},
    types::{Conversation, ModelReply},
    AgentError, Result,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One scripted model step
pub enum Step {
    Reply(ModelReply),
    Fail(AgentError),
    /// Cancel the token, then reply
    CancelThen(CancellationToken, ModelReply),
}

/// Model that replays scripted steps and records what it was sent
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<ModelReply>,
    seen: Mutex<Vec<Conversation>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Model that repeats the same reply forever
    pub fn always(reply: ModelReply) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Some(reply),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<Conversation> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn send(&self, conversation: &Conversation, _tools: &[ToolSchema]) -> Result<ModelReply> {
        self.seen.lock().unwrap().push(conversation.clone());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::CancelThen(token, reply)) => {
                token.cancel();
                Ok(reply)
            }
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AgentError::ModelApi("script exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn answer(text: &str) -> ModelReply {
    ModelReply::FinalAnswer(text.to_string())
}

pub fn calls(requests: Vec<(&str, Value)>) -> ModelReply {
    ModelReply::ToolCallBatch(
        requests
            .into_iter()
            .map(|(name, args)| ToolCallRequest::new(name, args))
            .collect(),
    )
}
