use super::{ChatCompletion, ChatRequest, Choice, LlmClient, ReplyMessage};
use async_trait::async_trait;
use std::sync::Mutex;

/// Scripted client for tests and offline runs. Queued completions are
/// consumed first; after that every call gets the fallback reply. With
/// neither configured a call is an error, which doubles as the transport
/// failure path in tests.
pub struct FakeClient {
    model: String,
    script: Mutex<Vec<ChatCompletion>>,
    fallback: Option<ChatCompletion>,
    /// Every request seen, in call order.
    pub calls: Mutex<Vec<ChatRequest>>,
}

impl FakeClient {
    pub fn new(model: String) -> Self {
        Self {
            model,
            script: Mutex::new(Vec::new()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fixed reply text for every call.
    pub fn with_reply(mut self, text: String) -> Self {
        self.fallback = Some(self.completion_from(text));
        self
    }

    /// Fixed full completion for every call.
    pub fn with_completion(mut self, completion: ChatCompletion) -> Self {
        self.fallback = Some(completion);
        self
    }

    /// Queue one reply, consumed before the fallback.
    pub fn push_reply(&self, text: String) {
        let completion = self.completion_from(text);
        self.script.lock().unwrap().push(completion);
    }

    /// Queue one full completion, consumed before the fallback.
    pub fn push_completion(&self, completion: ChatCompletion) {
        self.script.lock().unwrap().push(completion);
    }

    fn completion_from(&self, text: String) -> ChatCompletion {
        ChatCompletion {
            choices: vec![Choice {
                message: ReplyMessage {
                    content: Some(text),
                },
            }],
            model: Some(self.model.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<ChatCompletion> {
        self.calls.lock().unwrap().push(request.clone());
        let scripted = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                None
            } else {
                Some(script.remove(0))
            }
        };
        match scripted.or_else(|| self.fallback.clone()) {
            Some(completion) => Ok(completion),
            None => anyhow::bail!("no scripted reply left"),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
