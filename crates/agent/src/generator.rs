//! Generator client — assembled turns in, one reply out.
//!
//! [`Generator::generate`] surfaces every failure as `GenerationFailed`.
//! [`Generator::respond`] is what request handlers call: on failure it logs
//! the detail and hands back [`APOLOGY`] without touching the session.

use std::sync::Arc;
use std::time::Duration;

use biochat_core::conversation::ConversationState;
use biochat_core::error::{Error, ProviderError, Result};
use biochat_core::message::Turn;
use biochat_core::provider::{Provider, ProviderRequest, SamplingParams};
use tracing::{debug, error};

/// Reply returned to the visitor when generation fails.
pub const APOLOGY: &str = "Sorry, something went wrong while generating the conversation.";

pub struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
    params: SamplingParams,
    timeout: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, params: SamplingParams) -> Self {
        Self {
            provider,
            model: model.into(),
            params,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the assembled turns and return the reply text.
    pub async fn generate(&self, messages: Vec<Turn>) -> Result<String> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            params: self.params,
        };

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            turns = request.messages.len(),
            "Generating reply"
        );

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                Error::GenerationFailed(ProviderError::Timeout(format!(
                    "no reply after {}s",
                    self.timeout.as_secs()
                )))
            })?
            .map_err(Error::GenerationFailed)?;

        if response.content.trim().is_empty() {
            return Err(Error::GenerationFailed(ProviderError::MalformedResponse(
                "empty reply".into(),
            )));
        }

        if let Some(usage) = response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Reply generated"
            );
        }

        Ok(response.content)
    }

    /// Generate a reply and record it in the session.
    ///
    /// Generation failures become the apology and leave `state` untouched.
    /// The only error returned is a state invariant violation.
    pub async fn respond(&self, state: &mut ConversationState, messages: Vec<Turn>) -> Result<String> {
        match self.generate(messages).await {
            Ok(reply) => {
                state.append(Turn::assistant(reply.clone()))?;
                Ok(reply)
            }
            Err(e) => {
                error!(session = %state.id, error = %e, "Generation failed, replying with apology");
                Ok(APOLOGY.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use biochat_core::conversation::SessionId;
    use biochat_core::message::Role;

    fn generator(provider: Arc<ScriptedProvider>) -> Generator {
        Generator::new(provider, "gpt-4", SamplingParams::default())
    }

    fn asked() -> ConversationState {
        let mut s = ConversationState::new(SessionId::from("gen"));
        s.append(Turn::visitor("Tell me about Rafa")).unwrap();
        s
    }

    #[tokio::test]
    async fn generate_forwards_model_and_params() {
        let provider = Arc::new(ScriptedProvider::replying(&["Rafa is an engineer."]));
        let g = generator(provider.clone());

        let reply = g.generate(vec![Turn::system("persona"), Turn::visitor("q")]).await.unwrap();
        assert_eq!(reply, "Rafa is an engineer.");

        let req = &provider.requests()[0];
        assert_eq!(req.model, "gpt-4");
        assert_eq!(req.params, SamplingParams::default());
        assert_eq!(req.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn respond_appends_reply() {
        let provider = Arc::new(ScriptedProvider::replying(&["Hello there!"]));
        let mut state = asked();

        let reply = generator(provider).respond(&mut state, vec![Turn::visitor("q")]).await.unwrap();
        assert_eq!(reply, "Hello there!");
        assert_eq!(state.turns().len(), 2);
        assert_eq!(state.turns()[1].role, Role::Assistant);
        assert!(!state.should_greet());
    }

    #[tokio::test]
    async fn failure_yields_apology_without_appending() {
        let provider = Arc::new(ScriptedProvider::new().then_fail(ProviderError::ApiError {
            status_code: 500,
            message: "boom".into(),
        }));
        let mut state = asked();

        let reply = generator(provider).respond(&mut state, vec![Turn::visitor("q")]).await.unwrap();
        assert_eq!(reply, APOLOGY);
        assert_eq!(state.turns().len(), 1);
        assert!(state.should_greet());
    }

    #[tokio::test]
    async fn empty_reply_is_generation_failure() {
        let provider = Arc::new(ScriptedProvider::replying(&["   "]));
        let err = generator(provider).generate(vec![Turn::visitor("q")]).await.unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(ProviderError::MalformedResponse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out_into_apology() {
        let provider = Arc::new(ScriptedProvider::new().with_delay(Duration::from_secs(120)));
        let g = generator(provider).with_timeout(Duration::from_secs(5));

        let err = g.generate(vec![Turn::visitor("q")]).await.unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(ProviderError::Timeout(_))));

        let mut state = asked();
        assert_eq!(g.respond(&mut state, vec![Turn::visitor("q")]).await.unwrap(), APOLOGY);
        assert_eq!(state.turns().len(), 1);
    }

    #[tokio::test]
    async fn reply_without_question_is_state_corrupt() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut state = ConversationState::new(SessionId::from("empty"));
        let err = generator(provider).respond(&mut state, vec![Turn::visitor("q")]).await.unwrap_err();
        assert!(matches!(err, Error::StateCorrupt(_)));
    }
}
