use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::error::RelayError;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;
const TOP_P: f32 = 0.95;

/// One incremental piece of assistant output.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub content: String,
}

impl Fragment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Lazy sequence of fragments tied to one upstream call.
///
/// Ending without an error means the upstream completed; an `Err` item is
/// the failure that ended it and nothing follows.
pub type FragmentStream = BoxStream<'static, Result<Fragment, RelayError>>;

/// Anything that can turn a prompt into a completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn model(&self) -> &str;

    fn stream_completion(&self, prompt: String) -> FragmentStream;

    async fn complete(&self, prompt: String) -> Result<String, RelayError>;
}

pub struct LlmService {
    client: Client<OpenAIConfig>,
    model: String,
    upstream_timeout: Option<Duration>,
}

impl LlmService {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        info!(
            "Initializing LLM service with model {} at {}",
            config.model, config.api_base
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_str(&config.referer)?,
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_str(&config.title)?,
        );
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let openai_config = OpenAIConfig::new()
            .with_api_base(&config.api_base)
            .with_api_key(&config.api_key);
        let client = Client::with_config(openai_config).with_http_client(http_client);

        Ok(Self {
            client,
            model: config.model.clone(),
            upstream_timeout: config.upstream_timeout,
        })
    }

    /// The whole conversation goes upstream as a single user turn.
    fn build_request(
        &self,
        prompt: String,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, RelayError> {
        let user_message = ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?,
        );

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(vec![user_message])
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .top_p(TOP_P);
        if stream {
            args.stream(true);
        }
        Ok(args.build()?)
    }
}

#[async_trait]
impl CompletionBackend for LlmService {
    fn model(&self) -> &str {
        &self.model
    }

    fn stream_completion(&self, prompt: String) -> FragmentStream {
        let request = self.build_request(prompt, true);
        upstream_fragments(self.client.clone(), request, self.upstream_timeout).boxed()
    }

    async fn complete(&self, prompt: String) -> Result<String, RelayError> {
        let request = self.build_request(prompt, false)?;
        let response = with_deadline(self.upstream_timeout, self.client.chat().create(request))
            .await??;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::Upstream("upstream returned no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

/// The deadline covers opening the stream and the arrival of the first
/// chunk; once text is flowing the stream runs until the upstream ends it.
fn upstream_fragments(
    client: Client<OpenAIConfig>,
    request: Result<CreateChatCompletionRequest, RelayError>,
    upstream_timeout: Option<Duration>,
) -> impl Stream<Item = Result<Fragment, RelayError>> + Send + 'static {
    try_stream! {
        let request = request?;
        let mut upstream = with_deadline(upstream_timeout, client.chat().create_stream(request))
            .await??;

        let mut next = with_deadline(upstream_timeout, upstream.next()).await?;
        while let Some(result) = next {
            let response = result?;

            if let Some(delta) = response.choices.first().and_then(|c| c.delta.content.clone()) {
                debug!("Upstream delta: {} chars", delta.len());
                yield Fragment { content: delta };
            }

            next = upstream.next().await;
        }
    }
}

async fn with_deadline<F: Future>(
    limit: Option<Duration>,
    call: F,
) -> Result<F::Output, RelayError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| RelayError::Timeout(limit)),
        None => Ok(call.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RelayConfig {
        RelayConfig::from_lookup(|key| match key {
            "OPENROUTER_MODEL" => Some("test-model".to_string()),
            "OPENROUTER_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn request_flattens_prompt_into_one_user_turn() {
        let service = LlmService::new(&test_config()).unwrap();
        let request = service
            .build_request("Human: Hi\nAssistant: ".to_string(), true)
            .unwrap();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Human: Hi\nAssistant: ");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["stream"], true);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((body["top_p"].as_f64().unwrap() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn single_shot_request_is_not_streamed() {
        let service = LlmService::new(&test_config()).unwrap();
        let request = service.build_request("Assistant: ".to_string(), false).unwrap();
        assert_eq!(request.stream, None);
    }

    #[test]
    fn reports_configured_model() {
        let service = LlmService::new(&test_config()).unwrap();
        assert_eq!(service.model(), "test-model");
    }

    #[tokio::test]
    async fn deadline_expires() {
        let result = with_deadline(
            Some(Duration::from_millis(10)),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;
        assert!(matches!(result, Err(RelayError::Timeout(_))));
    }

    #[tokio::test]
    async fn no_deadline_waits() {
        let result = with_deadline(None, async { 7 }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
