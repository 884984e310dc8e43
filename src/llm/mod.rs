//! Chat-completion providers for routing and extraction.
//!
//! Defines the provider interface, the object-safe boxed wrapper for
//! runtime provider selection, and the failover client. The engine
//! never parses provider-specific payloads; it sees prompt-in,
//! text-out.

mod client;
mod ollama;
mod openai;

pub use client::{LlmClient, create_llm_client};
pub use ollama::OllamaChat;
pub use openai::OpenAiChat;

use crate::error::Result;

/// Provider metadata for logs and availability reporting.
#[derive(Debug, Clone)]
pub struct ChatProviderInfo {
    pub name: String,
    pub model: String,
    pub endpoint: String,
}

/// Trait for chat-completion providers.
///
/// Uses async methods via `impl Future` so implementations stay
/// zero-cost; see [`BoxedChatProvider`] for runtime polymorphism.
pub trait ChatProvider: Send + Sync {
    /// Provider metadata.
    fn info(&self) -> ChatProviderInfo;

    /// Cheap reachability probe (bounded internally, no retries).
    fn is_available(&self) -> impl std::future::Future<Output = bool> + Send;

    /// One completion. Implementations map transport failures to
    /// `Error::LlmUnavailable` and unusable payloads to
    /// `Error::LlmMalformed`.
    fn complete(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Boxed provider for dynamic dispatch.
///
/// The trait's async methods return `impl Future`, so runtime
/// polymorphism needs this wrapper.
pub struct BoxedChatProvider {
    inner: Box<dyn ChatProviderBoxed + Send + Sync>,
}

/// Object-safe version of [`ChatProvider`] for boxing.
trait ChatProviderBoxed: Send + Sync {
    fn info(&self) -> ChatProviderInfo;
    fn is_available_boxed(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>>;
    fn complete_boxed(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + '_>>;
}

impl BoxedChatProvider {
    pub fn new<P: ChatProvider + 'static>(provider: P) -> Self {
        Self {
            inner: Box::new(BoxedChatWrapper(provider)),
        }
    }

    #[must_use]
    pub fn info(&self) -> ChatProviderInfo {
        self.inner.info()
    }

    pub async fn is_available(&self) -> bool {
        self.inner.is_available_boxed().await
    }

    /// One completion through the boxed provider.
    ///
    /// # Errors
    ///
    /// Propagates the provider's `LlmUnavailable` / `LlmMalformed`.
    pub async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.inner.complete_boxed(prompt, temperature).await
    }
}

struct BoxedChatWrapper<P: ChatProvider + 'static>(P);

impl<P: ChatProvider + 'static> ChatProviderBoxed for BoxedChatWrapper<P> {
    fn info(&self) -> ChatProviderInfo {
        self.0.info()
    }

    fn is_available_boxed(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + '_>> {
        Box::pin(self.0.is_available())
    }

    fn complete_boxed(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + '_>> {
        // Owned copy so the future does not borrow the caller's str.
        let prompt = prompt.to_string();
        Box::pin(async move { self.0.complete(&prompt, temperature).await })
    }
}
