//! Failover LLM client: primary plus optional backup.
//!
//! Initialization health-checks the primary and starts on the backup
//! when the primary is unreachable. At runtime a completion error that
//! looks like an outage triggers a one-shot switch-over to the backup
//! for the rest of the process; malformed responses never do (they are
//! a prompt/model problem, not an availability problem).

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use super::{BoxedChatProvider, OllamaChat, OpenAiChat};
use crate::error::{Error, Result};

/// Chat client with primary/backup failover.
pub struct LlmClient {
    primary: BoxedChatProvider,
    backup: Option<BoxedChatProvider>,
    on_backup: AtomicBool,
}

impl LlmClient {
    /// Wrap providers without probing them.
    #[must_use]
    pub fn new(primary: BoxedChatProvider, backup: Option<BoxedChatProvider>) -> Self {
        Self {
            primary,
            backup,
            on_backup: AtomicBool::new(false),
        }
    }

    /// Health-check the primary and construct the client.
    ///
    /// Unreachable primary with a reachable backup starts on the
    /// backup; nothing reachable is an error (callers typically treat
    /// that as "run without an LLM").
    ///
    /// # Errors
    ///
    /// Returns `Error::LlmUnavailable` when no provider answers.
    pub async fn connect(
        primary: BoxedChatProvider,
        backup: Option<BoxedChatProvider>,
    ) -> Result<Self> {
        let client = Self::new(primary, backup);

        if client.primary.is_available().await {
            debug!(provider = %client.primary.info().name, "LLM primary healthy");
            return Ok(client);
        }

        if let Some(backup) = &client.backup {
            if backup.is_available().await {
                info!(
                    primary = %client.primary.info().name,
                    backup = %backup.info().name,
                    "LLM primary unreachable, starting on backup"
                );
                client.on_backup.store(true, Ordering::Relaxed);
                return Ok(client);
            }
        }

        let info = client.primary.info();
        Err(Error::LlmUnavailable {
            provider: info.name,
            message: format!("no provider reachable (primary {})", info.endpoint),
        })
    }

    fn active(&self) -> &BoxedChatProvider {
        if self.on_backup.load(Ordering::Relaxed) {
            self.backup.as_ref().unwrap_or(&self.primary)
        } else {
            &self.primary
        }
    }

    /// Name of the provider currently serving completions.
    #[must_use]
    pub fn active_provider(&self) -> String {
        self.active().info().name
    }

    /// One completion with failover.
    ///
    /// # Errors
    ///
    /// Propagates the active provider's error when no backup can take
    /// over (already on backup, no backup configured, or the error is
    /// not an outage signal).
    pub async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let result = self.active().complete(prompt, temperature).await;

        let err = match result {
            Ok(text) => return Ok(text),
            Err(err) => err,
        };

        let already_switched = self.on_backup.load(Ordering::Relaxed);
        let Some(backup) = &self.backup else {
            return Err(err);
        };
        if already_switched || !is_outage(&err) {
            return Err(err);
        }
        warn!(
            primary = %self.primary.info().name,
            backup = %backup.info().name,
            error = %err,
            "LLM completion failed, switching to backup"
        );
        self.on_backup.store(true, Ordering::Relaxed);
        backup.complete(prompt, temperature).await
    }
}

/// Outage classification: the structured kind first, then the legacy
/// message sniff for providers that cannot classify.
fn is_outage(err: &Error) -> bool {
    match err {
        Error::LlmUnavailable { message, .. } => {
            let msg = message.to_lowercase();
            // 4xx other than 404 means the endpoint is alive but the
            // request is wrong; switching providers will not help.
            !msg.contains("status 4") || msg.contains("404") || msg.contains("not found")
        }
        Error::Other(message) => {
            let msg = message.to_lowercase();
            msg.contains("404") || msg.contains("not found") || msg.contains("connection")
        }
        _ => false,
    }
}

/// Build an [`LlmClient`] from `LOREBASE_LLM_*` environment variables.
///
/// Returns `None` when no provider is configured or reachable; the
/// router then runs on its rules-based fallback.
pub async fn create_llm_client() -> Option<LlmClient> {
    let primary = provider_from_env("LOREBASE_LLM")?;
    let backup = provider_from_env("LOREBASE_LLM_BACKUP");

    match LlmClient::connect(primary, backup).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "no LLM provider reachable; router will use rules-based fallback");
            None
        }
    }
}

/// Build one boxed provider from a `{prefix}_*` variable family.
///
/// `{prefix}_PROVIDER` selects `ollama` (default for the primary
/// family) or `openai`; endpoint/model/api-key come from
/// `{prefix}_ENDPOINT`, `{prefix}_MODEL`, `{prefix}_API_KEY`.
fn provider_from_env(prefix: &str) -> Option<BoxedChatProvider> {
    let var = |suffix: &str| {
        std::env::var(format!("{prefix}_{suffix}"))
            .ok()
            .filter(|v| !v.trim().is_empty())
    };

    let kind = var("PROVIDER");
    let endpoint = var("ENDPOINT");
    let model = var("MODEL");

    // The backup family is opt-in: absent entirely means no backup.
    if prefix.ends_with("_BACKUP") && kind.is_none() && endpoint.is_none() && model.is_none() {
        return None;
    }

    match kind.as_deref() {
        Some("openai") => Some(BoxedChatProvider::new(OpenAiChat::with_config(
            endpoint,
            model,
            var("API_KEY"),
        ))),
        Some("ollama") | None => {
            Some(BoxedChatProvider::new(OllamaChat::with_config(endpoint, model)))
        }
        Some(other) => {
            warn!(provider = other, "unknown LLM provider kind, skipping");
            None
        }
    }
}
