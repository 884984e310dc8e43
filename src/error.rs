//! Error types for the retrieval engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=config, 3=store, 4=llm, etc.)
//! - A recoverability flag separating fail-open store/LLM faults from
//!   fatal configuration and cancellation outcomes
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

use crate::model::Source;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Agents match on the string; shell scripts on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Configuration (exit 2)
    ConfigError,

    // Stores (exit 3)
    StoreTimeout,
    StoreTransport,
    DatabaseError,

    // LLM (exit 4)
    LlmUnavailable,
    LlmMalformed,

    // Embedding (exit 5)
    EmbeddingError,

    // Cancellation (exit 6)
    Cancelled,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::StoreTimeout => "STORE_TIMEOUT",
            Self::StoreTransport => "STORE_TRANSPORT",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::LlmUnavailable => "LLM_UNAVAILABLE",
            Self::LlmMalformed => "LLM_MALFORMED",
            Self::EmbeddingError => "EMBEDDING_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::ConfigError => 2,
            Self::StoreTimeout | Self::StoreTransport | Self::DatabaseError => 3,
            Self::LlmUnavailable | Self::LlmMalformed => 4,
            Self::EmbeddingError => 5,
            Self::Cancelled => 6,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the orchestrator recovers from this locally.
    ///
    /// Recoverable faults degrade to an empty per-source result and a
    /// warning; only configuration errors and cancellation escape
    /// `search` to the caller.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ConfigError | Self::Cancelled)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur inside the retrieval engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{source_kind} store call exceeded its {deadline_ms}ms deadline")]
    StoreTimeout {
        source_kind: Source,
        deadline_ms: u64,
    },

    #[error("{source_kind} store transport error: {message}")]
    StoreTransport {
        source_kind: Source,
        message: String,
    },

    #[error("LLM unavailable ({provider}): {message}")]
    LlmUnavailable { provider: String, message: String },

    #[error("LLM returned an unparseable response: {snippet}")]
    LlmMalformed { snippet: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::StoreTimeout { .. } => ErrorCode::StoreTimeout,
            Self::StoreTransport { .. } => ErrorCode::StoreTransport,
            Self::LlmUnavailable { .. } => ErrorCode::LlmUnavailable,
            Self::LlmMalformed { .. } => ErrorCode::LlmMalformed,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Embedding(_) => ErrorCode::EmbeddingError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether the orchestrator may recover from this error locally.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.error_code().is_recoverable()
    }

    /// Context-aware recovery hint for agents and humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Config(msg) => {
                if msg.contains("strategy") {
                    Some(
                        "Valid strategies: plan, threshold, intent, \
                         parallel_expansion, entity_sentence, hop"
                            .to_string(),
                    )
                } else if msg.contains("weight") {
                    Some("Source weights must lie in [0.2, 1.5]".to_string())
                } else {
                    None
                }
            }
            Self::LlmUnavailable { .. } => Some(
                "Check LOREBASE_LLM_ENDPOINT, or run without an LLM: \
                 the router falls back to morphological extraction"
                    .to_string(),
            ),
            Self::Database(_) => {
                Some("Run `lorebase init` to create the knowledge-base schema".to_string())
            }
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "recoverable": code.is_recoverable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
