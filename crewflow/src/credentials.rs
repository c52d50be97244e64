//! Provider credentials.
//!
//! Credentials are resolved once, up front, and handed to the clients that
//! need them. The library never writes to the process environment.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default variable holding the LLM API key.
pub const DEFAULT_LLM_KEY_VAR: &str = "GEMINI_API_KEY";

/// Default variable holding the search API key.
pub const DEFAULT_SEARCH_KEY_VAR: &str = "SERPER_API_KEY";

/// A secret string that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value, for building request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Maps logical credential keys to environment variable names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialEnv {
    /// Variable holding the LLM API key.
    pub llm_api_key: String,
    /// Variable holding the search API key.
    pub search_api_key: String,
}

impl Default for CredentialEnv {
    fn default() -> Self {
        Self {
            llm_api_key: DEFAULT_LLM_KEY_VAR.to_string(),
            search_api_key: DEFAULT_SEARCH_KEY_VAR.to_string(),
        }
    }
}

/// Resolved credentials for one run.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Key for the reasoning service.
    pub llm_api_key: Secret,
    /// Key for the search capability, if any stage needs it.
    pub search_api_key: Option<Secret>,
}

impl Credentials {
    /// Creates credentials directly.
    #[must_use]
    pub fn new(llm_api_key: impl Into<String>) -> Self {
        Self {
            llm_api_key: Secret::new(llm_api_key),
            search_api_key: None,
        }
    }

    /// Adds a search API key.
    #[must_use]
    pub fn with_search_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(Secret::new(key));
        self
    }

    /// Reads credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when the LLM key is absent
    /// or blank, or when `require_search` is set and the search key is.
    pub fn from_env(env: &CredentialEnv, require_search: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(env, require_search, |name| std::env::var(name).ok())
    }

    /// Resolves credentials through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Credentials::from_env`].
    pub fn from_lookup<F>(env: &CredentialEnv, require_search: bool, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(Secret)
        };

        let llm_api_key = read(&env.llm_api_key)
            .ok_or_else(|| ConfigError::missing_credential("llm_api_key", &env.llm_api_key))?;

        let search_api_key = read(&env.search_api_key);
        if require_search && search_api_key.is_none() {
            return Err(ConfigError::missing_credential(
                "search_api_key",
                &env.search_api_key,
            ));
        }

        Ok(Self {
            llm_api_key,
            search_api_key,
        })
    }
}
