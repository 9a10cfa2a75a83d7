//! Queue configuration bound to a [`Queue`](crate::Queue) handle.
//!
//! The configuration is the base layer every call is built from: per-call
//! parameters are merged over it by the [`normalize`](crate::normalize)
//! functions, with per-call values taking precedence.

use crate::error::ConfigurationError;
use crate::message::MessageAttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Environment variable prefix used by [`QueueConfig::from_env`]
pub const ENV_PREFIX: &str = "SQS";

/// Explicit access credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Receive overrides applied to every receive made through the handle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveOptions {
    #[serde(default)]
    pub attribute_names: Option<Vec<String>>,
    #[serde(default)]
    pub message_attribute_names: Option<Vec<String>>,
    #[serde(default)]
    pub max_number_of_messages: Option<u32>,
    #[serde(default)]
    pub visibility_timeout: Option<u32>,
    #[serde(default)]
    pub wait_time_seconds: Option<u32>,
}

/// Send overrides applied to single-message sends made through the handle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    #[serde(default)]
    pub delay_seconds: Option<u32>,
    #[serde(default)]
    pub message_attributes: Option<HashMap<String, MessageAttributeValue>>,
    #[serde(default)]
    pub message_deduplication_id: Option<String>,
    #[serde(default)]
    pub message_group_id: Option<String>,
    #[serde(default)]
    pub message_system_attributes: Option<HashMap<String, MessageAttributeValue>>,
}

/// Base configuration for a queue handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub region: Option<String>,
    /// Named profile in the shared credentials file
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Endpoint override, e.g. a local emulator
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive: bool,
    #[serde(default)]
    pub queue_url: Option<String>,
    #[serde(default)]
    pub queue_name: Option<String>,
    /// Queue attributes used when creating the queue
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
    #[serde(default)]
    pub receive: ReceiveOptions,
    #[serde(default)]
    pub send: SendOptions,
}

fn default_keep_alive() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            credentials: None,
            endpoint: None,
            keep_alive: default_keep_alive(),
            queue_url: None,
            queue_name: None,
            attributes: None,
            receive: ReceiveOptions::default(),
            send: SendOptions::default(),
        }
    }
}

impl QueueConfig {
    /// Load configuration from `SQS_*` environment variables.
    ///
    /// Top-level fields map directly (`SQS_QUEUE_URL`, `SQS_REGION`,
    /// `SQS_KEEP_ALIVE`); nested fields use a double underscore
    /// (`SQS_RECEIVE__WAIT_TIME_SECONDS`).
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_env_source(None)
    }

    pub(crate) fn from_env_source(
        source: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(source);

        config::Config::builder()
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize::<QueueConfig>())
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.queue_url = Some(queue_url.into());
        self
    }

    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    pub fn with_receive(mut self, receive: ReceiveOptions) -> Self {
        self.receive = receive;
        self
    }

    pub fn with_send(mut self, send: SendOptions) -> Self {
        self.send = send;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
