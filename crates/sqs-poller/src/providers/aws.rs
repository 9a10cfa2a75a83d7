//! Amazon SQS provider over the HTTP Query API.
//!
//! Requests are form-encoded `POST`s against the regional endpoint (or an
//! endpoint override such as a local emulator), signed with AWS Signature
//! Version 4. Responses are XML and are parsed with `quick-xml`.
//!
//! ## Resolution
//!
//! - **Region**: config, then `AWS_REGION`, then `AWS_DEFAULT_REGION`.
//! - **Credentials**: explicit credentials, then the named profile from the
//!   shared credentials file, then `AWS_ACCESS_KEY_ID` /
//!   `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`. Without credentials the
//!   provider still builds, but every call fails with an authentication error.
//! - **Endpoint**: override, else `https://sqs.{region}.amazonaws.com`.
//! - **Keep-alive**: when disabled, idle connections are not pooled.
//!
//! ## Example
//!
//! ```no_run
//! use sqs_poller::providers::SqsHttpProvider;
//! use sqs_poller::{Credentials, QueueConfig};
//!
//! # fn example() -> Result<(), sqs_poller::QueueError> {
//! let config = QueueConfig::default()
//!     .with_region("us-east-1")
//!     .with_endpoint("http://localhost:4566")
//!     .with_credentials(Credentials::new("test", "test"));
//!
//! let provider = SqsHttpProvider::from_config(&config)?;
//! # Ok(())
//! # }
//! ```

use crate::client::*;
use crate::config::{Credentials, QueueConfig};
use crate::error::{ConfigurationError, QueueError, SerializationError};
use crate::message::{Message, MessageAttributeValue};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use config::Source;
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

/// SQS Query API version
pub const API_VERSION: &str = "2012-11-05";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Upper bound for one HTTP exchange; must exceed the 20 second long poll
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Error Types
// ============================================================================

/// AWS SQS specific errors
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("SQS service error: {code}: {message}")]
    ServiceError { code: String, message: String },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),

    #[error("Invalid message attribute: {0}")]
    InvalidAttribute(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AwsError {
    /// Map AWS error to QueueError
    pub fn to_queue_error(self) -> QueueError {
        match self {
            Self::Authentication(msg) => QueueError::AuthenticationFailed { message: msg },
            Self::NetworkError(msg) => QueueError::ConnectionFailed { message: msg },
            Self::ServiceError { code, message } => QueueError::Provider { code, message },
            Self::QueueNotFound(msg) => QueueError::QueueNotFound { message: msg },
            Self::InvalidReceipt(msg) => QueueError::MessageNotFound { message: msg },
            Self::InvalidAttribute(key) => {
                QueueError::Serialization(SerializationError::InvalidAttribute { key })
            }
            Self::SerializationError(msg) => {
                QueueError::Serialization(SerializationError::Xml { message: msg })
            }
        }
    }
}

impl From<AwsError> for QueueError {
    fn from(error: AwsError) -> Self {
        error.to_queue_error()
    }
}

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone)]
struct AwsV4Signer {
    credentials: Credentials,
    region: String,
    service: String,
}

impl AwsV4Signer {
    fn new(credentials: Credentials, region: String) -> Self {
        Self {
            credentials,
            region,
            service: "sqs".to_string(),
        }
    }

    /// Sign a form-encoded request with an empty query string.
    ///
    /// Returns the headers to add to the request: `Authorization`,
    /// `x-amz-date` and, for temporary credentials, `x-amz-security-token`.
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        // Canonical headers (must be sorted)
        let mut canonical_headers = vec![
            ("content-type", FORM_CONTENT_TYPE.to_string()),
            ("host", host.to_string()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            canonical_headers.push(("x-amz-security-token", token.clone()));
        }

        let signed_headers = canonical_headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers = canonical_headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect::<String>();

        let payload_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, "", canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = format!("{:x}", Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp);

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm,
            self.credentials.access_key_id,
            credential_scope,
            signed_headers,
            signature
        );

        let mut headers = vec![
            ("Authorization".to_string(), authorization_header),
            ("x-amz-date".to_string(), amz_date),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        headers
    }

    /// Derive the signing key through the HMAC chain and sign
    fn calculate_signature(&self, string_to_sign: &str, date_stamp: &str) -> String {
        let k_secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = self.hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
        let k_region = self.hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = self.hmac_sha256(&k_region, self.service.as_bytes());
        let k_signing = self.hmac_sha256(&k_service, b"aws4_request");
        let signature = self.hmac_sha256(&k_signing, string_to_sign.as_bytes());

        hex::encode(signature)
    }

    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

// ============================================================================
// Region and credential resolution
// ============================================================================

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn resolve_region(config: &QueueConfig) -> Result<String, ConfigurationError> {
    config
        .region
        .clone()
        .or_else(|| env_var("AWS_REGION"))
        .or_else(|| env_var("AWS_DEFAULT_REGION"))
        .ok_or_else(|| ConfigurationError::Missing {
            key: "region".to_string(),
        })
}

/// Location of the shared credentials file
pub fn shared_credentials_path() -> Option<PathBuf> {
    env_var("AWS_SHARED_CREDENTIALS_FILE")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".aws").join("credentials")))
}

/// Read one profile from an INI shared credentials file
pub fn load_profile_credentials(
    path: &Path,
    profile: &str,
) -> Result<Credentials, ConfigurationError> {
    // Sections are matched by raw name, not as config paths
    let mut sections = config::File::from(path)
        .format(config::FileFormat::Ini)
        .collect()
        .map_err(|e| ConfigurationError::Parsing {
            message: format!("{}: {}", path.display(), e),
        })?;

    let missing = |name: &str| ConfigurationError::Missing {
        key: format!("profile '{}' {}", profile, name),
    };

    let mut section = sections
        .remove(profile)
        .and_then(|value| value.into_table().ok())
        .ok_or_else(|| missing("section"))?;
    let mut take = |name: &str| {
        section
            .remove(name)
            .and_then(|value| value.into_string().ok())
    };

    Ok(Credentials {
        access_key_id: take("aws_access_key_id").ok_or_else(|| missing("aws_access_key_id"))?,
        secret_access_key: take("aws_secret_access_key")
            .ok_or_else(|| missing("aws_secret_access_key"))?,
        session_token: take("aws_session_token"),
    })
}

fn resolve_credentials(config: &QueueConfig) -> Result<Option<Credentials>, ConfigurationError> {
    if let Some(credentials) = &config.credentials {
        return Ok(Some(credentials.clone()));
    }

    if let Some(profile) = &config.profile {
        let path = shared_credentials_path().ok_or_else(|| ConfigurationError::Missing {
            key: "shared credentials file".to_string(),
        })?;
        return load_profile_credentials(&path, profile).map(Some);
    }

    Ok(match (
        env_var("AWS_ACCESS_KEY_ID"),
        env_var("AWS_SECRET_ACCESS_KEY"),
    ) {
        (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
            access_key_id,
            secret_access_key,
            session_token: env_var("AWS_SESSION_TOKEN"),
        }),
        _ => None,
    })
}

// ============================================================================
// AWS SQS Provider
// ============================================================================

/// SQS provider speaking the Query API over `reqwest`.
///
/// The underlying `reqwest::Client` is the connection pool; the provider holds
/// no other mutable state and can be shared freely behind an `Arc`.
pub struct SqsHttpProvider {
    http_client: HttpClient,
    signer: Option<AwsV4Signer>,
    endpoint: Url,
    host: String,
    region: String,
}

impl SqsHttpProvider {
    /// Build a provider from the region, credential, endpoint and keep-alive
    /// settings of `config`.
    pub fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
        let region = resolve_region(config)?;
        let credentials = resolve_credentials(config)?;

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://sqs.{}.amazonaws.com", region));
        let endpoint = Url::parse(&endpoint).map_err(|e| ConfigurationError::Invalid {
            message: format!("endpoint '{}': {}", endpoint, e),
        })?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ConfigurationError::Invalid {
                    message: format!("endpoint '{}' has no host", endpoint),
                }
                .into())
            }
        };

        let mut builder = HttpClient::builder().timeout(HTTP_TIMEOUT);
        if !config.keep_alive {
            builder = builder.pool_max_idle_per_host(0);
        }
        let http_client = builder
            .build()
            .map_err(|e| AwsError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            region = %region,
            endpoint = %endpoint,
            keep_alive = config.keep_alive,
            has_credentials = credentials.is_some(),
            "SQS provider configured"
        );

        Ok(Self {
            http_client,
            signer: credentials.map(|c| AwsV4Signer::new(c, region.clone())),
            endpoint,
            host,
            region,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// POST an action to the endpoint and parse the XML reply
    async fn make_request(&self, params: Vec<(String, String)>) -> Result<XmlNode, AwsError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AwsError::Authentication("No credentials configured".to_string()))?;

        let body = encode_form(&params);
        let timestamp = Utc::now();
        let auth_headers =
            signer.sign_request("POST", &self.host, self.endpoint.path(), &body, &timestamp);

        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body);
        for (key, value) in auth_headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AwsError::NetworkError(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                AwsError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AwsError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AwsError::NetworkError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(parse_error_response(&response_body, status.as_u16()));
        }

        parse_xml(&response_body)
    }
}

impl fmt::Debug for SqsHttpProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsHttpProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("signer", &self.signer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl QueueProvider for SqsHttpProvider {
    async fn create_queue(
        &self,
        request: CreateQueueRequest,
    ) -> Result<CreateQueueOutput, QueueError> {
        let response = self.make_request(create_queue_params(&request)).await?;
        Ok(parse_create_queue_response(&response)?)
    }

    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError> {
        let response = self.make_request(receive_message_params(&request)).await?;
        Ok(parse_receive_message_response(&response)?)
    }

    async fn delete_message(&self, request: DeleteMessageRequest) -> Result<(), QueueError> {
        self.make_request(delete_message_params(&request)).await?;
        Ok(())
    }

    async fn delete_message_batch(
        &self,
        request: DeleteMessageBatchRequest,
    ) -> Result<DeleteMessageBatchOutput, QueueError> {
        let response = self
            .make_request(delete_message_batch_params(&request))
            .await?;
        Ok(parse_delete_message_batch_response(&response))
    }

    async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError> {
        let response = self.make_request(send_message_params(&request)).await?;
        Ok(parse_send_message_response(&response)?)
    }

    async fn send_message_batch(
        &self,
        request: SendMessageBatchRequest,
    ) -> Result<SendMessageBatchOutput, QueueError> {
        let response = self
            .make_request(send_message_batch_params(&request))
            .await?;
        Ok(parse_send_message_batch_response(&response))
    }
}

// ============================================================================
// Request encoding
// ============================================================================

fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn action(name: &str) -> Vec<(String, String)> {
    vec![
        ("Action".to_string(), name.to_string()),
        ("Version".to_string(), API_VERSION.to_string()),
    ]
}

fn push(params: &mut Vec<(String, String)>, key: impl Into<String>, value: impl ToString) {
    params.push((key.into(), value.to_string()));
}

fn push_opt<T: ToString>(params: &mut Vec<(String, String)>, key: String, value: Option<&T>) {
    if let Some(value) = value {
        push(params, key, value.to_string());
    }
}

fn push_list(params: &mut Vec<(String, String)>, key: &str, values: Option<&Vec<String>>) {
    for (i, value) in values.into_iter().flatten().enumerate() {
        push(params, format!("{}.{}", key, i + 1), value);
    }
}

/// Encode `Prefix.N.Name` / `Prefix.N.Value.*` pairs in name order
fn push_message_attributes(
    params: &mut Vec<(String, String)>,
    prefix: &str,
    attributes: Option<&HashMap<String, MessageAttributeValue>>,
) {
    let Some(attributes) = attributes else {
        return;
    };
    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();

    for (i, name) in names.into_iter().enumerate() {
        let value = &attributes[name];
        let key = format!("{}.{}", prefix, i + 1);
        push(params, format!("{}.Name", key), name);
        push(params, format!("{}.Value.DataType", key), &value.data_type);
        if let Some(text) = &value.string_value {
            push(params, format!("{}.Value.StringValue", key), text);
        }
        if let Some(bytes) = &value.binary_value {
            push(params, format!("{}.Value.BinaryValue", key), STANDARD.encode(bytes));
        }
    }
}

fn create_queue_params(request: &CreateQueueRequest) -> Vec<(String, String)> {
    let mut params = action("CreateQueue");
    push(&mut params, "QueueName", &request.queue_name);

    if let Some(attributes) = &request.attributes {
        let mut names: Vec<&String> = attributes.keys().collect();
        names.sort();
        for (i, name) in names.into_iter().enumerate() {
            push(&mut params, format!("Attribute.{}.Name", i + 1), name);
            push(&mut params, format!("Attribute.{}.Value", i + 1), &attributes[name]);
        }
    }

    params
}

fn receive_message_params(request: &ReceiveMessageRequest) -> Vec<(String, String)> {
    let mut params = action("ReceiveMessage");
    push(&mut params, "QueueUrl", &request.queue_url);
    push_list(&mut params, "AttributeName", request.attribute_names.as_ref());
    push(
        &mut params,
        "MaxNumberOfMessages",
        request.max_number_of_messages,
    );
    push_list(
        &mut params,
        "MessageAttributeName",
        request.message_attribute_names.as_ref(),
    );
    push_opt(
        &mut params,
        "VisibilityTimeout".to_string(),
        request.visibility_timeout.as_ref(),
    );
    push(&mut params, "WaitTimeSeconds", request.wait_time_seconds);
    params
}

fn delete_message_params(request: &DeleteMessageRequest) -> Vec<(String, String)> {
    let mut params = action("DeleteMessage");
    push(&mut params, "QueueUrl", &request.queue_url);
    push(&mut params, "ReceiptHandle", &request.receipt_handle);
    params
}

fn delete_message_batch_params(request: &DeleteMessageBatchRequest) -> Vec<(String, String)> {
    let mut params = action("DeleteMessageBatch");
    push(&mut params, "QueueUrl", &request.queue_url);
    for (i, entry) in request.entries.iter().enumerate() {
        let key = format!("DeleteMessageBatchRequestEntry.{}", i + 1);
        push(&mut params, format!("{}.Id", key), &entry.id);
        push(
            &mut params,
            format!("{}.ReceiptHandle", key),
            &entry.receipt_handle,
        );
    }
    params
}

fn send_message_params(request: &SendMessageRequest) -> Vec<(String, String)> {
    let mut params = action("SendMessage");
    push(&mut params, "QueueUrl", &request.queue_url);
    push(&mut params, "MessageBody", &request.message_body);
    push_opt(
        &mut params,
        "DelaySeconds".to_string(),
        request.delay_seconds.as_ref(),
    );
    push_message_attributes(
        &mut params,
        "MessageAttribute",
        request.message_attributes.as_ref(),
    );
    push_opt(
        &mut params,
        "MessageDeduplicationId".to_string(),
        request.message_deduplication_id.as_ref(),
    );
    push_opt(
        &mut params,
        "MessageGroupId".to_string(),
        request.message_group_id.as_ref(),
    );
    push_message_attributes(
        &mut params,
        "MessageSystemAttribute",
        request.message_system_attributes.as_ref(),
    );
    params
}

fn send_message_batch_params(request: &SendMessageBatchRequest) -> Vec<(String, String)> {
    let mut params = action("SendMessageBatch");
    push(&mut params, "QueueUrl", &request.queue_url);
    for (i, entry) in request.entries.iter().enumerate() {
        let key = format!("SendMessageBatchRequestEntry.{}", i + 1);
        push(&mut params, format!("{}.Id", key), &entry.id);
        push(&mut params, format!("{}.MessageBody", key), &entry.message_body);
        push_opt(
            &mut params,
            format!("{}.DelaySeconds", key),
            entry.delay_seconds.as_ref(),
        );
        push_message_attributes(
            &mut params,
            &format!("{}.MessageAttribute", key),
            entry.message_attributes.as_ref(),
        );
        push_opt(
            &mut params,
            format!("{}.MessageDeduplicationId", key),
            entry.message_deduplication_id.as_ref(),
        );
        push_opt(
            &mut params,
            format!("{}.MessageGroupId", key),
            entry.message_group_id.as_ref(),
        );
        push_message_attributes(
            &mut params,
            &format!("{}.MessageSystemAttribute", key),
            entry.message_system_attributes.as_ref(),
        );
    }
    params
}

// ============================================================================
// Response parsing
// ============================================================================

/// Minimal element tree of an XML response
#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|c| c.text.clone())
    }

    /// Depth-first search for the first element called `name`
    fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

fn parse_xml(xml: &str) -> Result<XmlNode, AwsError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    fn element_name(name: quick_xml::name::LocalName<'_>) -> String {
        String::from_utf8_lossy(name.as_ref()).into_owned()
    }

    // Text is not trimmed: message bodies may carry significant whitespace
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![XmlNode::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(XmlNode {
                name: element_name(e.local_name()),
                ..Default::default()
            }),
            Ok(Event::Empty(e)) => {
                let node = XmlNode {
                    name: element_name(e.local_name()),
                    ..Default::default()
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| {
                    AwsError::SerializationError(format!("Failed to unescape XML text: {}", e))
                })?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    if let Some(node) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(node);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AwsError::SerializationError(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    while stack.len() > 1 {
        if let Some(node) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
        }
    }

    stack
        .pop()
        .ok_or_else(|| AwsError::SerializationError("Empty XML document".to_string()))
}

/// Map an error response to [`AwsError`] by code and status
fn parse_error_response(xml: &str, status_code: u16) -> AwsError {
    let root = parse_xml(xml).unwrap_or_default();
    let error = root.find("Error");

    let code = error
        .and_then(|e| e.child_text("Code"))
        .unwrap_or_else(|| "Unknown".to_string());
    let message = error
        .and_then(|e| e.child_text("Message"))
        .unwrap_or_else(|| format!("HTTP status {}", status_code));

    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            AwsError::QueueNotFound(message)
        }
        "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "MissingAuthenticationToken"
        | "ExpiredToken" => AwsError::Authentication(format!("{}: {}", code, message)),
        "InvalidReceiptHandle" | "ReceiptHandleIsInvalid" => AwsError::InvalidReceipt(message),
        _ => AwsError::ServiceError { code, message },
    }
}

fn required_text(node: &XmlNode, name: &str) -> Result<String, AwsError> {
    node.find(name)
        .map(|n| n.text.clone())
        .ok_or_else(|| AwsError::SerializationError(format!("{} not found in response", name)))
}

fn request_id(root: &XmlNode) -> Option<String> {
    root.find("RequestId").map(|n| n.text.clone())
}

fn parse_create_queue_response(root: &XmlNode) -> Result<CreateQueueOutput, AwsError> {
    Ok(CreateQueueOutput {
        queue_url: required_text(root, "QueueUrl")?,
    })
}

fn parse_attribute_value(name: &str, node: &XmlNode) -> Result<MessageAttributeValue, AwsError> {
    let binary_value = match node.child_text("BinaryValue") {
        Some(encoded) => Some(STANDARD.decode(encoded.trim()).map_err(|e| {
            debug!(attribute = %name, error = %e, "Binary attribute is not valid base64");
            AwsError::InvalidAttribute(name.to_string())
        })?),
        None => None,
    };

    Ok(MessageAttributeValue {
        data_type: node.child_text("DataType").unwrap_or_default(),
        string_value: node.child_text("StringValue"),
        binary_value,
    })
}

fn parse_message(node: &XmlNode) -> Result<Message, AwsError> {
    let mut message = Message {
        message_id: node.child_text("MessageId").unwrap_or_default(),
        receipt_handle: node.child_text("ReceiptHandle").unwrap_or_default(),
        body: node.child_text("Body").unwrap_or_default(),
        md5_of_body: node.child_text("MD5OfBody"),
        ..Default::default()
    };

    for attribute in node.children_named("Attribute") {
        if let (Some(name), Some(value)) =
            (attribute.child_text("Name"), attribute.child_text("Value"))
        {
            message.attributes.insert(name, value);
        }
    }

    for attribute in node.children_named("MessageAttribute") {
        if let (Some(name), Some(value)) = (attribute.child_text("Name"), attribute.child("Value"))
        {
            let value = parse_attribute_value(&name, value)?;
            message.message_attributes.insert(name, value);
        }
    }

    Ok(message)
}

fn parse_receive_message_response(root: &XmlNode) -> Result<ReceiveMessageOutput, AwsError> {
    let messages = match root.find("ReceiveMessageResult") {
        Some(result) => result
            .children_named("Message")
            .map(parse_message)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ReceiveMessageOutput {
        messages: if messages.is_empty() {
            None
        } else {
            Some(messages)
        },
        request_id: request_id(root),
    })
}

fn parse_send_message_response(root: &XmlNode) -> Result<SendMessageOutput, AwsError> {
    Ok(SendMessageOutput {
        message_id: required_text(root, "MessageId")?,
        md5_of_message_body: root.find("MD5OfMessageBody").map(|n| n.text.clone()),
        sequence_number: root.find("SequenceNumber").map(|n| n.text.clone()),
    })
}

fn parse_batch_errors(result: Option<&XmlNode>) -> Vec<BatchResultError> {
    result
        .into_iter()
        .flat_map(|r| r.children_named("BatchResultErrorEntry"))
        .map(|entry| BatchResultError {
            id: entry.child_text("Id").unwrap_or_default(),
            code: entry.child_text("Code").unwrap_or_default(),
            message: entry.child_text("Message"),
            sender_fault: entry
                .child_text("SenderFault")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
        .collect()
}

fn parse_delete_message_batch_response(root: &XmlNode) -> DeleteMessageBatchOutput {
    let result = root.find("DeleteMessageBatchResult");

    DeleteMessageBatchOutput {
        successful: result
            .into_iter()
            .flat_map(|r| r.children_named("DeleteMessageBatchResultEntry"))
            .map(|entry| DeleteBatchResultEntry {
                id: entry.child_text("Id").unwrap_or_default(),
            })
            .collect(),
        failed: parse_batch_errors(result),
    }
}

fn parse_send_message_batch_response(root: &XmlNode) -> SendMessageBatchOutput {
    let result = root.find("SendMessageBatchResult");

    SendMessageBatchOutput {
        successful: result
            .into_iter()
            .flat_map(|r| r.children_named("SendMessageBatchResultEntry"))
            .map(|entry| SendBatchResultEntry {
                id: entry.child_text("Id").unwrap_or_default(),
                message_id: entry.child_text("MessageId").unwrap_or_default(),
                md5_of_message_body: entry.child_text("MD5OfMessageBody"),
                sequence_number: entry.child_text("SequenceNumber"),
            })
            .collect(),
        failed: parse_batch_errors(result),
    }
}
