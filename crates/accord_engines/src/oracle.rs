#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use accord_kernel_contracts::media::MimeType;
use accord_kernel_contracts::oracle::{
    AiDecision, Confidence, OracleAnalysis, OracleTranscription,
};
use base64::Engine as _;
use serde_json::Value;

/// Failure of one oracle call. The detail string is safe to log: it never
/// carries media bytes, transcripts, or credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCallError {
    pub capability: &'static str,
    pub http_status: Option<u16>,
    pub error_kind: &'static str,
}

impl OracleCallError {
    fn new(capability: &'static str, error_kind: &'static str, http_status: Option<u16>) -> Self {
        Self {
            capability,
            http_status,
            error_kind,
        }
    }

    pub fn safe_detail(&self) -> String {
        match self.http_status {
            Some(status) => format!(
                "capability={} error={} status={}",
                self.capability, self.error_kind, status
            ),
            None => format!("capability={} error={}", self.capability, self.error_kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleProviderConfig {
    pub transcription_url: String,
    pub analysis_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub user_agent: String,
    pub timeout_ms: u32,
    pub transcription_fixture_json: Option<String>,
    pub analysis_fixture_json: Option<String>,
}

impl OracleProviderConfig {
    pub fn from_env() -> Self {
        Self {
            transcription_url: env::var("ACCORD_ORACLE_TRANSCRIBE_URL")
                .unwrap_or_else(|_| "https://api.oracle.accord.local/v1/transcribe".to_string()),
            analysis_url: env::var("ACCORD_ORACLE_ANALYZE_URL")
                .unwrap_or_else(|_| "https://api.oracle.accord.local/v1/analyze".to_string()),
            api_key: env::var("ACCORD_ORACLE_API_KEY").ok().and_then(trim_non_empty),
            model: env::var("ACCORD_ORACLE_MODEL")
                .unwrap_or_else(|_| "consent-analyst-1".to_string()),
            user_agent: env::var("ACCORD_ORACLE_USER_AGENT")
                .unwrap_or_else(|_| "accord-oracle/1.0".to_string()),
            timeout_ms: env::var("ACCORD_ORACLE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| (100..=120_000).contains(v))
                .unwrap_or(10_000),
            transcription_fixture_json: None,
            analysis_fixture_json: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleClient {
    config: OracleProviderConfig,
}

impl OracleClient {
    pub fn new(config: OracleProviderConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(OracleProviderConfig::from_env())
    }

    /// Transcription capability: `{transcript, confidence in [0,1]}`.
    pub fn transcribe(
        &self,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<OracleTranscription, OracleCallError> {
        let body = self.call_capability(
            "transcription",
            &self.config.transcription_url,
            self.config.transcription_fixture_json.as_deref(),
            media,
            mime_type,
        )?;

        let transcript = body
            .pointer("/transcript")
            .or_else(|| body.pointer("/text"))
            .and_then(Value::as_str)
            .ok_or_else(|| OracleCallError::new("transcription", "payload_invalid", None))?
            .to_string();
        let confidence = extract_confidence(&body)
            .ok_or_else(|| OracleCallError::new("transcription", "payload_invalid", None))?;

        OracleTranscription::v1(transcript, confidence)
            .map_err(|_| OracleCallError::new("transcription", "payload_invalid", None))
    }

    /// Analysis capability: `{decision, confidence, reasoning}`.
    pub fn analyze(
        &self,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<OracleAnalysis, OracleCallError> {
        let body = self.call_capability(
            "analysis",
            &self.config.analysis_url,
            self.config.analysis_fixture_json.as_deref(),
            media,
            mime_type,
        )?;

        let decision = body
            .pointer("/decision")
            .and_then(Value::as_str)
            .and_then(AiDecision::from_wire_str)
            .ok_or_else(|| OracleCallError::new("analysis", "payload_invalid", None))?;
        let confidence = extract_confidence(&body)
            .ok_or_else(|| OracleCallError::new("analysis", "payload_invalid", None))?;
        let reasoning = body
            .pointer("/reasoning")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        OracleAnalysis::v1(decision, confidence, reasoning)
            .map_err(|_| OracleCallError::new("analysis", "payload_invalid", None))
    }

    fn call_capability(
        &self,
        capability: &'static str,
        endpoint: &str,
        fixture_json: Option<&str>,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<Value, OracleCallError> {
        if let Some(fixture) = fixture_json {
            return serde_json::from_str(fixture)
                .map_err(|_| OracleCallError::new(capability, "json_parse", None));
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| OracleCallError::new(capability, "missing_config", None))?;

        let payload = serde_json::json!({
            "model": self.config.model,
            "mime_type": mime_type.as_str(),
            "media_b64": base64::engine::general_purpose::STANDARD.encode(media),
        });

        let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
            .map_err(|_| OracleCallError::new(capability, "config_invalid", None))?;
        let response = agent
            .post(endpoint)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {api_key}"))
            .set("Accept", "application/json")
            .send_json(payload)
            .map_err(|e| call_error_from_ureq(capability, e))?;
        serde_json::from_reader(response.into_reader())
            .map_err(|_| OracleCallError::new(capability, "json_parse", None))
    }
}

fn extract_confidence(body: &Value) -> Option<Confidence> {
    let raw = body.pointer("/confidence").and_then(Value::as_f64)?;
    Confidence::new(raw as f32).ok()
}

fn build_http_agent(timeout_ms: u32, user_agent: &str) -> Result<ureq::Agent, String> {
    if timeout_ms == 0 {
        return Err("timeout must be > 0".to_string());
    }
    let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
    Ok(ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(user_agent)
        .build())
}

fn call_error_from_ureq(capability: &'static str, err: ureq::Error) -> OracleCallError {
    match err {
        ureq::Error::Status(status, _) => {
            OracleCallError::new(capability, "http_non_200", Some(status))
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            OracleCallError::new(capability, classify_transport_error_kind(&combined), None)
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

fn trim_non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
