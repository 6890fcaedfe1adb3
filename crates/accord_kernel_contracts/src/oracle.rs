#![forbid(unsafe_code)]

use crate::{ContractViolation, SchemaVersion, Validate};

pub const ORACLE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Oracle-reported confidence, always in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confidence(pub f32);

impl Confidence {
    pub fn new(value: f32) -> Result<Self, ContractViolation> {
        let out = Self(value);
        out.validate()?;
        Ok(out)
    }
}

impl Validate for Confidence {
    fn validate(&self) -> Result<(), ContractViolation> {
        if !self.0.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "confidence",
            });
        }
        if !(0.0..=1.0).contains(&self.0) {
            return Err(ContractViolation::InvalidRange {
                field: "confidence",
                min: 0.0,
                max: 1.0,
                got: self.0 as f64,
            });
        }
        Ok(())
    }
}

/// Scale an oracle confidence to the persisted integer percentage.
///
/// Round-half-away-from-zero, then clamp to 0..=100. Stored values must be
/// reproducible across reimplementations, so the rounding lives here and
/// nowhere else.
pub fn scale_confidence(confidence: Confidence) -> u8 {
    let scaled = (confidence.0 * 100.0).round();
    if scaled <= 0.0 {
        0
    } else if scaled >= 100.0 {
        100
    } else {
        scaled as u8
    }
}

/// Decision emitted by the oracle's analysis capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiDecision {
    ConsentGranted,
    ConsentDenied,
    Unclear,
}

impl AiDecision {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            AiDecision::ConsentGranted => "CONSENT_GRANTED",
            AiDecision::ConsentDenied => "CONSENT_DENIED",
            AiDecision::Unclear => "UNCLEAR",
        }
    }

    pub fn from_wire_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CONSENT_GRANTED" => Some(AiDecision::ConsentGranted),
            "CONSENT_DENIED" => Some(AiDecision::ConsentDenied),
            "UNCLEAR" => Some(AiDecision::Unclear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleTranscription {
    pub schema_version: SchemaVersion,
    pub transcript: String,
    pub confidence: Confidence,
}

impl OracleTranscription {
    pub fn v1(transcript: String, confidence: Confidence) -> Result<Self, ContractViolation> {
        let out = Self {
            schema_version: ORACLE_CONTRACT_VERSION,
            transcript,
            confidence,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Validate for OracleTranscription {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ORACLE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_transcription.schema_version",
                reason: "must match ORACLE_CONTRACT_VERSION",
            });
        }
        if self.transcript.len() > 65_536 {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_transcription.transcript",
                reason: "must be <= 65536 bytes",
            });
        }
        self.confidence.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleAnalysis {
    pub schema_version: SchemaVersion,
    pub decision: AiDecision,
    pub confidence: Confidence,
    pub reasoning: String,
}

impl OracleAnalysis {
    pub fn v1(
        decision: AiDecision,
        confidence: Confidence,
        reasoning: String,
    ) -> Result<Self, ContractViolation> {
        let out = Self {
            schema_version: ORACLE_CONTRACT_VERSION,
            decision,
            confidence,
            reasoning,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Validate for OracleAnalysis {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ORACLE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_analysis.schema_version",
                reason: "must match ORACLE_CONTRACT_VERSION",
            });
        }
        if self.reasoning.len() > 16_384 {
            return Err(ContractViolation::InvalidValue {
                field: "oracle_analysis.reasoning",
                reason: "must be <= 16384 bytes",
            });
        }
        self.confidence.validate()
    }
}
