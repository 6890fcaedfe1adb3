#![forbid(unsafe_code)]

use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const MEDIA_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoAssetId(String);

impl VideoAssetId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "video_asset_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "video_asset_id",
                reason: "must be <= 64 chars",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ContractViolation> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "storage_key",
                reason: "must not be empty",
            });
        }
        if key.len() > 512 {
            return Err(ContractViolation::InvalidValue {
                field: "storage_key",
                reason: "must be <= 512 chars",
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType(String);

impl MimeType {
    pub fn new(mime: impl Into<String>) -> Result<Self, ContractViolation> {
        let mime = mime.into();
        if mime.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "mime_type",
                reason: "must not be empty",
            });
        }
        if !mime.contains('/') {
            return Err(ContractViolation::InvalidValue {
                field: "mime_type",
                reason: "must be a type/subtype pair",
            });
        }
        if mime.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "mime_type",
                reason: "must be <= 128 chars",
            });
        }
        Ok(Self(mime))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Derived transcription output. Text and scaled confidence travel as one
/// value so a partial write is unrepresentable; a later pipeline run
/// replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRecord {
    pub text: String,
    pub confidence_pct: u8,
}

impl TranscriptRecord {
    pub fn v1(text: String, confidence_pct: u8) -> Result<Self, ContractViolation> {
        let out = Self {
            text,
            confidence_pct,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Validate for TranscriptRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.confidence_pct > 100 {
            return Err(ContractViolation::InvalidRange {
                field: "transcript_record.confidence_pct",
                min: 0.0,
                max: 100.0,
                got: f64::from(self.confidence_pct),
            });
        }
        if self.text.len() > 65_536 {
            return Err(ContractViolation::InvalidValue {
                field: "transcript_record.text",
                reason: "must be <= 65536 bytes",
            });
        }
        Ok(())
    }
}

/// Immutable upload metadata plus the mutable derived transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub schema_version: SchemaVersion,
    pub id: VideoAssetId,
    pub storage_key: StorageKey,
    pub mime_type: MimeType,
    pub size_bytes: u64,
    pub transcript: Option<TranscriptRecord>,
    pub created_at: UnixTimeMs,
}

impl VideoAsset {
    pub fn v1(
        id: VideoAssetId,
        storage_key: StorageKey,
        mime_type: MimeType,
        size_bytes: u64,
        created_at: UnixTimeMs,
    ) -> Result<Self, ContractViolation> {
        let out = Self {
            schema_version: MEDIA_CONTRACT_VERSION,
            id,
            storage_key,
            mime_type,
            size_bytes,
            transcript: None,
            created_at,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Validate for VideoAsset {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != MEDIA_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "video_asset.schema_version",
                reason: "must match MEDIA_CONTRACT_VERSION",
            });
        }
        if self.size_bytes == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "video_asset.size_bytes",
                reason: "must be > 0",
            });
        }
        if let Some(transcript) = &self.transcript {
            transcript.validate()?;
        }
        Ok(())
    }
}
