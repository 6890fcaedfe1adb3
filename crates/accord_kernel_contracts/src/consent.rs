#![forbid(unsafe_code)]

use crate::identity::UserId;
use crate::media::VideoAssetId;
use crate::oracle::AiDecision;
use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const CONSENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const DEFAULT_DELETE_AFTER_DAYS: u16 = 90;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "session_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "session_id",
                reason: "must be <= 64 chars",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque recipient-correlation token. Public, unguessable, and carries no
/// initiator identity material.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QrToken(String);

impl QrToken {
    pub fn new(token: impl Into<String>) -> Result<Self, ContractViolation> {
        let token = token.into();
        if token.len() < 16 {
            return Err(ContractViolation::InvalidValue {
                field: "qr_token",
                reason: "must be >= 16 chars",
            });
        }
        if token.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "qr_token",
                reason: "must be <= 64 chars",
            });
        }
        if token.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "qr_token",
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsentStatus {
    Pending,
    Granted,
    Denied,
    Revoked,
}

impl ConsentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentStatus::Pending => "pending",
            ConsentStatus::Granted => "granted",
            ConsentStatus::Denied => "denied",
            ConsentStatus::Revoked => "revoked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationStatus {
    Pending,
    Verified,
    Mismatch,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Mismatch => "mismatch",
        }
    }
}

/// The recipient's explicit on-screen choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonChoice {
    Granted,
    Denied,
}

impl ButtonChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonChoice::Granted => "granted",
            ButtonChoice::Denied => "denied",
        }
    }

    pub fn as_consent_status(self) -> ConsentStatus {
        match self {
            ButtonChoice::Granted => ConsentStatus::Granted,
            ButtonChoice::Denied => ConsentStatus::Denied,
        }
    }
}

/// Descriptive fields for the responding party. Free text supplied by the
/// initiator; never used for authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantProfile {
    pub display_name: String,
    pub contact_hint: Option<String>,
}

impl ParticipantProfile {
    pub fn v1(
        display_name: String,
        contact_hint: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let out = Self {
            display_name,
            contact_hint,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Validate for ParticipantProfile {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.display_name.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "participant.display_name",
                reason: "must not be empty",
            });
        }
        if self.display_name.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "participant.display_name",
                reason: "must be <= 256 chars",
            });
        }
        if let Some(hint) = &self.contact_hint {
            if hint.len() > 256 {
                return Err(ContractViolation::InvalidValue {
                    field: "participant.contact_hint",
                    reason: "must be <= 256 chars",
                });
            }
        }
        Ok(())
    }
}

/// One consent interaction between an initiator and a recipient.
///
/// `retention_until` is derived exactly once, at construction, and is never
/// recomputed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsentSession {
    pub schema_version: SchemaVersion,
    pub id: SessionId,
    pub initiator_user_id: UserId,
    pub participant: ParticipantProfile,
    pub consent_status: ConsentStatus,
    pub video_asset_id: Option<VideoAssetId>,
    pub qr_code_id: QrToken,
    pub delete_after_days: u16,
    pub created_at: UnixTimeMs,
    pub retention_until: UnixTimeMs,
    pub retention_exempt: bool,
    pub ai_analysis_result: Option<AiDecision>,
    pub button_choice: Option<ButtonChoice>,
    pub has_audio_mismatch: bool,
    pub verification_status: VerificationStatus,
    pub verified_at: Option<UnixTimeMs>,
    pub consent_granted_at: Option<UnixTimeMs>,
    pub consent_revoked_at: Option<UnixTimeMs>,
}

impl ConsentSession {
    pub fn v1(
        id: SessionId,
        initiator_user_id: UserId,
        participant: ParticipantProfile,
        qr_code_id: QrToken,
        delete_after_days: u16,
        created_at: UnixTimeMs,
    ) -> Result<Self, ContractViolation> {
        if delete_after_days == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "consent_session.delete_after_days",
                reason: "must be >= 1",
            });
        }
        let out = Self {
            schema_version: CONSENT_CONTRACT_VERSION,
            id,
            initiator_user_id,
            participant,
            consent_status: ConsentStatus::Pending,
            video_asset_id: None,
            qr_code_id,
            delete_after_days,
            created_at,
            retention_until: created_at.plus_days(delete_after_days),
            retention_exempt: false,
            ai_analysis_result: None,
            button_choice: None,
            has_audio_mismatch: false,
            verification_status: VerificationStatus::Pending,
            verified_at: None,
            consent_granted_at: None,
            consent_revoked_at: None,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Validate for ConsentSession {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != CONSENT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "consent_session.schema_version",
                reason: "must match CONSENT_CONTRACT_VERSION",
            });
        }
        self.participant.validate()?;
        if self.delete_after_days == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "consent_session.delete_after_days",
                reason: "must be >= 1",
            });
        }
        if self.retention_until != self.created_at.plus_days(self.delete_after_days) {
            return Err(ContractViolation::InvalidValue {
                field: "consent_session.retention_until",
                reason: "must equal created_at + delete_after_days",
            });
        }
        if self.consent_status == ConsentStatus::Granted && self.video_asset_id.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "consent_session.video_asset_id",
                reason: "granted status requires a video asset",
            });
        }
        if self.verification_status == VerificationStatus::Mismatch {
            if self.ai_analysis_result.is_none() || self.button_choice.is_none() {
                return Err(ContractViolation::InvalidValue {
                    field: "consent_session.verification_status",
                    reason: "mismatch requires both ai decision and button choice",
                });
            }
            if !self.has_audio_mismatch {
                return Err(ContractViolation::InvalidValue {
                    field: "consent_session.has_audio_mismatch",
                    reason: "mismatch status requires the mismatch flag",
                });
            }
        }
        Ok(())
    }
}

/// Output of a state-machine transition: the only fields that transition
/// may touch. `video_asset_id` and the timestamps are merged, not cleared,
/// when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusWrite {
    pub consent_status: ConsentStatus,
    pub video_asset_id: Option<VideoAssetId>,
    pub consent_granted_at: Option<UnixTimeMs>,
    pub consent_revoked_at: Option<UnixTimeMs>,
}

/// The analysis stage owns exactly one session field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWrite {
    pub ai_analysis_result: AiDecision,
}

/// The verify step owns the audit fields and nothing else. `v1` derives the
/// status from the mismatch flag; `validate` re-checks the pairing at the
/// storage boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationWrite {
    pub button_choice: ButtonChoice,
    pub verification_status: VerificationStatus,
    pub has_audio_mismatch: bool,
    pub verified_at: UnixTimeMs,
}

impl VerificationWrite {
    pub fn v1(
        button_choice: ButtonChoice,
        has_audio_mismatch: bool,
        verified_at: UnixTimeMs,
    ) -> Self {
        Self {
            button_choice,
            verification_status: if has_audio_mismatch {
                VerificationStatus::Mismatch
            } else {
                VerificationStatus::Verified
            },
            has_audio_mismatch,
            verified_at,
        }
    }
}

impl Validate for VerificationWrite {
    fn validate(&self) -> Result<(), ContractViolation> {
        match (self.verification_status, self.has_audio_mismatch) {
            (VerificationStatus::Pending, _) => Err(ContractViolation::InvalidValue {
                field: "verification_write.verification_status",
                reason: "verify must resolve to verified or mismatch",
            }),
            (VerificationStatus::Mismatch, false) | (VerificationStatus::Verified, true) => {
                Err(ContractViolation::InvalidValue {
                    field: "verification_write.has_audio_mismatch",
                    reason: "flag must agree with verification_status",
                })
            }
            _ => Ok(()),
        }
    }
}
