#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use accord_kernel_contracts::consent::{
    AnalysisWrite, ConsentSession, QrToken, SessionId, StatusWrite, VerificationWrite,
};
use accord_kernel_contracts::identity::{BillingWrite, UserAccount, UserId};
use accord_kernel_contracts::media::{TranscriptRecord, VideoAsset, VideoAssetId};
use accord_kernel_contracts::{ContractViolation, UnixTimeMs, Validate};

use crate::repo::{ConsentSessionRepo, RetentionSweepRepo, UserAccountRepo, VideoAssetRepo};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    DuplicateKey { table: &'static str, key: String },
    ForeignKeyViolation { table: &'static str, key: String },
    NotFound { table: &'static str, key: String },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

/// In-memory entity store: one `BTreeMap` per table plus a unique
/// qr-token index. Deterministic iteration keeps the sweep queries and
/// tests stable. Mutations are atomic per row; there are no multi-row
/// transactions, matching the storage model the wirings are written for.
#[derive(Debug, Default)]
pub struct ConsentStore {
    users: BTreeMap<UserId, UserAccount>,
    sessions: BTreeMap<SessionId, ConsentSession>,
    videos: BTreeMap<VideoAssetId, VideoAsset>,
    session_by_qr: BTreeMap<QrToken, SessionId>,
}

impl ConsentStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    fn session_mut(&mut self, id: &SessionId) -> Result<&mut ConsentSession, StorageError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound {
                table: "consent_sessions",
                key: id.as_str().to_string(),
            })
    }

    fn require_video(&self, id: &VideoAssetId) -> Result<(), StorageError> {
        if self.videos.contains_key(id) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation {
                table: "video_assets",
                key: id.as_str().to_string(),
            })
        }
    }
}

impl UserAccountRepo for ConsentStore {
    fn insert_user_row(&mut self, record: UserAccount) -> Result<(), StorageError> {
        record.validate()?;
        if self.users.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                table: "users",
                key: record.id.as_str().to_string(),
            });
        }
        self.users.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_user_row(&self, user_id: &UserId) -> Result<&UserAccount, StorageError> {
        self.users.get(user_id).ok_or_else(|| StorageError::NotFound {
            table: "users",
            key: user_id.as_str().to_string(),
        })
    }

    fn apply_billing_write(
        &mut self,
        user_id: &UserId,
        write: BillingWrite,
    ) -> Result<(), StorageError> {
        write.validate()?;
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| StorageError::NotFound {
                table: "users",
                key: user_id.as_str().to_string(),
            })?;
        user.subscription_status = write.subscription_status;
        user.subscription_end_at = write.subscription_end_at;
        user.account_deletion_at = write.account_deletion_at;
        Ok(())
    }

    fn delete_user_row(&mut self, user_id: &UserId) -> Result<(), StorageError> {
        self.users
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                table: "users",
                key: user_id.as_str().to_string(),
            })
    }

    fn user_rows(&self) -> &BTreeMap<UserId, UserAccount> {
        &self.users
    }
}

impl ConsentSessionRepo for ConsentStore {
    fn insert_session_row(&mut self, record: ConsentSession) -> Result<(), StorageError> {
        record.validate()?;
        if !self.users.contains_key(&record.initiator_user_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "users",
                key: record.initiator_user_id.as_str().to_string(),
            });
        }
        if self.sessions.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                table: "consent_sessions",
                key: record.id.as_str().to_string(),
            });
        }
        if self.session_by_qr.contains_key(&record.qr_code_id) {
            return Err(StorageError::DuplicateKey {
                table: "consent_sessions.qr_code_id",
                key: record.qr_code_id.as_str().to_string(),
            });
        }
        self.session_by_qr
            .insert(record.qr_code_id.clone(), record.id.clone());
        self.sessions.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_session_row(&self, id: &SessionId) -> Result<&ConsentSession, StorageError> {
        self.sessions.get(id).ok_or_else(|| StorageError::NotFound {
            table: "consent_sessions",
            key: id.as_str().to_string(),
        })
    }

    fn get_session_row_by_qr_token(
        &self,
        token: &QrToken,
    ) -> Result<&ConsentSession, StorageError> {
        let id = self
            .session_by_qr
            .get(token)
            .ok_or_else(|| StorageError::NotFound {
                table: "consent_sessions.qr_code_id",
                key: token.as_str().to_string(),
            })?;
        self.get_session_row(id)
    }

    fn set_video_reference(
        &mut self,
        id: &SessionId,
        video_asset_id: &VideoAssetId,
    ) -> Result<(), StorageError> {
        self.require_video(video_asset_id)?;
        let session = self.session_mut(id)?;
        session.video_asset_id = Some(video_asset_id.clone());
        Ok(())
    }

    fn set_session_status(
        &mut self,
        id: &SessionId,
        write: StatusWrite,
    ) -> Result<(), StorageError> {
        if let Some(video_asset_id) = &write.video_asset_id {
            self.require_video(video_asset_id)?;
        }
        let session = self.session_mut(id)?;
        session.consent_status = write.consent_status;
        if write.video_asset_id.is_some() {
            session.video_asset_id = write.video_asset_id;
        }
        if write.consent_granted_at.is_some() {
            session.consent_granted_at = write.consent_granted_at;
        }
        if write.consent_revoked_at.is_some() {
            session.consent_revoked_at = write.consent_revoked_at;
        }
        Ok(())
    }

    fn set_ai_decision(&mut self, id: &SessionId, write: AnalysisWrite) -> Result<(), StorageError> {
        let session = self.session_mut(id)?;
        session.ai_analysis_result = Some(write.ai_analysis_result);
        Ok(())
    }

    fn set_verification(
        &mut self,
        id: &SessionId,
        write: VerificationWrite,
    ) -> Result<(), StorageError> {
        write.validate()?;
        let session = self.session_mut(id)?;
        session.button_choice = Some(write.button_choice);
        session.verification_status = write.verification_status;
        session.has_audio_mismatch = write.has_audio_mismatch;
        session.verified_at = Some(write.verified_at);
        Ok(())
    }

    fn set_retention_exempt(&mut self, id: &SessionId, exempt: bool) -> Result<(), StorageError> {
        let session = self.session_mut(id)?;
        session.retention_exempt = exempt;
        Ok(())
    }

    fn delete_session_row(&mut self, id: &SessionId) -> Result<(), StorageError> {
        let session = self.sessions.remove(id).ok_or_else(|| StorageError::NotFound {
            table: "consent_sessions",
            key: id.as_str().to_string(),
        })?;
        self.session_by_qr.remove(&session.qr_code_id);
        Ok(())
    }

    fn session_rows(&self) -> &BTreeMap<SessionId, ConsentSession> {
        &self.sessions
    }
}

impl VideoAssetRepo for ConsentStore {
    fn insert_video_row(&mut self, record: VideoAsset) -> Result<(), StorageError> {
        record.validate()?;
        if self.videos.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey {
                table: "video_assets",
                key: record.id.as_str().to_string(),
            });
        }
        self.videos.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_video_row(&self, id: &VideoAssetId) -> Result<&VideoAsset, StorageError> {
        self.videos.get(id).ok_or_else(|| StorageError::NotFound {
            table: "video_assets",
            key: id.as_str().to_string(),
        })
    }

    fn set_transcript(
        &mut self,
        id: &VideoAssetId,
        transcript: TranscriptRecord,
    ) -> Result<(), StorageError> {
        transcript.validate()?;
        let video = self.videos.get_mut(id).ok_or_else(|| StorageError::NotFound {
            table: "video_assets",
            key: id.as_str().to_string(),
        })?;
        // Whole-record replacement: text and confidence land together or
        // not at all.
        video.transcript = Some(transcript);
        Ok(())
    }

    fn delete_video_row(&mut self, id: &VideoAssetId) -> Result<(), StorageError> {
        self.videos
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                table: "video_assets",
                key: id.as_str().to_string(),
            })
    }
}

impl RetentionSweepRepo for ConsentStore {
    fn sessions_past_retention(&self, now: UnixTimeMs) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| !s.retention_exempt && now >= s.retention_until)
            .map(|s| s.id.clone())
            .collect()
    }

    fn users_past_deletion_deadline(&self, now: UnixTimeMs) -> Vec<UserId> {
        self.users
            .values()
            .filter(|u| matches!(u.account_deletion_at, Some(deadline) if deadline <= now))
            .map(|u| u.id.clone())
            .collect()
    }

    fn sessions_owned_by(&self, user_id: &UserId) -> Vec<SessionId> {
        self.sessions
            .values()
            .filter(|s| &s.initiator_user_id == user_id)
            .map(|s| s.id.clone())
            .collect()
    }
}
