#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use accord_kernel_contracts::consent::{
    AnalysisWrite, ConsentSession, QrToken, SessionId, StatusWrite, VerificationWrite,
};
use accord_kernel_contracts::identity::{BillingWrite, UserAccount, UserId};
use accord_kernel_contracts::media::{TranscriptRecord, VideoAsset, VideoAssetId};
use accord_kernel_contracts::UnixTimeMs;

use crate::store::StorageError;

/// Typed repository interface for user-account rows.
pub trait UserAccountRepo {
    fn insert_user_row(&mut self, record: UserAccount) -> Result<(), StorageError>;
    fn get_user_row(&self, user_id: &UserId) -> Result<&UserAccount, StorageError>;
    fn apply_billing_write(
        &mut self,
        user_id: &UserId,
        write: BillingWrite,
    ) -> Result<(), StorageError>;
    fn delete_user_row(&mut self, user_id: &UserId) -> Result<(), StorageError>;
    fn user_rows(&self) -> &BTreeMap<UserId, UserAccount>;
}

/// Typed repository interface for consent-session rows.
///
/// Mutations are per-payload on purpose: each payload type carries exactly
/// the fields its owning operation may touch, so concurrent completion of
/// the pipeline and the verify step cannot clobber each other's fields.
pub trait ConsentSessionRepo {
    fn insert_session_row(&mut self, record: ConsentSession) -> Result<(), StorageError>;
    fn get_session_row(&self, id: &SessionId) -> Result<&ConsentSession, StorageError>;
    fn get_session_row_by_qr_token(&self, token: &QrToken)
        -> Result<&ConsentSession, StorageError>;
    fn set_video_reference(
        &mut self,
        id: &SessionId,
        video_asset_id: &VideoAssetId,
    ) -> Result<(), StorageError>;
    fn set_session_status(&mut self, id: &SessionId, write: StatusWrite)
        -> Result<(), StorageError>;
    fn set_ai_decision(&mut self, id: &SessionId, write: AnalysisWrite)
        -> Result<(), StorageError>;
    fn set_verification(
        &mut self,
        id: &SessionId,
        write: VerificationWrite,
    ) -> Result<(), StorageError>;
    fn set_retention_exempt(&mut self, id: &SessionId, exempt: bool) -> Result<(), StorageError>;
    fn delete_session_row(&mut self, id: &SessionId) -> Result<(), StorageError>;
    fn session_rows(&self) -> &BTreeMap<SessionId, ConsentSession>;
}

/// Typed repository interface for video-asset rows.
pub trait VideoAssetRepo {
    fn insert_video_row(&mut self, record: VideoAsset) -> Result<(), StorageError>;
    fn get_video_row(&self, id: &VideoAssetId) -> Result<&VideoAsset, StorageError>;
    fn set_transcript(
        &mut self,
        id: &VideoAssetId,
        transcript: TranscriptRecord,
    ) -> Result<(), StorageError>;
    fn delete_video_row(&mut self, id: &VideoAssetId) -> Result<(), StorageError>;
}

/// Deadline queries consumed by the two retention sweeps. Pure reads; the
/// sweeps do their own deletes row by row.
pub trait RetentionSweepRepo {
    fn sessions_past_retention(&self, now: UnixTimeMs) -> Vec<SessionId>;
    fn users_past_deletion_deadline(&self, now: UnixTimeMs) -> Vec<UserId>;
    fn sessions_owned_by(&self, user_id: &UserId) -> Vec<SessionId>;
}
