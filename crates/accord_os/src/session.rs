#![forbid(unsafe_code)]

use accord_engines::consent_state::{ConsentStateMachine, TransitionError};
use accord_kernel_contracts::consent::{
    ConsentSession, ConsentStatus, ParticipantProfile, QrToken, SessionId, VerificationStatus,
};
use accord_kernel_contracts::identity::UserId;
use accord_kernel_contracts::{ContractViolation, UnixTimeMs};
use accord_storage::repo::{ConsentSessionRepo, UserAccountRepo};
use accord_storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWiringConfig {
    pub default_delete_after_days: u16,
}

impl SessionWiringConfig {
    pub fn mvp_v1() -> Self {
        Self {
            default_delete_after_days: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCreateError {
    Contract(ContractViolation),
    Storage(StorageError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevokeError {
    Transition(TransitionError),
    Storage(StorageError),
}

impl From<TransitionError> for RevokeError {
    fn from(e: TransitionError) -> Self {
        RevokeError::Transition(e)
    }
}

impl From<StorageError> for RevokeError {
    fn from(e: StorageError) -> Self {
        RevokeError::Storage(e)
    }
}

impl From<ContractViolation> for SessionCreateError {
    fn from(v: ContractViolation) -> Self {
        SessionCreateError::Contract(v)
    }
}

impl From<StorageError> for SessionCreateError {
    fn from(e: StorageError) -> Self {
        SessionCreateError::Storage(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionCreateInput {
    pub initiator_user_id: UserId,
    pub participant: ParticipantProfile,
    pub delete_after_days: Option<u16>,
}

/// What the recipient is allowed to see when they follow the QR link.
/// Deliberately omits the initiator's identity fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientSessionView {
    pub qr_code_id: QrToken,
    pub participant_display_name: String,
    pub consent_status: ConsentStatus,
    pub verification_status: VerificationStatus,
    pub has_video: bool,
}

#[derive(Debug, Clone)]
pub struct SessionWiring {
    config: SessionWiringConfig,
}

impl SessionWiring {
    pub fn new(config: SessionWiringConfig) -> Self {
        Self { config }
    }

    /// Create a pending session. `retention_until` is derived here, once;
    /// nothing downstream recomputes it.
    pub fn create_session<R>(
        &self,
        repo: &mut R,
        input: SessionCreateInput,
        session_id: SessionId,
        qr_token: QrToken,
        now: UnixTimeMs,
    ) -> Result<ConsentSession, SessionCreateError>
    where
        R: ConsentSessionRepo + UserAccountRepo,
    {
        repo.get_user_row(&input.initiator_user_id)?;

        let delete_after_days = input
            .delete_after_days
            .unwrap_or(self.config.default_delete_after_days);
        let session = ConsentSession::v1(
            session_id,
            input.initiator_user_id,
            input.participant,
            qr_token,
            delete_after_days,
            now,
        )?;
        repo.insert_session_row(session.clone())?;
        Ok(session)
    }

    /// Withdraw a previously recorded outcome. Stamps `consent_revoked_at`
    /// through the state machine; verification fields stay as audit record.
    pub fn revoke_session<R>(
        &self,
        repo: &mut R,
        session_id: &SessionId,
        now: UnixTimeMs,
    ) -> Result<ConsentStatus, RevokeError>
    where
        R: ConsentSessionRepo,
    {
        let session = repo.get_session_row(session_id)?.clone();
        let write =
            ConsentStateMachine::new().transition(&session, ConsentStatus::Revoked, None, now)?;
        repo.set_session_status(session_id, write)?;
        Ok(ConsentStatus::Revoked)
    }

    pub fn recipient_view<R>(
        &self,
        repo: &R,
        token: &QrToken,
    ) -> Result<RecipientSessionView, StorageError>
    where
        R: ConsentSessionRepo,
    {
        let session = repo.get_session_row_by_qr_token(token)?;
        Ok(RecipientSessionView {
            qr_code_id: session.qr_code_id.clone(),
            participant_display_name: session.participant.display_name.clone(),
            consent_status: session.consent_status,
            verification_status: session.verification_status,
            has_video: session.video_asset_id.is_some(),
        })
    }
}
