#![forbid(unsafe_code)]

use accord_kernel_contracts::consent::{ConsentSession, ConsentStatus, StatusWrite};
use accord_kernel_contracts::media::VideoAssetId;
use accord_kernel_contracts::UnixTimeMs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Entering `granted` with no video asset supplied and none on the session.
    MissingVideoAsset,
    /// The transition table refuses this pair.
    NotAllowed {
        from: ConsentStatus,
        to: ConsentStatus,
    },
}

/// Legal status transitions.
///
/// Every pair is currently allowed; re-requests after a denial create a new
/// session at the API layer rather than transitioning here. Tightening the
/// policy is a per-pair edit in this table.
pub fn transition_allowed(from: ConsentStatus, to: ConsentStatus) -> bool {
    use ConsentStatus::*;
    match (from, to) {
        (Pending, Pending) | (Pending, Granted) | (Pending, Denied) | (Pending, Revoked) => true,
        (Granted, Pending) | (Granted, Granted) | (Granted, Denied) | (Granted, Revoked) => true,
        (Denied, Pending) | (Denied, Granted) | (Denied, Denied) | (Denied, Revoked) => true,
        (Revoked, Pending) | (Revoked, Granted) | (Revoked, Denied) | (Revoked, Revoked) => true,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsentStateMachine;

impl ConsentStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Compute the status write for a transition. Touches only the fields a
    /// transition owns: status, video reference, and the two status
    /// timestamps. Verification fields belong to the verify step.
    pub fn transition(
        &self,
        session: &ConsentSession,
        new_status: ConsentStatus,
        video_asset_id: Option<VideoAssetId>,
        now: UnixTimeMs,
    ) -> Result<StatusWrite, TransitionError> {
        if !transition_allowed(session.consent_status, new_status) {
            return Err(TransitionError::NotAllowed {
                from: session.consent_status,
                to: new_status,
            });
        }

        let effective_video = video_asset_id.or_else(|| session.video_asset_id.clone());
        if new_status == ConsentStatus::Granted && effective_video.is_none() {
            return Err(TransitionError::MissingVideoAsset);
        }

        Ok(StatusWrite {
            consent_status: new_status,
            video_asset_id: effective_video,
            consent_granted_at: (new_status == ConsentStatus::Granted).then_some(now),
            consent_revoked_at: (new_status == ConsentStatus::Revoked).then_some(now),
        })
    }
}
