#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use accord_engines::consent_state::TransitionError;
use accord_engines::mismatch::MismatchConfig;
use accord_engines::oracle::OracleClient;
use accord_engines::retention::RetentionConfig;
use accord_engines::token::generate_qr_token;
use accord_kernel_contracts::consent::{
    ButtonChoice, ParticipantProfile, QrToken, SessionId,
};
use accord_kernel_contracts::identity::{BillingEvent, UserAccount, UserId};
use accord_kernel_contracts::media::{MimeType, VideoAsset, VideoAssetId};
use accord_kernel_contracts::{ContractViolation, UnixTimeMs};
use accord_os::pipeline::{PipelineConfig, PipelineError, VerificationPipeline};
use accord_os::retention::{BillingBridgeError, BillingBridgeWiring, RetentionSweepWiring};
use accord_os::session::{
    RevokeError, SessionCreateError, SessionCreateInput, SessionWiring, SessionWiringConfig,
};
use accord_os::verify::{VerifyError, VerifyWiring};
use accord_storage::media::{InMemoryMediaStore, MediaBlobStore, MediaStoreError};
use accord_storage::repo::{ConsentSessionRepo, UserAccountRepo, VideoAssetRepo};
use accord_storage::{ConsentStore, StorageError};
use base64::Engine as _;

const SIGNED_READ_URL_TTL_SECONDS: u32 = 300;

/// Adapter-level failure, mapped to an HTTP status by the binary.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterError {
    Invalid(String),
    NotFound(String),
    Conflict(String),
    /// Precondition not met yet; the client should retry later.
    NotReady(String),
    Internal(String),
}

impl From<StorageError> for AdapterError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { table, key } => {
                AdapterError::NotFound(format!("{table}: {key} not found"))
            }
            StorageError::DuplicateKey { table, key } => {
                AdapterError::Conflict(format!("{table}: {key} already exists"))
            }
            StorageError::ForeignKeyViolation { table, key } => {
                AdapterError::Invalid(format!("{table}: {key} does not resolve"))
            }
            StorageError::ContractViolation(v) => AdapterError::from(v),
        }
    }
}

impl From<ContractViolation> for AdapterError {
    fn from(v: ContractViolation) -> Self {
        AdapterError::Invalid(format!("{v:?}"))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterUserAdapterRequest {
    pub user_id: String,
    pub credential_hash: String,
    pub display_name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterUserAdapterResponse {
    pub user_id: String,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateSessionAdapterRequest {
    pub initiator_user_id: String,
    pub participant_display_name: String,
    pub participant_contact_hint: Option<String>,
    pub delete_after_days: Option<u16>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionAdapterResponse {
    pub session_id: String,
    pub qr_code_id: String,
    pub consent_status: String,
    pub verification_status: String,
    pub has_audio_mismatch: bool,
    pub ai_analysis_result: Option<String>,
    pub button_choice: Option<String>,
    pub video_asset_id: Option<String>,
    pub delete_after_days: u16,
    pub created_at_ms: u64,
    pub retention_until_ms: u64,
    pub retention_exempt: bool,
    pub verified_at_ms: Option<u64>,
    pub consent_granted_at_ms: Option<u64>,
    pub consent_revoked_at_ms: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecipientViewAdapterResponse {
    pub qr_code_id: String,
    pub participant_display_name: String,
    pub consent_status: String,
    pub verification_status: String,
    pub has_video: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadVideoAdapterRequest {
    pub media_b64: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadVideoAdapterResponse {
    pub video_asset_id: String,
    pub decision: String,
    pub transcript_confidence_pct: u8,
    pub transcription_degraded: bool,
    pub analysis_degraded: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VideoReadUrlAdapterResponse {
    pub video_asset_id: String,
    pub url: String,
    pub ttl_seconds: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VerifyAdapterRequest {
    pub button_choice: String,
    pub video_asset_id: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VerifyAdapterResponse {
    pub verification_status: String,
    pub has_audio_mismatch: bool,
    pub consent_status: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetentionExemptAdapterRequest {
    pub exempt: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BillingAdapterResponse {
    pub user_id: String,
    pub subscription_status: String,
    pub subscription_end_at_ms: Option<u64>,
    pub account_deletion_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SweepAdapterResponse {
    pub sessions_scanned: usize,
    pub users_scanned: usize,
    pub deleted_sessions: usize,
    pub deleted_videos: usize,
    pub deleted_users: usize,
    pub blob_failures: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub user_rows: usize,
    pub session_rows: usize,
}

pub struct AdapterRuntime {
    store: ConsentStore,
    media: InMemoryMediaStore,
    session_wiring: SessionWiring,
    pipeline: VerificationPipeline<OracleClient>,
    verify_wiring: VerifyWiring,
    sweeps: RetentionSweepWiring,
    billing: BillingBridgeWiring,
    next_row_seq: u64,
}

impl AdapterRuntime {
    pub fn default_from_env() -> Result<Self, String> {
        Ok(Self {
            store: ConsentStore::new_in_memory(),
            media: InMemoryMediaStore::new(),
            session_wiring: SessionWiring::new(SessionWiringConfig::mvp_v1()),
            pipeline: VerificationPipeline::new(PipelineConfig::mvp_v1(), OracleClient::from_env()),
            verify_wiring: VerifyWiring::new(MismatchConfig::mvp_v1()),
            sweeps: RetentionSweepWiring::new(),
            billing: BillingBridgeWiring::new(RetentionConfig::mvp_v1()),
            next_row_seq: 0,
        })
    }

    fn next_seq(&mut self) -> u64 {
        self.next_row_seq += 1;
        self.next_row_seq
    }

    pub fn register_user(
        &mut self,
        request: RegisterUserAdapterRequest,
    ) -> Result<RegisterUserAdapterResponse, AdapterError> {
        let now = now_unix_ms();
        let user = UserAccount::v1(
            UserId::new(request.user_id)?,
            request.credential_hash,
            request.display_name,
            now,
        )?;
        let user_id = user.id.as_str().to_string();
        self.store.insert_user_row(user)?;
        Ok(RegisterUserAdapterResponse {
            user_id,
            created_at_ms: now.0,
        })
    }

    pub fn create_session(
        &mut self,
        request: CreateSessionAdapterRequest,
    ) -> Result<SessionAdapterResponse, AdapterError> {
        let input = SessionCreateInput {
            initiator_user_id: UserId::new(request.initiator_user_id)?,
            participant: ParticipantProfile::v1(
                request.participant_display_name,
                request.participant_contact_hint,
            )?,
            delete_after_days: request.delete_after_days,
        };
        let session_id = SessionId::new(format!("cs_{:08}", self.next_seq()))?;
        let session = self
            .session_wiring
            .create_session(
                &mut self.store,
                input,
                session_id,
                generate_qr_token(),
                now_unix_ms(),
            )
            .map_err(|e| match e {
                SessionCreateError::Contract(v) => AdapterError::from(v),
                SessionCreateError::Storage(s) => AdapterError::from(s),
            })?;
        Ok(session_response(&session))
    }

    pub fn session_view(&self, session_id: &str) -> Result<SessionAdapterResponse, AdapterError> {
        let id = SessionId::new(session_id.to_string())?;
        let session = self.store.get_session_row(&id)?;
        Ok(session_response(session))
    }

    pub fn recipient_view(
        &self,
        qr_token: &str,
    ) -> Result<RecipientViewAdapterResponse, AdapterError> {
        let token = QrToken::new(qr_token.to_string())?;
        let view = self.session_wiring.recipient_view(&self.store, &token)?;
        Ok(RecipientViewAdapterResponse {
            qr_code_id: view.qr_code_id.as_str().to_string(),
            participant_display_name: view.participant_display_name,
            consent_status: view.consent_status.as_str().to_string(),
            verification_status: view.verification_status.as_str().to_string(),
            has_video: view.has_video,
        })
    }

    /// Register the uploaded recording and run the verification pipeline
    /// against it. Oracle failures surface only as degraded flags.
    pub fn upload_video(
        &mut self,
        session_id: &str,
        request: UploadVideoAdapterRequest,
    ) -> Result<UploadVideoAdapterResponse, AdapterError> {
        let id = SessionId::new(session_id.to_string())?;
        self.store.get_session_row(&id)?;

        let media_bytes = base64::engine::general_purpose::STANDARD
            .decode(request.media_b64.as_bytes())
            .map_err(|_| AdapterError::Invalid("media_b64 is not valid base64".to_string()))?;
        let mime_type = MimeType::new(request.mime_type)?;

        let storage_key = self
            .media
            .put(&media_bytes, &mime_type)
            .map_err(|MediaStoreError::Unavailable { detail }| AdapterError::Internal(detail))?;
        let video_id = VideoAssetId::new(format!("vid_{:08}", self.next_seq()))?;
        let video = VideoAsset::v1(
            video_id.clone(),
            storage_key,
            mime_type.clone(),
            media_bytes.len() as u64,
            now_unix_ms(),
        )?;
        self.store.insert_video_row(video)?;
        self.store.set_video_reference(&id, &video_id)?;

        let outcome = self
            .pipeline
            .process_video(&mut self.store, &id, &video_id, &media_bytes, &mime_type)
            .map_err(|e| match e {
                PipelineError::MediaTooLarge { got, max } => AdapterError::Invalid(format!(
                    "media is {got} bytes, limit is {max}"
                )),
                PipelineError::Storage(s) => AdapterError::from(s),
            })?;

        Ok(UploadVideoAdapterResponse {
            video_asset_id: video_id.as_str().to_string(),
            decision: outcome.decision.as_wire_str().to_string(),
            transcript_confidence_pct: outcome.transcript_confidence_pct,
            transcription_degraded: outcome.transcription_degraded,
            analysis_degraded: outcome.analysis_degraded,
        })
    }

    /// Short-lived read URL for the recorded evidence.
    pub fn video_read_url(
        &self,
        session_id: &str,
    ) -> Result<VideoReadUrlAdapterResponse, AdapterError> {
        let id = SessionId::new(session_id.to_string())?;
        let session = self.store.get_session_row(&id)?;
        let video_id = session.video_asset_id.clone().ok_or_else(|| {
            AdapterError::NotFound("video_assets: session has no recorded video".to_string())
        })?;
        let video = self.store.get_video_row(&video_id)?;
        let url = self
            .media
            .signed_read_url(&video.storage_key, SIGNED_READ_URL_TTL_SECONDS)
            .map_err(|MediaStoreError::Unavailable { detail }| AdapterError::Internal(detail))?;
        Ok(VideoReadUrlAdapterResponse {
            video_asset_id: video_id.as_str().to_string(),
            url,
            ttl_seconds: SIGNED_READ_URL_TTL_SECONDS,
        })
    }

    pub fn verify(
        &mut self,
        session_id: &str,
        request: VerifyAdapterRequest,
    ) -> Result<VerifyAdapterResponse, AdapterError> {
        let id = SessionId::new(session_id.to_string())?;
        let choice = parse_button_choice(&request.button_choice)?;
        let video_asset_id = request
            .video_asset_id
            .map(VideoAssetId::new)
            .transpose()?;

        let outcome = self
            .verify_wiring
            .verify(&mut self.store, &id, choice, video_asset_id, now_unix_ms())
            .map_err(|e| match e {
                VerifyError::AnalysisNotReady => AdapterError::NotReady(
                    "analysis not found for this session; retry after the pipeline completes"
                        .to_string(),
                ),
                VerifyError::Transition(t) => transition_error(t),
                VerifyError::Storage(s) => AdapterError::from(s),
            })?;

        Ok(VerifyAdapterResponse {
            verification_status: outcome.verification_status.as_str().to_string(),
            has_audio_mismatch: outcome.has_audio_mismatch,
            consent_status: outcome.consent_status.as_str().to_string(),
        })
    }

    pub fn revoke(&mut self, session_id: &str) -> Result<SessionAdapterResponse, AdapterError> {
        let id = SessionId::new(session_id.to_string())?;
        self.session_wiring
            .revoke_session(&mut self.store, &id, now_unix_ms())
            .map_err(|e| match e {
                RevokeError::Transition(t) => transition_error(t),
                RevokeError::Storage(s) => AdapterError::from(s),
            })?;
        let session = self.store.get_session_row(&id)?;
        Ok(session_response(session))
    }

    pub fn set_retention_exempt(
        &mut self,
        session_id: &str,
        request: RetentionExemptAdapterRequest,
    ) -> Result<SessionAdapterResponse, AdapterError> {
        let id = SessionId::new(session_id.to_string())?;
        self.store.set_retention_exempt(&id, request.exempt)?;
        let session = self.store.get_session_row(&id)?;
        Ok(session_response(session))
    }

    pub fn handle_billing_event(
        &mut self,
        event: BillingEvent,
    ) -> Result<BillingAdapterResponse, AdapterError> {
        let write = self
            .billing
            .handle_billing_event(&mut self.store, &event, now_unix_ms())
            .map_err(|e| match e {
                BillingBridgeError::Contract(v) => AdapterError::from(v),
                BillingBridgeError::Storage(s) => AdapterError::from(s),
            })?;
        Ok(BillingAdapterResponse {
            user_id: event.user_id.as_str().to_string(),
            subscription_status: write.subscription_status.as_str().to_string(),
            subscription_end_at_ms: write.subscription_end_at.map(|t| t.0),
            account_deletion_at_ms: write.account_deletion_at.map(|t| t.0),
        })
    }

    pub fn run_session_sweep_pass(&mut self) -> Result<SweepAdapterResponse, AdapterError> {
        let report = self
            .sweeps
            .run_session_retention_sweep(&mut self.store, &mut self.media, now_unix_ms())?;
        Ok(SweepAdapterResponse {
            sessions_scanned: report.scanned,
            deleted_sessions: report.deleted_sessions,
            deleted_videos: report.deleted_videos,
            blob_failures: report.blob_failures,
            ..SweepAdapterResponse::default()
        })
    }

    pub fn run_account_sweep_pass(&mut self) -> Result<SweepAdapterResponse, AdapterError> {
        let report = self
            .sweeps
            .run_account_deletion_sweep(&mut self.store, &mut self.media, now_unix_ms())?;
        Ok(SweepAdapterResponse {
            users_scanned: report.scanned,
            deleted_sessions: report.deleted_sessions,
            deleted_videos: report.deleted_videos,
            deleted_users: report.deleted_users,
            blob_failures: report.blob_failures,
            ..SweepAdapterResponse::default()
        })
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            user_rows: self.store.user_rows().len(),
            session_rows: self.store.session_rows().len(),
        }
    }
}

fn session_response(
    session: &accord_kernel_contracts::consent::ConsentSession,
) -> SessionAdapterResponse {
    SessionAdapterResponse {
        session_id: session.id.as_str().to_string(),
        qr_code_id: session.qr_code_id.as_str().to_string(),
        consent_status: session.consent_status.as_str().to_string(),
        verification_status: session.verification_status.as_str().to_string(),
        has_audio_mismatch: session.has_audio_mismatch,
        ai_analysis_result: session
            .ai_analysis_result
            .map(|d| d.as_wire_str().to_string()),
        button_choice: session.button_choice.map(|c| c.as_str().to_string()),
        video_asset_id: session
            .video_asset_id
            .as_ref()
            .map(|v| v.as_str().to_string()),
        delete_after_days: session.delete_after_days,
        created_at_ms: session.created_at.0,
        retention_until_ms: session.retention_until.0,
        retention_exempt: session.retention_exempt,
        verified_at_ms: session.verified_at.map(|t| t.0),
        consent_granted_at_ms: session.consent_granted_at.map(|t| t.0),
        consent_revoked_at_ms: session.consent_revoked_at.map(|t| t.0),
    }
}

fn parse_button_choice(raw: &str) -> Result<ButtonChoice, AdapterError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "granted" => Ok(ButtonChoice::Granted),
        "denied" => Ok(ButtonChoice::Denied),
        other => Err(AdapterError::Invalid(format!(
            "button_choice must be granted or denied, got '{other}'"
        ))),
    }
}

fn transition_error(e: TransitionError) -> AdapterError {
    match e {
        TransitionError::MissingVideoAsset => {
            AdapterError::Invalid("granting consent requires a recorded video".to_string())
        }
        TransitionError::NotAllowed { from, to } => AdapterError::Conflict(format!(
            "transition {} -> {} is not allowed",
            from.as_str(),
            to.as_str()
        )),
    }
}

fn now_unix_ms() -> UnixTimeMs {
    UnixTimeMs(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1)
            .max(1),
    )
}
