#![forbid(unsafe_code)]

use accord_engines::oracle::{OracleCallError, OracleClient};
use accord_kernel_contracts::consent::{AnalysisWrite, SessionId};
use accord_kernel_contracts::media::{MimeType, TranscriptRecord, VideoAssetId};
use accord_kernel_contracts::oracle::{
    scale_confidence, AiDecision, OracleAnalysis, OracleTranscription,
};
use accord_storage::repo::{ConsentSessionRepo, VideoAssetRepo};
use accord_storage::StorageError;

/// Seam between the pipeline and the AI oracle. The live client implements
/// it; tests substitute stubs.
pub trait ConsentOracle {
    fn transcribe(
        &self,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<OracleTranscription, OracleCallError>;
    fn analyze(
        &self,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<OracleAnalysis, OracleCallError>;
}

impl ConsentOracle for OracleClient {
    fn transcribe(
        &self,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<OracleTranscription, OracleCallError> {
        OracleClient::transcribe(self, media, mime_type)
    }

    fn analyze(
        &self,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<OracleAnalysis, OracleCallError> {
        OracleClient::analyze(self, media, mime_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_media_bytes: u64,
}

impl PipelineConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_media_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    MediaTooLarge { got: u64, max: u64 },
    Storage(StorageError),
}

impl From<StorageError> for PipelineError {
    fn from(e: StorageError) -> Self {
        PipelineError::Storage(e)
    }
}

/// What a pipeline run produced. Degraded stages are reported, never
/// surfaced as errors: an unreachable oracle must not leave a session
/// stuck un-analyzable.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub decision: AiDecision,
    pub transcript_confidence_pct: u8,
    pub analysis_confidence_pct: u8,
    pub transcription_degraded: bool,
    pub analysis_degraded: bool,
}

#[derive(Debug, Clone)]
pub struct VerificationPipeline<O>
where
    O: ConsentOracle,
{
    config: PipelineConfig,
    oracle: O,
}

impl<O> VerificationPipeline<O>
where
    O: ConsentOracle,
{
    pub fn new(config: PipelineConfig, oracle: O) -> Self {
        Self { config, oracle }
    }

    /// Run transcription and analysis against an uploaded video.
    ///
    /// Stage order is fixed: the transcript persists before analysis is
    /// invoked, keeping the audit trail monotonic. The two writes touch
    /// disjoint rows/fields (video transcript vs. session decision), and
    /// the decision write structurally cannot reach the verification
    /// fields.
    pub fn process_video<R>(
        &self,
        repo: &mut R,
        session_id: &SessionId,
        video_asset_id: &VideoAssetId,
        media: &[u8],
        mime_type: &MimeType,
    ) -> Result<PipelineOutcome, PipelineError>
    where
        R: ConsentSessionRepo + VideoAssetRepo,
    {
        let got = media.len() as u64;
        if got > self.config.max_media_bytes {
            return Err(PipelineError::MediaTooLarge {
                got,
                max: self.config.max_media_bytes,
            });
        }

        repo.get_session_row(session_id)?;
        repo.get_video_row(video_asset_id)?;

        let (transcript, transcription_degraded) = match self.oracle.transcribe(media, mime_type)
        {
            Ok(out) => {
                let confidence_pct = scale_confidence(out.confidence);
                match TranscriptRecord::v1(out.transcript, confidence_pct) {
                    Ok(record) => (record, false),
                    Err(_) => (sentinel_transcript("payload_invalid"), true),
                }
            }
            Err(err) => (sentinel_transcript(err.error_kind), true),
        };
        let transcript_confidence_pct = transcript.confidence_pct;
        repo.set_transcript(video_asset_id, transcript)?;

        let (decision, analysis_confidence_pct, analysis_degraded) =
            match self.oracle.analyze(media, mime_type) {
                Ok(out) => (out.decision, scale_confidence(out.confidence), false),
                Err(_) => (AiDecision::Unclear, 0, true),
            };
        repo.set_ai_decision(
            session_id,
            AnalysisWrite {
                ai_analysis_result: decision,
            },
        )?;

        Ok(PipelineOutcome {
            decision,
            transcript_confidence_pct,
            analysis_confidence_pct,
            transcription_degraded,
            analysis_degraded,
        })
    }
}

fn sentinel_transcript(error_kind: &str) -> TranscriptRecord {
    TranscriptRecord {
        text: format!("[transcription unavailable: {error_kind}]"),
        confidence_pct: 0,
    }
}
