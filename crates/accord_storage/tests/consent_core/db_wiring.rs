#![forbid(unsafe_code)]

use accord_kernel_contracts::consent::{
    AnalysisWrite, ButtonChoice, ConsentSession, ConsentStatus, ParticipantProfile, QrToken,
    SessionId, StatusWrite, VerificationStatus, VerificationWrite,
};
use accord_kernel_contracts::identity::{UserAccount, UserId};
use accord_kernel_contracts::media::{MimeType, StorageKey, TranscriptRecord, VideoAsset, VideoAssetId};
use accord_kernel_contracts::oracle::AiDecision;
use accord_kernel_contracts::UnixTimeMs;
use accord_storage::repo::{ConsentSessionRepo, UserAccountRepo, VideoAssetRepo};
use accord_storage::{ConsentStore, StorageError};

fn user(id: &str) -> UserAccount {
    UserAccount::v1(
        UserId::new(id).unwrap(),
        "argon2$hash".to_string(),
        "Robin".to_string(),
        UnixTimeMs(1_000),
    )
    .unwrap()
}

fn session(id: &str, user_id: &str, token: &str) -> ConsentSession {
    ConsentSession::v1(
        SessionId::new(id).unwrap(),
        UserId::new(user_id).unwrap(),
        ParticipantProfile::v1("Alex".to_string(), None).unwrap(),
        QrToken::new(token).unwrap(),
        90,
        UnixTimeMs(10_000),
    )
    .unwrap()
}

fn video(id: &str) -> VideoAsset {
    VideoAsset::v1(
        VideoAssetId::new(id).unwrap(),
        StorageKey::new(format!("media/{id}")).unwrap(),
        MimeType::new("video/webm").unwrap(),
        2_048,
        UnixTimeMs(11_000),
    )
    .unwrap()
}

#[test]
fn at_consent_db_01_session_requires_existing_initiator() {
    let mut s = ConsentStore::new_in_memory();
    let out = s.insert_session_row(session("cs_1", "u_ghost", "tok_aaaaaaaaaaaaaaaa"));
    assert!(matches!(
        out,
        Err(StorageError::ForeignKeyViolation { table: "users", .. })
    ));
}

#[test]
fn at_consent_db_02_duplicate_qr_token_is_rejected() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa"))
        .unwrap();
    let out = s.insert_session_row(session("cs_2", "u_1", "tok_aaaaaaaaaaaaaaaa"));
    assert!(matches!(
        out,
        Err(StorageError::DuplicateKey {
            table: "consent_sessions.qr_code_id",
            ..
        })
    ));
}

#[test]
fn at_consent_db_03_qr_token_lookup_resolves_and_distinguishes_not_found() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa"))
        .unwrap();

    let found = s
        .get_session_row_by_qr_token(&QrToken::new("tok_aaaaaaaaaaaaaaaa").unwrap())
        .unwrap();
    assert_eq!(found.id.as_str(), "cs_1");

    let missing = s.get_session_row_by_qr_token(&QrToken::new("tok_bbbbbbbbbbbbbbbb").unwrap());
    assert!(matches!(missing, Err(StorageError::NotFound { .. })));
}

#[test]
fn at_consent_db_04_status_write_with_unknown_video_is_fk_violation() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa"))
        .unwrap();

    let out = s.set_session_status(
        &SessionId::new("cs_1").unwrap(),
        StatusWrite {
            consent_status: ConsentStatus::Granted,
            video_asset_id: Some(VideoAssetId::new("vid_ghost").unwrap()),
            consent_granted_at: Some(UnixTimeMs(12_000)),
            consent_revoked_at: None,
        },
    );
    assert!(matches!(
        out,
        Err(StorageError::ForeignKeyViolation {
            table: "video_assets",
            ..
        })
    ));
}

#[test]
fn at_consent_db_05_analysis_write_touches_only_the_ai_decision() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa"))
        .unwrap();
    let id = SessionId::new("cs_1").unwrap();
    let before = s.get_session_row(&id).unwrap().clone();

    s.set_ai_decision(
        &id,
        AnalysisWrite {
            ai_analysis_result: AiDecision::ConsentDenied,
        },
    )
    .unwrap();

    let after = s.get_session_row(&id).unwrap();
    assert_eq!(after.ai_analysis_result, Some(AiDecision::ConsentDenied));
    assert_eq!(after.verification_status, before.verification_status);
    assert_eq!(after.has_audio_mismatch, before.has_audio_mismatch);
    assert_eq!(after.button_choice, before.button_choice);
    assert_eq!(after.consent_status, before.consent_status);
}

#[test]
fn at_consent_db_06_verification_write_touches_only_audit_fields() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa"))
        .unwrap();
    let id = SessionId::new("cs_1").unwrap();
    s.set_ai_decision(
        &id,
        AnalysisWrite {
            ai_analysis_result: AiDecision::ConsentGranted,
        },
    )
    .unwrap();

    s.set_verification(
        &id,
        VerificationWrite::v1(ButtonChoice::Granted, false, UnixTimeMs(13_000)),
    )
    .unwrap();

    let after = s.get_session_row(&id).unwrap();
    assert_eq!(after.verification_status, VerificationStatus::Verified);
    assert_eq!(after.button_choice, Some(ButtonChoice::Granted));
    assert_eq!(after.verified_at, Some(UnixTimeMs(13_000)));
    // Status stays with the state machine, decision stays with the pipeline.
    assert_eq!(after.consent_status, ConsentStatus::Pending);
    assert_eq!(after.ai_analysis_result, Some(AiDecision::ConsentGranted));
}

#[test]
fn at_consent_db_07_transcript_replacement_is_whole_record() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_video_row(video("vid_1")).unwrap();
    let id = VideoAssetId::new("vid_1").unwrap();

    s.set_transcript(&id, TranscriptRecord::v1("first run".to_string(), 40).unwrap())
        .unwrap();
    s.set_transcript(&id, TranscriptRecord::v1("second run".to_string(), 90).unwrap())
        .unwrap();

    let row = s.get_video_row(&id).unwrap();
    let transcript = row.transcript.as_ref().unwrap();
    assert_eq!(transcript.text, "second run");
    assert_eq!(transcript.confidence_pct, 90);
}

#[test]
fn at_consent_db_08_deleting_a_session_frees_its_qr_token() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa"))
        .unwrap();
    s.delete_session_row(&SessionId::new("cs_1").unwrap()).unwrap();

    // Same token can back a brand-new session once the old row is gone.
    s.insert_session_row(session("cs_2", "u_1", "tok_aaaaaaaaaaaaaaaa"))
        .unwrap();
    assert_eq!(s.session_rows().len(), 1);
}
