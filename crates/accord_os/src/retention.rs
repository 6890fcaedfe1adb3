#![forbid(unsafe_code)]

use accord_engines::retention::{RetentionConfig, RetentionRuntime};
use accord_kernel_contracts::consent::SessionId;
use accord_kernel_contracts::identity::{BillingEvent, BillingWrite};
use accord_kernel_contracts::{ContractViolation, UnixTimeMs, Validate};
use accord_storage::media::MediaBlobStore;
use accord_storage::repo::{
    ConsentSessionRepo, RetentionSweepRepo, UserAccountRepo, VideoAssetRepo,
};
use accord_storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSweepReport {
    pub scanned: usize,
    pub deleted_sessions: usize,
    pub deleted_videos: usize,
    pub blob_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountSweepReport {
    pub scanned: usize,
    pub deleted_users: usize,
    pub deleted_sessions: usize,
    pub deleted_videos: usize,
    pub blob_failures: usize,
}

/// The two retention timers. They share nothing but the store, so they can
/// run on separate cadences or in separate processes. Both act purely on
/// deadlines already persisted on the rows; nothing is recomputed here.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionSweepWiring;

impl RetentionSweepWiring {
    pub fn new() -> Self {
        Self
    }

    /// Delete sessions whose fixed retention window has elapsed.
    ///
    /// Two-phase per session: media blob first, then metadata. A failed
    /// blob removal leaves the rows in place; the session is still past its
    /// window, so the next sweep retries it.
    pub fn run_session_retention_sweep<R, M>(
        &self,
        repo: &mut R,
        media: &mut M,
        now: UnixTimeMs,
    ) -> Result<SessionSweepReport, StorageError>
    where
        R: ConsentSessionRepo + VideoAssetRepo + RetentionSweepRepo,
        M: MediaBlobStore,
    {
        let mut report = SessionSweepReport::default();
        for session_id in repo.sessions_past_retention(now) {
            report.scanned += 1;
            delete_session_cascade(
                repo,
                media,
                &session_id,
                &mut report.deleted_sessions,
                &mut report.deleted_videos,
                &mut report.blob_failures,
            )?;
        }
        Ok(report)
    }

    /// Cascade-delete accounts whose deletion deadline has passed: every
    /// owned session (regardless of its own retention window), then the
    /// user row. A blob failure keeps the user row so the next sweep
    /// finishes the job.
    pub fn run_account_deletion_sweep<R, M>(
        &self,
        repo: &mut R,
        media: &mut M,
        now: UnixTimeMs,
    ) -> Result<AccountSweepReport, StorageError>
    where
        R: ConsentSessionRepo + VideoAssetRepo + UserAccountRepo + RetentionSweepRepo,
        M: MediaBlobStore,
    {
        let mut report = AccountSweepReport::default();
        for user_id in repo.users_past_deletion_deadline(now) {
            report.scanned += 1;
            let before_failures = report.blob_failures;
            for session_id in repo.sessions_owned_by(&user_id) {
                delete_session_cascade(
                    repo,
                    media,
                    &session_id,
                    &mut report.deleted_sessions,
                    &mut report.deleted_videos,
                    &mut report.blob_failures,
                )?;
            }
            if report.blob_failures == before_failures {
                repo.delete_user_row(&user_id)?;
                report.deleted_users += 1;
            }
        }
        Ok(report)
    }
}

fn delete_session_cascade<R, M>(
    repo: &mut R,
    media: &mut M,
    session_id: &SessionId,
    deleted_sessions: &mut usize,
    deleted_videos: &mut usize,
    blob_failures: &mut usize,
) -> Result<(), StorageError>
where
    R: ConsentSessionRepo + VideoAssetRepo,
    M: MediaBlobStore,
{
    let video_asset_id = repo.get_session_row(session_id)?.video_asset_id.clone();
    if let Some(video_id) = video_asset_id {
        // Video metadata already gone means the blob key is unknowable;
        // tolerate and fall through to the session row.
        if let Ok(video) = repo.get_video_row(&video_id) {
            let storage_key = video.storage_key.clone();
            if media.delete(&storage_key).is_err() {
                *blob_failures += 1;
                return Ok(());
            }
            repo.delete_video_row(&video_id)?;
            *deleted_videos += 1;
        }
    }
    repo.delete_session_row(session_id)?;
    *deleted_sessions += 1;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum BillingBridgeError {
    Contract(ContractViolation),
    Storage(StorageError),
}

impl From<ContractViolation> for BillingBridgeError {
    fn from(v: ContractViolation) -> Self {
        BillingBridgeError::Contract(v)
    }
}

impl From<StorageError> for BillingBridgeError {
    fn from(e: StorageError) -> Self {
        BillingBridgeError::Storage(e)
    }
}

/// Consumes subscription-status change events from the billing
/// collaborator and turns them into billing writes on the user row.
#[derive(Debug, Clone)]
pub struct BillingBridgeWiring {
    retention: RetentionRuntime,
}

impl BillingBridgeWiring {
    pub fn new(config: RetentionConfig) -> Self {
        Self {
            retention: RetentionRuntime::new(config),
        }
    }

    pub fn handle_billing_event<R>(
        &self,
        repo: &mut R,
        event: &BillingEvent,
        received_at: UnixTimeMs,
    ) -> Result<BillingWrite, BillingBridgeError>
    where
        R: UserAccountRepo,
    {
        event.validate()?;
        repo.get_user_row(&event.user_id)?;
        let write = self.retention.apply_billing_event(event, received_at);
        repo.apply_billing_write(&event.user_id, write)?;
        Ok(write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_kernel_contracts::consent::{ConsentSession, ParticipantProfile, QrToken};
    use accord_kernel_contracts::identity::{SubscriptionStatus, UserAccount, UserId};
    use accord_kernel_contracts::media::{MimeType, StorageKey, VideoAsset, VideoAssetId};
    use accord_kernel_contracts::MS_PER_DAY;
    use accord_storage::media::{InMemoryMediaStore, MediaStoreError};
    use accord_storage::ConsentStore;

    fn user(id: &str) -> UserAccount {
        UserAccount::v1(
            UserId::new(id).unwrap(),
            "argon2$hash".to_string(),
            "Robin".to_string(),
            UnixTimeMs(0),
        )
        .unwrap()
    }

    fn session(id: &str, user_id: &str, token: &str, days: u16, created_at: u64) -> ConsentSession {
        ConsentSession::v1(
            SessionId::new(id).unwrap(),
            UserId::new(user_id).unwrap(),
            ParticipantProfile::v1("Alex".to_string(), None).unwrap(),
            QrToken::new(token).unwrap(),
            days,
            UnixTimeMs(created_at),
        )
        .unwrap()
    }

    fn attach_video(
        store: &mut ConsentStore,
        media: &mut InMemoryMediaStore,
        session_id: &str,
        video_id: &str,
        bytes: &[u8],
    ) -> StorageKey {
        let key = media
            .put(bytes, &MimeType::new("video/webm").unwrap())
            .unwrap();
        let vid = VideoAssetId::new(video_id).unwrap();
        store
            .insert_video_row(
                VideoAsset::v1(
                    vid.clone(),
                    key.clone(),
                    MimeType::new("video/webm").unwrap(),
                    bytes.len() as u64,
                    UnixTimeMs(1),
                )
                .unwrap(),
            )
            .unwrap();
        store
            .set_video_reference(&SessionId::new(session_id).unwrap(), &vid)
            .unwrap();
        key
    }

    fn sweeps() -> RetentionSweepWiring {
        RetentionSweepWiring::new()
    }

    #[test]
    fn at_sweep_01_one_day_session_is_gone_two_days_later() {
        let mut store = ConsentStore::new_in_memory();
        let mut media = InMemoryMediaStore::new();
        store.insert_user_row(user("u_1")).unwrap();
        store
            .insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa", 1, 0))
            .unwrap();
        let key = attach_video(&mut store, &mut media, "cs_1", "vid_1", b"footage");

        let report = sweeps()
            .run_session_retention_sweep(&mut store, &mut media, UnixTimeMs(2 * MS_PER_DAY))
            .unwrap();
        assert_eq!(report.deleted_sessions, 1);
        assert_eq!(report.deleted_videos, 1);
        assert!(!media.contains(&key));
        assert!(matches!(
            store.get_session_row(&SessionId::new("cs_1").unwrap()),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn at_sweep_02_live_sessions_survive() {
        let mut store = ConsentStore::new_in_memory();
        let mut media = InMemoryMediaStore::new();
        store.insert_user_row(user("u_1")).unwrap();
        store
            .insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa", 90, 0))
            .unwrap();

        let report = sweeps()
            .run_session_retention_sweep(&mut store, &mut media, UnixTimeMs(2 * MS_PER_DAY))
            .unwrap();
        assert_eq!(report.scanned, 0);
        assert!(store
            .get_session_row(&SessionId::new("cs_1").unwrap())
            .is_ok());
    }

    #[test]
    fn at_sweep_03_video_metadata_already_gone_is_tolerated() {
        let mut store = ConsentStore::new_in_memory();
        let mut media = InMemoryMediaStore::new();
        store.insert_user_row(user("u_1")).unwrap();
        store
            .insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa", 1, 0))
            .unwrap();
        attach_video(&mut store, &mut media, "cs_1", "vid_1", b"footage");
        store
            .delete_video_row(&VideoAssetId::new("vid_1").unwrap())
            .unwrap();

        let report = sweeps()
            .run_session_retention_sweep(&mut store, &mut media, UnixTimeMs(2 * MS_PER_DAY))
            .unwrap();
        assert_eq!(report.deleted_sessions, 1);
        assert_eq!(report.deleted_videos, 0);
    }

    #[test]
    fn at_sweep_04_account_sweep_cascades_sessions_and_videos() {
        let mut store = ConsentStore::new_in_memory();
        let mut media = InMemoryMediaStore::new();
        store.insert_user_row(user("u_due")).unwrap();
        store.insert_user_row(user("u_live")).unwrap();
        // One owned session still far inside its retention window.
        store
            .insert_session_row(session("cs_1", "u_due", "tok_aaaaaaaaaaaaaaaa", 90, 0))
            .unwrap();
        store
            .insert_session_row(session("cs_2", "u_live", "tok_bbbbbbbbbbbbbbbb", 90, 0))
            .unwrap();
        let key = attach_video(&mut store, &mut media, "cs_1", "vid_1", b"footage");

        let due_id = UserId::new("u_due").unwrap();
        store
            .apply_billing_write(
                &due_id,
                BillingWrite {
                    subscription_status: SubscriptionStatus::Canceled,
                    subscription_end_at: Some(UnixTimeMs(MS_PER_DAY)),
                    account_deletion_at: Some(UnixTimeMs(8 * MS_PER_DAY)),
                },
            )
            .unwrap();

        let report = sweeps()
            .run_account_deletion_sweep(&mut store, &mut media, UnixTimeMs(9 * MS_PER_DAY))
            .unwrap();
        assert_eq!(report.deleted_users, 1);
        assert_eq!(report.deleted_sessions, 1);
        assert_eq!(report.deleted_videos, 1);
        assert!(!media.contains(&key));
        assert!(matches!(
            store.get_user_row(&due_id),
            Err(StorageError::NotFound { .. })
        ));
        // The other user's world is untouched.
        assert!(store
            .get_session_row(&SessionId::new("cs_2").unwrap())
            .is_ok());
    }

    #[test]
    fn at_sweep_05_user_is_swept_exactly_once() {
        let mut store = ConsentStore::new_in_memory();
        let mut media = InMemoryMediaStore::new();
        store.insert_user_row(user("u_due")).unwrap();
        store
            .apply_billing_write(
                &UserId::new("u_due").unwrap(),
                BillingWrite {
                    subscription_status: SubscriptionStatus::Canceled,
                    subscription_end_at: Some(UnixTimeMs(MS_PER_DAY)),
                    account_deletion_at: Some(UnixTimeMs(8 * MS_PER_DAY)),
                },
            )
            .unwrap();

        let first = sweeps()
            .run_account_deletion_sweep(&mut store, &mut media, UnixTimeMs(9 * MS_PER_DAY))
            .unwrap();
        assert_eq!(first.deleted_users, 1);
        let second = sweeps()
            .run_account_deletion_sweep(&mut store, &mut media, UnixTimeMs(9 * MS_PER_DAY))
            .unwrap();
        assert_eq!(second.scanned, 0);
        assert_eq!(second.deleted_users, 0);
    }

    #[test]
    fn at_sweep_06_blob_failure_keeps_rows_for_the_next_pass() {
        struct FailingMediaStore;
        impl MediaBlobStore for FailingMediaStore {
            fn put(
                &mut self,
                _bytes: &[u8],
                _mime_type: &MimeType,
            ) -> Result<StorageKey, MediaStoreError> {
                Err(MediaStoreError::Unavailable {
                    detail: "down".to_string(),
                })
            }
            fn signed_read_url(
                &self,
                _key: &StorageKey,
                _ttl_seconds: u32,
            ) -> Result<String, MediaStoreError> {
                Err(MediaStoreError::Unavailable {
                    detail: "down".to_string(),
                })
            }
            fn delete(&mut self, _key: &StorageKey) -> Result<(), MediaStoreError> {
                Err(MediaStoreError::Unavailable {
                    detail: "down".to_string(),
                })
            }
            fn contains(&self, _key: &StorageKey) -> bool {
                false
            }
        }

        let mut store = ConsentStore::new_in_memory();
        let mut seed_media = InMemoryMediaStore::new();
        store.insert_user_row(user("u_1")).unwrap();
        store
            .insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa", 1, 0))
            .unwrap();
        attach_video(&mut store, &mut seed_media, "cs_1", "vid_1", b"footage");

        let mut failing = FailingMediaStore;
        let report = sweeps()
            .run_session_retention_sweep(&mut store, &mut failing, UnixTimeMs(2 * MS_PER_DAY))
            .unwrap();
        assert_eq!(report.blob_failures, 1);
        assert_eq!(report.deleted_sessions, 0);
        // Metadata survives so the retry path still has the blob key.
        assert!(store
            .get_session_row(&SessionId::new("cs_1").unwrap())
            .is_ok());
        assert!(store
            .get_video_row(&VideoAssetId::new("vid_1").unwrap())
            .is_ok());
    }

    #[test]
    fn at_billing_01_cancellation_then_reactivation_round_trip() {
        let mut store = ConsentStore::new_in_memory();
        store.insert_user_row(user("u_1")).unwrap();
        let bridge = BillingBridgeWiring::new(RetentionConfig::mvp_v1());
        let uid = UserId::new("u_1").unwrap();

        let cancel = BillingEvent::v1(
            uid.clone(),
            SubscriptionStatus::Canceled,
            None,
            Some(UnixTimeMs(10 * MS_PER_DAY)),
        );
        bridge
            .handle_billing_event(&mut store, &cancel, UnixTimeMs(9 * MS_PER_DAY))
            .unwrap();
        let row = store.get_user_row(&uid).unwrap();
        assert_eq!(row.subscription_end_at, Some(UnixTimeMs(10 * MS_PER_DAY)));
        assert_eq!(row.account_deletion_at, Some(UnixTimeMs(17 * MS_PER_DAY)));

        let reactivate = BillingEvent::v1(uid.clone(), SubscriptionStatus::Active, None, None);
        bridge
            .handle_billing_event(&mut store, &reactivate, UnixTimeMs(11 * MS_PER_DAY))
            .unwrap();
        let row = store.get_user_row(&uid).unwrap();
        assert_eq!(row.subscription_status, SubscriptionStatus::Active);
        assert_eq!(row.subscription_end_at, None);
        assert_eq!(row.account_deletion_at, None);
    }

    #[test]
    fn at_billing_02_unknown_user_is_not_found() {
        let mut store = ConsentStore::new_in_memory();
        let bridge = BillingBridgeWiring::new(RetentionConfig::mvp_v1());
        let event = BillingEvent::v1(
            UserId::new("u_ghost").unwrap(),
            SubscriptionStatus::Canceled,
            None,
            None,
        );
        let out = bridge.handle_billing_event(&mut store, &event, UnixTimeMs(1));
        assert!(matches!(
            out,
            Err(BillingBridgeError::Storage(StorageError::NotFound { .. }))
        ));
    }
}
