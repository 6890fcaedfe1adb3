#![forbid(unsafe_code)]

use accord_kernel_contracts::consent::{ConsentSession, ParticipantProfile, QrToken, SessionId};
use accord_kernel_contracts::identity::{
    BillingWrite, SubscriptionStatus, UserAccount, UserId,
};
use accord_kernel_contracts::{UnixTimeMs, MS_PER_DAY};
use accord_storage::repo::{ConsentSessionRepo, RetentionSweepRepo, UserAccountRepo};
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

#[test]
fn at_retention_db_01_sessions_past_retention_respect_the_boundary() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_due", "u_1", "tok_aaaaaaaaaaaaaaaa", 1, 0))
        .unwrap();
    s.insert_session_row(session(
        "cs_live",
        "u_1",
        "tok_bbbbbbbbbbbbbbbb",
        2,
        0,
    ))
    .unwrap();

    // One millisecond before the deadline: nothing is due.
    let due = s.sessions_past_retention(UnixTimeMs(MS_PER_DAY - 1));
    assert!(due.is_empty());

    // At the deadline the one-day session is due, the two-day one is not.
    let due = s.sessions_past_retention(UnixTimeMs(MS_PER_DAY));
    assert_eq!(due, vec![SessionId::new("cs_due").unwrap()]);
}

#[test]
fn at_retention_db_02_retention_exempt_sessions_are_never_listed() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_session_row(session("cs_hold", "u_1", "tok_aaaaaaaaaaaaaaaa", 1, 0))
        .unwrap();
    s.set_retention_exempt(&SessionId::new("cs_hold").unwrap(), true)
        .unwrap();

    let due = s.sessions_past_retention(UnixTimeMs(100 * MS_PER_DAY));
    assert!(due.is_empty());
}

#[test]
fn at_retention_db_03_users_past_deadline_listed_until_deleted() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_due")).unwrap();
    s.insert_user_row(user("u_live")).unwrap();

    let due_id = UserId::new("u_due").unwrap();
    s.apply_billing_write(
        &due_id,
        BillingWrite {
            subscription_status: SubscriptionStatus::Canceled,
            subscription_end_at: Some(UnixTimeMs(10 * MS_PER_DAY)),
            account_deletion_at: Some(UnixTimeMs(17 * MS_PER_DAY)),
        },
    )
    .unwrap();

    let due = s.users_past_deletion_deadline(UnixTimeMs(17 * MS_PER_DAY));
    assert_eq!(due, vec![due_id.clone()]);

    s.delete_user_row(&due_id).unwrap();
    let due = s.users_past_deletion_deadline(UnixTimeMs(17 * MS_PER_DAY));
    assert!(due.is_empty());
}

#[test]
fn at_retention_db_04_reversal_clears_the_deadline_listing() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    let id = UserId::new("u_1").unwrap();

    s.apply_billing_write(
        &id,
        BillingWrite {
            subscription_status: SubscriptionStatus::Canceled,
            subscription_end_at: Some(UnixTimeMs(MS_PER_DAY)),
            account_deletion_at: Some(UnixTimeMs(8 * MS_PER_DAY)),
        },
    )
    .unwrap();
    s.apply_billing_write(
        &id,
        BillingWrite {
            subscription_status: SubscriptionStatus::Active,
            subscription_end_at: None,
            account_deletion_at: None,
        },
    )
    .unwrap();

    let row = s.get_user_row(&id).unwrap();
    assert_eq!(row.subscription_status, SubscriptionStatus::Active);
    assert_eq!(row.subscription_end_at, None);
    assert_eq!(row.account_deletion_at, None);
    assert!(s
        .users_past_deletion_deadline(UnixTimeMs(100 * MS_PER_DAY))
        .is_empty());
}

#[test]
fn at_retention_db_05_ownership_query_scopes_to_one_user() {
    let mut s = ConsentStore::new_in_memory();
    s.insert_user_row(user("u_1")).unwrap();
    s.insert_user_row(user("u_2")).unwrap();
    s.insert_session_row(session("cs_1", "u_1", "tok_aaaaaaaaaaaaaaaa", 90, 0))
        .unwrap();
    s.insert_session_row(session("cs_2", "u_1", "tok_bbbbbbbbbbbbbbbb", 90, 0))
        .unwrap();
    s.insert_session_row(session("cs_3", "u_2", "tok_cccccccccccccccc", 90, 0))
        .unwrap();

    let owned = s.sessions_owned_by(&UserId::new("u_1").unwrap());
    assert_eq!(owned.len(), 2);
    assert!(owned.contains(&SessionId::new("cs_1").unwrap()));
    assert!(owned.contains(&SessionId::new("cs_2").unwrap()));
}
