#![forbid(unsafe_code)]

use accord_kernel_contracts::identity::{BillingEvent, BillingWrite, SubscriptionStatus};
use accord_kernel_contracts::UnixTimeMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Days between subscription end and account deletion.
    pub post_subscription_grace_days: u16,
}

impl RetentionConfig {
    pub fn mvp_v1() -> Self {
        Self {
            post_subscription_grace_days: 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionRuntime {
    config: RetentionConfig,
}

impl RetentionRuntime {
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    pub fn account_deletion_deadline(&self, subscription_end_at: UnixTimeMs) -> UnixTimeMs {
        subscription_end_at.plus_days(self.config.post_subscription_grace_days)
    }

    /// Fold a billing event into a billing write for the user row.
    ///
    /// An active subscription clears any pending deletion; the reversal is
    /// idempotent and safe when no deletion was pending. Every non-active
    /// status schedules one: the subscription end is the period end when the
    /// collaborator supplies it, else the cancellation instant, else the
    /// event arrival time.
    pub fn apply_billing_event(
        &self,
        event: &BillingEvent,
        received_at: UnixTimeMs,
    ) -> BillingWrite {
        match event.new_status {
            SubscriptionStatus::Active => BillingWrite {
                subscription_status: SubscriptionStatus::Active,
                subscription_end_at: None,
                account_deletion_at: None,
            },
            status => {
                let subscription_end_at = event
                    .current_period_end_ms()
                    .or_else(|| event.canceled_at_ms())
                    .unwrap_or(received_at);
                BillingWrite {
                    subscription_status: status,
                    subscription_end_at: Some(subscription_end_at),
                    account_deletion_at: Some(self.account_deletion_deadline(subscription_end_at)),
                }
            }
        }
    }
}
