#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};

pub const IDENTITY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must not be empty",
            });
        }
        if id.len() > 64 {
            return Err(ContractViolation::InvalidValue {
                field: "user_id",
                reason: "must be <= 64 chars",
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    None,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

/// Identity + billing facts for one account. The deletion date is only ever
/// set while an unreversed cancellation/non-payment event is outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    pub schema_version: SchemaVersion,
    pub id: UserId,
    pub credential_hash: String,
    pub display_name: String,
    pub subscription_status: SubscriptionStatus,
    pub subscription_end_at: Option<UnixTimeMs>,
    pub account_deletion_at: Option<UnixTimeMs>,
    pub created_at: UnixTimeMs,
}

impl UserAccount {
    pub fn v1(
        id: UserId,
        credential_hash: String,
        display_name: String,
        created_at: UnixTimeMs,
    ) -> Result<Self, ContractViolation> {
        let out = Self {
            schema_version: IDENTITY_CONTRACT_VERSION,
            id,
            credential_hash,
            display_name,
            subscription_status: SubscriptionStatus::None,
            subscription_end_at: None,
            account_deletion_at: None,
            created_at,
        };
        out.validate()?;
        Ok(out)
    }
}

impl Validate for UserAccount {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != IDENTITY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "user_account.schema_version",
                reason: "must match IDENTITY_CONTRACT_VERSION",
            });
        }
        if self.credential_hash.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "user_account.credential_hash",
                reason: "must not be empty",
            });
        }
        if self.display_name.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "user_account.display_name",
                reason: "must be <= 256 chars",
            });
        }
        if self.account_deletion_at.is_some() {
            if self.subscription_end_at.is_none() {
                return Err(ContractViolation::InvalidValue {
                    field: "user_account.account_deletion_at",
                    reason: "requires subscription_end_at to be set",
                });
            }
            if self.subscription_status == SubscriptionStatus::Active {
                return Err(ContractViolation::InvalidValue {
                    field: "user_account.account_deletion_at",
                    reason: "must be clear while the subscription is active",
                });
            }
        }
        Ok(())
    }
}

/// Subscription-status change pushed by the billing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub user_id: UserId,
    pub new_status: SubscriptionStatus,
    pub canceled_at: Option<u64>,
    pub current_period_end: Option<u64>,
}

impl BillingEvent {
    pub fn v1(
        user_id: UserId,
        new_status: SubscriptionStatus,
        canceled_at: Option<UnixTimeMs>,
        current_period_end: Option<UnixTimeMs>,
    ) -> Self {
        Self {
            user_id,
            new_status,
            canceled_at: canceled_at.map(|t| t.0),
            current_period_end: current_period_end.map(|t| t.0),
        }
    }

    pub fn canceled_at_ms(&self) -> Option<UnixTimeMs> {
        self.canceled_at.map(UnixTimeMs)
    }

    pub fn current_period_end_ms(&self) -> Option<UnixTimeMs> {
        self.current_period_end.map(UnixTimeMs)
    }
}

impl Validate for BillingEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "billing_event.user_id",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

/// The only fields a billing-event application may touch on a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingWrite {
    pub subscription_status: SubscriptionStatus,
    pub subscription_end_at: Option<UnixTimeMs>,
    pub account_deletion_at: Option<UnixTimeMs>,
}

impl Validate for BillingWrite {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.account_deletion_at.is_some() && self.subscription_end_at.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "billing_write.account_deletion_at",
                reason: "requires subscription_end_at to be set",
            });
        }
        if self.subscription_status == SubscriptionStatus::Active
            && self.account_deletion_at.is_some()
        {
            return Err(ContractViolation::InvalidValue {
                field: "billing_write.account_deletion_at",
                reason: "must be clear while the subscription is active",
            });
        }
        Ok(())
    }
}
