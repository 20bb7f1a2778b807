// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::{AccountId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    pub const ALL: [Self; 3] = [Self::One, Self::Two, Self::Three];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::One => "tier_1",
            Self::Two => "tier_2",
            Self::Three => "tier_3",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tier_1" => Some(Self::One),
            "tier_2" => Some(Self::Two),
            "tier_3" => Some(Self::Three),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::One => "Tier 1",
            Self::Two => "Tier 2",
            Self::Three => "Tier 3",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
        }
    }

    /// The tier an account lands in after one promotion step. Tier 1 is the
    /// top; accounts already there stay put.
    pub const fn promoted(self) -> Self {
        match self {
            Self::One => Self::One,
            Self::Two => Self::One,
            Self::Three => Self::Two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    Name,
    LastModifiedBy,
}

impl SortField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::LastModifiedBy => "last modified by",
        }
    }

    pub const fn next(self) -> Self {
        match self {
            Self::Name => Self::LastModifiedBy,
            Self::LastModifiedBy => Self::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
}

/// Raw account record as returned by the data service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub phone: String,
    pub tier: Tier,
    pub owner: Option<UserRef>,
    pub last_modified_by: Option<UserRef>,
    pub updated_at: OffsetDateTime,
}

/// Display row derived from an [`Account`]. Never persisted; recomputed on
/// every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: AccountId,
    pub name: String,
    pub phone: String,
    pub detail_url: String,
    pub last_modified_by: String,
    pub owner_name: String,
}

impl AccountRow {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            phone: account.phone.clone(),
            detail_url: account_detail_url(account.id),
            last_modified_by: account
                .last_modified_by
                .as_ref()
                .map(|user| user.name.clone())
                .unwrap_or_default(),
            owner_name: account
                .owner
                .as_ref()
                .map(|user| user.name.clone())
                .unwrap_or_default(),
        }
    }
}

pub fn account_detail_url(id: AccountId) -> String {
    format!("/account/{}/view", id.get())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOption {
    pub label: String,
    pub value: Option<UserId>,
}

impl UserOption {
    pub fn all_owners() -> Self {
        Self {
            label: "All Owners".to_owned(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// One-way outbound notification; presentation belongs to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub severity: NoticeSeverity,
}

impl Notice {
    pub fn new(title: &str, message: impl Into<String>, severity: NoticeSeverity) -> Self {
        Self {
            title: title.to_owned(),
            message: message.into(),
            severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Account, AccountRow, Tier, UserRef, account_detail_url};
    use crate::ids::{AccountId, UserId};
    use time::macros::datetime;

    fn account(id: i64) -> Account {
        Account {
            id: AccountId::new(id),
            name: "Acme Corp".to_owned(),
            phone: "555-0101".to_owned(),
            tier: Tier::Two,
            owner: Some(UserRef {
                id: UserId::new(7),
                name: "Dana Reed".to_owned(),
            }),
            last_modified_by: None,
            updated_at: datetime!(2026-01-05 12:00 UTC),
        }
    }

    #[test]
    fn detail_url_embeds_account_id() {
        assert_eq!(account_detail_url(AccountId::new(42)), "/account/42/view");
    }

    #[test]
    fn decoration_defaults_missing_references_to_empty_names() {
        let row = AccountRow::from_account(&account(3));
        assert_eq!(row.detail_url, "/account/3/view");
        assert_eq!(row.owner_name, "Dana Reed");
        assert_eq!(row.last_modified_by, "");
    }

    #[test]
    fn tier_round_trips_through_storage_form() {
        for tier in Tier::ALL {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("tier_9"), None);
    }

    #[test]
    fn promotion_moves_up_one_tier_and_saturates_at_the_top() {
        assert_eq!(Tier::Three.promoted(), Tier::Two);
        assert_eq!(Tier::Two.promoted(), Tier::One);
        assert_eq!(Tier::One.promoted(), Tier::One);
    }
}
