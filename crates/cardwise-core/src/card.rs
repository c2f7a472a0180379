//! Card and benefit catalog types.
//!
//! The catalog is owned one-directionally: a [`Card`] owns its [`Benefit`]
//! list, and a benefit owns its per-kind [`BenefitTerms`] lists. Rows coming
//! from the external sync feed are matched by `external_id`, which makes the
//! upsert idempotent. Nothing here holds a back-reference; lookups in the
//! other direction go through identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CardId, UserId};

/// The kind of a benefit accrual track.
///
/// Each kind has an independent usage ledger and limit; the variants are
/// closed and every consumer matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BenefitKind {
    /// Instant discount on the transaction amount.
    Discount,
    /// Points credited against spend.
    Point,
    /// Cashback credited against spend.
    Cashback,
}

impl BenefitKind {
    /// All kinds, in ledger order.
    pub const ALL: [Self; 3] = [Self::Discount, Self::Point, Self::Cashback];

    /// Stable string tag (used in lock keys and log fields).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discount => "DISCOUNT",
            Self::Point => "POINT",
            Self::Cashback => "CASHBACK",
        }
    }

    /// Single-byte code used in store key encoding.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Discount => 1,
            Self::Point => 2,
            Self::Cashback => 3,
        }
    }

    /// Decode a store key byte back into a kind.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Discount),
            2 => Some(Self::Point),
            3 => Some(Self::Cashback),
            _ => None,
        }
    }
}

impl std::fmt::Display for BenefitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction channel a benefit term applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    /// Online transactions only.
    Online,
    /// Offline (point-of-sale) transactions only.
    Offline,
    /// Applies on either channel.
    Both,
}

impl Channel {
    /// Whether a term declared for `self` is admitted under `filter`.
    ///
    /// `Both` always passes; no filter admits everything.
    #[must_use]
    pub fn admits(self, filter: Option<Channel>) -> bool {
        match filter {
            None => true,
            Some(f) => self == f || self == Self::Both,
        }
    }
}

/// A single accrual term of a benefit (one row of the feed's
/// discount/point/cashback sub-lists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitTerms {
    /// External feed identifier for idempotent upsert.
    pub external_id: i64,

    /// Fraction of spend returned (e.g. 0.05 for 5%).
    pub rate: f64,

    /// Optional flat reward amount in won; 0 means rate-based.
    pub amount: i64,

    /// Spend floor below which the term does not qualify.
    pub minimum_amount: i64,

    /// Cap on cumulative accrued usage for this term, in won.
    pub benefit_limit: i64,

    /// Channel the term is restricted to.
    pub channel: Channel,
}

/// A benefit owned by a card.
///
/// `applicable_categories` and `applicable_targets` scope where the benefit
/// applies; an empty set means unrestricted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefit {
    /// External feed identifier for idempotent upsert.
    pub external_id: i64,

    /// Category group codes the benefit is restricted to.
    #[serde(default)]
    pub applicable_categories: Vec<String>,

    /// Place names the benefit is restricted to.
    #[serde(default)]
    pub applicable_targets: Vec<String>,

    /// Discount terms.
    #[serde(default)]
    pub discounts: Vec<BenefitTerms>,

    /// Point terms.
    #[serde(default)]
    pub points: Vec<BenefitTerms>,

    /// Cashback terms.
    #[serde(default)]
    pub cashbacks: Vec<BenefitTerms>,
}

impl Benefit {
    /// The terms list for a given kind.
    #[must_use]
    pub fn terms(&self, kind: BenefitKind) -> &[BenefitTerms] {
        match kind {
            BenefitKind::Discount => &self.discounts,
            BenefitKind::Point => &self.points,
            BenefitKind::Cashback => &self.cashbacks,
        }
    }

    /// Whether the benefit's target list admits a place.
    ///
    /// An empty target list means the benefit is unrestricted by place.
    #[must_use]
    pub fn targets_place(&self, place: &str) -> bool {
        self.applicable_targets.is_empty()
            || self.applicable_targets.iter().any(|t| t == place)
    }
}

/// A card in the catalog, as synced from the external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Internal identifier, assigned on first sync.
    pub id: CardId,

    /// External feed identifier for idempotent upsert.
    pub external_id: i64,

    /// Display name.
    pub name: String,

    /// Issuing bank or company.
    pub issuer: String,

    /// Catalog image URL.
    pub image_url: Option<String>,

    /// Card product type label (e.g. "CREDIT", "CHECK").
    pub card_type: Option<String>,

    /// Benefits owned by this card.
    #[serde(default)]
    pub benefits: Vec<Benefit>,
}

impl Card {
    /// Benefits whose target list admits `place`.
    pub fn benefits_for_place<'a>(&'a self, place: &'a str) -> impl Iterator<Item = &'a Benefit> {
        self.benefits.iter().filter(move |b| b.targets_place(place))
    }

    /// Sum of `benefit_limit` across all of this card's terms of `kind`.
    ///
    /// A card may aggregate several synced benefit rows of the same kind, so
    /// the authoritative cap for a `(user, card, kind)` ledger is the sum.
    #[must_use]
    pub fn limit_sum(&self, kind: BenefitKind) -> i64 {
        self.benefits
            .iter()
            .flat_map(|b| b.terms(kind))
            .map(|t| t.benefit_limit)
            .sum()
    }

    /// The performance target for this card: the most restrictive spend floor
    /// declared across all benefit terms, if any.
    #[must_use]
    pub fn target_amount(&self) -> Option<i64> {
        self.benefits
            .iter()
            .flat_map(|b| BenefitKind::ALL.iter().flat_map(|k| b.terms(*k)))
            .map(|t| t.minimum_amount)
            .filter(|m| *m > 0)
            .max()
    }
}

/// A user's registration of a catalog card.
///
/// Unregistration deactivates the row instead of deleting it so that the
/// usage history behind it stays intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCard {
    /// The owning user.
    pub user_id: UserId,

    /// The registered card.
    pub card_id: CardId,

    /// Whether the registration is currently active.
    pub is_active: bool,

    /// When the card was registered.
    pub registered_at: DateTime<Utc>,

    /// When the card was deactivated, if it has been.
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl UserCard {
    /// Register a card for a user.
    #[must_use]
    pub fn register(user_id: UserId, card_id: CardId) -> Self {
        Self {
            user_id,
            card_id,
            is_active: true,
            registered_at: Utc::now(),
            deactivated_at: None,
        }
    }

    /// Soft-delete the registration.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.deactivated_at = Some(Utc::now());
    }

    /// Re-activate a previously deactivated registration.
    pub fn reactivate(&mut self) {
        self.is_active = true;
        self.deactivated_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(limit: i64, min: i64, channel: Channel) -> BenefitTerms {
        BenefitTerms {
            external_id: 1,
            rate: 0.05,
            amount: 0,
            minimum_amount: min,
            benefit_limit: limit,
            channel,
        }
    }

    fn card_with(benefits: Vec<Benefit>) -> Card {
        Card {
            id: CardId::generate(),
            external_id: 100,
            name: "Test Card".into(),
            issuer: "Test Bank".into(),
            image_url: None,
            card_type: None,
            benefits,
        }
    }

    #[test]
    fn empty_target_list_admits_any_place() {
        let benefit = Benefit {
            external_id: 1,
            applicable_categories: vec![],
            applicable_targets: vec![],
            discounts: vec![],
            points: vec![],
            cashbacks: vec![],
        };
        assert!(benefit.targets_place("anywhere"));
    }

    #[test]
    fn target_list_restricts_place() {
        let benefit = Benefit {
            external_id: 1,
            applicable_categories: vec![],
            applicable_targets: vec!["CoffeeShop".into()],
            discounts: vec![],
            points: vec![],
            cashbacks: vec![],
        };
        assert!(benefit.targets_place("CoffeeShop"));
        assert!(!benefit.targets_place("Bakery"));
    }

    #[test]
    fn limit_sum_aggregates_across_benefits() {
        let card = card_with(vec![
            Benefit {
                external_id: 1,
                applicable_categories: vec![],
                applicable_targets: vec![],
                discounts: vec![terms(1000, 0, Channel::Both)],
                points: vec![],
                cashbacks: vec![],
            },
            Benefit {
                external_id: 2,
                applicable_categories: vec![],
                applicable_targets: vec![],
                discounts: vec![terms(500, 0, Channel::Online)],
                points: vec![terms(300, 0, Channel::Both)],
                cashbacks: vec![],
            },
        ]);

        assert_eq!(card.limit_sum(BenefitKind::Discount), 1500);
        assert_eq!(card.limit_sum(BenefitKind::Point), 300);
        assert_eq!(card.limit_sum(BenefitKind::Cashback), 0);
    }

    #[test]
    fn target_amount_is_most_restrictive_floor() {
        let card = card_with(vec![Benefit {
            external_id: 1,
            applicable_categories: vec![],
            applicable_targets: vec![],
            discounts: vec![terms(1000, 300_000, Channel::Both)],
            points: vec![terms(1000, 500_000, Channel::Both)],
            cashbacks: vec![terms(1000, 0, Channel::Both)],
        }]);

        assert_eq!(card.target_amount(), Some(500_000));
    }

    #[test]
    fn target_amount_none_without_floors() {
        let card = card_with(vec![]);
        assert_eq!(card.target_amount(), None);
    }

    #[test]
    fn channel_admits() {
        assert!(Channel::Both.admits(Some(Channel::Online)));
        assert!(Channel::Online.admits(Some(Channel::Online)));
        assert!(!Channel::Offline.admits(Some(Channel::Online)));
        assert!(Channel::Offline.admits(None));
    }

    #[test]
    fn user_card_soft_delete_cycle() {
        let mut uc = UserCard::register(UserId::generate(), CardId::generate());
        assert!(uc.is_active);

        uc.deactivate();
        assert!(!uc.is_active);
        assert!(uc.deactivated_at.is_some());

        uc.reactivate();
        assert!(uc.is_active);
        assert!(uc.deactivated_at.is_none());
    }

    #[test]
    fn kind_code_roundtrip() {
        for kind in BenefitKind::ALL {
            assert_eq!(BenefitKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(BenefitKind::from_code(0), None);
    }
}
