//! Benefit matching and per-kind reward computation.
//!
//! Matching answers "does this benefit apply to this place / category /
//! channel"; reward computation turns a qualifying spend into the integer
//! won amount a kind accrues. Both are pure so the pipeline and the read-path
//! filter share one implementation.

use serde::{Deserialize, Serialize};

use crate::{Benefit, BenefitKind, BenefitTerms, Card, Channel};

/// A sub-benefit surfaced to presentation layers, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitInfo {
    /// The owning benefit's external id.
    pub benefit_external_id: i64,

    /// Accrual track.
    pub kind: BenefitKind,

    /// Fraction of spend returned.
    pub rate: f64,

    /// Flat reward amount, if the term declares one.
    pub amount: i64,

    /// The term's usage cap.
    pub benefit_limit: i64,
}

/// Whether a benefit applies for a category and channel.
///
/// An empty applicable-category set means "all categories"; a declared set
/// requires the expense's category to be a member. A channel filter requires
/// at least one sub-benefit on a matching or `Both` channel. Place/target
/// containment is deliberately not checked here; callers evaluate it with
/// [`Benefit::targets_place`] since the read path matches on targets before
/// it ever builds candidates.
#[must_use]
pub fn is_applicable(
    benefit: &Benefit,
    category_code: Option<&str>,
    channel: Option<Channel>,
) -> bool {
    if !benefit.applicable_categories.is_empty() {
        let Some(code) = category_code else {
            return false;
        };
        if !benefit.applicable_categories.iter().any(|c| c == code) {
            return false;
        }
    }

    match channel {
        None => true,
        Some(_) => BenefitKind::ALL
            .iter()
            .flat_map(|kind| benefit.terms(*kind))
            .any(|t| t.channel.admits(channel)),
    }
}

/// Enumerate the sub-benefits of a benefit whose channel passes `channel`,
/// tagged with their kind.
#[must_use]
pub fn list_benefit_info(benefit: &Benefit, channel: Option<Channel>) -> Vec<BenefitInfo> {
    let mut infos = Vec::new();
    for kind in BenefitKind::ALL {
        for term in benefit.terms(kind) {
            if term.channel.admits(channel) {
                infos.push(BenefitInfo {
                    benefit_external_id: benefit.external_id,
                    kind,
                    rate: term.rate,
                    amount: term.amount,
                    benefit_limit: term.benefit_limit,
                });
            }
        }
    }
    infos
}

/// Reward for a single term, floored to an integer won amount.
///
/// Terms whose spend floor is not met yield nothing. Discounts honor a flat
/// amount when one is declared; points and cashback are always rate-based.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn term_reward(term: &BenefitTerms, kind: BenefitKind, spend: i64) -> i64 {
    if spend < term.minimum_amount {
        return 0;
    }
    match kind {
        BenefitKind::Discount if term.amount > 0 => term.amount,
        BenefitKind::Discount | BenefitKind::Point | BenefitKind::Cashback => {
            (term.rate * spend as f64).floor() as i64
        }
    }
}

/// Total reward a benefit yields for `kind` at `spend`, summed across its
/// qualifying terms of that kind.
#[must_use]
pub fn kind_reward(benefit: &Benefit, kind: BenefitKind, spend: i64) -> i64 {
    benefit
        .terms(kind)
        .iter()
        .map(|t| term_reward(t, kind, spend))
        .sum()
}

/// Total reward a card yields for `kind` at `spend` for a given place,
/// summed across its place-matching benefits.
#[must_use]
pub fn card_kind_reward(card: &Card, kind: BenefitKind, place: &str, spend: i64) -> i64 {
    card.benefits_for_place(place)
        .map(|b| kind_reward(b, kind, spend))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(rate: f64, amount: i64, min: i64, channel: Channel) -> BenefitTerms {
        BenefitTerms {
            external_id: 7,
            rate,
            amount,
            minimum_amount: min,
            benefit_limit: 10_000,
            channel,
        }
    }

    fn benefit(categories: Vec<&str>, discounts: Vec<BenefitTerms>) -> Benefit {
        Benefit {
            external_id: 42,
            applicable_categories: categories.into_iter().map(String::from).collect(),
            applicable_targets: vec![],
            discounts,
            points: vec![],
            cashbacks: vec![],
        }
    }

    #[test]
    fn empty_category_set_matches_all() {
        let b = benefit(vec![], vec![term(0.05, 0, 0, Channel::Both)]);
        assert!(is_applicable(&b, Some("CE7"), None));
        assert!(is_applicable(&b, None, None));
    }

    #[test]
    fn declared_categories_require_membership() {
        let b = benefit(vec!["CE7"], vec![term(0.05, 0, 0, Channel::Both)]);
        assert!(is_applicable(&b, Some("CE7"), None));
        assert!(!is_applicable(&b, Some("FD6"), None));
        assert!(!is_applicable(&b, None, None));
    }

    #[test]
    fn channel_filter_needs_a_matching_term() {
        let b = benefit(vec![], vec![term(0.05, 0, 0, Channel::Offline)]);
        assert!(is_applicable(&b, None, Some(Channel::Offline)));
        assert!(!is_applicable(&b, None, Some(Channel::Online)));

        let both = benefit(vec![], vec![term(0.05, 0, 0, Channel::Both)]);
        assert!(is_applicable(&both, None, Some(Channel::Online)));
    }

    #[test]
    fn list_benefit_info_tags_kinds_and_filters_channel() {
        let b = Benefit {
            external_id: 42,
            applicable_categories: vec![],
            applicable_targets: vec![],
            discounts: vec![term(0.10, 0, 0, Channel::Offline)],
            points: vec![term(0.01, 0, 0, Channel::Both)],
            cashbacks: vec![term(0.02, 0, 0, Channel::Online)],
        };

        let all = list_benefit_info(&b, None);
        assert_eq!(all.len(), 3);

        let online = list_benefit_info(&b, Some(Channel::Online));
        let kinds: Vec<_> = online.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![BenefitKind::Point, BenefitKind::Cashback]);
    }

    #[test]
    fn rate_reward_floors_to_won() {
        let t = term(0.033, 0, 0, Channel::Both);
        // 0.033 * 9999 = 329.967 -> 329
        assert_eq!(term_reward(&t, BenefitKind::Point, 9999), 329);
    }

    #[test]
    fn discount_prefers_flat_amount() {
        // flat 700 and rate-based 0.05 * 10,000 = 500 must differ so the
        // two paths are distinguishable
        let t = term(0.05, 700, 0, Channel::Both);
        assert_eq!(term_reward(&t, BenefitKind::Discount, 10_000), 700);
        // other kinds stay rate-based even with a flat amount present
        assert_eq!(term_reward(&t, BenefitKind::Cashback, 10_000), 500);
        assert_eq!(term_reward(&t, BenefitKind::Point, 10_000), 500);
    }

    #[test]
    fn spend_floor_gates_reward() {
        let t = term(0.05, 0, 5000, Channel::Both);
        assert_eq!(term_reward(&t, BenefitKind::Discount, 4999), 0);
        assert_eq!(term_reward(&t, BenefitKind::Discount, 5000), 250);
    }

    #[test]
    fn kind_reward_sums_terms() {
        let b = benefit(
            vec![],
            vec![
                term(0.05, 0, 0, Channel::Both),
                term(0.01, 0, 0, Channel::Both),
            ],
        );
        assert_eq!(kind_reward(&b, BenefitKind::Discount, 10_000), 600);
    }
}
