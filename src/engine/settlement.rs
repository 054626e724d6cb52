//! Weekly payout settlement.
//!
//! Each week is settled on its own, in two zero-sum parts:
//!
//! * points: every member is paid `(score − average) · dollar_per_point`,
//!   where `average` is the mean weekly score over all members;
//! * bonus: every member below the top score pays `weekly_bonus` into a pool
//!   that is split evenly among the top scorer(s).
//!
//! Season totals are the sum of the weekly totals; there is no cross-week
//! normalisation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::db::models::{Member, Pick, PickOutcome};

/// League payout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutSettings {
    pub dollar_per_point: f64,
    pub weekly_bonus: f64,
}

/// One member's settled week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPayout {
    pub id: String,
    pub name: String,
    pub week_score: u32,
    pub points_payout: f64,
    pub bonus_payout: f64,
    pub total_weekly_payout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonTotal {
    pub id: String,
    pub name: String,
    pub season_total: f64,
}

/// Sum of confidence over the member's correct picks in `week`.
/// Pending and incorrect picks score nothing.
pub fn weekly_score(member_id: &str, week: u32, picks: &[Pick]) -> u32 {
    picks
        .iter()
        .filter(|p| p.user_id == member_id && p.week == week)
        .filter(|p| p.outcome == PickOutcome::Correct)
        .map(|p| u32::from(p.confidence))
        .sum()
}

/// Settle one week from already-computed member scores.
///
/// An empty member list yields no rows.
pub fn weekly_payouts(scores: &[(&Member, u32)], settings: PayoutSettings) -> Vec<WeeklyPayout> {
    if scores.is_empty() {
        return Vec::new();
    }

    let total: u32 = scores.iter().map(|(_, s)| *s).sum();
    let average = f64::from(total) / scores.len() as f64;
    let highest = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);

    let winners = scores.iter().filter(|(_, s)| *s == highest).count();
    let losers = scores.len() - winners;
    let bonus_pool = losers as f64 * settings.weekly_bonus;
    let bonus_per_winner = if winners > 0 {
        bonus_pool / winners as f64
    } else {
        0.0
    };

    scores
        .iter()
        .map(|(member, score)| {
            let points_payout = (f64::from(*score) - average) * settings.dollar_per_point;
            let bonus_payout = if *score == highest {
                bonus_per_winner
            } else {
                -settings.weekly_bonus
            };
            WeeklyPayout {
                id: member.id.clone(),
                name: member.name.clone(),
                week_score: *score,
                points_payout,
                bonus_payout,
                total_weekly_payout: points_payout + bonus_payout,
            }
        })
        .collect()
}

/// Score every member from the week's picks and settle the week.
/// Members without picks score zero.
pub fn compute_weekly_payouts(
    week: u32,
    members: &[Member],
    picks_for_week: &[Pick],
    settings: PayoutSettings,
) -> Vec<WeeklyPayout> {
    let scores: Vec<(&Member, u32)> = members
        .iter()
        .map(|m| (m, weekly_score(&m.id, week, picks_for_week)))
        .collect();
    weekly_payouts(&scores, settings)
}

/// Settle each listed week independently and total per member.
/// `picks` may span any number of weeks; each week only sees its own picks.
pub fn compute_season_totals(
    weeks: &[u32],
    members: &[Member],
    picks: &[Pick],
    settings: PayoutSettings,
) -> Vec<SeasonTotal> {
    let mut by_week: BTreeMap<u32, Vec<Pick>> = BTreeMap::new();
    for pick in picks {
        by_week.entry(pick.week).or_default().push(pick.clone());
    }

    let mut totals: HashMap<String, f64> = HashMap::new();
    for &week in weeks {
        let week_picks = by_week.get(&week).map(Vec::as_slice).unwrap_or(&[]);
        for row in compute_weekly_payouts(week, members, week_picks, settings) {
            *totals.entry(row.id).or_insert(0.0) += row.total_weekly_payout;
        }
    }

    members
        .iter()
        .map(|m| SeasonTotal {
            id: m.id.clone(),
            name: m.name.clone(),
            season_total: totals.get(m.id.as_str()).copied().unwrap_or(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{BetSide, BetType};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const SETTINGS: PayoutSettings = PayoutSettings {
        dollar_per_point: 2.0,
        weekly_bonus: 5.0,
    };

    fn member(id: &str) -> Member {
        Member {
            id: id.into(),
            name: id.to_uppercase(),
            email: None,
        }
    }

    fn pick(user: &str, week: u32, confidence: u8, outcome: PickOutcome) -> Pick {
        Pick {
            id: 0,
            user_id: user.into(),
            game_id: 1,
            week,
            bet_type: BetType::Spread,
            bet_side: BetSide::Favorite,
            confidence,
            outcome,
        }
    }

    fn settle(raw: &[u32], settings: PayoutSettings) -> Vec<WeeklyPayout> {
        let members: Vec<Member> = (0..raw.len()).map(|i| member(&format!("m{i}"))).collect();
        let scores: Vec<(&Member, u32)> = members.iter().zip(raw.iter().copied()).collect();
        weekly_payouts(&scores, settings)
    }

    #[test]
    fn weekly_score_counts_only_correct_picks_in_week() {
        let picks = vec![
            pick("a", 1, 10, PickOutcome::Correct),
            pick("a", 1, 9, PickOutcome::Incorrect),
            pick("a", 1, 8, PickOutcome::Pending),
            pick("a", 1, 3, PickOutcome::Correct),
            pick("a", 2, 7, PickOutcome::Correct),
            pick("b", 1, 6, PickOutcome::Correct),
        ];
        assert_eq!(weekly_score("a", 1, &picks), 13);
        assert_eq!(weekly_score("a", 2, &picks), 7);
        assert_eq!(weekly_score("c", 1, &picks), 0);
    }

    #[test]
    fn three_member_example() {
        let rows = settle(&[30, 20, 10], SETTINGS);
        let points: Vec<f64> = rows.iter().map(|r| r.points_payout).collect();
        let bonus: Vec<f64> = rows.iter().map(|r| r.bonus_payout).collect();
        let totals: Vec<f64> = rows.iter().map(|r| r.total_weekly_payout).collect();
        for (got, want) in points.iter().zip([20.0, 0.0, -20.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-9);
        }
        for (got, want) in bonus.iter().zip([10.0, -5.0, -5.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-9);
        }
        for (got, want) in totals.iter().zip([30.0, -5.0, -25.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn payouts_are_zero_sum() {
        let weeks: [&[u32]; 5] = [
            &[30, 20, 10],
            &[17, 17, 3, 41, 0],
            &[55, 55, 54],
            &[1, 2, 3, 4, 5, 6, 7],
            &[0, 0, 1],
        ];
        let settings = PayoutSettings {
            dollar_per_point: 1.75,
            weekly_bonus: 3.3,
        };
        for scores in weeks {
            let rows = settle(scores, settings);
            let points: f64 = rows.iter().map(|r| r.points_payout).sum();
            let bonus: f64 = rows.iter().map(|r| r.bonus_payout).sum();
            assert_abs_diff_eq!(points, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(bonus, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn single_winner_collects_from_everyone() {
        let rows = settle(&[12, 40, 7, 19], SETTINGS);
        for row in &rows {
            if row.week_score == 40 {
                assert_relative_eq!(row.bonus_payout, 15.0, epsilon = 1e-9);
            } else {
                assert_relative_eq!(row.bonus_payout, -5.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn tied_winners_split_the_pool() {
        let rows = settle(&[25, 25, 10, 5], SETTINGS);
        assert_relative_eq!(rows[0].bonus_payout, 5.0, epsilon = 1e-9);
        assert_relative_eq!(rows[1].bonus_payout, 5.0, epsilon = 1e-9);
        assert_relative_eq!(rows[2].bonus_payout, -5.0, epsilon = 1e-9);
    }

    #[test]
    fn all_tied_week_pays_nothing() {
        for row in settle(&[14, 14, 14], SETTINGS) {
            assert_eq!(row.points_payout, 0.0);
            assert_eq!(row.bonus_payout, 0.0);
            assert_eq!(row.total_weekly_payout, 0.0);
        }
    }

    #[test]
    fn single_member_league_pays_nothing() {
        let rows = settle(&[33], SETTINGS);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].points_payout, 0.0);
        assert_eq!(rows[0].bonus_payout, 0.0);
    }

    #[test]
    fn empty_league_has_no_rows() {
        assert!(settle(&[], SETTINGS).is_empty());
    }

    #[test]
    fn week_without_picks_settles_to_zero() {
        let members = vec![member("a"), member("b")];
        let rows = compute_weekly_payouts(4, &members, &[], SETTINGS);
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.week_score, 0);
            assert_eq!(row.total_weekly_payout, 0.0);
        }
    }

    #[test]
    fn season_total_sums_independent_weeks() {
        let members = vec![member("a"), member("b"), member("c")];
        let picks = vec![
            // week 1: a=30, b=20, c=10 -> totals 30, -5, -25
            pick("a", 1, 10, PickOutcome::Correct),
            pick("a", 1, 9, PickOutcome::Correct),
            pick("a", 1, 8, PickOutcome::Correct),
            pick("a", 1, 3, PickOutcome::Correct),
            pick("b", 1, 10, PickOutcome::Correct),
            pick("b", 1, 6, PickOutcome::Correct),
            pick("b", 1, 4, PickOutcome::Correct),
            pick("c", 1, 10, PickOutcome::Correct),
            pick("c", 1, 9, PickOutcome::Incorrect),
            // week 2: c=9, others 0 -> c: +12 + 10, a,b: -6 - 5
            pick("c", 2, 9, PickOutcome::Correct),
            pick("a", 2, 10, PickOutcome::Pending),
        ];
        let totals = compute_season_totals(&[1, 2], &members, &picks, SETTINGS);
        assert_relative_eq!(totals[0].season_total, 30.0 - 11.0, epsilon = 1e-9);
        assert_relative_eq!(totals[1].season_total, -5.0 - 11.0, epsilon = 1e-9);
        assert_relative_eq!(totals[2].season_total, -25.0 + 22.0, epsilon = 1e-9);

        let sum: f64 = totals.iter().map(|t| t.season_total).sum();
        assert_abs_diff_eq!(sum, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn season_totals_follow_member_order() {
        let members = vec![member("c"), member("a"), member("b")];
        let picks = vec![pick("a", 1, 10, PickOutcome::Correct)];
        let totals = compute_season_totals(&[1], &members, &picks, SETTINGS);
        let ids: Vec<&str> = totals.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(totals[1].season_total > 0.0);
        assert!(totals[0].season_total < 0.0);
    }

    #[test]
    fn season_total_ignores_unlisted_weeks() {
        let members = vec![member("a"), member("b")];
        let picks = vec![pick("a", 3, 10, PickOutcome::Correct)];
        let totals = compute_season_totals(&[1, 2], &members, &picks, SETTINGS);
        assert!(totals.iter().all(|t| t.season_total == 0.0));
    }
}
