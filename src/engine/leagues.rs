use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::db::models::{League, Member, User};

use super::service::PickemEngine;

const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const INVITE_CODE_LEN: usize = 8;
const INVITE_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("League name required")]
    NameRequired,

    #[error("You are already in a league")]
    AlreadyInLeague,

    #[error("Invalid invite code")]
    InvalidInviteCode,

    #[error("League not found")]
    NotFound,

    #[error("Only the league admin can do that")]
    NotAdmin,

    #[error("Cannot remove yourself")]
    CannotRemoveSelf,

    #[error("{0} must be a non-negative number")]
    InvalidPayout(&'static str),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// The caller's league as shown on the league page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyLeague {
    pub league: League,
    pub members: Vec<Member>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaguePreview {
    pub name: String,
    pub member_count: i64,
}

pub fn generate_invite_code<R: Rng>(rng: &mut R) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

fn check_payout(what: &'static str, value: f64) -> Result<(), LeagueError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LeagueError::InvalidPayout(what))
    }
}

impl PickemEngine {
    pub fn login(&self, user: &User) -> Result<()> {
        self.db().upsert_user(user)
    }

    pub fn my_league(&self, user_id: &str) -> Result<Option<MyLeague>> {
        let Some(league) = self.db().league_for_user(user_id)? else {
            return Ok(None);
        };
        let members = self.db().list_members(league.id)?;
        let is_admin = league.admin_id == user_id;
        Ok(Some(MyLeague {
            league,
            members,
            is_admin,
        }))
    }

    /// Create a league with the caller as admin and first member.
    pub fn create_league(&self, user_id: &str, name: &str) -> Result<League, LeagueError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LeagueError::NameRequired);
        }
        if self.db().is_in_any_league(user_id)? {
            return Err(LeagueError::AlreadyInLeague);
        }

        let mut rng = rand::thread_rng();
        let mut code = generate_invite_code(&mut rng);
        for _ in 1..INVITE_CODE_ATTEMPTS {
            if self.db().league_by_invite_code(&code)?.is_none() {
                break;
            }
            code = generate_invite_code(&mut rng);
        }

        let payouts = self.default_payouts();
        let league_id = self.db().create_league(
            name,
            &code,
            user_id,
            payouts.dollar_per_point,
            payouts.weekly_bonus,
        )?;
        info!("League '{}' ({}) created by {}", name, league_id, user_id);
        self.db()
            .league_by_id(league_id)?
            .ok_or(LeagueError::NotFound)
    }

    /// Join by invite code; codes are matched case-insensitively.
    pub fn join_league(&self, user_id: &str, invite_code: &str) -> Result<League, LeagueError> {
        if self.db().is_in_any_league(user_id)? {
            return Err(LeagueError::AlreadyInLeague);
        }
        let league = self
            .db()
            .league_by_invite_code(&invite_code.trim().to_uppercase())?
            .ok_or(LeagueError::InvalidInviteCode)?;
        self.db().add_member(league.id, user_id)?;
        info!("{} joined league {}", user_id, league.id);
        Ok(league)
    }

    pub fn preview_league(&self, invite_code: &str) -> Result<LeaguePreview, LeagueError> {
        let league = self
            .db()
            .league_by_invite_code(&invite_code.trim().to_uppercase())?
            .ok_or(LeagueError::InvalidInviteCode)?;
        let member_count = self.db().member_count(league.id)?;
        Ok(LeaguePreview {
            name: league.name,
            member_count,
        })
    }

    fn admin_league(&self, user_id: &str, league_id: i64) -> Result<League, LeagueError> {
        let league = self
            .db()
            .league_by_id(league_id)?
            .ok_or(LeagueError::NotFound)?;
        if league.admin_id != user_id {
            return Err(LeagueError::NotAdmin);
        }
        Ok(league)
    }

    pub fn update_league(
        &self,
        user_id: &str,
        league_id: i64,
        name: &str,
        dollar_per_point: f64,
        weekly_bonus: f64,
    ) -> Result<League, LeagueError> {
        self.admin_league(user_id, league_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(LeagueError::NameRequired);
        }
        check_payout("dollarPerPoint", dollar_per_point)?;
        check_payout("weeklyBonus", weekly_bonus)?;

        self.db()
            .update_league(league_id, name, dollar_per_point, weekly_bonus)?;
        self.db()
            .league_by_id(league_id)?
            .ok_or(LeagueError::NotFound)
    }

    /// Returns whether the member was in the league.
    pub fn remove_member(
        &self,
        user_id: &str,
        league_id: i64,
        member_id: &str,
    ) -> Result<bool, LeagueError> {
        self.admin_league(user_id, league_id)?;
        if member_id == user_id {
            return Err(LeagueError::CannotRemoveSelf);
        }
        let removed = self.db().remove_member(league_id, member_id)?;
        if removed {
            info!("{} removed {} from league {}", user_id, member_id, league_id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::service::tests::engine;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn invite_codes_use_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let code = generate_invite_code(&mut rng);
            assert_eq!(code.len(), 8);
            assert!(code.bytes().all(|b| INVITE_ALPHABET.contains(&b)));
            assert!(!code.contains(|c: char| "O0I1".contains(c)));
        }
    }

    #[test]
    fn create_and_join() {
        let engine = engine();
        let league = engine.create_league("admin", "Sunday Crew").unwrap();
        assert_eq!(league.admin_id, "admin");
        assert_eq!(league.dollar_per_point, 2.0);
        assert_eq!(league.weekly_bonus, 5.0);

        assert!(matches!(
            engine.create_league("admin", "Second"),
            Err(LeagueError::AlreadyInLeague)
        ));

        let joined = engine
            .join_league("friend", &league.invite_code.to_lowercase())
            .unwrap();
        assert_eq!(joined.id, league.id);
        assert!(matches!(
            engine.join_league("friend", &league.invite_code),
            Err(LeagueError::AlreadyInLeague)
        ));
        assert!(matches!(
            engine.join_league("other", "NOPE2345"),
            Err(LeagueError::InvalidInviteCode)
        ));

        let preview = engine.preview_league(&league.invite_code).unwrap();
        assert_eq!(preview.member_count, 2);

        let mine = engine.my_league("friend").unwrap().unwrap();
        assert!(!mine.is_admin);
        assert_eq!(mine.members.len(), 2);
        assert!(engine.my_league("other").unwrap().is_none());
    }

    #[test]
    fn blank_name_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.create_league("u1", "   "),
            Err(LeagueError::NameRequired)
        ));
    }

    #[test]
    fn admin_only_settings() {
        let engine = engine();
        let league = engine.create_league("admin", "Crew").unwrap();
        engine.join_league("friend", &league.invite_code).unwrap();

        assert!(matches!(
            engine.update_league("friend", league.id, "Mine", 1.0, 1.0),
            Err(LeagueError::NotAdmin)
        ));
        assert!(matches!(
            engine.update_league("admin", league.id, "Crew", -1.0, 5.0),
            Err(LeagueError::InvalidPayout("dollarPerPoint"))
        ));
        assert!(matches!(
            engine.update_league("admin", league.id, "Crew", 1.0, f64::NAN),
            Err(LeagueError::InvalidPayout("weeklyBonus"))
        ));
        assert!(matches!(
            engine.update_league("admin", 999, "Crew", 1.0, 1.0),
            Err(LeagueError::NotFound)
        ));

        let updated = engine
            .update_league("admin", league.id, "High Rollers", 10.0, 20.0)
            .unwrap();
        assert_eq!(updated.name, "High Rollers");
        assert_eq!(updated.dollar_per_point, 10.0);
    }

    #[test]
    fn remove_member_rules() {
        let engine = engine();
        let league = engine.create_league("admin", "Crew").unwrap();
        engine.join_league("friend", &league.invite_code).unwrap();

        assert!(matches!(
            engine.remove_member("admin", league.id, "admin"),
            Err(LeagueError::CannotRemoveSelf)
        ));
        assert!(matches!(
            engine.remove_member("friend", league.id, "admin"),
            Err(LeagueError::NotAdmin)
        ));
        assert!(engine.remove_member("admin", league.id, "friend").unwrap());
        assert!(!engine.remove_member("admin", league.id, "friend").unwrap());
        assert!(engine.my_league("friend").unwrap().is_none());
    }
}
