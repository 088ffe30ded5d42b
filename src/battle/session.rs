//! One-on-one battle state machine.
//!
//! A session lives only in memory. It tracks who may act and how the
//! battle ended; damage itself comes from [`super::resolve_attack`].

use crate::battle::AttackResult;
use crate::creature::OwnerId;
use crate::errors::{CollectorResult, PreconditionError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEnd {
    Defeat { winner: OwnerId, loser: OwnerId },
    Forfeit { by: OwnerId },
    /// Nobody answered the challenge, or the player to move stalled.
    Timeout { idle: OwnerId },
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattlePhase {
    WaitingForChallengeResponse,
    ActiveTurn(OwnerId),
    Ended(BattleEnd),
}

#[derive(Debug, Clone)]
pub struct BattleSession {
    pub challenger: OwnerId,
    pub opponent: OwnerId,
    pub phase: BattlePhase,
    /// When the current prompt expires
    pub deadline: Instant,
    pub timeout: Duration,
    pub turns_taken: u32,
}

impl BattleSession {
    pub fn new(challenger: &str, opponent: &str, now: Instant, timeout: Duration) -> CollectorResult<Self> {
        if challenger == opponent {
            return Err(PreconditionError::SelfTarget.into());
        }
        Ok(BattleSession {
            challenger: challenger.to_string(),
            opponent: opponent.to_string(),
            phase: BattlePhase::WaitingForChallengeResponse,
            deadline: now + timeout,
            timeout,
            turns_taken: 0,
        })
    }

    pub fn is_participant(&self, user: &str) -> bool {
        self.challenger == user || self.opponent == user
    }

    pub fn other(&self, user: &str) -> CollectorResult<&str> {
        if user == self.challenger {
            Ok(&self.opponent)
        } else if user == self.opponent {
            Ok(&self.challenger)
        } else {
            Err(PreconditionError::NotAParticipant(user.to_string()).into())
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, BattlePhase::Ended(_))
    }

    pub fn end_reason(&self) -> Option<&BattleEnd> {
        match &self.phase {
            BattlePhase::Ended(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whose move it is, if the battle is running.
    pub fn active(&self) -> Option<&str> {
        match &self.phase {
            BattlePhase::ActiveTurn(user) => Some(user),
            _ => None,
        }
    }

    /// The opponent accepts or declines. Accepting hands the first turn to
    /// the challenger.
    pub fn respond(&mut self, by: &str, accept: bool, now: Instant) -> CollectorResult<&BattlePhase> {
        self.check_deadline(now);
        if self.phase != BattlePhase::WaitingForChallengeResponse {
            return Err(self.wrong_phase());
        }
        if by != self.opponent {
            return Err(PreconditionError::NotAParticipant(by.to_string()).into());
        }

        self.phase = if accept {
            self.deadline = now + self.timeout;
            BattlePhase::ActiveTurn(self.challenger.clone())
        } else {
            BattlePhase::Ended(BattleEnd::Declined)
        };
        info!(challenger = %self.challenger, opponent = %self.opponent, accept, "challenge answered");
        Ok(&self.phase)
    }

    /// Fail unless `by` may act right now.
    pub fn ensure_turn(&mut self, by: &str, now: Instant) -> CollectorResult<()> {
        self.check_deadline(now);
        if !self.is_participant(by) {
            return Err(PreconditionError::NotAParticipant(by.to_string()).into());
        }
        match &self.phase {
            BattlePhase::ActiveTurn(active) if active == by => Ok(()),
            BattlePhase::ActiveTurn(_) => Err(PreconditionError::NotYourTurn(by.to_string()).into()),
            _ => Err(self.wrong_phase()),
        }
    }

    /// Record an attack by the active player. A faint ends the battle,
    /// otherwise the turn passes.
    pub fn record_attack(&mut self, by: &str, result: &AttackResult, now: Instant) -> CollectorResult<&BattlePhase> {
        self.ensure_turn(by, now)?;
        let other = self.other(by)?.to_string();
        self.turns_taken += 1;

        if result.fainted {
            info!(winner = %by, loser = %other, turns = self.turns_taken, "battle won");
            self.phase = BattlePhase::Ended(BattleEnd::Defeat {
                winner: by.to_string(),
                loser: other,
            });
        } else {
            debug!(attacker = %by, damage = result.damage, "turn passes");
            self.phase = BattlePhase::ActiveTurn(other);
            self.deadline = now + self.timeout;
        }
        Ok(&self.phase)
    }

    /// Spend the turn without attacking (using an item).
    pub fn pass_turn(&mut self, by: &str, now: Instant) -> CollectorResult<&BattlePhase> {
        self.ensure_turn(by, now)?;
        let other = self.other(by)?.to_string();
        self.turns_taken += 1;
        self.phase = BattlePhase::ActiveTurn(other);
        self.deadline = now + self.timeout;
        Ok(&self.phase)
    }

    /// Either participant may forfeit at any time before the end.
    pub fn forfeit(&mut self, by: &str) -> CollectorResult<&BattlePhase> {
        if !self.is_participant(by) {
            return Err(PreconditionError::NotAParticipant(by.to_string()).into());
        }
        if self.is_over() {
            return Err(self.wrong_phase());
        }
        info!(by = %by, "battle forfeited");
        self.phase = BattlePhase::Ended(BattleEnd::Forfeit { by: by.to_string() });
        Ok(&self.phase)
    }

    /// End the session if its deadline has passed. Returns true when this
    /// call ended it.
    pub fn check_deadline(&mut self, now: Instant) -> bool {
        if now < self.deadline {
            return false;
        }
        let idle = match &self.phase {
            BattlePhase::WaitingForChallengeResponse => self.opponent.clone(),
            BattlePhase::ActiveTurn(active) => active.clone(),
            BattlePhase::Ended(_) => return false,
        };
        info!(idle = %idle, "battle timed out");
        self.phase = BattlePhase::Ended(BattleEnd::Timeout { idle });
        true
    }

    fn wrong_phase(&self) -> crate::errors::CollectorError {
        let phase = match &self.phase {
            BattlePhase::WaitingForChallengeResponse => "waiting for the challenge response",
            BattlePhase::ActiveTurn(_) => "battle already running",
            BattlePhase::Ended(_) => "battle is over",
        };
        PreconditionError::WrongPhase(phase.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollectorError;
    use pretty_assertions::assert_eq;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn hit(damage: u32, fainted: bool) -> AttackResult {
        AttackResult {
            damage,
            defender_hp_after: if fainted { 0 } else { 10 },
            fainted,
        }
    }

    fn accepted(now: Instant) -> BattleSession {
        let mut session = BattleSession::new("ash", "gary", now, TIMEOUT).unwrap();
        session.respond("gary", true, now).unwrap();
        session
    }

    #[test]
    fn test_accept_gives_challenger_first_turn() {
        let now = Instant::now();
        let session = accepted(now);
        assert_eq!(session.phase, BattlePhase::ActiveTurn("ash".to_string()));
    }

    #[test]
    fn test_only_opponent_can_answer() {
        let now = Instant::now();
        let mut session = BattleSession::new("ash", "gary", now, TIMEOUT).unwrap();
        assert!(session.respond("ash", true, now).is_err());
        assert!(session.respond("brock", true, now).is_err());
        assert_eq!(session.phase, BattlePhase::WaitingForChallengeResponse);
    }

    #[test]
    fn test_decline_ends_session() {
        let now = Instant::now();
        let mut session = BattleSession::new("ash", "gary", now, TIMEOUT).unwrap();
        session.respond("gary", false, now).unwrap();
        assert_eq!(session.end_reason(), Some(&BattleEnd::Declined));
    }

    #[test]
    fn test_self_challenge_refused() {
        let result = BattleSession::new("ash", "ash", Instant::now(), TIMEOUT);
        assert_eq!(result.unwrap_err(), PreconditionError::SelfTarget.into());
    }

    #[test]
    fn test_turns_alternate() {
        let now = Instant::now();
        let mut session = accepted(now);

        session.record_attack("ash", &hit(12, false), now).unwrap();
        assert_eq!(session.active(), Some("gary"));
        assert_eq!(
            session.record_attack("ash", &hit(12, false), now).unwrap_err(),
            PreconditionError::NotYourTurn("ash".to_string()).into()
        );

        session.pass_turn("gary", now).unwrap();
        assert_eq!(session.active(), Some("ash"));
        assert_eq!(session.turns_taken, 2);
    }

    #[test]
    fn test_faint_ends_with_defeat() {
        let now = Instant::now();
        let mut session = accepted(now);
        session.record_attack("ash", &hit(200, true), now).unwrap();

        assert_eq!(
            session.end_reason(),
            Some(&BattleEnd::Defeat {
                winner: "ash".to_string(),
                loser: "gary".to_string(),
            })
        );
        assert!(matches!(
            session.record_attack("gary", &hit(1, false), now),
            Err(CollectorError::PreconditionFailed(PreconditionError::WrongPhase(_)))
        ));
    }

    #[test]
    fn test_forfeit_from_either_side() {
        let now = Instant::now();
        let mut session = accepted(now);
        session.forfeit("gary").unwrap();
        assert_eq!(
            session.end_reason(),
            Some(&BattleEnd::Forfeit {
                by: "gary".to_string()
            })
        );
        assert!(session.forfeit("ash").is_err());
    }

    #[test]
    fn test_outsider_cannot_act() {
        let now = Instant::now();
        let mut session = accepted(now);
        assert_eq!(
            session.forfeit("misty").unwrap_err(),
            PreconditionError::NotAParticipant("misty".to_string()).into()
        );
        assert!(session.ensure_turn("misty", now).is_err());
    }

    #[test]
    fn test_unanswered_challenge_times_out() {
        let now = Instant::now();
        let mut session = BattleSession::new("ash", "gary", now, TIMEOUT).unwrap();

        assert!(!session.check_deadline(now + Duration::from_secs(29)));
        assert!(session.respond("gary", true, now + TIMEOUT).is_err());
        assert_eq!(
            session.end_reason(),
            Some(&BattleEnd::Timeout {
                idle: "gary".to_string()
            })
        );
    }

    #[test]
    fn test_stalled_turn_times_out() {
        let start = Instant::now();
        let mut session = accepted(start);
        let later = start + Duration::from_secs(20);
        session.record_attack("ash", &hit(5, false), later).unwrap();

        // the deadline restarted at `later`
        assert!(!session.check_deadline(start + Duration::from_secs(45)));
        assert!(session.check_deadline(later + TIMEOUT));
        assert_eq!(
            session.end_reason(),
            Some(&BattleEnd::Timeout {
                idle: "gary".to_string()
            })
        );
        assert!(!session.check_deadline(later + TIMEOUT * 2));
    }
}
