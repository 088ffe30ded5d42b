use crate::creature::OwnerId;
use crate::errors::{CollectorError, CollectorResult, NotFoundError};
use crate::sessions::SessionRegistry;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

/// How many users the leaderboard shows
pub const LEADERBOARD_SIZE: usize = 5;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, EnumString, EnumIter, Display,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Parse a player's choice; no choice means medium.
    pub fn parse(text: &str) -> CollectorResult<Self> {
        if text.trim().is_empty() {
            return Ok(Difficulty::default());
        }
        Difficulty::from_str(text.trim()).map_err(|_| {
            CollectorError::invalid(format!(
                "unknown difficulty '{}', choose easy, medium or hard",
                text
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaQuestion {
    pub difficulty: Difficulty,
    pub question: String,
    pub answer: String,
}

impl TriviaQuestion {
    /// Answers match ignoring case and surrounding whitespace.
    pub fn is_correct(&self, reply: &str) -> bool {
        self.answer.trim().eq_ignore_ascii_case(reply.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriviaAnswer {
    pub correct: bool,
    pub difficulty: Difficulty,
    pub expected: String,
    /// Score after the point for answering
    pub score: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Trivia {
    questions: BTreeMap<Difficulty, Vec<TriviaQuestion>>,
    pending: SessionRegistry<TriviaQuestion>,
    scores: BTreeMap<OwnerId, u32>,
}

impl Trivia {
    pub fn new(questions: Vec<TriviaQuestion>) -> Self {
        let mut by_difficulty: BTreeMap<Difficulty, Vec<TriviaQuestion>> = BTreeMap::new();
        for question in questions {
            by_difficulty.entry(question.difficulty).or_default().push(question);
        }
        Trivia {
            questions: by_difficulty,
            ..Default::default()
        }
    }

    /// Draw a question for `user`. Only one question may be open per user.
    pub fn ask<R: Rng + ?Sized>(
        &mut self,
        user: &str,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> CollectorResult<&TriviaQuestion> {
        let question = self
            .questions
            .get(&difficulty)
            .and_then(|pool| pool.choose(rng))
            .cloned()
            .ok_or_else(|| {
                CollectorError::invalid(format!("no questions available for {}", difficulty))
            })?;
        debug!(user = %user, %difficulty, "trivia question asked");
        let open = self.pending.create(user, question)?;
        Ok(open)
    }

    pub fn is_waiting(&self, user: &str) -> bool {
        self.pending.contains(user)
    }

    /// Close the open question with `reply`. Answering, right or wrong,
    /// earns one score point.
    pub fn answer(&mut self, user: &str, reply: &str) -> CollectorResult<TriviaAnswer> {
        let question = self
            .pending
            .destroy(user)
            .ok_or_else(|| NotFoundError::Session(format!("trivia for {}", user)))?;

        let score = self.scores.entry(user.to_string()).or_default();
        *score += 1;
        let correct = question.is_correct(reply);
        debug!(user = %user, correct, score = *score, "trivia answered");

        Ok(TriviaAnswer {
            correct,
            difficulty: question.difficulty,
            expected: question.answer,
            score: *score,
        })
    }

    /// Drop an unanswered question. The score is left alone.
    pub fn cancel(&mut self, user: &str) -> bool {
        self.pending.destroy(user).is_some()
    }

    pub fn score(&self, user: &str) -> u32 {
        self.scores.get(user).copied().unwrap_or(0)
    }

    pub fn scores(&self) -> &BTreeMap<OwnerId, u32> {
        &self.scores
    }

    pub fn set_scores(&mut self, scores: BTreeMap<OwnerId, u32>) {
        self.scores = scores;
    }

    pub fn forget(&mut self, user: &str) {
        self.scores.remove(user);
        self.pending.destroy(user);
    }

    /// Top scores, highest first; ties go to the lower user id.
    pub fn leaderboard(&self) -> Vec<(OwnerId, u32)> {
        let mut board: Vec<(OwnerId, u32)> = self
            .scores
            .iter()
            .map(|(user, score)| (user.clone(), *score))
            .collect();
        board.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        board.truncate(LEADERBOARD_SIZE);
        board
    }
}
