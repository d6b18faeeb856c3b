//! Single-elimination bracket engine
//!
//! Stages are stored in play order with an explicit round depth. Every
//! result, reported or auto-resolved, flows through one work-list so an
//! all-computer subtree collapses without recursion.

use std::collections::{HashSet, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::Participant;
use super::BracketError;
use crate::game::paddle::Side;

/// Label of the last stage
pub const FINAL_LABEL: &str = "Final";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub left: u32,
    pub right: u32,
}

/// One bracket cell. An empty slot awaits the winner of an earlier match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub left: Option<Participant>,
    pub right: Option<Participant>,
    pub winner: Option<String>,
    pub score: MatchScore,
}

impl Match {
    fn pairing(left: Participant, right: Participant) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            ..Default::default()
        }
    }

    fn slot(&self, side: Side) -> &Option<Participant> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<Participant> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Side `name` plays on, if any
    pub fn side_of(&self, name: &str) -> Option<Side> {
        [Side::Left, Side::Right]
            .into_iter()
            .find(|side| matches!(self.slot(*side), Some(p) if p.name == name))
    }

    fn both_ai(&self) -> bool {
        matches!((&self.left, &self.right), (Some(l), Some(r)) if l.is_ai() && r.is_ai())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub label: String,
    /// 0 for the opening stage, increasing towards the final
    pub round: u32,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bracket {
    stages: Vec<Stage>,
}

/// A decided match whose winner still has to move on
struct Advance {
    stage: usize,
    winner: Participant,
}

fn stage_label(match_count: usize) -> String {
    if match_count == 1 {
        FINAL_LABEL.to_string()
    } else {
        format!("1/{}", match_count)
    }
}

impl Bracket {
    /// Build the bracket for an already shuffled and padded roster.
    /// Opening computer-vs-computer matches resolve immediately.
    pub fn seed<R: Rng + ?Sized>(
        roster: &[Participant],
        end_score: u32,
        rng: &mut R,
    ) -> Result<Self, BracketError> {
        let size = roster.len();
        if size < 2 {
            return Err(BracketError::TooFewPlayers);
        }
        let mut seen = HashSet::with_capacity(size);
        for participant in roster {
            if !seen.insert(participant.name.as_str()) {
                return Err(BracketError::DuplicateName(participant.name.clone()));
            }
        }
        if !size.is_power_of_two() {
            return Err(BracketError::UnpaddedRoster(size));
        }

        let mut stages = Vec::new();
        let mut match_count = size / 2;
        let mut round = 0;
        while match_count >= 1 {
            let matches = if round == 0 {
                roster
                    .chunks(2)
                    .map(|pair| Match::pairing(pair[0].clone(), pair[1].clone()))
                    .collect()
            } else {
                vec![Match::default(); match_count]
            };
            stages.push(Stage {
                label: stage_label(match_count),
                round,
                matches,
            });
            match_count /= 2;
            round += 1;
        }

        let mut bracket = Self { stages };
        let mut pending = VecDeque::new();
        for index in 0..bracket.stages[0].matches.len() {
            let cell = &mut bracket.stages[0].matches[index];
            if cell.both_ai() {
                if let Some(winner) = resolve_randomly(cell, end_score, rng) {
                    pending.push_back(Advance { stage: 0, winner });
                }
            }
        }
        bracket.propagate(pending, end_score, rng);
        Ok(bracket)
    }

    /// Stages in play order
    #[cfg(test)]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[cfg(test)]
    pub fn stage(&self, label: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.label == label)
    }

    /// Winner of the final, once decided
    pub fn champion(&self) -> Option<&str> {
        self.stages
            .last()
            .filter(|stage| stage.label == FINAL_LABEL)
            .and_then(|stage| stage.matches.first())
            .and_then(|cell| cell.winner.as_deref())
    }

    /// Latest stage and match index holding `name`
    fn locate(&self, name: &str) -> Option<(usize, usize)> {
        self.stages
            .iter()
            .enumerate()
            .filter_map(|(stage_idx, stage)| {
                stage
                    .matches
                    .iter()
                    .position(|cell| cell.side_of(name).is_some())
                    .map(|match_idx| (stage_idx, match_idx))
            })
            .last()
    }

    /// Record a played result for `winner` and advance the bracket
    pub fn record_result<R: Rng + ?Sized>(
        &mut self,
        winner: &str,
        score: MatchScore,
        end_score: u32,
        rng: &mut R,
    ) -> Result<(), BracketError> {
        let (stage_idx, match_idx) = self
            .locate(winner)
            .ok_or_else(|| BracketError::UnknownParticipant(winner.to_string()))?;

        let cell = &mut self.stages[stage_idx].matches[match_idx];
        if cell.winner.is_some() {
            return Err(BracketError::AlreadyDecided(winner.to_string()));
        }
        if cell.left.is_none() || cell.right.is_none() {
            return Err(BracketError::OpponentPending(winner.to_string()));
        }
        let participant = cell
            .side_of(winner)
            .and_then(|side| cell.slot(side).clone())
            .ok_or_else(|| BracketError::UnknownParticipant(winner.to_string()))?;

        cell.winner = Some(participant.name.clone());
        cell.score = score;
        debug!(stage = %self.stages[stage_idx].label, winner = %winner, "Match result recorded");

        let pending = VecDeque::from([Advance {
            stage: stage_idx,
            winner: participant,
        }]);
        self.propagate(pending, end_score, rng);
        Ok(())
    }

    /// Move decided winners into the next stage until nothing is left to resolve
    fn propagate<R: Rng + ?Sized>(
        &mut self,
        mut pending: VecDeque<Advance>,
        end_score: u32,
        rng: &mut R,
    ) {
        while let Some(Advance { stage, winner }) = pending.pop_front() {
            let next = stage + 1;
            if next >= self.stages.len() {
                continue;
            }

            let slots: Vec<(usize, Side)> = self.stages[next]
                .matches
                .iter()
                .enumerate()
                .flat_map(|(idx, cell)| {
                    [Side::Left, Side::Right]
                        .into_iter()
                        .filter(move |side| cell.slot(*side).is_none())
                        .map(move |side| (idx, side))
                })
                .collect();

            if slots.is_empty() {
                warn!(
                    stage = %self.stages[next].label,
                    winner = %winner.name,
                    "No available slot in next stage, advancement stopped"
                );
                continue;
            }

            let (match_idx, side) = slots[rng.gen_range(0..slots.len())];
            let cell = &mut self.stages[next].matches[match_idx];
            *cell.slot_mut(side) = Some(winner);

            if cell.both_ai() && cell.winner.is_none() {
                if let Some(winner) = resolve_randomly(cell, end_score, rng) {
                    pending.push_back(Advance {
                        stage: next,
                        winner,
                    });
                }
            }
        }
    }
}

/// Pick a random winner: full threshold for the winner, random short score for the loser
fn resolve_randomly<R: Rng + ?Sized>(
    cell: &mut Match,
    end_score: u32,
    rng: &mut R,
) -> Option<Participant> {
    let end_score = end_score.max(1);
    let side = if rng.gen_bool(0.5) { Side::Left } else { Side::Right };
    let winner = cell.slot(side).clone()?;
    let loser_score = rng.gen_range(0..end_score);

    cell.score = match side {
        Side::Left => MatchScore {
            left: end_score,
            right: loser_score,
        },
        Side::Right => MatchScore {
            left: loser_score,
            right: end_score,
        },
    };
    cell.winner = Some(winner.name.clone());
    Some(winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn humans(n: usize) -> Vec<Participant> {
        (0..n).map(|i| Participant::human(format!("p{}", i))).collect()
    }

    fn bots(n: usize) -> Vec<Participant> {
        (0..n).map(|i| Participant::ai(format!("CPU {}", i + 1))).collect()
    }

    fn decided(bracket: &Bracket) -> usize {
        bracket
            .stages()
            .iter()
            .flat_map(|s| &s.matches)
            .filter(|m| m.winner.is_some())
            .count()
    }

    #[test]
    fn stage_layout_follows_roster_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for k in 1..=6u32 {
            let size = 1usize << k;
            let bracket = Bracket::seed(&humans(size), 6, &mut rng).unwrap();
            assert_eq!(bracket.stages().len(), k as usize);
            assert_eq!(bracket.stages()[0].matches.len(), size / 2);
            assert_eq!(bracket.stages().last().unwrap().label, FINAL_LABEL);
            for (depth, stage) in bracket.stages().iter().enumerate() {
                assert_eq!(stage.round, depth as u32);
            }
        }
    }

    #[test]
    fn full_next_stage_leaves_bracket_unchanged() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut bracket = Bracket::seed(&humans(4), 6, &mut rng).unwrap();
        bracket.stages[1].matches[0] =
            Match::pairing(Participant::human("x"), Participant::human("y"));
        let final_before = bracket.stages[1].clone();

        let winner = bracket.stages[0].matches[0].left.clone().unwrap().name;
        let score = MatchScore { left: 6, right: 1 };
        let recorded = bracket.record_result(&winner, score, 6, &mut rng);

        assert!(recorded.is_ok());
        assert_eq!(bracket.stages[1], final_before);
        assert_eq!(
            bracket.stages[0].matches[0].winner.as_deref(),
            Some(winner.as_str())
        );
        assert_eq!(bracket.champion(), None);
    }

    #[test]
    fn labels_name_the_match_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let bracket = Bracket::seed(&humans(8), 6, &mut rng).unwrap();
        let labels: Vec<_> = bracket.stages().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["1/4", "1/2", "Final"]);
        assert!(bracket.stage("1/2").unwrap().matches.iter().all(|m| m.left.is_none()));
    }

    #[test]
    fn rejects_invalid_rosters() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(
            Bracket::seed(&humans(1), 6, &mut rng),
            Err(BracketError::TooFewPlayers)
        );
        assert_eq!(
            Bracket::seed(&humans(3), 6, &mut rng),
            Err(BracketError::UnpaddedRoster(3))
        );
        let mut roster = humans(4);
        roster[3].name = "p1".into();
        assert_eq!(
            Bracket::seed(&roster, 6, &mut rng),
            Err(BracketError::DuplicateName("p1".into()))
        );
    }

    #[test]
    fn computer_only_brackets_resolve_to_one_champion() {
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for k in 1..=6 {
                let size = 1usize << k;
                let bracket = Bracket::seed(&bots(size), 5, &mut rng).unwrap();
                assert!(bracket.champion().is_some(), "size {} seed {}", size, seed);
                assert_eq!(decided(&bracket), size - 1);
                for cell in bracket.stages().iter().flat_map(|s| &s.matches) {
                    let (hi, lo) = if cell.score.left > cell.score.right {
                        (cell.score.left, cell.score.right)
                    } else {
                        (cell.score.right, cell.score.left)
                    };
                    assert_eq!(hi, 5);
                    assert!(lo < 5);
                }
            }
        }
    }

    #[test]
    fn human_results_advance_to_the_final() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut bracket = Bracket::seed(&humans(4), 3, &mut rng).unwrap();
        assert_eq!(decided(&bracket), 0);

        let score = MatchScore { left: 3, right: 1 };
        bracket.record_result("p0", score, 3, &mut rng).unwrap();
        bracket.record_result("p3", score, 3, &mut rng).unwrap();

        let final_match = &bracket.stage(FINAL_LABEL).unwrap().matches[0];
        assert!(final_match.side_of("p0").is_some());
        assert!(final_match.side_of("p3").is_some());
        assert!(bracket.champion().is_none());

        // Latest stage wins the lookup
        bracket.record_result("p3", score, 3, &mut rng).unwrap();
        assert_eq!(bracket.champion(), Some("p3"));
        assert_eq!(bracket.stages()[0].matches[1].winner.as_deref(), Some("p3"));
    }

    #[test]
    fn decided_matches_are_immutable() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut bracket = Bracket::seed(&humans(2), 3, &mut rng).unwrap();
        let score = MatchScore { left: 3, right: 0 };
        bracket.record_result("p0", score, 3, &mut rng).unwrap();
        assert_eq!(bracket.champion(), Some("p0"));
        assert_eq!(
            bracket.record_result("p1", score, 3, &mut rng),
            Err(BracketError::AlreadyDecided("p1".into()))
        );
        assert_eq!(
            bracket.record_result("nobody", score, 3, &mut rng),
            Err(BracketError::UnknownParticipant("nobody".into()))
        );
    }

    #[test]
    fn waiting_for_opponent_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut bracket = Bracket::seed(&humans(4), 3, &mut rng).unwrap();
        let score = MatchScore { left: 3, right: 2 };
        bracket.record_result("p1", score, 3, &mut rng).unwrap();
        assert_eq!(
            bracket.record_result("p1", score, 3, &mut rng),
            Err(BracketError::OpponentPending("p1".into()))
        );
    }

    #[test]
    fn computer_winner_meeting_computer_resolves_on_its_own() {
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            // Two human-vs-computer openers feeding one final
            let roster = vec![
                Participant::human("alice"),
                Participant::ai("CPU 1"),
                Participant::ai("CPU 2"),
                Participant::human("bob"),
            ];
            let mut bracket = Bracket::seed(&roster, 4, &mut rng).unwrap();
            assert_eq!(decided(&bracket), 0);

            let score = MatchScore { left: 1, right: 4 };
            bracket.record_result("CPU 1", score, 4, &mut rng).unwrap();
            assert!(bracket.champion().is_none());
            bracket.record_result("CPU 2", score, 4, &mut rng).unwrap();

            let champion = bracket.champion().unwrap();
            assert!(champion == "CPU 1" || champion == "CPU 2");
        }
    }

    #[test]
    fn mixed_bracket_collapses_computer_subtrees() {
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut roster = bots(6);
            roster.insert(0, Participant::human("alice"));
            roster.insert(1, Participant::human("bob"));
            let bracket = Bracket::seed(&roster, 6, &mut rng).unwrap();

            // Three computer openers decided, and any computer pair that met in round two
            let opening = bracket.stages()[0].matches.iter().filter(|m| m.winner.is_some()).count();
            assert_eq!(opening, 3);
            for cell in &bracket.stage("1/2").unwrap().matches {
                if cell.both_ai() {
                    assert!(cell.winner.is_some());
                }
            }
        }
    }
}
