//! Match scoring with optional deuce/advantage rule

use serde::Serialize;

use super::paddle::Side;

/// Read-only view of the score, as pushed in status frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreSnapshot {
    pub left: u32,
    pub right: u32,
    pub is_deuce: bool,
    pub is_left_advantage: bool,
    pub is_right_advantage: bool,
    /// 0 = none, 1 = left, 2 = right
    pub winner: u8,
}

#[derive(Debug, Clone)]
pub struct Score {
    left: u32,
    right: u32,
    end_score: u32,
    is_deuce_enabled: bool,
}

impl Score {
    /// `end_score` must be at least 1; callers validate it
    pub fn new(end_score: u32, is_deuce_enabled: bool) -> Self {
        Self {
            left: 0,
            right: 0,
            end_score: end_score.max(1),
            is_deuce_enabled,
        }
    }

    #[cfg(test)]
    pub fn end_score(&self) -> u32 {
        self.end_score
    }

    /// Award a point. Ignored once the match has a winner.
    pub fn add_point(&mut self, side: Side) {
        if self.winner().is_some() {
            return;
        }
        match side {
            Side::Left => self.left += 1,
            Side::Right => self.right += 1,
        }
    }

    /// Both sides are close enough to the threshold for the deuce rule to apply
    fn in_deuce_zone(&self) -> bool {
        self.is_deuce_enabled
            && self.left + 1 >= self.end_score
            && self.right + 1 >= self.end_score
    }

    pub fn winner(&self) -> Option<Side> {
        let (leader, lead_score, trail_score) = if self.left >= self.right {
            (Side::Left, self.left, self.right)
        } else {
            (Side::Right, self.right, self.left)
        };

        if lead_score < self.end_score {
            return None;
        }
        if self.is_deuce_enabled && lead_score - trail_score < 2 {
            return None;
        }
        Some(leader)
    }

    pub fn get_score(&self) -> ScoreSnapshot {
        let deuce_zone = self.in_deuce_zone();
        let winner = self.winner();
        let open = deuce_zone && winner.is_none();

        ScoreSnapshot {
            left: self.left,
            right: self.right,
            is_deuce: open && self.left == self.right,
            is_left_advantage: open && self.left == self.right + 1,
            is_right_advantage: open && self.right == self.left + 1,
            winner: match winner {
                None => 0,
                Some(Side::Left) => 1,
                Some(Side::Right) => 2,
            },
        }
    }
}
