// Team balancing and scoring rules.

use super::state::{Score, Team};

fn team_sizes(current: impl IntoIterator<Item = Team>) -> [usize; 2] {
    let mut sizes = [0usize; 2];
    for team in current {
        sizes[team.index()] += 1;
    }
    sizes
}

/// Picks the team for a newly connected player.
///
/// The smaller team wins; ties go to team zero.
pub fn assign_team(current: impl IntoIterator<Item = Team>) -> Team {
    let sizes = team_sizes(current);
    if sizes[Team::One.index()] < sizes[Team::Zero.index()] {
        Team::One
    } else {
        Team::Zero
    }
}

/// Returns the team that must give up a player after a leave, if any.
///
/// Sizes that differ by two or more would let the next connect land two apart.
pub fn surplus_team(current: impl IntoIterator<Item = Team>) -> Option<Team> {
    let [zero, one] = team_sizes(current);
    if zero >= one + 2 {
        Some(Team::Zero)
    } else if one >= zero + 2 {
        Some(Team::One)
    } else {
        None
    }
}

impl Score {
    /// Credits the team opposing `victim` and returns it.
    pub fn record_death(&mut self, victim: Team) -> Team {
        let scorer = victim.opponent();
        self.0[scorer.index()] += 1;
        scorer
    }

    pub fn exceeds(&self, limit: u32) -> bool {
        self.0.iter().any(|&points| points > limit)
    }

    /// Zeroes both scores when either is above `limit`; returns true if it did.
    pub fn reset_if_exceeds(&mut self, limit: u32) -> bool {
        if !self.exceeds(limit) {
            return false;
        }
        self.0 = [0, 0];
        true
    }
}
