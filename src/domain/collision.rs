// Collision-driven player state machine.
//
// Only first-contact events reach this module; sustained contact is filtered by the caller.

use super::state::{PlayerState, ShapeCategory, Team};

/// A first contact, already classified from the touched shape's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Wall,
    Center,
    Teammate,
    Opponent,
}

impl ContactEvent {
    /// Classifies a touched shape relative to `own_team`.
    ///
    /// `other_team` is only consulted for player shapes; a player shape without a known
    /// owner yields no event.
    pub fn classify(
        own_team: Team,
        category: ShapeCategory,
        other_team: Option<Team>,
    ) -> Option<ContactEvent> {
        match category {
            ShapeCategory::Wall => Some(ContactEvent::Wall),
            ShapeCategory::Center => Some(ContactEvent::Center),
            ShapeCategory::Player => other_team.map(|team| {
                if team == own_team {
                    ContactEvent::Teammate
                } else {
                    ContactEvent::Opponent
                }
            }),
        }
    }
}

/// Returns the state after `event`, or `None` when the event does not move the player.
///
/// `Some(PlayerState::Dead)` is a death: the caller scores it, repositions the body and
/// puts the player back to `Normal`.
pub fn next_state(state: PlayerState, event: ContactEvent) -> Option<PlayerState> {
    match (state, event) {
        (PlayerState::Normal, ContactEvent::Center) => None,
        (_, ContactEvent::Center) => Some(PlayerState::Normal),
        (PlayerState::Normal, ContactEvent::Wall) => Some(PlayerState::Risk),
        (PlayerState::Risk, ContactEvent::Opponent) => Some(PlayerState::Dire),
        (PlayerState::Dire, ContactEvent::Wall) => Some(PlayerState::Dead),
        _ => None,
    }
}
