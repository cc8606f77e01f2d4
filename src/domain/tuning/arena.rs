use crate::domain::Vec2;
use std::f32::consts::TAU;

/// Gameplay tuning for the arena and the bodies in it.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).
#[derive(Debug, Clone, Copy)]
pub struct ArenaTuning {
    /// Inner radius of the playfield in world units.
    pub radius: f32,

    /// Thickness of the boundary wall.
    pub wall_thickness: f32,

    /// Number of straight segments approximating the circular wall.
    pub wall_segments: usize,

    /// Collision radius of every player body.
    pub player_radius: f32,

    pub player_mass: f32,

    /// Radius of the static obstacle at the origin.
    pub center_radius: f32,

    /// Upper bound on the force the cursor drag may apply to a body.
    pub drag_max_force: f32,

    /// A team score above this value resets the match.
    pub score_limit: u32,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            radius: 320.0,
            wall_thickness: 8.0,
            wall_segments: 360,
            player_radius: 16.0,
            player_mass: 1.0,
            center_radius: 32.0,
            drag_max_force: 1000.0,
            score_limit: 99,
        }
    }
}

impl ArenaTuning {
    /// Spawn and reset point for players.
    pub fn center(&self) -> Vec2 {
        Vec2::ZERO
    }

    /// Endpoints of the wall segments, laid on the ring at the wall's midline.
    pub fn wall_segment_endpoints(&self) -> Vec<(Vec2, Vec2)> {
        let ring = self.radius + 0.5 * self.wall_thickness;
        let segments = self.wall_segments.max(3);
        (0..segments)
            .map(|i| {
                let a0 = i as f32 / segments as f32 * TAU;
                let a1 = (i + 1) as f32 / segments as f32 * TAU;
                (
                    Vec2::new(ring * a0.cos(), ring * a0.sin()),
                    Vec2::new(ring * a1.cos(), ring * a1.sin()),
                )
            })
            .collect()
    }
}
