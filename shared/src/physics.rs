//! Per-frame player physics: gravity, circle-vs-rectangle push-out against
//! platforms and placed texts, the ground, and landing deformation.
//!
//! Units are pixels and frames. Non-finite player state propagates through
//! the step unchanged; rectangles with non-finite bounds are not solid.

use crate::world::{Platform, TextBoard};
use crate::{
    Player, DEFORMATION_RECOVERY, GRAVITY, GROUND_Y, JUMP_VELOCITY, LANDING_DEFORMATION,
    PLAYER_SPEED, TEXT_SIZE, WORLD_WIDTH,
};
use std::f32::consts::{FRAC_PI_2, PI};

/// Measures the rendered width of a placed text.
pub trait TextMetrics {
    fn text_width(&self, content: &str) -> f32;
}

/// Monospace approximation used when no font is available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvance(pub f32);

impl Default for FixedAdvance {
    fn default() -> Self {
        FixedAdvance(TEXT_SIZE * 0.5)
    }
}

impl TextMetrics for FixedAdvance {
    fn text_width(&self, content: &str) -> f32 {
        content.chars().count() as f32 * self.0
    }
}

/// Movement keys sampled for one frame. `jump` is a press, not a hold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// Landed on top or bumped underneath.
    Vertical,
    /// Hit a side.
    Horizontal,
}

/// Sets horizontal velocity from the held keys and starts a jump if the
/// player is grounded.
pub fn apply_controls(player: &mut Player, controls: &Controls) {
    player.vel_x = match (controls.left, controls.right) {
        (true, false) => -PLAYER_SPEED,
        (false, true) => PLAYER_SPEED,
        _ => 0.0,
    };

    if controls.jump && player.on_ground {
        player.vel_y = JUMP_VELOCITY;
        player.on_ground = false;
    }
}

/// Pushes the player out of `platform` if the circle overlaps it.
///
/// The push follows the direction from the rectangle's nearest point to the
/// player's center. A push whose angle has |sin| > 0.5 counts as vertical
/// (stops vertical motion and grounds the player), anything else as
/// horizontal. A rectangle with non-finite bounds is never solid.
pub fn resolve_platform_collision(player: &mut Player, platform: &Platform) -> Option<Contact> {
    if !platform.is_finite() {
        return None;
    }

    let (near_x, near_y) = platform.nearest_point(player.x, player.y);
    let dx = player.x - near_x;
    let dy = player.y - near_y;
    let distance = (dx * dx + dy * dy).sqrt();

    if distance >= player.radius {
        return None;
    }

    let (angle, overlap) = if distance > 0.0 {
        (dy.atan2(dx), player.radius - distance)
    } else {
        escape_from_inside(player, platform)
    };

    player.x += angle.cos() * overlap;
    player.y += angle.sin() * overlap;

    if angle.sin().abs() > 0.5 {
        player.vel_y = 0.0;
        player.on_ground = true;
        land(player);
        Some(Contact::Vertical)
    } else {
        player.vel_x = 0.0;
        Some(Contact::Horizontal)
    }
}

// Center is inside the rectangle: leave through the closest face.
fn escape_from_inside(player: &Player, platform: &Platform) -> (f32, f32) {
    let faces = [
        (player.x - platform.x, PI),
        (platform.x + platform.width - player.x, 0.0),
        (player.y - platform.y, -FRAC_PI_2),
        (platform.y + platform.height - player.y, FRAC_PI_2),
    ];

    let (depth, angle) = faces
        .iter()
        .copied()
        .fold((f32::INFINITY, 0.0), |best, face| {
            if face.0 < best.0 {
                face
            } else {
                best
            }
        });

    (angle, depth + player.radius)
}

fn resolve_ground(player: &mut Player) {
    if player.y + player.radius >= GROUND_Y {
        player.y = GROUND_Y - player.radius;
        player.vel_y = 0.0;
        player.on_ground = true;
        land(player);
    }
}

fn land(player: &mut Player) {
    if player.deformation == 0.0 {
        player.deformation = LANDING_DEFORMATION;
    }
}

/// Advances the player by one frame.
pub fn step(
    player: &mut Player,
    platforms: &[Platform],
    texts: &TextBoard,
    metrics: &dyn TextMetrics,
) {
    player.vel_y += GRAVITY;

    player.x += player.vel_x;
    player.y += player.vel_y;

    player.on_ground = false;

    for platform in platforms {
        resolve_platform_collision(player, platform);
    }

    for text in texts.iter() {
        resolve_platform_collision(player, &text.platform(metrics));
    }

    resolve_ground(player);

    if player.on_ground {
        player.deformation += (0.0 - player.deformation) * DEFORMATION_RECOVERY;
    } else {
        player.deformation = 0.0;
    }

    // Keeps the player on screen; not a collision wall.
    player.x = player.x.clamp(0.0, WORLD_WIDTH);
}
