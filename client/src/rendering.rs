use crate::game::{ClaimState, ClientGameState};
use macroquad::prelude::*;
use shared::{Coin, Player, TextMetrics, GROUND_Y, TEXT_SIZE, WORLD_HEIGHT, WORLD_WIDTH};

const COIN_SPIN_SPEED: f32 = 0.05;

fn rgb(color: [u8; 3]) -> Color {
    Color::from_rgba(color[0], color[1], color[2], 255)
}

/// Text widths measured with macroquad's default font, so the collision
/// box of a placed text matches what is drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroquadMetrics;

impl TextMetrics for MacroquadMetrics {
    fn text_width(&self, content: &str) -> f32 {
        measure_text(content, None, TEXT_SIZE as u16, 1.0).width
    }
}

pub struct Renderer {
    coin_spin: f32,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer { coin_spin: 0.0 }
    }

    /// Draws one frame. `typing` is the prompt buffer while the player is
    /// writing a text.
    pub fn render(
        &mut self,
        game: &ClientGameState,
        metrics: &dyn TextMetrics,
        typing: Option<&str>,
        connected: bool,
    ) {
        self.coin_spin += COIN_SPIN_SPEED;

        clear_background(Color::from_rgba(200, 200, 200, 255));
        self.draw_world(game);

        for coin in game.coins.iter().filter(|coin| !coin.collected) {
            self.draw_coin(coin.x, coin.y, coin, 1.0);
        }

        for text in game.board().iter() {
            let width = metrics.text_width(&text.content);
            draw_text(
                &text.content,
                text.x - width / 2.0,
                text.y + TEXT_SIZE / 2.0 - 4.0,
                TEXT_SIZE,
                BLACK,
            );
        }

        for other in game.others.values() {
            draw_circle(other.x, other.y, other.radius, rgb(other.color));
            self.draw_carried_coins(other, game, |_| 1.0);
        }

        self.draw_local_player(&game.player);
        self.draw_carried_coins(&game.player, game, |index| {
            match game.claim_state(index) {
                Some(ClaimState::Pending) => 0.4,
                _ => 1.0,
            }
        });

        if let Some(buffer) = typing {
            self.draw_typing_bubble(&game.player, buffer);
        }

        self.draw_ui(game, connected);
    }

    fn draw_world(&self, game: &ClientGameState) {
        draw_rectangle(
            0.0,
            GROUND_Y,
            WORLD_WIDTH,
            WORLD_HEIGHT - GROUND_Y,
            Color::from_rgba(100, 200, 100, 255),
        );

        for platform in &game.platforms {
            draw_rectangle(
                platform.x,
                platform.y,
                platform.width,
                platform.height,
                Color::from_rgba(150, 150, 150, 255),
            );
        }
    }

    fn draw_coin(&self, x: f32, y: f32, coin: &Coin, alpha: f32) {
        let scale_x = self.coin_spin.sin().abs() * 0.8 + 0.2;
        let half = coin.size / 2.0;
        draw_ellipse(
            x,
            y,
            half * scale_x,
            half,
            0.0,
            Color::new(1.0, 215.0 / 255.0, 0.0, alpha),
        );
    }

    /// Squashes the circle by the landing deformation.
    fn draw_local_player(&self, player: &Player) {
        let d = player.deformation;
        draw_ellipse(
            player.x,
            player.y,
            player.radius * (1.0 + d),
            player.radius * (1.0 - d),
            0.0,
            rgb(player.color),
        );
        draw_ellipse_lines(
            player.x,
            player.y,
            player.radius * (1.0 + d),
            player.radius * (1.0 - d),
            0.0,
            2.0,
            WHITE,
        );
    }

    /// Stacks a player's coins above their head.
    fn draw_carried_coins(
        &self,
        player: &Player,
        game: &ClientGameState,
        alpha_for: impl Fn(usize) -> f32,
    ) {
        for (slot, &index) in player.collected_coins.iter().enumerate() {
            let Some(coin) = game.coins.get(index) else {
                continue;
            };
            let y = player.y - player.radius - coin.size / 2.0 - slot as f32 * (coin.size + 2.0);
            self.draw_coin(player.x, y, coin, alpha_for(index));
        }
    }

    fn draw_typing_bubble(&self, player: &Player, buffer: &str) {
        let label = format!("{}_", buffer);
        let size = measure_text(&label, None, TEXT_SIZE as u16, 1.0);
        let width = size.width.max(60.0) + 16.0;
        let height = TEXT_SIZE + 12.0;
        let x = player.x - width / 2.0;
        let y = player.y - player.radius - height - 40.0;

        draw_rectangle(x, y, width, height, WHITE);
        draw_rectangle_lines(x, y, width, height, 2.0, BLACK);
        draw_text(&label, x + 8.0, y + height - 10.0, TEXT_SIZE, BLACK);
    }

    fn draw_ui(&self, game: &ClientGameState, connected: bool) {
        draw_text(
            "A/D or arrows: move   W/Up/Space: jump   T: write, click to place, Esc to cancel",
            10.0,
            20.0,
            18.0,
            DARKGRAY,
        );

        let status = match (&game.rejected, connected, game.client_id) {
            (Some(reason), _, _) => format!("Rejected: {}", reason),
            (None, false, _) => "Connecting...".to_string(),
            (None, true, None) => "Joining...".to_string(),
            (None, true, Some(id)) => format!("Player {} | {} online", id, game.others.len() + 1),
        };
        let color = if connected && game.rejected.is_none() {
            DARKGREEN
        } else {
            RED
        };
        draw_text(&status, 10.0, 42.0, 18.0, color);

        let coins = format!(
            "Coins: {}/{}",
            game.player.collected_coins.len(),
            shared::MAX_COLLECTED_COINS
        );
        draw_text(&coins, 10.0, 64.0, 18.0, DARKGRAY);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
