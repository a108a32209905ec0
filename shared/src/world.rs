//! Static level layout and the collectible/annotation state shared by the
//! relay and every client.

use crate::physics::TextMetrics;
use crate::{Player, COIN_LIFT, COIN_SIZE, TEXT_BOARD_CAPACITY, TEXT_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Axis-aligned rectangle the player can stand on.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Point of the rectangle closest to `(px, py)`.
    /// A NaN bound is ignored rather than panicking.
    pub fn nearest_point(&self, px: f32, py: f32) -> (f32, f32) {
        (
            px.max(self.x).min(self.x + self.width),
            py.max(self.y).min(self.y + self.height),
        )
    }

    /// True when every bound is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

const LEVEL: [Platform; 6] = [
    Platform::new(200.0, 600.0, 300.0, 20.0),
    Platform::new(600.0, 500.0, 300.0, 20.0),
    Platform::new(1100.0, 400.0, 300.0, 20.0),
    Platform::new(300.0, 300.0, 300.0, 20.0),
    Platform::new(800.0, 200.0, 300.0, 20.0),
    Platform::new(1300.0, 100.0, 300.0, 20.0),
];

pub fn level_platforms() -> Vec<Platform> {
    LEVEL.to_vec()
}

/// One coin per platform, hovering above its center.
pub fn level_coins(platforms: &[Platform]) -> Vec<Coin> {
    platforms
        .iter()
        .map(|p| Coin::new(p.x + p.width / 2.0, p.y - COIN_LIFT))
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Coin {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub collected: bool,
}

impl Coin {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            size: COIN_SIZE,
            collected: false,
        }
    }

    /// Circle-vs-circle test using the coin's half size as its radius.
    pub fn touches(&self, player: &Player) -> bool {
        let dx = player.x - self.x;
        let dy = player.y - self.y;
        (dx * dx + dy * dy).sqrt() < player.radius + self.size / 2.0
    }

    /// Marks the coin collected. Returns false if it already was.
    pub fn collect(&mut self) -> bool {
        if self.collected {
            return false;
        }
        self.collected = true;
        true
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f32,
    pub y: f32,
    pub content: String,
}

impl PlacedText {
    pub fn new(x: f32, y: f32, content: impl Into<String>) -> Self {
        Self {
            x,
            y,
            content: content.into(),
        }
    }

    /// A text can be placed only with a finite anchor and non-empty content.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && !self.content.is_empty()
    }

    /// Collision rectangle covering the rendered text, centered on its anchor.
    pub fn platform(&self, metrics: &dyn TextMetrics) -> Platform {
        let width = metrics.text_width(&self.content);
        Platform::new(
            self.x - width / 2.0,
            self.y - TEXT_SIZE / 2.0,
            width,
            TEXT_SIZE,
        )
    }
}

/// Bounded FIFO of placed texts. Inserting into a full board evicts the
/// oldest entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBoard {
    entries: VecDeque<PlacedText>,
}

impl TextBoard {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(TEXT_BOARD_CAPACITY),
        }
    }

    /// Appends `text`, returning the evicted entry if the board was full.
    pub fn place(&mut self, text: PlacedText) -> Option<PlacedText> {
        let evicted = if self.entries.len() >= TEXT_BOARD_CAPACITY {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(text);
        evicted
    }

    /// Replaces the board with a snapshot, keeping only its newest entries.
    pub fn replace(&mut self, texts: Vec<PlacedText>) {
        self.entries.clear();
        for text in texts {
            self.place(text);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedText> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<PlacedText> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
