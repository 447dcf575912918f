//! Continuous positions on the rail graph.
use serde::{Deserialize, Serialize};

use crate::constants::FAR_DISTANCE;
use crate::direction::Direction;
use crate::level::Level;
use crate::tile::TileId;

/// A tile, a progress along its trail and a travel direction.
///
/// `progress` runs from 0 at the trail's in end to `length()` at its out end;
/// both ends are valid, so a joint between two tiles has two representations.
/// Equality compares the stored tile and progress and ignores the travel
/// direction; [`TrailPosition::same_point`] also folds joint aliases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrailPosition {
    pub tile: TileId,
    pub progress: i32,
    reversed: bool,
}

impl PartialEq for TrailPosition {
    fn eq(&self, other: &Self) -> bool {
        self.tile == other.tile && self.progress == other.progress
    }
}

impl Eq for TrailPosition {}

impl TrailPosition {
    #[must_use]
    pub const fn new(tile: TileId, progress: i32) -> Self {
        Self {
            tile,
            progress,
            reversed: false,
        }
    }

    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// `1` when traveling in to out, `-1` otherwise.
    #[must_use]
    pub const fn sign(&self) -> i32 {
        if self.reversed { -1 } else { 1 }
    }

    pub const fn reverse(&mut self) {
        self.reversed = !self.reversed;
    }

    /// Move by `distance` along the travel direction, crossing tiles as needed.
    pub fn advance(&mut self, level: &Level, distance: i32) {
        let target = self.progress.saturating_add(distance.saturating_mul(self.sign()));
        self.set_position(level, self.tile, target);
    }

    pub fn retreat(&mut self, level: &Level, distance: i32) {
        self.advance(level, -distance);
    }

    #[must_use]
    pub fn advanced(mut self, level: &Level, distance: i32) -> Self {
        self.advance(level, distance);
        self
    }

    /// Place on `tile` at a possibly out-of-range progress and renormalize.
    pub fn set_position(&mut self, level: &Level, tile: TileId, progress: i32) {
        self.tile = tile;
        self.progress = progress;
        loop {
            let here = self.tile;
            let len = level[here].length();
            if self.progress < 0 {
                self.leave_through_in(level, here);
            } else if self.progress > len {
                self.leave_through_out(level, here, len);
            } else {
                break;
            }
        }
    }

    fn leave_through_in(&mut self, level: &Level, here: TileId) {
        let overshoot = self.progress;
        let Some(next) = level[here].in_neighbor() else {
            self.bounce_at_start();
            return;
        };
        let next_tile = &level[next];
        if next_tile.in_neighbor() == Some(here) {
            self.tile = next;
            self.progress = -overshoot;
            self.reverse();
        } else if next_tile.out_neighbor() == Some(here) {
            self.tile = next;
            self.progress = next_tile.length() + overshoot;
        } else {
            self.bounce_at_start();
        }
    }

    fn leave_through_out(&mut self, level: &Level, here: TileId, len: i32) {
        let excess = self.progress - len;
        let Some(next) = level[here].out_neighbor() else {
            self.bounce_at_end(len, excess);
            return;
        };
        let next_tile = &level[next];
        if next_tile.in_neighbor() == Some(here) {
            self.tile = next;
            self.progress = excess;
        } else if next_tile.out_neighbor() == Some(here) {
            self.tile = next;
            self.progress = next_tile.length() - excess;
            self.reverse();
        } else {
            self.bounce_at_end(len, excess);
        }
    }

    const fn bounce_at_start(&mut self) {
        self.progress = -self.progress;
        self.reverse();
    }

    const fn bounce_at_end(&mut self, len: i32, excess: i32) {
        self.progress = len - excess;
        self.reverse();
    }

    /// Jump to the start of the next tile in travel direction; stay and turn
    /// around at a dead end.
    pub fn to_next_tile(&mut self, level: &Level) {
        let here = self.tile;
        let next = if self.reversed {
            level[here].in_neighbor()
        } else {
            level[here].out_neighbor()
        };
        match next {
            None => self.reverse(),
            Some(next) => {
                self.tile = next;
                let entered_backwards = if self.reversed {
                    level[next].in_neighbor() == Some(here)
                } else {
                    level[next].out_neighbor() == Some(here)
                };
                if entered_backwards {
                    self.reverse();
                }
            }
        }
        self.progress = 0;
    }

    /// Direction the position is heading towards.
    #[must_use]
    pub fn out_direction(&self, level: &Level) -> Direction {
        let tile = &level[self.tile];
        if self.reversed {
            tile.in_direction()
        } else {
            tile.out_direction()
        }
    }

    /// Direction the position came from.
    #[must_use]
    pub fn in_direction(&self, level: &Level) -> Direction {
        let tile = &level[self.tile];
        if self.reversed {
            tile.out_direction()
        } else {
            tile.in_direction()
        }
    }

    /// Trail distance to `other` across at most one tile boundary, or
    /// [`FAR_DISTANCE`] for anything farther apart.
    #[must_use]
    pub fn distance(&self, level: &Level, other: &Self) -> i32 {
        if self.tile == other.tile {
            return (self.progress - other.progress).abs();
        }
        let mine = &level[self.tile];
        let theirs = &level[other.tile];
        let to_boundary = if mine.in_neighbor() == Some(other.tile) {
            self.progress
        } else if mine.out_neighbor() == Some(other.tile) {
            mine.length() - self.progress
        } else {
            return FAR_DISTANCE;
        };
        if theirs.in_neighbor() == Some(self.tile) {
            to_boundary + other.progress
        } else if theirs.out_neighbor() == Some(self.tile) {
            to_boundary + theirs.length() - other.progress
        } else {
            FAR_DISTANCE
        }
    }

    /// Whether both positions sit on the same point of the trail, treating
    /// `a@len` and `b@0` of linked tiles as one joint.
    #[must_use]
    pub fn same_point(&self, level: &Level, other: &Self) -> bool {
        self.distance(level, other) == 0
    }

    /// Whether both positions travel the same way across at most one boundary.
    #[must_use]
    pub fn same_direction(&self, level: &Level, other: &Self) -> bool {
        if self.tile == other.tile {
            return self.reversed == other.reversed;
        }
        let mine = &level[self.tile];
        let theirs = &level[other.tile];
        let my_end_is_in = if mine.in_neighbor() == Some(other.tile) {
            true
        } else if mine.out_neighbor() == Some(other.tile) {
            false
        } else {
            return false;
        };
        let their_end_is_in = if theirs.in_neighbor() == Some(self.tile) {
            true
        } else if theirs.out_neighbor() == Some(self.tile) {
            false
        } else {
            return false;
        };
        // Ends of the same kind meeting means the trails run head to head.
        if my_end_is_in == their_end_is_in {
            self.reversed != other.reversed
        } else {
            self.reversed == other.reversed
        }
    }
}
