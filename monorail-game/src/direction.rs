//! Compass directions on the isometric grid.
//!
//! ```text
//!     N  E         x
//!      \/        \/
//!      /\        /\
//!     W  S         y
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All directions in id order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    #[must_use]
    pub const fn id(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    #[must_use]
    pub const fn from_id(id: usize) -> Self {
        Self::ALL[id % 4]
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        Self::from_id(self.id() + 2)
    }

    /// Base grid offset for a flat tile.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_an_involution() {
        for dir in Direction::ALL {
            assert_ne!(dir, dir.opposite());
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::West.opposite(), Direction::East);
        assert_eq!(Direction::North.opposite(), Direction::South);
    }

    #[test]
    fn ids_round_trip() {
        for dir in Direction::ALL {
            assert_eq!(Direction::from_id(dir.id()), dir);
        }
    }
}
