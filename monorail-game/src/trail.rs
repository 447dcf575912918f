//! Trail orientation owned by a single tile.
use serde::{Deserialize, Serialize};

use crate::direction::Direction;
use crate::tile::TileShape;

/// Which pair of neighbor directions a tile connects.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrailKind {
    NorthSouth,
    EastWest,
    SouthEast,
    SouthWest,
    NorthWest,
    NorthEast,
    Hill,
}

impl TrailKind {
    /// Flat orientations in switch-cycling order.
    pub const FLAT: [Self; 6] = [
        Self::NorthSouth,
        Self::EastWest,
        Self::SouthEast,
        Self::SouthWest,
        Self::NorthWest,
        Self::NorthEast,
    ];

    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::NorthSouth => 0,
            Self::EastWest => 1,
            Self::SouthEast => 2,
            Self::SouthWest => 3,
            Self::NorthWest => 4,
            Self::NorthEast => 5,
            Self::Hill => 6,
        }
    }

    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::NorthSouth),
            1 => Some(Self::EastWest),
            2 => Some(Self::SouthEast),
            3 => Some(Self::SouthWest),
            4 => Some(Self::NorthWest),
            5 => Some(Self::NorthEast),
            6 => Some(Self::Hill),
            _ => None,
        }
    }

    /// The two connected directions of a flat orientation.
    #[must_use]
    pub const fn ends(self) -> Option<(Direction, Direction)> {
        match self {
            Self::NorthSouth => Some((Direction::North, Direction::South)),
            Self::EastWest => Some((Direction::East, Direction::West)),
            Self::SouthEast => Some((Direction::South, Direction::East)),
            Self::SouthWest => Some((Direction::South, Direction::West)),
            Self::NorthWest => Some((Direction::North, Direction::West)),
            Self::NorthEast => Some((Direction::North, Direction::East)),
            Self::Hill => None,
        }
    }

    #[must_use]
    pub const fn is_straight(self) -> bool {
        matches!(self, Self::NorthSouth | Self::EastWest)
    }

    #[must_use]
    pub fn connects(self, dir: Direction) -> bool {
        self.ends().is_some_and(|(a, b)| a == dir || b == dir)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trail {
    pub kind: TrailKind,
    /// Cleared while a cart stands on the tile.
    pub may_switch: bool,
}

impl Trail {
    #[must_use]
    pub const fn new(kind: TrailKind) -> Self {
        Self {
            kind,
            may_switch: true,
        }
    }

    /// Direction of the trail's "in" end (progress 0).
    #[must_use]
    pub fn in_direction(&self, shape: TileShape) -> Direction {
        if let Some(dir) = shape.slope_direction() {
            return dir;
        }
        match self.kind {
            TrailKind::NorthSouth | TrailKind::NorthEast | TrailKind::NorthWest => Direction::North,
            TrailKind::EastWest | TrailKind::SouthEast => Direction::East,
            TrailKind::SouthWest => Direction::South,
            // A hill trail on a flat tile never survives alignment.
            TrailKind::Hill => Direction::North,
        }
    }

    /// Direction of the trail's "out" end (progress == length).
    #[must_use]
    pub fn out_direction(&self, shape: TileShape) -> Direction {
        if shape.slope_direction().is_some() {
            return self.in_direction(shape).opposite();
        }
        match self.kind {
            TrailKind::NorthWest | TrailKind::EastWest | TrailKind::SouthWest => Direction::West,
            TrailKind::NorthSouth | TrailKind::SouthEast => Direction::South,
            TrailKind::NorthEast => Direction::East,
            TrailKind::Hill => Direction::South,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::SlopeHalf;

    #[test]
    fn bytes_round_trip() {
        for byte in 0..=6 {
            let kind = TrailKind::from_byte(byte).expect("known byte");
            assert_eq!(kind.to_byte(), byte);
        }
        assert!(TrailKind::from_byte(7).is_none());
    }

    #[test]
    fn flat_ends_are_distinct() {
        for kind in TrailKind::FLAT {
            let trail = Trail::new(kind);
            let input = trail.in_direction(TileShape::Flat);
            let output = trail.out_direction(TileShape::Flat);
            assert_ne!(input, output);
            assert!(kind.connects(input));
            assert!(kind.connects(output));
        }
    }

    #[test]
    fn slope_ends_follow_shape() {
        let trail = Trail::new(TrailKind::Hill);
        let shape = TileShape::Slope(Direction::North, SlopeHalf::Top);
        assert_eq!(trail.in_direction(shape), Direction::North);
        assert_eq!(trail.out_direction(shape), Direction::South);
    }
}
