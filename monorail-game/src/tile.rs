//! Grid cells of the rail network.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::constants::{CURVE_LENGTH, SLOPE_ANGLE, SLOPE_LENGTH, STRAIGHT_LENGTH};
use crate::direction::Direction;
use crate::pickups::Pickup;
use crate::trail::{Trail, TrailKind};

/// Dense index of a tile inside its [`Level`](crate::level::Level).
///
/// Ids are invalidated whenever the level topology is edited.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub usize);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl TilePos {
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Isometric draw order key; tiles are kept sorted by it.
    #[must_use]
    pub const fn draw_key(self) -> i32 {
        -self.x + self.y
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlopeHalf {
    Top,
    Bottom,
}

/// Shape family of a tile. Portals and gates ride like flat tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileShape {
    Flat,
    /// A slope half; the direction names the side the slope faces.
    Slope(Direction, SlopeHalf),
    Portal,
    Gate,
}

impl TileShape {
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Flat => 0,
            Self::Slope(dir, half) => {
                let base = 1 + 2 * dir.id() as u8;
                match half {
                    SlopeHalf::Top => base,
                    SlopeHalf::Bottom => base + 1,
                }
            }
            Self::Portal => 10,
            Self::Gate => 11,
        }
    }

    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Flat),
            1..=8 => {
                let dir = Direction::from_id(((byte - 1) / 2) as usize);
                let half = if (byte - 1) % 2 == 0 {
                    SlopeHalf::Top
                } else {
                    SlopeHalf::Bottom
                };
                Some(Self::Slope(dir, half))
            }
            10 => Some(Self::Portal),
            11 => Some(Self::Gate),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_flat(self) -> bool {
        !matches!(self, Self::Slope(..))
    }

    #[must_use]
    pub const fn slope_direction(self) -> Option<Direction> {
        match self {
            Self::Slope(dir, _) => Some(dir),
            _ => None,
        }
    }

    #[must_use]
    pub const fn default_trail(self) -> TrailKind {
        if self.is_flat() {
            TrailKind::NorthSouth
        } else {
            TrailKind::Hill
        }
    }

    /// Grid offset of the neighbor in `dir`; `(0, 0)` means the side is closed.
    #[must_use]
    pub fn neighbor_offset(self, dir: Direction) -> (i32, i32) {
        let Self::Slope(facing, half) = self else {
            return dir.offset();
        };
        // The rails of a slope only leave along its facing axis.
        let along_axis = dir == facing || dir == facing.opposite();
        if !along_axis {
            return (0, 0);
        }
        match (facing, half, dir) {
            (Direction::North, SlopeHalf::Top, Direction::North) => (-1, 0),
            (Direction::North, SlopeHalf::Bottom, Direction::South) => (1, 0),
            (Direction::East, SlopeHalf::Top, Direction::East) => (0, 1),
            (Direction::East, SlopeHalf::Bottom, Direction::West) => (0, -1),
            (Direction::South, SlopeHalf::Top, Direction::South) => (-1, 2),
            (Direction::South, SlopeHalf::Bottom, Direction::North) => (1, -2),
            (Direction::West, SlopeHalf::Top, Direction::West) => (-2, 1),
            (Direction::West, SlopeHalf::Bottom, Direction::East) => (2, -1),
            _ => dir.offset(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tile {
    pub position: TilePos,
    pub shape: TileShape,
    pub trail: Trail,
    neighbors: [Option<TileId>; 4],
    pub pickup: Option<Pickup>,
    /// Presentation hint for the pending switch of a cart.
    pub selected: bool,
    /// Only meaningful on gate tiles.
    pub gate_down: bool,
}

impl Tile {
    #[must_use]
    pub fn new(position: TilePos, shape: TileShape) -> Self {
        Self::with_trail(position, shape, shape.default_trail())
    }

    /// Slopes always carry a hill trail regardless of `kind`.
    #[must_use]
    pub fn with_trail(position: TilePos, shape: TileShape, kind: TrailKind) -> Self {
        let kind = if shape.is_flat() {
            if kind == TrailKind::Hill {
                TrailKind::NorthSouth
            } else {
                kind
            }
        } else {
            TrailKind::Hill
        };
        Self {
            position,
            shape,
            trail: Trail::new(kind),
            neighbors: [None; 4],
            pickup: None,
            selected: false,
            gate_down: false,
        }
    }

    #[must_use]
    pub fn length(&self) -> i32 {
        if !self.shape.is_flat() {
            SLOPE_LENGTH
        } else if self.trail.kind.is_straight() {
            STRAIGHT_LENGTH
        } else {
            CURVE_LENGTH
        }
    }

    #[must_use]
    pub const fn angle(&self) -> i32 {
        if self.shape.is_flat() { 0 } else { SLOPE_ANGLE }
    }

    #[must_use]
    pub const fn neighbor(&self, dir: Direction) -> Option<TileId> {
        self.neighbors[dir.id()]
    }

    #[must_use]
    pub const fn neighbors(&self) -> [Option<TileId>; 4] {
        self.neighbors
    }

    pub(crate) const fn set_neighbor(&mut self, dir: Direction, neighbor: Option<TileId>) {
        self.neighbors[dir.id()] = neighbor;
    }

    #[must_use]
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.iter().flatten().count()
    }

    #[must_use]
    pub fn in_direction(&self) -> Direction {
        self.trail.in_direction(self.shape)
    }

    #[must_use]
    pub fn out_direction(&self) -> Direction {
        self.trail.out_direction(self.shape)
    }

    #[must_use]
    pub fn in_neighbor(&self) -> Option<TileId> {
        self.neighbor(self.in_direction())
    }

    #[must_use]
    pub fn out_neighbor(&self) -> Option<TileId> {
        self.neighbor(self.out_direction())
    }

    #[must_use]
    pub const fn is_portal(&self) -> bool {
        matches!(self.shape, TileShape::Portal)
    }

    #[must_use]
    pub const fn is_gate(&self) -> bool {
        matches!(self.shape, TileShape::Gate)
    }

    /// Junctions (three or more neighbors) and gates can be switched.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        match self.shape {
            TileShape::Gate => true,
            TileShape::Slope(..) => false,
            TileShape::Flat | TileShape::Portal => self.neighbor_count() >= 3,
        }
    }

    /// Portals exit north when their rail continues to the south.
    #[must_use]
    pub const fn is_north_exit(&self) -> bool {
        self.neighbors[Direction::South.id()].is_some()
    }

    /// Orientations whose both ends have a neighbor, optionally restricted to
    /// those touching `from`.
    #[must_use]
    pub fn possible_switches(&self, from: Option<Direction>) -> SmallVec<[TrailKind; 6]> {
        TrailKind::FLAT
            .into_iter()
            .filter(|kind| {
                kind.ends().is_some_and(|(a, b)| {
                    self.neighbor(a).is_some()
                        && self.neighbor(b).is_some()
                        && from.is_none_or(|dir| dir == a || dir == b)
                })
            })
            .collect()
    }

    /// Cycle the orientation, or raise/lower a gate. Returns whether anything changed.
    pub fn switch_it(&mut self, from: Option<Direction>) -> bool {
        if self.is_gate() {
            self.gate_down = !self.gate_down;
            return true;
        }
        self.cycle_trail(from)
    }

    fn cycle_trail(&mut self, from: Option<Direction>) -> bool {
        if !self.trail.may_switch || !self.shape.is_flat() {
            return false;
        }
        let available = self.possible_switches(from);
        let Some(first) = available.first().copied() else {
            return false;
        };
        let next = available
            .iter()
            .position(|kind| *kind == self.trail.kind)
            .and_then(|idx| available.get(idx + 1).copied())
            .unwrap_or(first);
        let changed = next != self.trail.kind;
        self.trail.kind = next;
        changed
    }

    /// Make the trail consistent with the neighbors, or enterable from `from`.
    pub fn align(&mut self, from: Option<Direction>) {
        if !self.shape.is_flat() {
            return;
        }
        if self.is_portal() {
            self.trail.kind = if self.is_north_exit() {
                TrailKind::NorthSouth
            } else {
                TrailKind::EastWest
            };
            return;
        }
        match from {
            None => {
                if !self.possible_switches(None).contains(&self.trail.kind) {
                    self.cycle_trail(None);
                }
            }
            Some(dir) => {
                if dir != self.in_direction() && dir != self.out_direction() {
                    self.cycle_trail(Some(dir));
                }
            }
        }
    }

    /// Advance the fuse or timers of a pickup lying on this tile.
    pub fn tick(&mut self) {
        if let Some(pickup) = self.pickup.as_mut() {
            pickup.tick(false);
        }
    }
}
