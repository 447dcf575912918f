//! Tile sets, the derived neighbor graph and the binary level format.
//!
//! Every edit recomputes all neighbor links, portal pairings and trail
//! alignments. Edits happen while authoring, so the O(tiles) rebuild is the
//! whole story; [`TileId`]s handed out before an edit are stale afterwards.
use log::debug;
use rand::Rng;
use std::collections::HashMap;
use std::hash::Hasher;
use std::io::{Read, Write};
use std::ops::{Index, IndexMut};
use thiserror::Error;
use twox_hash::XxHash64;

use crate::direction::Direction;
use crate::tile::{Tile, TileId, TilePos, TileShape};
use crate::trail::TrailKind;

/// Size of one serialized tile record.
pub const TILE_RECORD_LEN: usize = 16;
const COUNT_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level data truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("level declares a negative tile count ({0})")]
    NegativeCount(i32),
    #[error("tile record {index} has unknown shape byte {byte}")]
    UnknownShape { index: usize, byte: u8 },
    #[error("tile record {index} has unknown trail byte {byte}")]
    UnknownTrail { index: usize, byte: u8 },
    #[error("level I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct Level {
    tiles: Vec<Tile>,
    by_cell: HashMap<(i32, i32), TileId>,
    portals: Vec<TileId>,
}

impl Level {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a level from tiles in one pass; later tiles replace earlier ones
    /// on the same cell.
    #[must_use]
    pub fn from_tiles(tiles: impl IntoIterator<Item = Tile>) -> Self {
        let mut level = Self::new();
        for tile in tiles {
            level.insert_unlinked(tile);
        }
        level.rebuild();
        level
    }

    /// Place a tile, replacing whatever occupied its cell, and return its id.
    pub fn set_tile(&mut self, tile: Tile) -> TileId {
        let pos = tile.position;
        self.insert_unlinked(tile);
        self.rebuild();
        self.tile_at(pos.x, pos.y).unwrap_or(TileId(0))
    }

    /// Remove the tile at `(x, y)`.
    pub fn remove_tile(&mut self, x: i32, y: i32) -> Option<Tile> {
        let idx = self
            .tiles
            .iter()
            .position(|t| t.position.x == x && t.position.y == y)?;
        let removed = self.tiles.remove(idx);
        self.rebuild();
        Some(removed)
    }

    fn insert_unlinked(&mut self, tile: Tile) {
        let pos = tile.position;
        self.tiles
            .retain(|t| !(t.position.x == pos.x && t.position.y == pos.y));
        self.tiles.push(tile);
    }

    fn rebuild(&mut self) {
        // Stable, so equal draw keys keep insertion order.
        self.tiles.sort_by_key(|t| t.position.draw_key());
        self.by_cell = self
            .tiles
            .iter()
            .enumerate()
            .map(|(idx, t)| ((t.position.x, t.position.y), TileId(idx)))
            .collect();
        self.update_neighbors();
        self.portals = self
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_portal())
            .map(|(idx, _)| TileId(idx))
            .collect();
        for tile in &mut self.tiles {
            tile.align(None);
        }
        debug!(
            "level rebuilt: {} tiles, {} portals",
            self.tiles.len(),
            self.portals.len()
        );
    }

    fn update_neighbors(&mut self) {
        for idx in 0..self.tiles.len() {
            for dir in Direction::ALL {
                let neighbor = self.linked_neighbor(idx, dir);
                self.tiles[idx].set_neighbor(dir, neighbor);
            }
        }
    }

    /// A link exists only when both tiles' offset functions agree.
    fn linked_neighbor(&self, idx: usize, dir: Direction) -> Option<TileId> {
        let tile = &self.tiles[idx];
        let (dx, dy) = tile.shape.neighbor_offset(dir);
        if (dx, dy) == (0, 0) {
            return None;
        }
        let id = self.tile_at(tile.position.x + dx, tile.position.y + dy)?;
        let back = self.tiles[id.0].shape.neighbor_offset(dir.opposite());
        (back == (-dx, -dy)).then_some(id)
    }

    #[must_use]
    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileId> {
        self.by_cell.get(&(x, y)).copied()
    }

    #[must_use]
    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id.0)
    }

    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn ids(&self) -> impl Iterator<Item = TileId> + use<> {
        (0..self.tiles.len()).map(TileId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[must_use]
    pub fn portals(&self) -> &[TileId] {
        &self.portals
    }

    /// Every other portal of the level.
    pub fn companions(&self, portal: TileId) -> impl Iterator<Item = TileId> + '_ {
        self.portals.iter().copied().filter(move |id| *id != portal)
    }

    pub fn random_companion<R: Rng + ?Sized>(&self, portal: TileId, rng: &mut R) -> Option<TileId> {
        let companions: Vec<TileId> = self.companions(portal).collect();
        if companions.is_empty() {
            return None;
        }
        companions.get(rng.gen_range(0..companions.len())).copied()
    }

    fn is_plain_flat(tile: &Tile) -> bool {
        tile.shape.is_flat() && !tile.is_portal()
    }

    pub fn random_flat_tile<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<TileId> {
        let flat: Vec<TileId> = self
            .ids()
            .filter(|id| Self::is_plain_flat(&self.tiles[id.0]))
            .collect();
        if flat.is_empty() {
            return None;
        }
        flat.get(rng.gen_range(0..flat.len())).copied()
    }

    #[must_use]
    pub fn first_portal(&self) -> Option<TileId> {
        self.portals.first().copied()
    }

    pub fn random_portal<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<TileId> {
        if self.portals.is_empty() {
            return None;
        }
        self.portals.get(rng.gen_range(0..self.portals.len())).copied()
    }

    /// Serialize into the fixed-width level format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(COUNT_LEN + self.tiles.len() * TILE_RECORD_LEN);
        let count = i32::try_from(self.tiles.len()).unwrap_or(i32::MAX);
        out.extend_from_slice(&count.to_le_bytes());
        for tile in &self.tiles {
            out.push(tile.shape.to_byte());
            out.push(tile.trail.kind.to_byte());
            out.extend_from_slice(&[0, 0]);
            out.extend_from_slice(&tile.position.x.to_le_bytes());
            out.extend_from_slice(&tile.position.y.to_le_bytes());
            out.extend_from_slice(&tile.position.z.to_le_bytes());
        }
        out
    }

    /// Parse the fixed-width level format and rebuild the graph.
    ///
    /// # Errors
    ///
    /// Returns [`LevelError`] when the data is truncated or holds unknown bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, LevelError> {
        let count_bytes = read_array::<COUNT_LEN>(bytes, 0)?;
        let count = i32::from_le_bytes(count_bytes);
        let count = usize::try_from(count).map_err(|_| LevelError::NegativeCount(count))?;
        let expected = COUNT_LEN + count.saturating_mul(TILE_RECORD_LEN);
        if bytes.len() < expected {
            return Err(LevelError::Truncated {
                expected,
                found: bytes.len(),
            });
        }

        let mut tiles = Vec::with_capacity(count);
        for index in 0..count {
            let record = read_array::<TILE_RECORD_LEN>(bytes, COUNT_LEN + index * TILE_RECORD_LEN)?;
            let shape = TileShape::from_byte(record[0]).ok_or(LevelError::UnknownShape {
                index,
                byte: record[0],
            })?;
            let kind = TrailKind::from_byte(record[1]).ok_or(LevelError::UnknownTrail {
                index,
                byte: record[1],
            })?;
            let coord = |at: usize| i32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]]);
            let position = TilePos::new(coord(4), coord(8), coord(12));
            tiles.push(Tile::with_trail(position, shape, kind));
        }
        Ok(Self::from_tiles(tiles))
    }

    /// # Errors
    ///
    /// Returns [`LevelError::Io`] when writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), LevelError> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`LevelError`] when reading fails or the data is malformed.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, LevelError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::decode(&bytes)
    }

    /// Stable hash of the serialized level.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&self.encode());
        hasher.finish()
    }
}

fn read_array<const N: usize>(bytes: &[u8], at: usize) -> Result<[u8; N], LevelError> {
    bytes
        .get(at..at + N)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or(LevelError::Truncated {
            expected: at + N,
            found: bytes.len(),
        })
}

impl Index<TileId> for Level {
    type Output = Tile;

    fn index(&self, id: TileId) -> &Tile {
        &self.tiles[id.0]
    }
}

impl IndexMut<TileId> for Level {
    fn index_mut(&mut self, id: TileId) -> &mut Tile {
        &mut self.tiles[id.0]
    }
}
