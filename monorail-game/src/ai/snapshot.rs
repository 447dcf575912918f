//! Read-only view of the world a prediction tree scores against.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cart::CartId;
use crate::constants::{FORECAST_MEET_WINDOW, SCORE_UNIT};
use crate::direction::Direction;
use crate::level::Level;
use crate::pickups::{Collectible, Pickup, PickupTag};
use crate::tile::TileId;

/// Where a cart stands in a prediction: the tile, the side it entered from
/// and what it carries on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeState {
    pub tile: TileId,
    pub entry: Direction,
    pub cargo: Option<PickupTag>,
}

/// A state reachable from another, with the exit direction taken to get there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Successor {
    pub via: Direction,
    pub state: NodeState,
}

/// Predicted tile path of one cart; index `g` is the tile at generation `g`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forecast {
    pub cart: CartId,
    pub path: Vec<TileId>,
}

impl Forecast {
    /// Whether the forecast visits `tile` within the meeting window of `generation`.
    #[must_use]
    pub fn meets(&self, tile: TileId, generation: u32) -> bool {
        let generation = usize::try_from(generation).unwrap_or(usize::MAX);
        let window = usize::try_from(FORECAST_MEET_WINDOW).unwrap_or(0);
        let from = generation.saturating_sub(window);
        let to = generation.saturating_add(window);
        self.path
            .iter()
            .enumerate()
            .any(|(g, t)| *t == tile && (from..=to).contains(&g))
    }
}

// Heuristic weights, in score units.
const COIN_POINTS: i32 = SCORE_UNIT;
const DIAMOND_POINTS: i32 = 3 * SCORE_UNIT;
const DELIVERY_POINTS: i32 = 10 * SCORE_UNIT;
const ROCK_DROP_POINTS: i32 = 2 * SCORE_UNIT;
const ROCK_PENALTY: i32 = -3 * SCORE_UNIT;
const LEPRECHAUN_PENALTY: i32 = -2 * SCORE_UNIT;
const DYNAMITE_PENALTY: i32 = -4 * SCORE_UNIT;
const ITEM_POINTS: i32 = SCORE_UNIT / 2;
const MEET_POINTS: i32 = 2 * SCORE_UNIT;

/// The level plus the other carts' forecasts from the previous tick.
#[derive(Debug, Clone, Copy)]
pub struct WorldSnapshot<'a> {
    level: &'a Level,
    owner: u8,
    forecasts: &'a [Forecast],
    me: CartId,
}

impl<'a> WorldSnapshot<'a> {
    /// `forecasts` may include the cart's own; it is skipped.
    #[must_use]
    pub const fn new(level: &'a Level, me: CartId, owner: u8, forecasts: &'a [Forecast]) -> Self {
        Self {
            level,
            owner,
            forecasts,
            me,
        }
    }

    #[must_use]
    pub const fn level(&self) -> &'a Level {
        self.level
    }

    fn others(&self) -> impl Iterator<Item = &'a Forecast> + '_ {
        self.forecasts.iter().filter(move |f| f.cart != self.me)
    }

    /// States the cart can reach after leaving `state`'s tile.
    ///
    /// Junctions branch over every orientation enterable from the entry side;
    /// other tiles follow their trail, turning back when it does not connect.
    /// Dead ends turn around in place and portals lead to every companion.
    #[must_use]
    pub fn successors(&self, state: &NodeState) -> SmallVec<[Successor; 4]> {
        let tile = &self.level[state.tile];
        let mut exits: SmallVec<[Direction; 4]> = SmallVec::new();
        if tile.is_switch() && !tile.is_gate() {
            for kind in tile.possible_switches(Some(state.entry)) {
                if let Some((a, b)) = kind.ends() {
                    let exit = if a == state.entry { b } else { a };
                    if !exits.contains(&exit) {
                        exits.push(exit);
                    }
                }
            }
        }
        if exits.is_empty() {
            let (inward, outward) = (tile.in_direction(), tile.out_direction());
            exits.push(if state.entry == inward {
                outward
            } else if state.entry == outward {
                inward
            } else {
                state.entry
            });
        }

        let cargo = self.cargo_after(state);
        let mut next = SmallVec::new();
        for via in exits {
            match tile.neighbor(via) {
                Some(neighbor) => next.push(Successor {
                    via,
                    state: NodeState {
                        tile: neighbor,
                        entry: via.opposite(),
                        cargo,
                    },
                }),
                None if tile.is_portal() => {
                    for port in self.level.companions(state.tile) {
                        next.push(Successor {
                            via,
                            state: NodeState {
                                tile: port,
                                entry: self.dead_end_side(port),
                                cargo,
                            },
                        });
                    }
                }
                None => next.push(Successor {
                    via,
                    state: NodeState {
                        tile: state.tile,
                        entry: via,
                        cargo,
                    },
                }),
            }
        }
        next
    }

    /// The trail end of a portal without a neighbor; carts arrive from there.
    fn dead_end_side(&self, portal: TileId) -> Direction {
        let tile = &self.level[portal];
        let inward = tile.in_direction();
        if tile.neighbor(inward).is_none() {
            inward
        } else {
            tile.out_direction()
        }
    }

    /// Cargo after the effects of `state`'s tile.
    #[must_use]
    pub fn cargo_after(&self, state: &NodeState) -> Option<PickupTag> {
        self.visit(state).1
    }

    /// Heuristic value of arriving at `state` at `generation`, already
    /// discounted by `generation + 1`.
    #[must_use]
    pub fn score(&self, state: &NodeState, generation: u32) -> i32 {
        let (mut points, _) = self.visit(state);
        let carrying_dynamite = state.cargo == Some(PickupTag::Dynamite);
        for forecast in self.others() {
            if forecast.meets(state.tile, generation) {
                points += if carrying_dynamite {
                    MEET_POINTS
                } else {
                    -MEET_POINTS
                };
            }
        }
        let divisor = i32::try_from(generation).unwrap_or(i32::MAX - 1) + 1;
        points / divisor
    }

    /// Points and resulting cargo of arriving at a tile.
    fn visit(&self, state: &NodeState) -> (i32, Option<PickupTag>) {
        let tile = &self.level[state.tile];
        let cargo = state.cargo;
        if tile.is_portal() {
            match cargo {
                Some(PickupTag::Diamond) => return (DELIVERY_POINTS, None),
                Some(PickupTag::RockBlock) => return (ROCK_DROP_POINTS, None),
                _ => {}
            }
        }
        let Some(pickup) = tile.pickup.as_ref() else {
            return (0, cargo);
        };
        if cargo == Some(PickupTag::RockBlock) {
            return (0, cargo);
        }
        let factor = if cargo == Some(PickupTag::Multiplier) { 2 } else { 1 };
        let holds_collectible = cargo.is_some_and(is_collectible_tag);
        match pickup {
            Pickup::Collectible(Collectible::CopperCoin) => (COIN_POINTS * factor, cargo),
            Pickup::Collectible(Collectible::GoldBlock) => {
                let points = if cargo == Some(PickupTag::Axe) {
                    COIN_POINTS * factor
                } else {
                    0
                };
                (points, cargo)
            }
            Pickup::Collectible(Collectible::Flag { owner }) => {
                let points = if *owner == self.owner {
                    COIN_POINTS * factor
                } else {
                    0
                };
                (points, cargo)
            }
            Pickup::Collectible(Collectible::Diamond) => match cargo {
                Some(PickupTag::Diamond) => (0, cargo),
                None => (DIAMOND_POINTS, Some(PickupTag::Diamond)),
                Some(_) => (ITEM_POINTS, Some(PickupTag::Diamond)),
            },
            Pickup::Collectible(Collectible::RockBlock) => (ROCK_PENALTY, Some(PickupTag::RockBlock)),
            Pickup::Collectible(Collectible::Leprechaun) => {
                (LEPRECHAUN_PENALTY, Some(PickupTag::Leprechaun))
            }
            Pickup::Collectible(item) => {
                let tag = Pickup::Collectible(item.clone()).tag();
                (ITEM_POINTS, Some(tag))
            }
            Pickup::PowerUp(item) => {
                if holds_collectible || cargo == Some(PickupTag::Dynamite) {
                    return (0, cargo);
                }
                let tag = Pickup::PowerUp(item.clone()).tag();
                if tag == PickupTag::Dynamite {
                    (DYNAMITE_PENALTY, Some(tag))
                } else {
                    (ITEM_POINTS, Some(tag))
                }
            }
            Pickup::Modifier(_) => (ITEM_POINTS, cargo),
            Pickup::Torch | Pickup::Bonus => (0, cargo),
        }
    }
}

const fn is_collectible_tag(tag: PickupTag) -> bool {
    matches!(
        tag,
        PickupTag::CopperCoin
            | PickupTag::GoldBlock
            | PickupTag::RockBlock
            | PickupTag::Diamond
            | PickupTag::Lamp
            | PickupTag::Axe
            | PickupTag::Flag
            | PickupTag::Leprechaun
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Tile, TilePos, TileShape};

    /// A junction at (0,1) reached from the north, with arms east and west.
    fn junction() -> Level {
        Level::from_tiles([
            Tile::new(TilePos::new(0, 0, 0), TileShape::Flat),
            Tile::new(TilePos::new(0, 1, 0), TileShape::Flat),
            Tile::new(TilePos::new(-1, 1, 0), TileShape::Flat),
            Tile::new(TilePos::new(1, 1, 0), TileShape::Flat),
        ])
    }

    #[test]
    fn junctions_branch_over_enterable_orientations() {
        let level = junction();
        let snapshot = WorldSnapshot::new(&level, CartId(0), 0, &[]);
        let node = NodeState {
            tile: level.tile_at(0, 1).expect("junction"),
            entry: Direction::North,
            cargo: None,
        };
        let next = snapshot.successors(&node);
        let vias: Vec<Direction> = next.iter().map(|s| s.via).collect();
        assert_eq!(vias, vec![Direction::West, Direction::East]);
        assert_eq!(next[0].state.tile, level.tile_at(-1, 1).expect("west"));
        assert_eq!(next[0].state.entry, Direction::East);
    }

    #[test]
    fn dead_ends_turn_around() {
        let level = junction();
        let snapshot = WorldSnapshot::new(&level, CartId(0), 0, &[]);
        let top = level.tile_at(0, 0).expect("top");
        let node = NodeState {
            tile: top,
            entry: Direction::South,
            cargo: None,
        };
        let next = snapshot.successors(&node);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].via, Direction::North);
        assert_eq!(next[0].state.tile, top);
        assert_eq!(next[0].state.entry, Direction::North);
    }

    #[test]
    fn pickups_change_cargo_and_score() {
        let mut level = junction();
        let west = level.tile_at(-1, 1).expect("west");
        level[west].pickup = Some(Pickup::Collectible(Collectible::Diamond));
        let snapshot = WorldSnapshot::new(&level, CartId(0), 0, &[]);
        let node = NodeState {
            tile: west,
            entry: Direction::East,
            cargo: None,
        };
        assert_eq!(snapshot.cargo_after(&node), Some(PickupTag::Diamond));
        assert_eq!(snapshot.score(&node, 0), DIAMOND_POINTS);
        assert_eq!(snapshot.score(&node, 2), DIAMOND_POINTS / 3);

        let rocky = NodeState {
            cargo: Some(PickupTag::RockBlock),
            ..node
        };
        assert_eq!(snapshot.score(&rocky, 0), 0);
        assert_eq!(snapshot.cargo_after(&rocky), Some(PickupTag::RockBlock));
    }

    #[test]
    fn meeting_forecasts_is_penalized_unless_armed() {
        let level = junction();
        let east = level.tile_at(1, 1).expect("east");
        let forecasts = [Forecast {
            cart: CartId(1),
            path: vec![TileId(0), east, east],
        }];
        let snapshot = WorldSnapshot::new(&level, CartId(0), 0, &forecasts);
        let node = NodeState {
            tile: east,
            entry: Direction::West,
            cargo: None,
        };
        assert_eq!(snapshot.score(&node, 0), -MEET_POINTS);
        assert_eq!(snapshot.score(&node, 5), 0);
        let armed = NodeState {
            cargo: Some(PickupTag::Dynamite),
            ..node
        };
        assert_eq!(snapshot.score(&armed, 1), MEET_POINTS / 2);

        let own = WorldSnapshot::new(&level, CartId(1), 0, &forecasts);
        assert_eq!(own.score(&node, 0), 0);
    }
}
