//! Items lying on tiles or riding along with carts.
//!
//! A cart has two slots: the carried slot holds a [`Collectible`] or a
//! [`PowerUp`] and is passed between carts on collision, the modifier slot
//! holds a [`Modifier`] that stays with its cart until it expires.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cart::CartId;
use crate::constants::{
    BALLOON_TICKS, DYNAMITE_FUSE_STEP, GHOST_TICKS, KEY_TICKS, LAMP_PERIOD, MIRROR_TICKS,
    MULTIPLIER_TICKS, OILER_TICKS,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Collectible {
    CopperCoin,
    GoldBlock,
    RockBlock,
    Diamond,
    /// Pays a point once per lamp period while carried.
    Lamp { score_tick: u32 },
    Axe,
    /// Only the cart of player `owner` may pick it up.
    Flag { owner: u8 },
    Leprechaun,
}

impl Collectible {
    #[must_use]
    pub const fn lamp() -> Self {
        Self::Lamp { score_tick: 0 }
    }

    /// Points due this tick; only lamps ever pay.
    #[must_use]
    pub const fn score(&self) -> i32 {
        match self {
            Self::Lamp { score_tick: 0 } => 1,
            _ => 0,
        }
    }

    pub fn tick(&mut self) {
        if let Self::Lamp { score_tick } = self {
            *score_tick = (*score_tick + 1) % LAMP_PERIOD;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PowerUp {
    /// Keypresses toggle every switch on the level.
    Key { ttl: u32 },
    /// Doubles coin, gold and flag points.
    Multiplier { ttl: u32 },
    /// Inverts slope acceleration.
    Balloon { ttl: u32 },
    /// Burns down everywhere and never expires by itself.
    Dynamite { life: f64 },
}

impl PowerUp {
    #[must_use]
    pub const fn key() -> Self {
        Self::Key { ttl: KEY_TICKS }
    }

    #[must_use]
    pub const fn multiplier() -> Self {
        Self::Multiplier {
            ttl: MULTIPLIER_TICKS,
        }
    }

    #[must_use]
    pub const fn balloon() -> Self {
        Self::Balloon { ttl: BALLOON_TICKS }
    }

    #[must_use]
    pub const fn dynamite() -> Self {
        Self::Dynamite { life: 1.0 }
    }

    /// Timers only run while a cart carries the power-up; the fuse always burns.
    pub fn tick(&mut self, carried: bool) {
        match self {
            Self::Key { ttl } | Self::Multiplier { ttl } | Self::Balloon { ttl } => {
                if carried {
                    *ttl = ttl.saturating_sub(1);
                }
            }
            Self::Dynamite { life } => {
                if *life > 0.0 {
                    *life -= DYNAMITE_FUSE_STEP;
                }
            }
        }
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        match self {
            Self::Key { ttl } | Self::Multiplier { ttl } | Self::Balloon { ttl } => *ttl == 0,
            Self::Dynamite { .. } => false,
        }
    }

    #[must_use]
    pub fn is_exploding(&self) -> bool {
        matches!(self, Self::Dynamite { life } if *life <= 0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Modifier {
    /// Bound to the twin cart spawned when the mirror was picked up.
    Mirror { twin: Option<CartId>, ttl: u32 },
    Oiler { ttl: u32 },
    /// Passes through other carts at a pinned speed.
    Ghost { ttl: u32 },
}

impl Modifier {
    #[must_use]
    pub const fn mirror() -> Self {
        Self::Mirror {
            twin: None,
            ttl: MIRROR_TICKS,
        }
    }

    #[must_use]
    pub const fn oiler() -> Self {
        Self::Oiler { ttl: OILER_TICKS }
    }

    #[must_use]
    pub const fn ghost() -> Self {
        Self::Ghost { ttl: GHOST_TICKS }
    }

    pub fn tick(&mut self, carried: bool) {
        if !carried {
            return;
        }
        let (Self::Mirror { ttl, .. } | Self::Oiler { ttl } | Self::Ghost { ttl }) = self;
        *ttl = ttl.saturating_sub(1);
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        let (Self::Mirror { ttl, .. } | Self::Oiler { ttl } | Self::Ghost { ttl }) = self;
        *ttl == 0
    }

    #[must_use]
    pub const fn twin(&self) -> Option<CartId> {
        match self {
            Self::Mirror { twin, .. } => *twin,
            _ => None,
        }
    }
}

/// Content of a cart's carried slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Carried {
    Collectible(Collectible),
    PowerUp(PowerUp),
}

impl Carried {
    #[must_use]
    pub const fn is_collectible(&self) -> bool {
        matches!(self, Self::Collectible(_))
    }

    #[must_use]
    pub fn is(&self, tag: PickupTag) -> bool {
        self.tag() == tag
    }

    #[must_use]
    pub const fn tag(&self) -> PickupTag {
        match self {
            Self::Collectible(item) => collectible_tag(item),
            Self::PowerUp(item) => power_up_tag(item),
        }
    }
}

/// Anything that can lie on a tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Pickup {
    Collectible(Collectible),
    PowerUp(PowerUp),
    Modifier(Modifier),
    /// Starts a darkness shuffle when driven over.
    Torch,
    /// Spawned by scenario layers; consumed without effect when driven over.
    Bonus,
}

impl Pickup {
    #[must_use]
    pub const fn coin() -> Self {
        Self::Collectible(Collectible::CopperCoin)
    }

    #[must_use]
    pub const fn tag(&self) -> PickupTag {
        match self {
            Self::Collectible(item) => collectible_tag(item),
            Self::PowerUp(item) => power_up_tag(item),
            Self::Modifier(item) => modifier_tag(item),
            Self::Torch => PickupTag::Torch,
            Self::Bonus => PickupTag::Bonus,
        }
    }

    #[must_use]
    pub const fn is_power_up(&self) -> bool {
        matches!(self, Self::PowerUp(_))
    }

    /// Tick while lying on a tile.
    pub fn tick(&mut self, carried: bool) {
        match self {
            Self::Collectible(item) => item.tick(),
            Self::PowerUp(item) => item.tick(carried),
            Self::Modifier(item) => item.tick(carried),
            Self::Torch | Self::Bonus => {}
        }
    }

    #[must_use]
    pub fn is_exploding(&self) -> bool {
        matches!(self, Self::PowerUp(item) if item.is_exploding())
    }
}

impl From<Carried> for Pickup {
    fn from(value: Carried) -> Self {
        match value {
            Carried::Collectible(item) => Self::Collectible(item),
            Carried::PowerUp(item) => Self::PowerUp(item),
        }
    }
}

/// Kind of a pickup, without its state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupTag {
    CopperCoin,
    GoldBlock,
    RockBlock,
    Diamond,
    Lamp,
    Axe,
    Flag,
    Leprechaun,
    Key,
    Multiplier,
    Balloon,
    Dynamite,
    Mirror,
    Oiler,
    Ghost,
    Torch,
    Bonus,
}

impl fmt::Display for PickupTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CopperCoin => "copper_coin",
            Self::GoldBlock => "gold_block",
            Self::RockBlock => "rock_block",
            Self::Diamond => "diamond",
            Self::Lamp => "lamp",
            Self::Axe => "axe",
            Self::Flag => "flag",
            Self::Leprechaun => "leprechaun",
            Self::Key => "key",
            Self::Multiplier => "multiplier",
            Self::Balloon => "balloon",
            Self::Dynamite => "dynamite",
            Self::Mirror => "mirror",
            Self::Oiler => "oiler",
            Self::Ghost => "ghost",
            Self::Torch => "torch",
            Self::Bonus => "bonus",
        };
        f.write_str(label)
    }
}

const fn collectible_tag(item: &Collectible) -> PickupTag {
    match item {
        Collectible::CopperCoin => PickupTag::CopperCoin,
        Collectible::GoldBlock => PickupTag::GoldBlock,
        Collectible::RockBlock => PickupTag::RockBlock,
        Collectible::Diamond => PickupTag::Diamond,
        Collectible::Lamp { .. } => PickupTag::Lamp,
        Collectible::Axe => PickupTag::Axe,
        Collectible::Flag { .. } => PickupTag::Flag,
        Collectible::Leprechaun => PickupTag::Leprechaun,
    }
}

const fn power_up_tag(item: &PowerUp) -> PickupTag {
    match item {
        PowerUp::Key { .. } => PickupTag::Key,
        PowerUp::Multiplier { .. } => PickupTag::Multiplier,
        PowerUp::Balloon { .. } => PickupTag::Balloon,
        PowerUp::Dynamite { .. } => PickupTag::Dynamite,
    }
}

const fn modifier_tag(item: &Modifier) -> PickupTag {
    match item {
        Modifier::Mirror { .. } => PickupTag::Mirror,
        Modifier::Oiler { .. } => PickupTag::Oiler,
        Modifier::Ghost { .. } => PickupTag::Ghost,
    }
}
