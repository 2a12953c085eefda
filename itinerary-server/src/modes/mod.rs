//! Movement modes.
//!
//! A mode is a rule that, given a cell and read access to the terrain around
//! it, produces the neighbouring cells an agent could move to and what each
//! move costs. Modes form a closed set; per-mode behaviour is looked up in a
//! capability table rather than through trait objects.
//!
//! Every move costs its straight-line length times a multiplier of at least
//! one, which keeps the Euclidean search heuristic admissible.

mod group;
mod movement;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Cell;
use crate::terrain::Terrain;

pub use group::ModeTypeGroup;

/// One lazily produced move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    pub target: Cell,
    pub cost: f64,
    pub mode: ModeType,
}

/// The built-in movement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ModeType {
    Walk = 0,
    Jump = 1,
    Swim = 2,
    Climb = 3,
    Door = 4,
    Dig = 5,
    Boat = 6,
    /// Labels tunnel segments; produces no in-region moves.
    Tunnel = 7,
}

/// Pushes every cell reachable from the origin in one move.
type Generator = fn(Cell, &dyn Terrain, &mut Vec<Cell>);

/// Static description of a mode.
struct Capability {
    name: &'static str,
    multiplier: f64,
    generate: Option<Generator>,
}

static CAPABILITIES: [Capability; 8] = [
    Capability {
        name: "walk",
        multiplier: 1.0,
        generate: Some(movement::walk),
    },
    Capability {
        name: "jump",
        multiplier: 1.5,
        generate: Some(movement::jump),
    },
    Capability {
        name: "swim",
        multiplier: 2.0,
        generate: Some(movement::swim),
    },
    Capability {
        name: "climb",
        multiplier: 1.2,
        generate: Some(movement::climb),
    },
    Capability {
        name: "door",
        multiplier: 1.3,
        generate: Some(movement::door),
    },
    Capability {
        name: "dig",
        multiplier: 4.0,
        generate: Some(movement::dig),
    },
    Capability {
        name: "boat",
        multiplier: 1.0,
        generate: Some(movement::boat),
    },
    Capability {
        name: "tunnel",
        multiplier: 1.0,
        generate: None,
    },
];

impl ModeType {
    /// Every mode, in bit order.
    pub const ALL: [ModeType; 8] = [
        ModeType::Walk,
        ModeType::Jump,
        ModeType::Swim,
        ModeType::Climb,
        ModeType::Door,
        ModeType::Dig,
        ModeType::Boat,
        ModeType::Tunnel,
    ];

    fn capability(self) -> &'static Capability {
        &CAPABILITIES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.capability().name
    }

    /// Factor applied to the straight-line length of each move.
    pub fn multiplier(self) -> f64 {
        self.capability().multiplier
    }

    /// Returns true if the mode produces moves inside a region.
    pub fn generates_moves(self) -> bool {
        self.capability().generate.is_some()
    }

    /// The single bit representing this mode in a [`ModeTypeGroup`].
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Parses a mode name as produced by [`ModeType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Moves available from `origin`.
    ///
    /// Reads only the terrain immediately around `origin` and has no side
    /// effects, so it is safe to call from any worker. An empty result just
    /// means the mode contributes nothing here.
    pub fn destinations(self, origin: Cell, terrain: &dyn Terrain) -> Vec<Move> {
        let cap = self.capability();
        let Some(generate) = cap.generate else {
            return Vec::new();
        };

        let mut targets = Vec::new();
        generate(origin, terrain, &mut targets);
        targets
            .into_iter()
            .map(|target| Move {
                target,
                cost: origin.distance_to(&target) * cap.multiplier,
                mode: self,
            })
            .collect()
    }
}

impl fmt::Display for ModeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
