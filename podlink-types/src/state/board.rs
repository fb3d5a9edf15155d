use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Param, ParamId};

/// What kind of slot a board item occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Amp,
    Cab,
    Pedal,
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Amp => "Amp",
            ItemKind::Cab => "Cab",
            ItemKind::Pedal => "Pedal",
        }
    }
}

/// Signal path segment an item sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Path {
    #[default]
    Pre,
    A,
    B,
    Post,
}

impl Path {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Path::Pre),
            1 => Some(Path::A),
            2 => Some(Path::B),
            3 => Some(Path::Post),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Path::Pre => 0,
            Path::A => 1,
            Path::B => 2,
            Path::Post => 3,
        }
    }
}

/// Where an item sits in the chain. Positions are unique and contiguous
/// across the whole board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Placement {
    pub position: u16,
    pub path: Path,
}

impl Placement {
    pub fn new(position: u16, path: Path) -> Self {
        Self { position, path }
    }
}

/// A placed amp, cab or pedal with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub kind: ItemKind,
    /// Pedal category ("Distortion", "Delay", ...); the kind name for amps and cabs.
    pub category: String,
    pub model: String,
    pub active: bool,
    pub placement: Placement,
    pub params: BTreeMap<ParamId, Param>,
}

impl BoardItem {
    pub fn param(&self, id: ParamId) -> Option<&Param> {
        self.params.get(&id)
    }

    pub fn param_mut(&mut self, id: ParamId) -> Option<&mut Param> {
        self.params.get_mut(&id)
    }
}
