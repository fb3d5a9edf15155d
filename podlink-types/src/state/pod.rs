use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    BoardItem, Catalog, DeviceLayout, DtChannel, DtId, ItemId, ItemKind, Param, ParamId,
    ParamTarget, Preset, PresetData, PresetId, SetId, SetList,
};

/// Full configuration snapshot of one bound device: the live edit buffer
/// (board, DT channels, global parameters) plus the preset and set catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub layout: DeviceLayout,
    /// Board items indexed by [`ItemId`].
    pub items: Vec<BoardItem>,
    pub board_params: BTreeMap<ParamId, Param>,
    pub dt: Vec<DtChannel>,
    /// Name of the preset in the edit buffer.
    pub name: String,
    pub current_set: Option<SetId>,
    pub current_preset: Option<PresetId>,
    /// Local edits not yet saved to the device.
    pub dirty: bool,
    pub presets: BTreeMap<PresetId, Preset>,
    pub sets: BTreeMap<SetId, SetList>,
}

impl Pod {
    /// A fresh model for a device described by `catalog`. Every preset and set
    /// address of the layout gets an (unknown) entry.
    pub fn new(catalog: &Catalog) -> Self {
        let layout = catalog.layout;
        Self {
            layout,
            items: catalog.default_board(),
            board_params: catalog.default_board_params(),
            dt: catalog.default_dt(),
            name: String::new(),
            current_set: None,
            current_preset: None,
            dirty: false,
            presets: layout.preset_ids().map(|id| (id, Preset::default())).collect(),
            sets: layout.set_ids().map(|id| (id, SetList::default())).collect(),
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&BoardItem> {
        self.items.get(id.index())
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut BoardItem> {
        self.items.get_mut(id.index())
    }

    pub fn amps(&self) -> impl Iterator<Item = &BoardItem> {
        self.items.iter().filter(|i| i.kind == ItemKind::Amp)
    }

    pub fn cabs(&self) -> impl Iterator<Item = &BoardItem> {
        self.items.iter().filter(|i| i.kind == ItemKind::Cab)
    }

    pub fn pedals(&self) -> impl Iterator<Item = &BoardItem> {
        self.items.iter().filter(|i| i.kind == ItemKind::Pedal)
    }

    pub fn param(&self, target: ParamTarget) -> Option<&Param> {
        match target {
            ParamTarget::Item { item, param } => self.item(item)?.param(param),
            ParamTarget::Board { param } => self.board_params.get(&param),
        }
    }

    pub fn param_mut(&mut self, target: ParamTarget) -> Option<&mut Param> {
        match target {
            ParamTarget::Item { item, param } => self.item_mut(item)?.param_mut(param),
            ParamTarget::Board { param } => self.board_params.get_mut(&param),
        }
    }

    pub fn dt(&self, id: DtId) -> Option<&DtChannel> {
        self.dt.get(id.get() as usize)
    }

    /// The DT channel driven by amp slot `amp`.
    pub fn dt_for_amp(&self, amp: u8) -> Option<DtId> {
        self.dt
            .iter()
            .position(|ch| ch.amp == amp)
            .map(|idx| DtId::new(idx as u8))
    }

    pub fn preset(&self, id: PresetId) -> Option<&Preset> {
        self.presets.get(&id)
    }

    /// The live edit buffer as a storable preset payload.
    pub fn live_data(&self) -> PresetData {
        PresetData {
            name: self.name.clone(),
            items: self.items.clone(),
            board_params: self.board_params.clone(),
            dt: self.dt.clone(),
        }
    }

    /// Replace the edit buffer with a preset payload.
    pub fn load_data(&mut self, data: &PresetData) {
        self.name = data.name.clone();
        self.items = data.items.clone();
        self.board_params = data.board_params.clone();
        self.dt = data.dt.clone();
    }

    /// Item ids ordered by board position.
    pub fn chain(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = (0..self.items.len() as u16).map(ItemId::new).collect();
        ids.sort_by_key(|id| self.items[id.index()].placement.position);
        ids
    }
}
