//! Type catalog and slot layout published by a device.
//!
//! The catalog is firmware dependent: the host fetches it once per binding
//! and treats it as read-only afterwards. [`Catalog::pod_hd`] is the built-in
//! description of the reference unit, used by the simulated device.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    BoardItem, DtChannel, ItemId, ItemKind, ModelError, Param, ParamDef, ParamId, Path,
    Placement, PresetData, PresetId, SetId,
};

/// How many sets, presets and slots the device has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLayout {
    pub sets: u8,
    pub presets_per_set: u8,
    pub amps: u8,
    pub pedals: u8,
}

impl DeviceLayout {
    /// Amps and cabs come in pairs, followed by the pedals.
    pub fn item_count(&self) -> u16 {
        self.amps as u16 * 2 + self.pedals as u16
    }

    pub fn preset_count(&self) -> usize {
        self.sets as usize * self.presets_per_set as usize
    }

    pub fn contains(&self, id: PresetId) -> bool {
        id.set.get() < self.sets && id.index < self.presets_per_set
    }

    pub fn contains_set(&self, set: SetId) -> bool {
        set.get() < self.sets
    }

    pub fn set_ids(&self) -> impl Iterator<Item = SetId> {
        (0..self.sets).map(SetId::new)
    }

    /// Every preset address, set by set.
    pub fn preset_ids(&self) -> impl Iterator<Item = PresetId> {
        let per_set = self.presets_per_set;
        (0..self.sets).flat_map(move |s| (0..per_set).map(move |i| PresetId::new(s, i)))
    }

    pub fn amp_item(&self, amp: u8) -> Option<ItemId> {
        (amp < self.amps).then(|| ItemId::new(amp as u16 * 2))
    }

    pub fn cab_item(&self, cab: u8) -> Option<ItemId> {
        (cab < self.amps).then(|| ItemId::new(cab as u16 * 2 + 1))
    }

    pub fn pedal_item(&self, pedal: u8) -> Option<ItemId> {
        (pedal < self.pedals).then(|| ItemId::new(pedal as u16 + self.amps as u16 * 2))
    }

    /// Which slot an item id addresses.
    pub fn slot_of(&self, item: ItemId) -> Option<(ItemKind, u8)> {
        let id = item.get();
        let amp_span = self.amps as u16 * 2;
        if id < amp_span {
            let kind = if id % 2 == 0 { ItemKind::Amp } else { ItemKind::Cab };
            Some((kind, (id / 2) as u8))
        } else if id < self.item_count() {
            Some((ItemKind::Pedal, (id - amp_span) as u8))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub firmware: String,
    pub layout: DeviceLayout,
    pub amps: Vec<String>,
    pub cabs: Vec<String>,
    /// Pedal models keyed by category.
    pub pedals: BTreeMap<String, Vec<String>>,
    pub amp_params: Vec<ParamDef>,
    pub cab_params: Vec<ParamDef>,
    pub pedal_params: BTreeMap<String, Vec<ParamDef>>,
    pub board_params: Vec<ParamDef>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Catalog {
    /// The reference unit: 8 sets of 64 presets, two amp/cab pairs, eight pedals.
    pub fn pod_hd() -> Self {
        Self::pod_hd_with_layout(DeviceLayout {
            sets: 8,
            presets_per_set: 64,
            amps: 2,
            pedals: 8,
        })
    }

    /// Same type lists and parameters as [`Catalog::pod_hd`] on a different layout.
    pub fn pod_hd_with_layout(layout: DeviceLayout) -> Self {
        let amps = names(&[
            "Blackface 'Lux",
            "Blackface Double",
            "Hiway 100",
            "Super O",
            "Gibtone 185",
            "Tweed B-Man",
            "Divided Duo",
            "Treadplate",
            "Elektrik",
            "Brit J-45",
            "Brit P-75",
            "Brit J-800",
            "Bomber Uber",
            "Angel F-Ball",
            "Flip Top",
            "Line 6 Doom",
        ]);
        let cabs = names(&[
            "1x12 Blackface 'Lux",
            "2x12 Blackface Dbl",
            "4x12 Hiway",
            "2x12 Silver Bell",
            "1x12 Super O",
            "4x10 Tweed B-Man",
            "4x12 Greenback 25",
            "4x12 Blackback 30",
            "4x12 Brit T-75",
            "4x12 Uber",
        ]);

        let mut pedals = BTreeMap::new();
        pedals.insert(
            "Distortion".to_string(),
            names(&[
                "Tube Drive",
                "Screamer",
                "Overdrive",
                "Classic Distortion",
                "Heavy Distortion",
                "Colordrive",
                "Buzz Saw",
                "Facial Fuzz",
                "Jet Fuzz",
                "Octave Fuzz",
            ]),
        );
        pedals.insert(
            "Dynamics".to_string(),
            names(&["Tube Comp", "Red Comp", "Blue Comp", "Vetta Comp", "Boost Comp", "Noise Gate", "Hard Gate"]),
        );
        pedals.insert(
            "EQ".to_string(),
            names(&["Graphic EQ", "Studio EQ", "Parametric EQ", "4 Band Shift EQ", "Mid Focus EQ"]),
        );
        pedals.insert(
            "Modulation".to_string(),
            names(&[
                "Pattern Tremolo",
                "Opto Tremolo",
                "Script Phase",
                "U-Vibe",
                "Analog Chorus",
                "Tri Chorus",
                "Jet Flanger",
                "Ring Modulator",
                "Rotary Drum & Horn",
            ]),
        );
        pedals.insert(
            "Delay".to_string(),
            names(&[
                "Ping Pong",
                "Stereo",
                "Digital",
                "Reverse",
                "Lo Res",
                "Tube Echo",
                "Tape Echo",
                "Analog Echo",
                "Multi-Head",
            ]),
        );
        pedals.insert(
            "Reverb".to_string(),
            names(&["Spring", "'63 Spring", "Plate", "Room", "Chamber", "Hall", "Ducking", "Cave"]),
        );
        pedals.insert(
            "Filter".to_string(),
            names(&["Voice Box", "V-Tron", "Q Filter", "Seeker", "Obi Wah", "Tron Up", "Throbber"]),
        );
        pedals.insert(
            "Pitch".to_string(),
            names(&["Pitch Glide", "Smart Harmony", "Bass Octaver"]),
        );
        pedals.insert(
            "Wah".to_string(),
            names(&["Vetta Wah", "Fassel", "Weeper", "Chrome", "Throaty", "Conductor"]),
        );
        pedals.insert("Volume/Pan".to_string(), names(&["Volume Pedal", "Pan"]));

        let amp_params = vec![
            ParamDef::numeric(0, "Drive", 0.0, 1.0, 0.5),
            ParamDef::numeric(1, "Bass", 0.0, 1.0, 0.5),
            ParamDef::numeric(2, "Mid", 0.0, 1.0, 0.5),
            ParamDef::numeric(3, "Treble", 0.0, 1.0, 0.5),
            ParamDef::numeric(4, "Presence", 0.0, 1.0, 0.5),
            ParamDef::numeric(5, "Volume", 0.0, 1.0, 0.7),
            ParamDef::numeric(6, "Sag", 0.0, 1.0, 0.5),
            ParamDef::numeric(7, "Hum", 0.0, 1.0, 0.0),
            ParamDef::numeric(8, "Bias", 0.0, 1.0, 0.5),
            ParamDef::numeric(9, "Bias X", 0.0, 1.0, 0.5),
        ];
        let cab_params = vec![
            ParamDef::choice(
                0,
                "Mic",
                &["57 On Axis", "57 Off Axis", "409 Dynamic", "421 Dynamic", "4038 Ribbon", "121 Ribbon", "67 Condenser", "87 Condenser"],
                0,
            ),
            ParamDef::numeric(1, "Mic Position", -1.0, 1.0, 0.0),
            ParamDef::numeric(2, "Low Cut", 20.0, 500.0, 20.0).with_unit("Hz"),
            ParamDef::numeric(3, "Res Level", 0.0, 1.0, 0.5),
            ParamDef::numeric(4, "Thump", 0.0, 1.0, 0.5),
            ParamDef::numeric(5, "Decay", 0.0, 1.0, 0.5),
        ];

        let mut pedal_params = BTreeMap::new();
        pedal_params.insert(
            "Distortion".to_string(),
            vec![
                ParamDef::numeric(0, "Drive", 0.0, 1.0, 0.5),
                ParamDef::numeric(1, "Bass", 0.0, 1.0, 0.5),
                ParamDef::numeric(2, "Treble", 0.0, 1.0, 0.5),
                ParamDef::numeric(3, "Output", 0.0, 1.0, 0.5),
                ParamDef::numeric(4, "Mix", 0.0, 1.0, 1.0),
            ],
        );
        pedal_params.insert(
            "Dynamics".to_string(),
            vec![
                ParamDef::numeric(0, "Threshold", -60.0, 0.0, -20.0).with_unit("dB"),
                ParamDef::numeric(1, "Ratio", 1.0, 20.0, 4.0),
                ParamDef::numeric(2, "Level", -12.0, 12.0, 0.0).with_unit("dB"),
                ParamDef::numeric(3, "Mix", 0.0, 1.0, 1.0),
            ],
        );
        pedal_params.insert(
            "EQ".to_string(),
            vec![
                ParamDef::numeric(0, "Low Gain", -12.0, 12.0, 0.0).with_unit("dB"),
                ParamDef::numeric(1, "Mid Gain", -12.0, 12.0, 0.0).with_unit("dB"),
                ParamDef::numeric(2, "Mid Freq", 200.0, 5000.0, 1000.0).with_unit("Hz"),
                ParamDef::numeric(3, "High Gain", -12.0, 12.0, 0.0).with_unit("dB"),
                ParamDef::numeric(4, "Level", -12.0, 12.0, 0.0).with_unit("dB"),
            ],
        );
        pedal_params.insert(
            "Modulation".to_string(),
            vec![
                ParamDef::numeric(0, "Speed", 0.1, 15.0, 2.0).with_unit("Hz"),
                ParamDef::numeric(1, "Depth", 0.0, 1.0, 0.5),
                ParamDef::numeric(2, "Mix", 0.0, 1.0, 0.5),
                ParamDef::switch(3, "Sync", false),
            ],
        );
        pedal_params.insert(
            "Delay".to_string(),
            vec![
                ParamDef::numeric(0, "Time", 20.0, 4000.0, 500.0).with_unit("ms"),
                ParamDef::numeric(1, "Feedback", 0.0, 1.0, 0.3),
                ParamDef::numeric(2, "Mix", 0.0, 1.0, 0.3),
                ParamDef::switch(3, "Sync", false),
                ParamDef::choice(4, "Note", &["1/4", "1/8", "1/8 Dotted", "1/16", "1/4 Triplet"], 0),
            ],
        );
        pedal_params.insert(
            "Reverb".to_string(),
            vec![
                ParamDef::numeric(0, "Decay", 0.0, 1.0, 0.5),
                ParamDef::numeric(1, "Pre-Delay", 0.0, 500.0, 20.0).with_unit("ms"),
                ParamDef::numeric(2, "Tone", 0.0, 1.0, 0.5),
                ParamDef::numeric(3, "Mix", 0.0, 1.0, 0.3),
            ],
        );
        pedal_params.insert(
            "Filter".to_string(),
            vec![
                ParamDef::numeric(0, "Freq", 0.0, 1.0, 0.5),
                ParamDef::numeric(1, "Q", 0.0, 1.0, 0.5),
                ParamDef::numeric(2, "Mix", 0.0, 1.0, 1.0),
            ],
        );
        pedal_params.insert(
            "Pitch".to_string(),
            vec![
                ParamDef::numeric(0, "Shift", -24.0, 24.0, 12.0).with_unit("st"),
                ParamDef::numeric(1, "Mix", 0.0, 1.0, 0.5),
            ],
        );
        pedal_params.insert(
            "Wah".to_string(),
            vec![
                ParamDef::numeric(0, "Position", 0.0, 1.0, 0.5),
                ParamDef::numeric(1, "Mix", 0.0, 1.0, 1.0),
            ],
        );
        pedal_params.insert(
            "Volume/Pan".to_string(),
            vec![
                ParamDef::numeric(0, "Volume", 0.0, 1.0, 1.0),
                ParamDef::numeric(1, "Pan", -1.0, 1.0, 0.0),
            ],
        );

        let sources = ["Guitar", "Mic", "Variax", "Aux", "Same"];
        let board_params = vec![
            ParamDef::choice(0, "Input 1 Source", &sources, 0),
            ParamDef::choice(1, "Input 2 Source", &sources, 4),
            ParamDef::numeric(2, "Tempo", 30.0, 240.0, 120.0).with_unit("BPM"),
            ParamDef::numeric(3, "Mixer A Level", -60.0, 12.0, 0.0).with_unit("dB"),
            ParamDef::numeric(4, "Mixer A Pan", -1.0, 1.0, 0.0),
            ParamDef::numeric(5, "Mixer B Level", -60.0, 12.0, 0.0).with_unit("dB"),
            ParamDef::numeric(6, "Mixer B Pan", -1.0, 1.0, 0.0),
        ];

        Self {
            firmware: "2.62".to_string(),
            layout,
            amps,
            cabs,
            pedals,
            amp_params,
            cab_params,
            pedal_params,
            board_params,
        }
    }

    /// Selectable amp models.
    pub fn amp_types(&self) -> Vec<String> {
        self.amps.clone()
    }

    pub fn cab_types(&self) -> Vec<String> {
        self.cabs.clone()
    }

    /// Selectable pedal models keyed by category.
    pub fn pedal_types(&self) -> BTreeMap<String, Vec<String>> {
        self.pedals.clone()
    }

    /// Check that `model` is a valid type for a slot of `kind`. Amps and cabs
    /// accept an empty category or their own kind name.
    pub fn check_type(&self, kind: ItemKind, category: &str, model: &str) -> Result<(), ModelError> {
        let unknown = || ModelError::UnknownType {
            category: category.to_string(),
            model: model.to_string(),
        };
        let models = match kind {
            ItemKind::Amp | ItemKind::Cab => {
                if !category.is_empty() && category != kind.name() {
                    return Err(unknown());
                }
                if kind == ItemKind::Amp { &self.amps } else { &self.cabs }
            }
            ItemKind::Pedal => self.pedals.get(category).ok_or_else(unknown)?,
        };
        if models.iter().any(|m| m == model) {
            Ok(())
        } else {
            Err(unknown())
        }
    }

    pub fn param_defs(&self, kind: ItemKind, category: &str) -> &[ParamDef] {
        match kind {
            ItemKind::Amp => &self.amp_params,
            ItemKind::Cab => &self.cab_params,
            ItemKind::Pedal => self
                .pedal_params
                .get(category)
                .map(|v| v.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn default_params(&self, kind: ItemKind, category: &str) -> BTreeMap<ParamId, Param> {
        self.param_defs(kind, category)
            .iter()
            .map(|def| (def.id, def.instantiate()))
            .collect()
    }

    /// Build an item of the given type with default parameters. This is what
    /// a device reports after a type change.
    pub fn make_item(
        &self,
        kind: ItemKind,
        category: &str,
        model: &str,
        active: bool,
        placement: Placement,
    ) -> Result<BoardItem, ModelError> {
        self.check_type(kind, category, model)?;
        let category = match kind {
            ItemKind::Amp | ItemKind::Cab => kind.name().to_string(),
            ItemKind::Pedal => category.to_string(),
        };
        Ok(BoardItem {
            params: self.default_params(kind, &category),
            kind,
            category,
            model: model.to_string(),
            active,
            placement,
        })
    }

    /// Factory board: every slot filled with the first model of its kind.
    pub fn default_board(&self) -> Vec<BoardItem> {
        let layout = self.layout;
        let first_pedal_category = self.pedals.keys().next().cloned().unwrap_or_default();
        let half = layout.pedals / 2;
        (0..layout.item_count())
            .filter_map(|id| {
                let item = ItemId::new(id);
                let (kind, slot) = layout.slot_of(item)?;
                let (category, model, path) = match kind {
                    ItemKind::Amp => (kind.name().to_string(), self.amps.first()?.clone(), amp_path(slot)),
                    ItemKind::Cab => (kind.name().to_string(), self.cabs.first()?.clone(), amp_path(slot)),
                    ItemKind::Pedal => {
                        let model = self.pedals.get(&first_pedal_category)?.first()?.clone();
                        let path = if slot < half { Path::Pre } else { Path::Post };
                        (first_pedal_category.clone(), model, path)
                    }
                };
                Some(BoardItem {
                    params: self.default_params(kind, &category),
                    kind,
                    category,
                    model,
                    active: kind != ItemKind::Pedal,
                    placement: Placement::new(id, path),
                })
            })
            .collect()
    }

    pub fn default_board_params(&self) -> BTreeMap<ParamId, Param> {
        self.board_params
            .iter()
            .map(|def| (def.id, def.instantiate()))
            .collect()
    }

    pub fn default_dt(&self) -> Vec<DtChannel> {
        (0..self.layout.amps).map(DtChannel::new).collect()
    }

    pub fn blank_preset(&self, name: &str) -> PresetData {
        PresetData {
            name: name.to_string(),
            items: self.default_board(),
            board_params: self.default_board_params(),
            dt: self.default_dt(),
        }
    }
}

fn amp_path(slot: u8) -> Path {
    if slot % 2 == 0 { Path::A } else { Path::B }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_addressing() {
        let layout = Catalog::pod_hd().layout;
        assert_eq!(layout.item_count(), 12);
        assert_eq!(layout.amp_item(1), Some(ItemId::new(2)));
        assert_eq!(layout.cab_item(1), Some(ItemId::new(3)));
        assert_eq!(layout.pedal_item(0), Some(ItemId::new(4)));
        assert_eq!(layout.pedal_item(8), None);
        assert_eq!(layout.slot_of(ItemId::new(3)), Some((ItemKind::Cab, 1)));
        assert_eq!(layout.slot_of(ItemId::new(11)), Some((ItemKind::Pedal, 7)));
        assert_eq!(layout.slot_of(ItemId::new(12)), None);
    }

    #[test]
    fn preset_ids_cover_layout() {
        let layout = DeviceLayout { sets: 2, presets_per_set: 3, amps: 1, pedals: 2 };
        let ids: Vec<_> = layout.preset_ids().collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[3], PresetId::new(1, 0));
        assert!(!layout.contains(PresetId::new(2, 0)));
    }

    #[test]
    fn check_type() {
        let catalog = Catalog::pod_hd();
        assert!(catalog.check_type(ItemKind::Amp, "", "Treadplate").is_ok());
        assert!(catalog.check_type(ItemKind::Pedal, "Delay", "Tape Echo").is_ok());
        assert!(catalog.check_type(ItemKind::Pedal, "Delay", "Screamer").is_err());
        assert!(catalog.check_type(ItemKind::Cab, "Amp", "4x12 Uber").is_err());
    }

    #[test]
    fn default_board_positions_are_contiguous() {
        let board = Catalog::pod_hd().default_board();
        assert_eq!(board.len(), 12);
        for (i, item) in board.iter().enumerate() {
            assert_eq!(item.placement.position as usize, i);
        }
        assert_eq!(board[0].kind, ItemKind::Amp);
        assert_eq!(board[3].kind, ItemKind::Cab);
        assert_eq!(board[4].category, "Delay");
    }
}
