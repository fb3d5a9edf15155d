//! DT amplifier channel settings (power-amp class, tube mode, topology).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DtClass {
    #[default]
    A,
    AB,
}

impl DtClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DtClass::A => "A",
            DtClass::AB => "A/B",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "A" | "a" => Some(DtClass::A),
            "A/B" | "AB" | "a/b" | "ab" => Some(DtClass::AB),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DtMode {
    #[default]
    Pentode,
    Triode,
}

impl DtMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DtMode::Pentode => "Pentode",
            DtMode::Triode => "Triode",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pentode" => Some(DtMode::Pentode),
            "triode" => Some(DtMode::Triode),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DtTopology {
    #[default]
    I,
    II,
    III,
    IV,
}

impl DtTopology {
    pub fn as_str(&self) -> &'static str {
        match self {
            DtTopology::I => "I",
            DtTopology::II => "II",
            DtTopology::III => "III",
            DtTopology::IV => "IV",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "I" | "1" => Some(DtTopology::I),
            "II" | "2" => Some(DtTopology::II),
            "III" | "3" => Some(DtTopology::III),
            "IV" | "4" => Some(DtTopology::IV),
            _ => None,
        }
    }
}

/// Which DT setting a write addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtField {
    Class,
    Mode,
    Topology,
}

impl DtField {
    pub fn name(&self) -> &'static str {
        match self {
            DtField::Class => "class",
            DtField::Mode => "mode",
            DtField::Topology => "topology",
        }
    }

    /// Decode a binding-surface string for this field.
    pub fn parse(&self, text: &str) -> Option<DtSetting> {
        match self {
            DtField::Class => DtClass::parse(text).map(DtSetting::Class),
            DtField::Mode => DtMode::parse(text).map(DtSetting::Mode),
            DtField::Topology => DtTopology::parse(text).map(DtSetting::Topology),
        }
    }
}

/// A decoded DT write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtSetting {
    Class(DtClass),
    Mode(DtMode),
    Topology(DtTopology),
}

impl DtSetting {
    pub fn field(&self) -> DtField {
        match self {
            DtSetting::Class(_) => DtField::Class,
            DtSetting::Mode(_) => DtField::Mode,
            DtSetting::Topology(_) => DtField::Topology,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DtSetting::Class(c) => c.as_str(),
            DtSetting::Mode(m) => m.as_str(),
            DtSetting::Topology(t) => t.as_str(),
        }
    }
}

/// One DT channel, bound to one amp slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DtChannel {
    /// Amp slot (not item id) this channel drives.
    pub amp: u8,
    pub class: DtClass,
    pub mode: DtMode,
    pub topology: DtTopology,
}

impl DtChannel {
    pub fn new(amp: u8) -> Self {
        Self {
            amp,
            ..Self::default()
        }
    }

    pub fn get(&self, field: DtField) -> DtSetting {
        match field {
            DtField::Class => DtSetting::Class(self.class),
            DtField::Mode => DtSetting::Mode(self.mode),
            DtField::Topology => DtSetting::Topology(self.topology),
        }
    }

    pub fn apply(&mut self, setting: DtSetting) {
        match setting {
            DtSetting::Class(c) => self.class = c,
            DtSetting::Mode(m) => self.mode = m,
            DtSetting::Topology(t) => self.topology = t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_settings() {
        assert_eq!(DtField::Class.parse("A/B"), Some(DtSetting::Class(DtClass::AB)));
        assert_eq!(DtField::Mode.parse("triode"), Some(DtSetting::Mode(DtMode::Triode)));
        assert_eq!(DtField::Topology.parse("III"), Some(DtSetting::Topology(DtTopology::III)));
        assert_eq!(DtField::Topology.parse("V"), None);
    }

    #[test]
    fn apply_touches_one_field() {
        let mut ch = DtChannel::new(1);
        ch.apply(DtSetting::Topology(DtTopology::IV));
        assert_eq!(ch.topology, DtTopology::IV);
        assert_eq!(ch.class, DtClass::A);
        assert_eq!(ch.get(DtField::Topology).as_str(), "IV");
    }
}
