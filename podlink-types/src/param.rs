use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ParamId;

/// What values a parameter accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamKind {
    /// `unit` is empty for dimensionless values.
    Numeric { min: f32, max: f32, unit: String },
    Enumerated(Vec<String>),
    Boolean,
}

/// Static definition of a parameter, as published in the device catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub id: ParamId,
    pub name: String,
    pub kind: ParamKind,
    pub default: ParamValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f32),
    Choice(u16),
    Switch(bool),
}

/// Which user-settable bound of a numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamBound {
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("'{text}' is not a valid {expected}")]
    Invalid { text: String, expected: &'static str },

    #[error("value {value} outside {min}..={max}")]
    OutOfRange { value: f32, min: f32, max: f32 },

    #[error("value kind does not match parameter kind")]
    KindMismatch,

    #[error("min/max overrides only apply to numeric parameters")]
    BoundsUnsupported,
}

/// A live parameter: definition data plus the current value and optional
/// user-set range overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub value: ParamValue,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl ParamValue {
    pub fn to_f32(&self) -> f32 {
        match self {
            ParamValue::Number(v) => *v,
            ParamValue::Choice(v) => *v as f32,
            ParamValue::Switch(v) => if *v { 1.0 } else { 0.0 },
        }
    }
}

impl ParamKind {
    /// Decode a string coming from the binding surface. Only the shape of the
    /// text is checked here; range checks belong to [`Param::check`].
    pub fn parse(&self, text: &str) -> Result<ParamValue, ParamError> {
        let trimmed = text.trim();
        match self {
            ParamKind::Numeric { unit, .. } => match trimmed
                .strip_suffix(unit.as_str())
                .unwrap_or(trimmed)
                .trim_end()
                .parse::<f32>()
            {
                Ok(v) if v.is_finite() => Ok(ParamValue::Number(v)),
                _ => Err(ParamError::Invalid {
                    text: text.to_string(),
                    expected: "number",
                }),
            },
            ParamKind::Enumerated(options) => {
                if let Some(pos) = options
                    .iter()
                    .position(|o| o.eq_ignore_ascii_case(trimmed))
                {
                    return Ok(ParamValue::Choice(pos as u16));
                }
                match trimmed.parse::<u16>() {
                    Ok(idx) if (idx as usize) < options.len() => Ok(ParamValue::Choice(idx)),
                    _ => Err(ParamError::Invalid {
                        text: text.to_string(),
                        expected: "option",
                    }),
                }
            }
            ParamKind::Boolean => match trimmed.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(ParamValue::Switch(true)),
                "false" | "0" | "no" | "off" => Ok(ParamValue::Switch(false)),
                _ => Err(ParamError::Invalid {
                    text: text.to_string(),
                    expected: "switch",
                }),
            },
        }
    }

    /// Declared numeric range, if any.
    pub fn range(&self) -> Option<(f32, f32)> {
        match self {
            ParamKind::Numeric { min, max, .. } => Some((*min, *max)),
            _ => None,
        }
    }
}

impl ParamDef {
    pub fn numeric(id: u16, name: &str, min: f32, max: f32, default: f32) -> Self {
        Self {
            id: ParamId::new(id),
            name: name.to_string(),
            kind: ParamKind::Numeric {
                min,
                max,
                unit: String::new(),
            },
            default: ParamValue::Number(default),
        }
    }

    /// Attach a display unit to a numeric definition.
    pub fn with_unit(mut self, unit: &str) -> Self {
        if let ParamKind::Numeric { unit: u, .. } = &mut self.kind {
            *u = unit.to_string();
        }
        self
    }

    pub fn choice(id: u16, name: &str, options: &[&str], default: u16) -> Self {
        Self {
            id: ParamId::new(id),
            name: name.to_string(),
            kind: ParamKind::Enumerated(options.iter().map(|o| o.to_string()).collect()),
            default: ParamValue::Choice(default),
        }
    }

    pub fn switch(id: u16, name: &str, default: bool) -> Self {
        Self {
            id: ParamId::new(id),
            name: name.to_string(),
            kind: ParamKind::Boolean,
            default: ParamValue::Switch(default),
        }
    }

    pub fn instantiate(&self) -> Param {
        Param {
            name: self.name.clone(),
            kind: self.kind.clone(),
            value: self.default,
            min: None,
            max: None,
        }
    }
}

impl Param {
    /// Range a new value must fall in: the declared range narrowed by overrides.
    pub fn effective_range(&self) -> Option<(f32, f32)> {
        let (lo, hi) = self.kind.range()?;
        Some((self.min.unwrap_or(lo), self.max.unwrap_or(hi)))
    }

    /// Check that `value` may be stored in this parameter.
    pub fn check(&self, value: &ParamValue) -> Result<(), ParamError> {
        match (&self.kind, value) {
            (ParamKind::Numeric { .. }, ParamValue::Number(v)) => {
                let (min, max) = self.effective_range().unwrap_or((f32::MIN, f32::MAX));
                if *v < min || *v > max {
                    return Err(ParamError::OutOfRange { value: *v, min, max });
                }
                Ok(())
            }
            (ParamKind::Enumerated(options), ParamValue::Choice(idx)) => {
                if (*idx as usize) < options.len() {
                    Ok(())
                } else {
                    Err(ParamError::OutOfRange {
                        value: *idx as f32,
                        min: 0.0,
                        max: options.len().saturating_sub(1) as f32,
                    })
                }
            }
            (ParamKind::Boolean, ParamValue::Switch(_)) => Ok(()),
            _ => Err(ParamError::KindMismatch),
        }
    }

    /// Check a new min or max override. The override must sit inside the
    /// declared range, keep `min <= max`, and keep the current value inside.
    pub fn check_bound(&self, bound: ParamBound, value: &ParamValue) -> Result<(), ParamError> {
        let (lo, hi) = self.kind.range().ok_or(ParamError::BoundsUnsupported)?;
        let v = match value {
            ParamValue::Number(v) => *v,
            _ => return Err(ParamError::KindMismatch),
        };
        if v < lo || v > hi {
            return Err(ParamError::OutOfRange { value: v, min: lo, max: hi });
        }
        let current = self.value.to_f32();
        match bound {
            ParamBound::Min => {
                let upper = self.max.unwrap_or(hi).min(current);
                if v > upper {
                    return Err(ParamError::OutOfRange { value: v, min: lo, max: upper });
                }
            }
            ParamBound::Max => {
                let lower = self.min.unwrap_or(lo).max(current);
                if v < lower {
                    return Err(ParamError::OutOfRange { value: v, min: lower, max: hi });
                }
            }
        }
        Ok(())
    }

    pub fn bound(&self, bound: ParamBound) -> Option<f32> {
        match bound {
            ParamBound::Min => self.min,
            ParamBound::Max => self.max,
        }
    }

    pub fn set_bound(&mut self, bound: ParamBound, value: Option<f32>) {
        match bound {
            ParamBound::Min => self.min = value,
            ParamBound::Max => self.max = value,
        }
    }

    /// Get the current value as the string the binding surface exchanges
    pub fn value_string(&self) -> String {
        match (&self.kind, &self.value) {
            (ParamKind::Enumerated(options), ParamValue::Choice(idx)) => options
                .get(*idx as usize)
                .cloned()
                .unwrap_or_else(|| idx.to_string()),
            (ParamKind::Numeric { unit, .. }, ParamValue::Number(v)) if !unit.is_empty() => {
                format!("{:.2} {}", v, unit)
            }
            (_, ParamValue::Number(v)) => format!("{:.2}", v),
            (_, ParamValue::Choice(v)) => format!("{}", v),
            (_, ParamValue::Switch(v)) => format!("{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(value: f32, min: f32, max: f32) -> Param {
        Param {
            name: "drive".to_string(),
            kind: ParamKind::Numeric {
                min,
                max,
                unit: String::new(),
            },
            value: ParamValue::Number(value),
            min: None,
            max: None,
        }
    }

    fn mic() -> Param {
        ParamDef::choice(0, "Mic", &["57 On Axis", "57 Off Axis", "421 Dynamic"], 0).instantiate()
    }

    #[test]
    fn parse_numeric() {
        let kind = ParamKind::Numeric {
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        };
        assert_eq!(kind.parse("0.25"), Ok(ParamValue::Number(0.25)));
        assert_eq!(kind.parse(" -1 "), Ok(ParamValue::Number(-1.0)));
        assert!(kind.parse("loud").is_err());
        assert!(kind.parse("NaN").is_err());
    }

    #[test]
    fn parse_enumerated_by_name_or_index() {
        let p = mic();
        assert_eq!(p.kind.parse("421 dynamic"), Ok(ParamValue::Choice(2)));
        assert_eq!(p.kind.parse("1"), Ok(ParamValue::Choice(1)));
        assert!(p.kind.parse("7").is_err());
        assert!(p.kind.parse("ribbon").is_err());
    }

    #[test]
    fn parse_boolean() {
        assert_eq!(ParamKind::Boolean.parse("on"), Ok(ParamValue::Switch(true)));
        assert_eq!(ParamKind::Boolean.parse("0"), Ok(ParamValue::Switch(false)));
        assert!(ParamKind::Boolean.parse("maybe").is_err());
    }

    #[test]
    fn check_respects_overrides() {
        let mut p = numeric(0.5, -1.0, 1.0);
        assert!(p.check(&ParamValue::Number(-1.0)).is_ok());
        p.min = Some(0.0);
        assert_eq!(
            p.check(&ParamValue::Number(-1.0)),
            Err(ParamError::OutOfRange { value: -1.0, min: 0.0, max: 1.0 })
        );
        assert!(p.check(&ParamValue::Switch(true)).is_err());
    }

    #[test]
    fn bound_cannot_exclude_current_value() {
        let p = numeric(0.5, 0.0, 1.0);
        assert!(p.check_bound(ParamBound::Min, &ParamValue::Number(0.2)).is_ok());
        assert!(p.check_bound(ParamBound::Min, &ParamValue::Number(0.7)).is_err());
        assert!(p.check_bound(ParamBound::Max, &ParamValue::Number(0.4)).is_err());
        assert!(p.check_bound(ParamBound::Max, &ParamValue::Number(2.0)).is_err());
    }

    #[test]
    fn bound_on_choice_rejected() {
        let p = mic();
        assert_eq!(
            p.check_bound(ParamBound::Min, &ParamValue::Number(0.0)),
            Err(ParamError::BoundsUnsupported)
        );
    }

    #[test]
    fn value_string_uses_option_names() {
        let mut p = mic();
        p.value = ParamValue::Choice(1);
        assert_eq!(p.value_string(), "57 Off Axis");
        assert_eq!(numeric(0.123, 0.0, 1.0).value_string(), "0.12");
    }

    #[test]
    fn unit_is_shown_and_accepted_back() {
        let mut time = ParamDef::numeric(0, "Time", 20.0, 4000.0, 500.0)
            .with_unit("ms")
            .instantiate();
        assert_eq!(time.value_string(), "500.00 ms");
        assert_eq!(time.kind.parse("350 ms"), Ok(ParamValue::Number(350.0)));
        assert_eq!(time.kind.parse("350"), Ok(ParamValue::Number(350.0)));
        assert!(time.kind.parse("350 Hz").is_err());
        time.value = ParamValue::Number(120.5);
        assert_eq!(time.kind.parse(&time.value_string()), Ok(ParamValue::Number(120.5)));
    }
}
