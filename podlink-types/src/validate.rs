//! Checks run against the model before a command leaves the host.
//!
//! Nothing here mutates the model. A command that fails validation is never
//! sent to the device.

use thiserror::Error;

use crate::{
    ItemId, ParamBound, ParamError, ParamId, ParamTarget, ParamValue, Placement, Pod, PresetId,
    PRESET_NAME_MAX,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("no board item {0}")]
    UnknownSlot(ItemId),

    #[error("no parameter {param} (item {item:?})")]
    UnknownParameter { item: Option<ItemId>, param: ParamId },

    #[error("value {value} outside {min}..={max}")]
    ParameterOutOfRange { value: f32, min: f32, max: f32 },

    #[error("unknown type '{model}' in category '{category}'")]
    UnknownType { category: String, model: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("no preset {0}")]
    UnknownPreset(PresetId),

    #[error("position {position} outside board of {capacity} items")]
    InvalidPosition { position: u16, capacity: u16 },
}

impl From<ParamError> for ModelError {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::OutOfRange { value, min, max } => {
                ModelError::ParameterOutOfRange { value, min, max }
            }
            other => ModelError::InvalidValue(other.to_string()),
        }
    }
}

fn unknown_param(target: ParamTarget) -> ModelError {
    match target {
        ParamTarget::Item { item, param } => ModelError::UnknownParameter {
            item: Some(item),
            param,
        },
        ParamTarget::Board { param } => ModelError::UnknownParameter { item: None, param },
    }
}

impl Pod {
    /// Decode a binding-surface string for `target` and check it against the
    /// parameter's effective range.
    pub fn decode_value(&self, target: ParamTarget, text: &str) -> Result<ParamValue, ModelError> {
        if let ParamTarget::Item { item, .. } = target {
            self.item(item).ok_or(ModelError::UnknownSlot(item))?;
        }
        let param = self.param(target).ok_or_else(|| unknown_param(target))?;
        let value = param.kind.parse(text)?;
        param.check(&value)?;
        Ok(value)
    }

    /// Decode a min/max override. An empty string clears the override.
    pub fn decode_bound(
        &self,
        item: ItemId,
        param: ParamId,
        bound: ParamBound,
        text: &str,
    ) -> Result<Option<f32>, ModelError> {
        let slot = self.item(item).ok_or(ModelError::UnknownSlot(item))?;
        let p = slot
            .param(param)
            .ok_or(ModelError::UnknownParameter { item: Some(item), param })?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let value = p.kind.parse(text)?;
        p.check_bound(bound, &value)?;
        Ok(Some(value.to_f32()))
    }

    pub fn check_item(&self, item: ItemId) -> Result<(), ModelError> {
        self.item(item).map(|_| ()).ok_or(ModelError::UnknownSlot(item))
    }

    pub fn check_placement(&self, item: ItemId, placement: Placement) -> Result<(), ModelError> {
        self.check_item(item)?;
        let capacity = self.items.len() as u16;
        if placement.position >= capacity {
            return Err(ModelError::InvalidPosition {
                position: placement.position,
                capacity,
            });
        }
        Ok(())
    }

    pub fn check_preset(&self, id: PresetId) -> Result<(), ModelError> {
        if self.layout.contains(id) {
            Ok(())
        } else {
            Err(ModelError::UnknownPreset(id))
        }
    }
}

/// Preset names are short printable ASCII.
pub fn check_preset_name(name: &str) -> Result<(), ModelError> {
    if name.len() > PRESET_NAME_MAX {
        return Err(ModelError::InvalidValue(format!(
            "preset name longer than {PRESET_NAME_MAX} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err(ModelError::InvalidValue(
            "preset name must be printable ASCII".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Catalog, Path};

    #[test]
    fn min_override_narrows_accepted_values() {
        let mut pod = Pod::new(&Catalog::pod_hd());
        let item = ItemId::new(3);
        let param = ParamId::new(1);
        let target = ParamTarget::item(item, param);
        assert_eq!(pod.decode_value(target, "-1.0"), Ok(ParamValue::Number(-1.0)));

        let min = pod.decode_bound(item, param, ParamBound::Min, "0.0").unwrap();
        pod.items[3].params.get_mut(&param).unwrap().min = min;
        assert!(matches!(
            pod.decode_value(target, "-1.0"),
            Err(ModelError::ParameterOutOfRange { .. })
        ));
    }

    #[test]
    fn unknown_targets() {
        let pod = Pod::new(&Catalog::pod_hd());
        assert_eq!(
            pod.decode_value(ParamTarget::item(ItemId::new(99), ParamId::new(0)), "1"),
            Err(ModelError::UnknownSlot(ItemId::new(99)))
        );
        assert_eq!(
            pod.decode_value(ParamTarget::board(ParamId::new(42)), "1"),
            Err(ModelError::UnknownParameter { item: None, param: ParamId::new(42) })
        );
        assert!(matches!(
            pod.decode_value(ParamTarget::board(ParamId::new(2)), "fast"),
            Err(ModelError::InvalidValue(_))
        ));
    }

    #[test]
    fn empty_bound_clears() {
        let pod = Pod::new(&Catalog::pod_hd());
        assert_eq!(pod.decode_bound(ItemId::new(0), ParamId::new(0), ParamBound::Max, " "), Ok(None));
    }

    #[test]
    fn placement_bounds() {
        let pod = Pod::new(&Catalog::pod_hd());
        assert!(pod.check_placement(ItemId::new(4), Placement::new(11, Path::Post)).is_ok());
        assert_eq!(
            pod.check_placement(ItemId::new(4), Placement::new(12, Path::Post)),
            Err(ModelError::InvalidPosition { position: 12, capacity: 12 })
        );
    }

    #[test]
    fn preset_names() {
        assert!(check_preset_name("Clean Machine").is_ok());
        assert!(check_preset_name("This name is far too long").is_err());
        assert!(check_preset_name("tab\there").is_err());
    }
}
