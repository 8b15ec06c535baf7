//! Per-element visual effect parameters.
//!
//! An element may carry several effect instances. They are folded into one
//! parameter bag before drawing: a later enabled effect that sets a key
//! overrides earlier values, and keys it leaves unset keep what came before.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Named effect parameters. `None` means "not set by this effect".
///
/// Filter keys (`brightness` .. `opacity`) map onto a per-pixel filter pass.
/// Advanced keys (`vignette`, `pixelate`, `tint`) need a second pass over the
/// drawn layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectParameters {
    /// Percent offset, -100..=100.
    pub brightness: Option<f64>,
    /// Percent offset, -100..=100.
    pub contrast: Option<f64>,
    /// Percent offset, -100..=100.
    pub saturation: Option<f64>,
    /// Degrees.
    pub hue_rotate: Option<f64>,
    /// Blur radius in pixels.
    pub blur: Option<f64>,
    /// 0..=100.
    pub grayscale: Option<f64>,
    /// 0..=100.
    pub sepia: Option<f64>,
    /// 0..=100.
    pub invert: Option<f64>,
    /// 0..=100.
    pub opacity: Option<f64>,

    /// Vignette strength, 0..=100.
    pub vignette: Option<f64>,
    /// Pixel block size.
    pub pixelate: Option<f64>,
    /// Tint colour as `#rrggbb`.
    pub tint: Option<String>,
    /// Tint mix, 0..=100.
    pub tint_strength: Option<f64>,
}

macro_rules! last_wins {
    ($target:ident, $other:ident, $($field:ident),+ $(,)?) => {
        $(
            if $other.$field.is_some() {
                $target.$field = $other.$field.clone();
            }
        )+
    };
}

impl EffectParameters {
    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: &EffectParameters) {
        last_wins!(
            self,
            other,
            brightness,
            contrast,
            saturation,
            hue_rotate,
            blur,
            grayscale,
            sepia,
            invert,
            opacity,
            vignette,
            pixelate,
            tint,
            tint_strength,
        );
    }

    /// Whether any filter-pass key is set.
    pub fn has_filters(&self) -> bool {
        [
            self.brightness,
            self.contrast,
            self.saturation,
            self.hue_rotate,
            self.blur,
            self.grayscale,
            self.sepia,
            self.invert,
            self.opacity,
        ]
        .iter()
        .any(Option::is_some)
    }

    /// Whether any advanced-pass key is set.
    pub fn has_advanced(&self) -> bool {
        self.vignette.is_some() || self.pixelate.is_some() || self.tint.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_filters() && !self.has_advanced() && self.tint_strength.is_none()
    }
}

/// One effect applied to an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectInstance {
    #[serde(default)]
    pub id: String,

    /// Preset or display name.
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub params: EffectParameters,
}

fn default_enabled() -> bool {
    true
}

impl EffectInstance {
    pub fn new(name: impl Into<String>, params: EffectParameters) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            enabled: true,
            params,
        }
    }
}

/// Effects keyed by element id, in application order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectCatalog {
    by_element: HashMap<String, Vec<EffectInstance>>,
}

impl EffectCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an effect to an element's stack.
    pub fn push(&mut self, element_id: impl Into<String>, effect: EffectInstance) {
        self.by_element
            .entry(element_id.into())
            .or_default()
            .push(effect);
    }

    pub fn effects_for(&self, element_id: &str) -> &[EffectInstance] {
        self.by_element
            .get(element_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Merged parameters of the element's enabled effects, or `None` when it
    /// has none.
    pub fn merged_for(&self, element_id: &str) -> Option<EffectParameters> {
        let mut enabled = self
            .effects_for(element_id)
            .iter()
            .filter(|effect| effect.enabled);
        let mut merged = enabled.next()?.params.clone();
        for effect in enabled {
            merged.merge(&effect.params);
        }
        Some(merged)
    }

    pub fn element_count(&self) -> usize {
        self.by_element.len()
    }
}
