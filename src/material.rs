//! Renderable materials: fixed parameter slots resolved to stable handles.

use crate::dichoptic::VisibilityChannel;
use ratatui::style::Color;

/// Stable handle to a material slot. Valid until [`MaterialStore::free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(u32);

/// Rendering parameters for one simulated object (a piece cell, a locked
/// cell, or the board frame). The parameter set is fixed; the modulator
/// writes these slots directly instead of resolving properties by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base: Color,
    pub channel: VisibilityChannel,
    /// Opacity pushed by the contrast loop; 1.0 = fully opaque.
    pub alpha: f32,
    /// Dedicated contrast scalar, pushed alongside alpha.
    pub contrast: f32,
    pub gabor_enabled: bool,
    pub gabor_frequency: f32,
    /// Radians. The therapy config stores degrees; converted on push.
    pub gabor_orientation: f32,
    pub gabor_contrast: f32,
    pub gabor_sigma: f32,
}

impl Material {
    pub fn new(base: Color, channel: VisibilityChannel) -> Self {
        Self {
            base,
            channel,
            alpha: 1.0,
            contrast: 1.0,
            gabor_enabled: false,
            gabor_frequency: 0.0,
            gabor_orientation: 0.0,
            gabor_contrast: 0.0,
            gabor_sigma: 0.0,
        }
    }
}

/// Slab of materials. Slots are reused after free; handles index directly.
#[derive(Debug, Default)]
pub struct MaterialStore {
    slots: Vec<Option<Material>>,
    free: Vec<u32>,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, material: Material) -> MaterialId {
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(material);
            MaterialId(idx)
        } else {
            self.slots.push(Some(material));
            MaterialId((self.slots.len() - 1) as u32)
        }
    }

    pub fn free(&mut self, id: MaterialId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                self.free.push(id.0);
            }
        }
    }

    #[inline]
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Live (id, material) pairs, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|m| (MaterialId(i as u32), m)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
