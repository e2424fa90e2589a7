//! Contrast calibration for vision therapy: the therapy config written by
//! the calibration surface, and the per-frame loop that pushes it to every
//! material the dominant eye currently sees.

use crate::dichoptic::VisibilityChannel;
use crate::material::{MaterialId, MaterialStore};

/// Calibration parameters. Read every frame by the modulator; mutated
/// directly by the calibration UI, no explicit push calls needed.
#[derive(Debug, Clone, PartialEq)]
pub struct TherapyConfig {
    /// Contrast for the dominant eye, 0.1..=1.0.
    pub good_eye_contrast: f32,
    pub gabor_mode: bool,
    /// Cycles, 1..=16.
    pub gabor_frequency: f32,
    /// Degrees, wraps within 0..180.
    pub gabor_orientation: f32,
    /// 0.1..=1.0.
    pub gabor_contrast: f32,
    /// Gaussian envelope width, 0.05..=2.0.
    pub gabor_sigma: f32,
}

impl Default for TherapyConfig {
    fn default() -> Self {
        Self {
            good_eye_contrast: 0.5,
            gabor_mode: false,
            gabor_frequency: 4.0,
            gabor_orientation: 45.0,
            gabor_contrast: 0.8,
            gabor_sigma: 0.3,
        }
    }
}

impl TherapyConfig {
    pub fn set_contrast(&mut self, v: f32) {
        self.good_eye_contrast = v.clamp(0.1, 1.0);
    }

    pub fn nudge_contrast(&mut self, delta: f32) {
        self.set_contrast(self.good_eye_contrast + delta);
    }

    pub fn set_frequency(&mut self, v: f32) {
        self.gabor_frequency = v.clamp(1.0, 16.0);
    }

    pub fn set_orientation(&mut self, deg: f32) {
        self.gabor_orientation = deg.rem_euclid(180.0);
    }

    pub fn set_gabor_contrast(&mut self, v: f32) {
        self.gabor_contrast = v.clamp(0.1, 1.0);
    }

    pub fn set_sigma(&mut self, v: f32) {
        self.gabor_sigma = v.clamp(0.05, 2.0);
    }
}

/// Per-frame control loop over the good-eye material registry.
///
/// Registration happens when a cell locks or on an eye-swap rebuild;
/// deregistration when a cleared cell is destroyed or the grid is emptied.
/// `tick` runs unconditionally every frame, so calibration changes land
/// within one frame.
#[derive(Debug, Clone, Default)]
pub struct ContrastModulator {
    registry: Vec<MaterialId>,
}

impl ContrastModulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: MaterialId) {
        if !self.registry.contains(&id) {
            self.registry.push(id);
        }
    }

    pub fn unregister(&mut self, id: MaterialId) {
        self.registry.retain(|&m| m != id);
    }

    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Drop the registry and re-collect every material currently on the
    /// good-eye channel. Called after an eye swap re-tags the world.
    pub fn rebuild(&mut self, store: &MaterialStore) {
        self.clear();
        self.registry.extend(
            store
                .iter()
                .filter(|(_, m)| m.channel == VisibilityChannel::GoodEyeOnly)
                .map(|(id, _)| id),
        );
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Push the current therapy parameters to every registered material:
    /// contrast as both opacity and the dedicated contrast slot, and the
    /// four Gabor parameters (orientation converted to radians) when Gabor
    /// mode is on.
    pub fn tick(&mut self, store: &mut MaterialStore, config: &TherapyConfig) {
        for &id in &self.registry {
            let Some(mat) = store.get_mut(id) else { continue };
            mat.alpha = config.good_eye_contrast;
            mat.contrast = config.good_eye_contrast;
            mat.gabor_enabled = config.gabor_mode;
            if config.gabor_mode {
                mat.gabor_frequency = config.gabor_frequency;
                mat.gabor_orientation = config.gabor_orientation.to_radians();
                mat.gabor_contrast = config.gabor_contrast;
                mat.gabor_sigma = config.gabor_sigma;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dichoptic::VisibilityChannel;
    use crate::material::Material;
    use ratatui::style::Color;

    fn store_with(n: usize) -> (MaterialStore, Vec<MaterialId>) {
        let mut store = MaterialStore::new();
        let ids = (0..n)
            .map(|_| store.alloc(Material::new(Color::White, VisibilityChannel::GoodEyeOnly)))
            .collect();
        (store, ids)
    }

    #[test]
    fn tick_pushes_contrast_to_registered() {
        let (mut store, ids) = store_with(3);
        let mut modulator = ContrastModulator::new();
        for &id in &ids[..2] {
            modulator.register(id);
        }
        let mut config = TherapyConfig::default();
        config.set_contrast(0.3);

        modulator.tick(&mut store, &config);
        for &id in &ids[..2] {
            let mat = store.get(id).unwrap();
            assert!((mat.alpha - 0.3).abs() < f32::EPSILON);
            assert!((mat.contrast - 0.3).abs() < f32::EPSILON);
        }
        // Unregistered material untouched.
        assert!((store.get(ids[2]).unwrap().alpha - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn calibration_change_lands_on_next_tick() {
        let (mut store, ids) = store_with(1);
        let mut modulator = ContrastModulator::new();
        modulator.register(ids[0]);
        let mut config = TherapyConfig::default();

        modulator.tick(&mut store, &config);
        assert!((store.get(ids[0]).unwrap().contrast - 0.5).abs() < f32::EPSILON);

        config.nudge_contrast(-0.3);
        modulator.tick(&mut store, &config);
        assert!((store.get(ids[0]).unwrap().contrast - 0.2).abs() < 1e-5);
    }

    #[test]
    fn gabor_params_pushed_in_radians_when_enabled() {
        let (mut store, ids) = store_with(1);
        let mut modulator = ContrastModulator::new();
        modulator.register(ids[0]);
        let mut config = TherapyConfig::default();

        modulator.tick(&mut store, &config);
        assert!(!store.get(ids[0]).unwrap().gabor_enabled);

        config.gabor_mode = true;
        config.set_orientation(90.0);
        modulator.tick(&mut store, &config);
        let mat = store.get(ids[0]).unwrap();
        assert!(mat.gabor_enabled);
        assert!((mat.gabor_frequency - 4.0).abs() < f32::EPSILON);
        assert!((mat.gabor_orientation - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
        assert!((mat.gabor_contrast - 0.8).abs() < f32::EPSILON);
        assert!((mat.gabor_sigma - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn register_dedups_and_unregister_stops_updates() {
        let (mut store, ids) = store_with(1);
        let mut modulator = ContrastModulator::new();
        modulator.register(ids[0]);
        modulator.register(ids[0]);
        assert_eq!(modulator.len(), 1);

        modulator.unregister(ids[0]);
        assert!(modulator.is_empty());

        let mut config = TherapyConfig::default();
        config.set_contrast(0.1);
        modulator.tick(&mut store, &config);
        assert!((store.get(ids[0]).unwrap().alpha - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn config_clamps() {
        let mut config = TherapyConfig::default();
        config.set_contrast(2.0);
        assert!((config.good_eye_contrast - 1.0).abs() < f32::EPSILON);
        config.set_contrast(0.0);
        assert!((config.good_eye_contrast - 0.1).abs() < f32::EPSILON);
        config.set_frequency(100.0);
        assert!((config.gabor_frequency - 16.0).abs() < f32::EPSILON);
        config.set_orientation(190.0);
        assert!((config.gabor_orientation - 10.0).abs() < 1e-4);
        config.set_sigma(0.0);
        assert!((config.gabor_sigma - 0.05).abs() < f32::EPSILON);
    }
}
