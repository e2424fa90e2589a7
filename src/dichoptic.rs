//! Dichoptic presentation: visibility channels, lazy-eye designation,
//! per-eye view masks, and channel (re)assignment.
//!
//! The falling piece is shown only to the amblyopic eye, the locked stack
//! only to the dominant eye (contrast-reduced), and the board frame to both
//! for binocular fusion.

use crate::material::{MaterialId, MaterialStore};
use crate::therapy::ContrastModulator;

/// Physical eye side. Which one is "lazy" is configuration, swappable live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Every renderable simulation object carries exactly one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChannel {
    /// Only the amblyopic eye: the falling piece.
    LazyEyeOnly,
    /// Only the dominant eye: the locked stack, contrast-suppressed.
    GoodEyeOnly,
    /// Both eyes: the board frame, anchors binocular alignment.
    Fusion,
}

/// Subset of channels a render target draws. One per eye viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMask(u8);

const BIT_LAZY: u8 = 1 << 0;
const BIT_GOOD: u8 = 1 << 1;
const BIT_FUSION: u8 = 1 << 2;

impl ChannelMask {
    pub const LAZY_VIEW: Self = Self(BIT_LAZY | BIT_FUSION);
    pub const GOOD_VIEW: Self = Self(BIT_GOOD | BIT_FUSION);

    #[inline]
    pub fn allows(self, channel: VisibilityChannel) -> bool {
        let bit = match channel {
            VisibilityChannel::LazyEyeOnly => BIT_LAZY,
            VisibilityChannel::GoodEyeOnly => BIT_GOOD,
            VisibilityChannel::Fusion => BIT_FUSION,
        };
        self.0 & bit != 0
    }
}

/// Maps simulated objects to channels and rebuilds the good-eye registry
/// when the lazy-eye designation flips.
#[derive(Debug, Clone)]
pub struct EyeChannelAssigner {
    lazy_eye: Eye,
}

impl EyeChannelAssigner {
    pub fn new(lazy_eye: Eye) -> Self {
        Self { lazy_eye }
    }

    pub fn lazy_eye(&self) -> Eye {
        self.lazy_eye
    }

    pub fn good_eye(&self) -> Eye {
        self.lazy_eye.other()
    }

    /// View mask for one physical eye under the current designation.
    pub fn mask_for(&self, side: Eye) -> ChannelMask {
        if side == self.lazy_eye {
            ChannelMask::LAZY_VIEW
        } else {
            ChannelMask::GOOD_VIEW
        }
    }

    /// Tag the active piece's cells for the amblyopic eye.
    pub fn tag_active_piece(&self, store: &mut MaterialStore, cells: &[MaterialId]) {
        for &id in cells {
            if let Some(mat) = store.get_mut(id) {
                mat.channel = VisibilityChannel::LazyEyeOnly;
            }
        }
    }

    /// Tag newly locked cells for the dominant eye and register them with
    /// the contrast loop.
    pub fn tag_locked(
        &self,
        store: &mut MaterialStore,
        cells: &[MaterialId],
        modulator: &mut ContrastModulator,
    ) {
        for &id in cells {
            if let Some(mat) = store.get_mut(id) {
                mat.channel = VisibilityChannel::GoodEyeOnly;
            }
            modulator.register(id);
        }
    }

    pub fn tag_fusion(&self, store: &mut MaterialStore, id: MaterialId) {
        if let Some(mat) = store.get_mut(id) {
            mat.channel = VisibilityChannel::Fusion;
        }
    }

    /// Swap the lazy-eye designation and re-tag every simulated object in a
    /// single pass: active piece, all locked cells, and the frame. The
    /// good-eye material registry is then rebuilt for the new scheme so no
    /// frame mixes old and new assignments.
    pub fn swap_lazy_eye(
        &mut self,
        store: &mut MaterialStore,
        piece_cells: &[MaterialId],
        locked_cells: &[MaterialId],
        frame: MaterialId,
        modulator: &mut ContrastModulator,
    ) {
        self.lazy_eye = self.lazy_eye.other();
        for &id in piece_cells {
            if let Some(mat) = store.get_mut(id) {
                mat.channel = VisibilityChannel::LazyEyeOnly;
            }
        }
        for &id in locked_cells {
            if let Some(mat) = store.get_mut(id) {
                mat.channel = VisibilityChannel::GoodEyeOnly;
            }
        }
        self.tag_fusion(store, frame);
        modulator.rebuild(store);
    }
}
