use bitflags::bitflags;
use strum::{Display, EnumIter, FromRepr};

/// The five tile-accelerator primitive list categories.
///
/// Declaration order is the fixed DMA priority order: a frame's lists are
/// always transferred opaque-first, punch-through-last, so bin ordering is
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[repr(usize)]
pub enum ListType {
    /// Opaque polygons (OP).
    Opaque = 0,
    /// Opaque modifier volumes (OM).
    OpaqueModifier = 1,
    /// Translucent polygons (TR).
    Translucent = 2,
    /// Translucent modifier volumes (TM).
    TranslucentModifier = 3,
    /// Punch-through polygons (PT).
    PunchThrough = 4,
}

impl ListType {
    pub const COUNT: usize = 5;

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn mask(self) -> ListMask {
        ListMask::from_bits_truncate(1 << self.index())
    }
}

bitflags! {
    /// Set of primitive lists, used for init-time bin configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ListMask: u8 {
        const OPAQUE = 1 << 0;
        const OPAQUE_MODIFIER = 1 << 1;
        const TRANSLUCENT = 1 << 2;
        const TRANSLUCENT_MODIFIER = 1 << 3;
        const PUNCH_THROUGH = 1 << 4;
    }
}

impl ListMask {
    #[must_use]
    pub fn contains_list(self, list: ListType) -> bool {
        self.contains(list.mask())
    }
}

/// Per-list lifecycle within one frame.
///
/// Single source of truth for a list's progress through a frame, instead of
/// parallel enabled/dmaed/transferred bitmasks that can disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPhase {
    /// Not used this frame.
    #[default]
    Unopened,
    /// Accepting primitives.
    Open,
    /// Closed for this frame; closing is one-way until the next scene.
    Closed,
    /// Handed to the DMA chain (or skipped by it for direct-mode lists).
    DmaIssued,
    /// The tile accelerator confirmed full receipt.
    Transferred,
}

impl ListPhase {
    /// Whether the list participates in the current frame.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Unopened)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator as _;

    use super::*;

    #[test]
    fn priority_order_is_declaration_order() {
        let order: Vec<ListType> = ListType::iter().collect();
        assert_eq!(
            order,
            [
                ListType::Opaque,
                ListType::OpaqueModifier,
                ListType::Translucent,
                ListType::TranslucentModifier,
                ListType::PunchThrough,
            ]
        );
    }

    #[test]
    fn mask_round_trip() {
        for list in ListType::iter() {
            assert!(list.mask().contains_list(list));
            assert_eq!(ListType::from_repr(list.index()), Some(list));
        }
    }
}
