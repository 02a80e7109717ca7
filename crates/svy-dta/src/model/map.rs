//! The section offset map.
//!
//! Fourteen absolute byte offsets, one per section boundary, stored
//! right after the header. Zeroed at construction, read verbatim on
//! parse, and backpatched with real positions at the end of a write.

use serde::{Deserialize, Serialize};

/// Number of offset slots.
pub const MAP_SLOTS: usize = 14;

/// Section boundaries indexed by the map, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSection {
    Open,
    Map,
    VariableTypes,
    VariableNames,
    SortList,
    Formats,
    ValueLabelNames,
    VariableLabels,
    Characteristics,
    Data,
    LongStrings,
    ValueLabels,
    Close,
    Eof,
}

impl MapSection {
    /// All sections in slot order.
    pub const ALL: [Self; MAP_SLOTS] = [
        Self::Open,
        Self::Map,
        Self::VariableTypes,
        Self::VariableNames,
        Self::SortList,
        Self::Formats,
        Self::ValueLabelNames,
        Self::VariableLabels,
        Self::Characteristics,
        Self::Data,
        Self::LongStrings,
        Self::ValueLabels,
        Self::Close,
        Self::Eof,
    ];

    fn slot(self) -> usize {
        Self::ALL.iter().position(|&s| s == self).unwrap_or(0)
    }
}

/// The 14-slot offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffsetMap {
    offsets: [u64; MAP_SLOTS],
}

impl OffsetMap {
    pub fn get(&self, section: MapSection) -> u64 {
        self.offsets[section.slot()]
    }

    pub fn set(&mut self, section: MapSection, offset: u64) {
        self.offsets[section.slot()] = offset;
    }

    /// Offsets in slot order, for serialization.
    pub fn as_slice(&self) -> &[u64; MAP_SLOTS] {
        &self.offsets
    }

    /// Replace all slots at once, in slot order.
    pub fn set_all(&mut self, offsets: [u64; MAP_SLOTS]) {
        self.offsets = offsets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_follow_file_order() {
        let mut map = OffsetMap::default();
        for (position, section) in MapSection::ALL.into_iter().enumerate() {
            map.set(section, position as u64 * 100);
        }
        assert_eq!(map.get(MapSection::Open), 0);
        assert_eq!(map.get(MapSection::Data), 900);
        assert_eq!(map.get(MapSection::Eof), 1300);
        assert_eq!(map.as_slice()[1], 100);
    }

    #[test]
    fn test_default_is_zeroed() {
        let map = OffsetMap::default();
        assert!(map.as_slice().iter().all(|&offset| offset == 0));
    }
}
