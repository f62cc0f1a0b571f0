//! The system: one horizontal line of staves with its own timeline.
//!
//! A [`System`] owns every entity placed on its timeline (interior
//! barlines, directions, chord text, rhythm slashes and staves) plus the
//! two sentinel barlines at its start and end. Positions are shared by all
//! containers, so edits go through the operations in this module tree, which
//! keep the containers, the spacing and the end bar consistent:
//!
//! - `barlines`: lookup and editing of the sorted barline collection
//! - `layout`: position count and position ↔ x-coordinate mapping
//! - `timeline`: shifting, spacing adjustment and container edits

mod barlines;
mod layout;
mod timeline;

pub use timeline::ShiftDirection;

use serde::{Deserialize, Serialize};

use crate::error::{ContainerKind, SystemError, SystemResult};
use crate::model::*;
use crate::staff::Staff;

// ── Layout constants ────────────────────────────────────────────────
pub const DEFAULT_RECT: Rect = Rect {
    left: 50,
    top: 20,
    width: 750,
    height: 0,
};
pub const DEFAULT_POSITION_SPACING: u8 = 20;
pub const MIN_POSITION_SPACING: u8 = 3;
pub const DEFAULT_RHYTHM_SLASH_SPACING_ABOVE: u8 = 0;
pub const DEFAULT_RHYTHM_SLASH_SPACING_BELOW: u8 = 0;
pub const DEFAULT_EXTRA_SPACING: u8 = 0;
/// Vertical space given to a system symbol (rehearsal sign, direction, ...)
pub const SYSTEM_SYMBOL_SPACING: u32 = 18;
/// Height of the rhythm slash block, present when any slash exists
pub const RHYTHM_SLASH_SPACING: u32 = 2 * SYSTEM_SYMBOL_SPACING;
/// Padding on each side of the clef symbol
pub const CLEF_PADDING: i32 = 3;
/// Clef symbol (16) plus padding on both sides
pub const CLEF_WIDTH: i32 = 22;

/// Drawable area of a system, in page units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }
}

impl Default for Rect {
    fn default() -> Self {
        DEFAULT_RECT
    }
}

/// One line of staves spanning the page width.
///
/// Cloning duplicates every owned container; equality compares all of them
/// by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub(crate) rect: Rect,
    pub(crate) position_spacing: u8,
    pub(crate) rhythm_slash_spacing_above: u8,
    pub(crate) rhythm_slash_spacing_below: u8,
    pub(crate) extra_spacing: u8,
    pub(crate) start_bar: Barline,
    pub(crate) end_bar: Barline,
    /// Interior barlines, strictly increasing by position
    pub(crate) barlines: Vec<Barline>,
    pub(crate) directions: Vec<Direction>,
    pub(crate) chord_texts: Vec<ChordText>,
    pub(crate) rhythm_slashes: Vec<RhythmSlash>,
    pub(crate) staves: Vec<Staff>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    /// A blank system: sentinel bars only, no staves, default spacing.
    pub fn new() -> Self {
        let mut system = Self {
            rect: DEFAULT_RECT,
            position_spacing: DEFAULT_POSITION_SPACING,
            rhythm_slash_spacing_above: DEFAULT_RHYTHM_SLASH_SPACING_ABOVE,
            rhythm_slash_spacing_below: DEFAULT_RHYTHM_SLASH_SPACING_BELOW,
            extra_spacing: DEFAULT_EXTRA_SPACING,
            start_bar: Barline::new(0, BarType::Bar),
            end_bar: Barline::new(0, BarType::Bar),
            barlines: Vec::new(),
            directions: Vec::new(),
            chord_texts: Vec::new(),
            rhythm_slashes: Vec::new(),
            staves: Vec::new(),
        };
        system.sync_end_bar();
        system
    }

    // ── Geometry ────────────────────────────────────────────────────

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn position_spacing(&self) -> u8 {
        self.position_spacing
    }

    pub fn rhythm_slash_spacing_above(&self) -> u8 {
        self.rhythm_slash_spacing_above
    }

    pub fn rhythm_slash_spacing_below(&self) -> u8 {
        self.rhythm_slash_spacing_below
    }

    pub fn extra_spacing(&self) -> u8 {
        self.extra_spacing
    }

    // ── Directions ──────────────────────────────────────────────────

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    pub fn direction(&self, index: usize) -> Option<&Direction> {
        self.directions.get(index)
    }

    pub fn find_direction(&self, position: u32) -> Option<&Direction> {
        self.directions.iter().find(|d| d.position == position)
    }

    /// Largest number of symbols carried by any one direction.
    pub fn max_direction_symbol_count(&self) -> usize {
        self.directions
            .iter()
            .map(Direction::symbol_count)
            .max()
            .unwrap_or(0)
    }

    // ── Chord text ──────────────────────────────────────────────────

    pub fn chord_texts(&self) -> &[ChordText] {
        &self.chord_texts
    }

    pub fn chord_text(&self, index: usize) -> Option<&ChordText> {
        self.chord_texts.get(index)
    }

    /// Index of the chord text at `position`, if any.
    pub fn find_chord_text(&self, position: u32) -> Option<usize> {
        if !self.is_valid_position(position) {
            return None;
        }
        self.chord_texts.iter().position(|c| c.position == position)
    }

    pub fn has_chord_text(&self, position: u32) -> bool {
        self.find_chord_text(position).is_some()
    }

    // ── Rhythm slashes ──────────────────────────────────────────────

    pub fn rhythm_slashes(&self) -> &[RhythmSlash] {
        &self.rhythm_slashes
    }

    pub fn rhythm_slash(&self, index: usize) -> Option<&RhythmSlash> {
        self.rhythm_slashes.get(index)
    }

    // ── Staves ──────────────────────────────────────────────────────

    pub fn staves(&self) -> &[Staff] {
        &self.staves
    }

    pub fn staff(&self, index: usize) -> Option<&Staff> {
        self.staves.get(index)
    }

    pub fn staff_count(&self) -> usize {
        self.staves.len()
    }

    /// Every occupied position of every container, in no particular order.
    pub(crate) fn occupied_positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.barlines
            .iter()
            .map(|b| b.position)
            .chain(self.directions.iter().map(|d| d.position))
            .chain(self.chord_texts.iter().map(|c| c.position))
            .chain(self.rhythm_slashes.iter().map(|r| r.position))
            .chain(
                self.staves
                    .iter()
                    .flat_map(|s| s.all_positions().map(|p| p.position)),
            )
    }
}

/// Inserts `item` into a position-sorted collection, rejecting duplicates.
pub(crate) fn insert_sorted<T>(
    items: &mut Vec<T>,
    item: T,
    position_of: impl Fn(&T) -> u32,
    kind: ContainerKind,
) -> SystemResult<()> {
    let position = position_of(&item);
    match items.binary_search_by_key(&position, |i| position_of(i)) {
        Ok(_) => Err(SystemError::DuplicatePosition { kind, position }),
        Err(idx) => {
            items.insert(idx, item);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_system_has_sentinels_only() {
        let system = System::new();
        assert_eq!(system.rect(), DEFAULT_RECT);
        assert_eq!(system.position_spacing(), DEFAULT_POSITION_SPACING);
        assert!(system.interior_barlines().is_empty());
        assert_eq!(system.start_bar().position, 0);
        assert_eq!(system.end_bar().position, system.position_count());
        assert_eq!(system.staff_count(), 0);
    }

    #[test]
    fn insert_sorted_rejects_duplicates() {
        let mut items = vec![ChordText::new(1, "C"), ChordText::new(5, "G")];
        insert_sorted(&mut items, ChordText::new(3, "Am"), |c| c.position, ContainerKind::ChordText)
            .unwrap();
        let err = insert_sorted(&mut items, ChordText::new(5, "D"), |c| c.position, ContainerKind::ChordText)
            .unwrap_err();
        assert_eq!(
            err,
            SystemError::DuplicatePosition {
                kind: ContainerKind::ChordText,
                position: 5
            }
        );
        let names: Vec<&str> = items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "Am", "G"]);
    }
}
