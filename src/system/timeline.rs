//! Timeline edits: shifting positions, spacing control, staff setup and the
//! per-container insert/remove operations.
//!
//! Every operation either leaves the system satisfying its invariants or
//! returns an error with the system unchanged.

use log::{debug, warn};

use super::*;
use crate::staff::{Clef, NUM_STAFF_VOICES};

/// Direction of a one-position shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftDirection {
    Forward,
    Backward,
}

impl ShiftDirection {
    fn apply(self, position: u32, from: u32) -> u32 {
        if position < from {
            return position;
        }
        match self {
            ShiftDirection::Forward => position + 1,
            ShiftDirection::Backward => position - 1,
        }
    }
}

impl System {
    // ═══════════════════════════════════════════════════════════════════
    // Shifting
    // ═══════════════════════════════════════════════════════════════════

    /// Moves every entity at or after `from` one position forward or back,
    /// across barlines, directions, chord text, rhythm slashes and all staff
    /// voices, then tightens the spacing only as far as needed.
    ///
    /// Fails without touching anything if `from` is not a valid position, a
    /// backward shift would push something below 0, onto the start bar or
    /// onto a neighbour at `from - 1`, or the shifted content cannot fit at
    /// any spacing.
    pub fn shift(&mut self, from: u32, direction: ShiftDirection) -> SystemResult<()> {
        let count = self.position_count();
        if !self.is_valid_position(from) {
            return Err(SystemError::InvalidPosition {
                position: from as i64,
                count,
            });
        }

        if direction == ShiftDirection::Backward {
            let lowest = self.occupied_positions().filter(|&p| p >= from).min();
            if lowest == Some(0) {
                return Err(SystemError::InvalidPosition {
                    position: -1,
                    count,
                });
            }
            if self.barlines.iter().any(|b| b.position == 1 && from <= 1) {
                return Err(SystemError::InvalidPosition { position: 0, count });
            }
            if let Some(previous) = from.checked_sub(1) {
                if let Some(kind) = self.container_holding_both(previous, from) {
                    warn!("backward shift from {from} would stack two {kind} entries");
                    return Err(SystemError::DuplicatePosition {
                        kind,
                        position: previous,
                    });
                }
            }
        }

        let shifted_max = self
            .occupied_positions()
            .map(|p| direction.apply(p, from))
            .max()
            .unwrap_or(0);
        if self
            .fitting_spacing(self.position_spacing, shifted_max)
            .is_none()
        {
            warn!("shift from {from} rejected: position {shifted_max} cannot fit");
            return Err(SystemError::InsufficientSpace {
                max_position: shifted_max,
            });
        }

        let shift = |p: &mut u32| *p = direction.apply(*p, from);
        self.barlines.iter_mut().for_each(|b| shift(&mut b.position));
        self.directions.iter_mut().for_each(|d| shift(&mut d.position));
        self.chord_texts.iter_mut().for_each(|c| shift(&mut c.position));
        self.rhythm_slashes
            .iter_mut()
            .for_each(|r| shift(&mut r.position));
        for staff in &mut self.staves {
            staff.all_positions_mut().for_each(|p| shift(&mut p.position));
        }

        debug!("shifted positions from {from} {direction:?}");
        self.adjust_spacing()
    }

    /// First container with entries at both `a` and `b`.
    fn container_holding_both(&self, a: u32, b: u32) -> Option<ContainerKind> {
        fn holds<T>(items: &[T], position_of: impl Fn(&T) -> u32, a: u32, b: u32) -> bool {
            items.iter().any(|i| position_of(i) == a) && items.iter().any(|i| position_of(i) == b)
        }

        if holds(&self.barlines, |x| x.position, a, b) {
            return Some(ContainerKind::Barline);
        }
        if holds(&self.directions, |x| x.position, a, b) {
            return Some(ContainerKind::Direction);
        }
        if holds(&self.chord_texts, |x| x.position, a, b) {
            return Some(ContainerKind::ChordText);
        }
        if holds(&self.rhythm_slashes, |x| x.position, a, b) {
            return Some(ContainerKind::RhythmSlash);
        }
        self.staves
            .iter()
            .flat_map(|staff| (0..NUM_STAFF_VOICES).map(move |v| staff.positions(v)))
            .any(|voice| holds(voice, |x| x.position, a, b))
            .then_some(ContainerKind::StaffPosition)
    }

    pub fn shift_forward(&mut self, from: u32) -> SystemResult<()> {
        self.shift(from, ShiftDirection::Forward)
    }

    pub fn shift_backward(&mut self, from: u32) -> SystemResult<()> {
        self.shift(from, ShiftDirection::Backward)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Spacing
    // ═══════════════════════════════════════════════════════════════════

    /// Reduces the spacing one step at a time until every occupied position
    /// fits. Never widens it.
    pub fn adjust_spacing(&mut self) -> SystemResult<()> {
        let mut spacing = self.position_spacing;
        while spacing > MIN_POSITION_SPACING && !self.is_valid_spacing(spacing as i32) {
            spacing -= 1;
        }

        if !self.is_valid_spacing(spacing as i32) {
            return Err(SystemError::InsufficientSpace {
                max_position: self.max_position(),
            });
        }

        if spacing != self.position_spacing {
            debug!(
                "position spacing tightened from {} to {spacing}",
                self.position_spacing
            );
        }
        self.set_spacing(spacing)
    }

    /// Sets the spacing between positions; rejected if the content would no
    /// longer fit.
    pub fn set_spacing(&mut self, spacing: u8) -> SystemResult<()> {
        if !self.is_valid_spacing(spacing as i32) {
            return Err(SystemError::InvalidSpacing(spacing as u32));
        }
        self.position_spacing = spacing;
        self.sync_end_bar();
        Ok(())
    }

    /// Sets the system width, tightening the spacing if the narrower width
    /// would otherwise drop content off the end.
    pub fn set_width(&mut self, width: i32) -> SystemResult<()> {
        self.edit_checked(|system| system.rect.width = width)
    }

    pub fn set_rhythm_slash_spacing_above(&mut self, spacing: u8) {
        self.rhythm_slash_spacing_above = spacing;
        self.calculate_height();
    }

    pub fn set_rhythm_slash_spacing_below(&mut self, spacing: u8) {
        self.rhythm_slash_spacing_below = spacing;
        self.calculate_height();
    }

    pub fn set_extra_spacing(&mut self, spacing: u8) {
        self.extra_spacing = spacing;
        self.calculate_height();
    }

    // ═══════════════════════════════════════════════════════════════════
    // Staves, height and beaming
    // ═══════════════════════════════════════════════════════════════════

    /// Replaces the staves with fresh ones of the given string counts.
    pub fn init(
        &mut self,
        staff_sizes: &[u8],
        visible_staves: &[bool],
        show_time_signature: bool,
    ) -> SystemResult<()> {
        if staff_sizes.len() != visible_staves.len() {
            return Err(SystemError::StaffCountMismatch {
                sizes: staff_sizes.len(),
                visibility: visible_staves.len(),
            });
        }

        // A shown start time signature narrows the system, so this goes
        // through the same fit check as any other edit.
        self.edit_checked(|system| {
            system.staves = staff_sizes
                .iter()
                .zip(visible_staves)
                .map(|(&size, &shown)| {
                    let mut staff = Staff::new(size, Clef::Treble);
                    staff.shown = shown;
                    staff
                })
                .collect();
            system.start_bar.time_signature.shown = show_time_signature;
        })?;
        self.calculate_height();
        Ok(())
    }

    /// Recomputes the rectangle height from the rhythm slash block and the
    /// staves.
    pub fn calculate_height(&mut self) {
        let height = match self.staves.len() {
            0 => self.base_height_offset(),
            n => {
                let last = n - 1;
                self.staff_top(last).unwrap_or(0) + self.staves[last].height()
            }
        };
        self.rect.height = height as i32;
    }

    /// Recomputes beam groups for every bar of every staff.
    pub fn calculate_beaming(&mut self) {
        self.sync_end_bar();

        let bounds: Vec<u32> = std::iter::once(self.start_bar.position)
            .chain(self.barlines.iter().map(|b| b.position))
            .chain(std::iter::once(self.end_bar.position))
            .collect();

        for staff in &mut self.staves {
            for pair in bounds.windows(2) {
                staff.calculate_beaming_for_bar(pair[0], pair[1]);
            }
        }
    }

    pub fn insert_staff_position(
        &mut self,
        staff: usize,
        voice: usize,
        position: Position,
    ) -> SystemResult<()> {
        self.check_content_position(position.position)?;
        let len = self.staves.len();
        let target = self.staves.get_mut(staff).ok_or(SystemError::InvalidIndex {
            kind: ContainerKind::StaffPosition,
            index: staff,
            len,
        })?;

        let at = position.position;
        if !target.insert_position(voice, position) {
            return Err(SystemError::DuplicatePosition {
                kind: ContainerKind::StaffPosition,
                position: at,
            });
        }
        Ok(())
    }

    pub fn remove_staff_position(
        &mut self,
        staff: usize,
        voice: usize,
        position: u32,
    ) -> Option<Position> {
        self.staves.get_mut(staff)?.remove_position(voice, position)
    }

    /// Edits a staff in place, then re-derives the height. Rolled back if
    /// the staff's positions no longer fit.
    pub fn update_staff<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut Staff) -> R,
    ) -> SystemResult<R> {
        let len = self.staves.len();
        if index >= len {
            return Err(SystemError::InvalidIndex {
                kind: ContainerKind::StaffPosition,
                index,
                len,
            });
        }

        let result = self.edit_checked(|system| {
            let staff = &mut system.staves[index];
            let result = edit(staff);
            for voice in 0..crate::staff::NUM_STAFF_VOICES {
                if let Some(positions) = staff.positions_mut(voice) {
                    positions.sort_by_key(|p| p.position);
                    positions.dedup_by_key(|p| p.position);
                }
            }
            result
        })?;
        self.calculate_height();
        Ok(result)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Directions, chord text, rhythm slashes
    // ═══════════════════════════════════════════════════════════════════

    /// Fails if a direction already sits at the same position.
    pub fn insert_direction(&mut self, direction: Direction) -> SystemResult<()> {
        self.check_content_position(direction.position)?;
        insert_sorted(
            &mut self.directions,
            direction,
            |d| d.position,
            ContainerKind::Direction,
        )
    }

    pub fn remove_direction(&mut self, position: u32) -> Option<Direction> {
        let idx = self.directions.iter().position(|d| d.position == position)?;
        Some(self.directions.remove(idx))
    }

    pub fn insert_chord_text(&mut self, chord_text: ChordText) -> SystemResult<()> {
        self.check_content_position(chord_text.position)?;
        insert_sorted(
            &mut self.chord_texts,
            chord_text,
            |c| c.position,
            ContainerKind::ChordText,
        )
    }

    pub fn remove_chord_text(&mut self, index: usize) -> SystemResult<ChordText> {
        if index >= self.chord_texts.len() {
            return Err(SystemError::InvalidIndex {
                kind: ContainerKind::ChordText,
                index,
                len: self.chord_texts.len(),
            });
        }
        Ok(self.chord_texts.remove(index))
    }

    /// Inserts a rhythm slash; the first one opens the rhythm slash block,
    /// so the height is re-derived.
    pub fn insert_rhythm_slash(&mut self, slash: RhythmSlash) -> SystemResult<()> {
        self.check_content_position(slash.position)?;
        insert_sorted(
            &mut self.rhythm_slashes,
            slash,
            |r| r.position,
            ContainerKind::RhythmSlash,
        )?;
        self.calculate_height();
        Ok(())
    }

    pub fn remove_rhythm_slash(&mut self, index: usize) -> SystemResult<RhythmSlash> {
        if index >= self.rhythm_slashes.len() {
            return Err(SystemError::InvalidIndex {
                kind: ContainerKind::RhythmSlash,
                index,
                len: self.rhythm_slashes.len(),
            });
        }
        let removed = self.rhythm_slashes.remove(index);
        self.calculate_height();
        Ok(removed)
    }

    /// Content may occupy any position before the end bar.
    fn check_content_position(&self, position: u32) -> SystemResult<()> {
        let count = self.position_count();
        if position >= count {
            return Err(SystemError::InvalidPosition {
                position: position as i64,
                count,
            });
        }
        Ok(())
    }
}
