//! Layout engine: how many positions fit across the system and where each
//! one is drawn.
//!
//! All x-coordinates are relative to the left edge of the system rectangle.
//! Positions are spread `position_spacing` apart, pushed right by the clef,
//! the start bar's key/time signature, and every interior key/time signature
//! to their left.

use super::*;

impl System {
    /// X of the first position's left boundary: clef, start-bar key and time
    /// signatures, and the start bar itself.
    pub fn first_position_x(&self) -> i32 {
        self.first_position_x_for(self.position_spacing as i32)
    }

    fn first_position_x_for(&self, spacing: i32) -> i32 {
        let mut x = CLEF_WIDTH;

        let key_width = self.start_bar.key_signature.width();
        let time_width = self.start_bar.time_signature.width();
        x += key_width + time_width;
        if key_width > 0 && time_width > 0 {
            x += KEY_TIME_SEPARATION;
        }

        // A plain bar is one unit wide; anything else needs a full position.
        x += if self.start_bar.is_bar() { 1 } else { spacing };
        x
    }

    /// Number of positions that fit across the system at `spacing`.
    pub fn compute_position_count(&self, spacing: i32) -> u32 {
        if spacing < MIN_POSITION_SPACING as i32 {
            return 0;
        }

        let mut width = self.rect.width;
        width -= self.first_position_x_for(spacing);
        width -= self.cumulative_interior_key_time_width(None);
        // Leave one position of room between the last position and the end.
        width -= spacing;

        if width < spacing {
            return 0;
        }
        (width / spacing) as u32
    }

    /// Number of positions at the current spacing.
    pub fn position_count(&self) -> u32 {
        self.compute_position_count(self.position_spacing as i32)
    }

    /// Valid positions run from 0 to the position count inclusive; the last
    /// one is where the end bar sits.
    pub fn is_valid_position(&self, position: u32) -> bool {
        position <= self.position_count()
    }

    /// X of a position, or of the first position when out of range.
    pub fn position_x(&self, position: u32) -> i32 {
        let first = self.first_position_x();
        if !self.is_valid_position(position) {
            return first;
        }

        let spacing = self.position_spacing as i32;
        first
            + (position as i32 + 1) * spacing
            + self.cumulative_interior_key_time_width(Some(position))
    }

    /// Position index for an x-coordinate.
    ///
    /// Scans forward and returns the position before the first one whose x
    /// reaches `x`. Anything at or before the first position maps to 0;
    /// anything past the last maps to the last position.
    pub fn position_from_x(&self, x: i32) -> u32 {
        if self.position_x(0) >= x {
            return 0;
        }

        let count = self.position_count();
        for i in 1..count {
            if self.position_x(i) >= x {
                return i - 1;
            }
        }

        count.saturating_sub(1)
    }

    /// Width of every key and time signature on interior barlines strictly
    /// before `up_to` (all of them for `None`). Bars at position 0 are
    /// already accounted for by [`System::first_position_x`].
    pub fn cumulative_interior_key_time_width(&self, up_to: Option<u32>) -> i32 {
        let mut width = 0;
        for barline in &self.barlines {
            match up_to {
                Some(limit) if barline.position >= limit => break,
                _ => {}
            }
            if barline.position > 0 {
                width += barline.key_and_time_signature_width();
            }
        }
        width
    }

    /// Highest occupied position across barlines, directions, chord text,
    /// rhythm slashes and every staff voice.
    pub fn max_position(&self) -> u32 {
        self.occupied_positions().max().unwrap_or(0)
    }

    /// A spacing is valid when it is at least the minimum and every occupied
    /// position still fits.
    pub fn is_valid_spacing(&self, spacing: i32) -> bool {
        if spacing < MIN_POSITION_SPACING as i32 {
            return false;
        }
        self.max_position() < self.compute_position_count(spacing)
    }

    /// Widest spacing no larger than `start` that fits `max_position`.
    pub(crate) fn fitting_spacing(&self, start: u8, max_position: u32) -> Option<u8> {
        (MIN_POSITION_SPACING..=start.max(MIN_POSITION_SPACING))
            .rev()
            .find(|&s| max_position < self.compute_position_count(s as i32))
    }

    /// Vertical offset of a staff's top from the top of the system, or from
    /// the top of the page when `absolute` is set. A system placed above the
    /// page origin gives negative absolute offsets.
    pub fn staff_height_offset(&self, staff: usize, absolute: bool) -> Option<i32> {
        let offset = self.staff_top(staff)? as i32;
        Some(if absolute {
            self.rect.top + offset
        } else {
            offset
        })
    }

    /// Offset of a staff's top within the system.
    pub(crate) fn staff_top(&self, staff: usize) -> Option<u32> {
        if staff >= self.staves.len() {
            return None;
        }
        Some(
            self.base_height_offset()
                + self.staves[..staff].iter().map(Staff::height).sum::<u32>(),
        )
    }

    /// Space above the first staff: extra spacing plus the rhythm slash block.
    pub(crate) fn base_height_offset(&self) -> u32 {
        let mut offset = self.extra_spacing as u32
            + self.rhythm_slash_spacing_above as u32
            + self.rhythm_slash_spacing_below as u32;
        if !self.rhythm_slashes.is_empty() {
            offset += RHYTHM_SLASH_SPACING;
        }
        offset
    }
}
