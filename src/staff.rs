//! A staff: standard notation plus tablature, holding the note positions of
//! each voice.

use serde::{Deserialize, Serialize};

use crate::model::{BeamPart, Position};

/// Parallel voices per staff.
pub const NUM_STAFF_VOICES: usize = 2;

pub const MIN_STRING_COUNT: u8 = 3;
pub const MAX_STRING_COUNT: u8 = 7;
pub const DEFAULT_STRING_COUNT: u8 = 6;

/// Height of the five-line standard notation staff.
pub const STD_NOTATION_STAFF_HEIGHT: u32 = 28;
/// Padding above and below the tablature staff.
pub const STAFF_BORDER_SPACING: u32 = 10;
pub const TAB_LINE_SPACING: u32 = 9;

pub const DEFAULT_STD_NOTATION_ABOVE_SPACING: u8 = 9;
pub const DEFAULT_STD_NOTATION_BELOW_SPACING: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Clef {
    #[default]
    Treble,
    Bass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub clef: Clef,
    /// Tablature string count (3..=7)
    pub string_count: u8,
    pub shown: bool,
    pub std_notation_above_spacing: u8,
    pub std_notation_below_spacing: u8,
    pub symbol_spacing: u8,
    pub tab_below_spacing: u8,
    voices: [Vec<Position>; NUM_STAFF_VOICES],
}

impl Default for Staff {
    fn default() -> Self {
        Self::new(DEFAULT_STRING_COUNT, Clef::Treble)
    }
}

impl Staff {
    pub fn new(string_count: u8, clef: Clef) -> Self {
        Self {
            clef,
            string_count: string_count.clamp(MIN_STRING_COUNT, MAX_STRING_COUNT),
            shown: true,
            std_notation_above_spacing: DEFAULT_STD_NOTATION_ABOVE_SPACING,
            std_notation_below_spacing: DEFAULT_STD_NOTATION_BELOW_SPACING,
            symbol_spacing: 0,
            tab_below_spacing: 0,
            voices: Default::default(),
        }
    }

    /// Total drawn height; hidden staves take no space.
    pub fn height(&self) -> u32 {
        if !self.shown {
            return 0;
        }
        self.std_notation_above_spacing as u32
            + STD_NOTATION_STAFF_HEIGHT
            + self.std_notation_below_spacing as u32
            + self.symbol_spacing as u32
            + 2 * STAFF_BORDER_SPACING
            + (self.string_count.saturating_sub(1)) as u32 * TAB_LINE_SPACING
            + self.tab_below_spacing as u32
    }

    /// Positions of one voice, sorted. Empty for an out-of-range voice.
    pub fn positions(&self, voice: usize) -> &[Position] {
        self.voices.get(voice).map_or(&[], |v| v.as_slice())
    }

    pub fn positions_mut(&mut self, voice: usize) -> Option<&mut Vec<Position>> {
        self.voices.get_mut(voice)
    }

    /// All positions of all voices.
    pub fn all_positions(&self) -> impl Iterator<Item = &Position> {
        self.voices.iter().flatten()
    }

    pub(crate) fn all_positions_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.voices.iter_mut().flatten()
    }

    pub(crate) fn set_voice(&mut self, voice: usize, positions: Vec<Position>) {
        if let Some(v) = self.voices.get_mut(voice) {
            *v = positions;
        }
    }

    /// Positions of a voice in `[start, end)`.
    pub fn positions_in_range(&self, voice: usize, start: u32, end: u32) -> &[Position] {
        let positions = self.positions(voice);
        let lo = positions.partition_point(|p| p.position < start);
        let hi = positions.partition_point(|p| p.position < end).max(lo);
        &positions[lo..hi]
    }

    /// Inserts keeping the voice sorted. Returns `false` if the voice is out
    /// of range or the position is already occupied.
    pub fn insert_position(&mut self, voice: usize, position: Position) -> bool {
        let Some(positions) = self.voices.get_mut(voice) else {
            return false;
        };
        match positions.binary_search_by_key(&position.position, |p| p.position) {
            Ok(_) => false,
            Err(idx) => {
                positions.insert(idx, position);
                true
            }
        }
    }

    pub fn remove_position(&mut self, voice: usize, position: u32) -> Option<Position> {
        let positions = self.voices.get_mut(voice)?;
        let idx = positions.iter().position(|p| p.position == position)?;
        Some(positions.remove(idx))
    }

    /// The occupied position furthest to the right, across voices.
    pub fn last_position(&self) -> Option<&Position> {
        self.voices
            .iter()
            .filter_map(|v| v.last())
            .max_by_key(|p| p.position)
    }

    /// Regroups beams for the bar spanning `[start, end)` in every voice.
    ///
    /// Maximal runs of adjacent beamable positions form one group; a run of
    /// one is left unbeamed, as is everything that isn't beamable.
    pub fn calculate_beaming_for_bar(&mut self, start: u32, end: u32) {
        for positions in self.voices.iter_mut() {
            let lo = positions.partition_point(|p| p.position < start);
            let hi = positions.partition_point(|p| p.position < end).max(lo);
            let bar = &mut positions[lo..hi];

            let mut i = 0;
            while i < bar.len() {
                if !bar[i].is_beamable() {
                    bar[i].beam = None;
                    i += 1;
                    continue;
                }
                let run_start = i;
                while i < bar.len() && bar[i].is_beamable() {
                    i += 1;
                }
                let run = &mut bar[run_start..i];
                if run.len() == 1 {
                    run[0].beam = None;
                    continue;
                }
                let last = run.len() - 1;
                for (j, pos) in run.iter_mut().enumerate() {
                    pos.beam = Some(match j {
                        0 => BeamPart::Start,
                        j if j == last => BeamPart::End,
                        _ => BeamPart::Continue,
                    });
                }
            }
        }
    }
}
