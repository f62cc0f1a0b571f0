//! Data model for the entities that live on a system's timeline.
//!
//! Every entity here carries a `position`: a zero-based index into the
//! system's horizontal timeline. The system owns all of them exclusively;
//! nothing in this module refers back to its owner.

use serde::{Deserialize, Serialize};

/// Width of one accidental in a key signature.
pub const KEY_ACCIDENTAL_WIDTH: i32 = 5;
/// Width of a shown time signature.
pub const TIME_SIGNATURE_WIDTH: i32 = 18;
/// Gap between a key signature and a time signature on the same bar.
pub const KEY_TIME_SEPARATION: i32 = 3;
/// Largest repeat count representable on the wire (5 bits).
pub const MAX_REPEAT_COUNT: u8 = 0x1f;
/// Largest accidental code (7 flats).
pub const MAX_KEY_ACCIDENTALS: u8 = 14;
/// Directions hold at most this many symbols.
pub const MAX_DIRECTION_SYMBOLS: usize = 3;

// ═══════════════════════════════════════════════════════════════════════
// Key and time signatures
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    Major,
    Minor,
}

/// Key signature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySignature {
    pub key_type: KeyType,
    /// 0 = no accidentals, 1–7 = sharps, 8–14 = 1–7 flats
    pub accidentals: u8,
    pub shown: bool,
    /// Draws naturals cancelling the previous key
    pub cancellation: bool,
}

impl KeySignature {
    pub fn new(key_type: KeyType, accidentals: u8) -> Self {
        Self {
            key_type,
            accidentals: accidentals.min(MAX_KEY_ACCIDENTALS),
            shown: false,
            cancellation: false,
        }
    }

    /// A shown key signature.
    pub fn shown(key_type: KeyType, accidentals: u8) -> Self {
        Self {
            shown: true,
            ..Self::new(key_type, accidentals)
        }
    }

    pub fn set_key(&mut self, key_type: KeyType, accidentals: u8) {
        self.key_type = key_type;
        self.accidentals = accidentals.min(MAX_KEY_ACCIDENTALS);
    }

    /// Number of sharps or flats drawn.
    pub fn accidental_count(&self) -> u8 {
        if self.accidentals > 7 {
            self.accidentals - 7
        } else {
            self.accidentals
        }
    }

    pub fn uses_sharps(&self) -> bool {
        (1..=7).contains(&self.accidentals)
    }

    pub fn uses_flats(&self) -> bool {
        self.accidentals > 7
    }

    /// Same key regardless of visibility and cancellation.
    pub fn same_key(&self, other: &KeySignature) -> bool {
        self.key_type == other.key_type && self.accidentals == other.accidentals
    }

    /// Horizontal space taken when drawn; hidden keys take none.
    pub fn width(&self) -> i32 {
        if !self.shown {
            return 0;
        }
        self.accidental_count() as i32 * KEY_ACCIDENTAL_WIDTH
    }
}

/// Time signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Numerator (e.g., 3 in 3/4)
    pub beats_per_measure: u8,
    /// Denominator (e.g., 4 in 3/4)
    pub beat_amount: u8,
    pub shown: bool,
    pub common_time: bool,
    pub cut_time: bool,
    /// Metronome pulses per measure
    pub pulses: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats_per_measure: 4,
            beat_amount: 4,
            shown: false,
            common_time: false,
            cut_time: false,
            pulses: 4,
        }
    }
}

impl TimeSignature {
    pub fn new(beats_per_measure: u8, beat_amount: u8) -> Self {
        Self {
            beats_per_measure,
            beat_amount,
            pulses: beats_per_measure,
            ..Self::default()
        }
    }

    pub fn width(&self) -> i32 {
        if self.shown {
            TIME_SIGNATURE_WIDTH
        } else {
            0
        }
    }
}

/// Rehearsal sign (boxed letter above the system).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RehearsalSign {
    /// A–Z when set
    pub letter: Option<char>,
    pub description: String,
}

impl RehearsalSign {
    pub fn new(letter: char, description: impl Into<String>) -> Self {
        Self {
            letter: Some(letter),
            description: description.into(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.letter.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Barline
// ═══════════════════════════════════════════════════════════════════════

/// Bar type; the discriminant is the 3-bit code used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BarType {
    #[default]
    Bar = 0,
    DoubleBar = 1,
    FreeTimeBar = 2,
    RepeatStart = 3,
    RepeatEnd = 4,
    DoubleBarFine = 5,
}

impl BarType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(BarType::Bar),
            1 => Some(BarType::DoubleBar),
            2 => Some(BarType::FreeTimeBar),
            3 => Some(BarType::RepeatStart),
            4 => Some(BarType::RepeatEnd),
            5 => Some(BarType::DoubleBarFine),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A barline, with the key/time signature and rehearsal sign attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Barline {
    pub position: u32,
    pub bar_type: BarType,
    /// Only meaningful for `RepeatEnd`
    pub repeat_count: u8,
    pub key_signature: KeySignature,
    pub time_signature: TimeSignature,
    pub rehearsal_sign: RehearsalSign,
}

impl Barline {
    pub fn new(position: u32, bar_type: BarType) -> Self {
        Self {
            position,
            bar_type,
            ..Self::default()
        }
    }

    /// Plain single bar.
    pub fn is_bar(&self) -> bool {
        self.bar_type == BarType::Bar
    }

    pub fn set_barline_data(&mut self, bar_type: BarType, repeat_count: u8) {
        self.bar_type = bar_type;
        self.repeat_count = repeat_count.min(MAX_REPEAT_COUNT);
    }

    /// Space taken by the key and time signature drawn after the bar.
    pub fn key_and_time_signature_width(&self) -> i32 {
        let key = self.key_signature.width();
        let time = self.time_signature.width();
        let mut width = key + time;
        if key > 0 && time > 0 {
            width += KEY_TIME_SEPARATION;
        }
        width
    }
}

// ═══════════════════════════════════════════════════════════════════════
// System-level symbols
// ═══════════════════════════════════════════════════════════════════════

/// One symbol of a direction (coda, segno, D.S. al fine, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionSymbol {
    pub kind: u8,
    pub active_symbol: u8,
    pub repeat_number: u8,
}

/// Performance direction at a position.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Direction {
    pub position: u32,
    pub symbols: Vec<DirectionSymbol>,
}

impl Direction {
    pub fn new(position: u32) -> Self {
        Self {
            position,
            symbols: Vec::new(),
        }
    }

    /// Adds a symbol; returns `false` once the direction is full.
    pub fn add_symbol(&mut self, symbol: DirectionSymbol) -> bool {
        if self.symbols.len() >= MAX_DIRECTION_SYMBOLS {
            return false;
        }
        self.symbols.push(symbol);
        true
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

/// Chord name written above the system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChordText {
    pub position: u32,
    pub name: String,
}

impl ChordText {
    pub fn new(position: u32, name: impl Into<String>) -> Self {
        Self {
            position,
            name: name.into(),
        }
    }
}

/// Beam membership of a note position or rhythm slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamPart {
    Start,
    Continue,
    End,
}

impl BeamPart {
    pub fn code(part: Option<BeamPart>) -> u8 {
        match part {
            None => 0,
            Some(BeamPart::Start) => 1,
            Some(BeamPart::Continue) => 2,
            Some(BeamPart::End) => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Option<BeamPart>> {
        match code {
            0 => Some(None),
            1 => Some(Some(BeamPart::Start)),
            2 => Some(Some(BeamPart::Continue)),
            3 => Some(Some(BeamPart::End)),
            _ => None,
        }
    }
}

/// Rhythm slash drawn in the rhythm-slash block above the staves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmSlash {
    pub position: u32,
    /// 1 = whole, 2 = half, 4 = quarter, 8 = eighth, ...
    pub duration_type: u8,
    pub dotted: bool,
    pub rest: bool,
    pub triplet: bool,
    pub beam: Option<BeamPart>,
}

impl RhythmSlash {
    pub fn new(position: u32, duration_type: u8) -> Self {
        Self {
            position,
            duration_type,
            dotted: false,
            rest: false,
            triplet: false,
            beam: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Staff contents
// ═══════════════════════════════════════════════════════════════════════

/// A fretted note on one string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// 0 = highest string
    pub string: u8,
    pub fret: u8,
    pub tied: bool,
    pub muted: bool,
}

impl Note {
    pub fn new(string: u8, fret: u8) -> Self {
        Self {
            string,
            fret,
            tied: false,
            muted: false,
        }
    }
}

/// A chord or rest at one position of one staff voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub position: u32,
    /// 1 = whole, 2 = half, 4 = quarter, 8 = eighth, ...
    pub duration_type: u8,
    pub dotted: bool,
    pub rest: bool,
    /// Measure count of a multi-bar rest
    pub multibar_rest: Option<u8>,
    pub beam: Option<BeamPart>,
    pub notes: Vec<Note>,
}

impl Position {
    pub fn new(position: u32, duration_type: u8) -> Self {
        Self {
            position,
            duration_type,
            dotted: false,
            rest: false,
            multibar_rest: None,
            beam: None,
            notes: Vec::new(),
        }
    }

    pub fn rest(position: u32, duration_type: u8) -> Self {
        Self {
            rest: true,
            ..Self::new(position, duration_type)
        }
    }

    pub fn multibar_rest(position: u32, measure_count: u8) -> Self {
        Self {
            rest: true,
            multibar_rest: Some(measure_count),
            ..Self::new(position, 1)
        }
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn has_multibar_rest(&self) -> bool {
        self.multibar_rest.is_some()
    }

    /// Eighth notes and shorter take part in beam groups.
    pub fn is_beamable(&self) -> bool {
        !self.rest && self.duration_type >= 8
    }
}
