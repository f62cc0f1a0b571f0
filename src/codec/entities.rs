//! Wire layout of the entities stored inside a system.
//!
//! | entity         | layout                                                        |
//! |----------------|---------------------------------------------------------------|
//! | KeySignature   | u8: accidentals (bits 0–3), minor (4), shown (6), cancel (7)  |
//! | TimeSignature  | beats u8, beat amount u8, flags u8, pulses u8                 |
//! | RehearsalSign  | letter u8 (0 = unset), description string                     |
//! | Barline        | position u8, type << 5 \| repeat u8, key, time, rehearsal     |
//! | Direction      | position u8, symbol count u8, 3 bytes per symbol              |
//! | ChordText      | position u8, name string                                      |
//! | RhythmSlash    | position u8, duration u8, flags u8, beam u8                   |
//! | Note           | string u8, fret u8, flags u8                                  |
//! | Position       | position u8, duration u8, flags u8, rest count u8, beam u8,   |
//! |                | notes                                                         |
//! | Staff          | data u8, four spacing bytes, positions of each voice          |
//!
//! The legacy versions use the same nested layouts.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use super::*;
use crate::model::*;
use crate::staff::{Clef, Staff, MAX_STRING_COUNT, MIN_STRING_COUNT, NUM_STAFF_VOICES};

// ── Key signature bits ──────────────────────────────────────────────
const KEY_ACCIDENTALS_MASK: u8 = 0x0f;
const KEY_MINOR: u8 = 0x10;
const KEY_SHOWN: u8 = 0x40;
const KEY_CANCELLATION: u8 = 0x80;

// ── Staff data bits ─────────────────────────────────────────────────
const STAFF_STRING_COUNT_MASK: u8 = 0x0f;
const STAFF_BASS_CLEF: u8 = 0x10;
const STAFF_HIDDEN: u8 = 0x80;

fn invalid(what: impl Into<String>) -> CodecError {
    CodecError::InvalidData(what.into())
}

fn read_beam<R: Read>(r: &mut R) -> CodecResult<Option<BeamPart>> {
    let code = r.read_u8()?;
    BeamPart::from_code(code).ok_or_else(|| invalid(format!("beam code {code}")))
}

impl Serializable for KeySignature {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        if self.accidentals > MAX_KEY_ACCIDENTALS {
            return Err(CodecError::ValueOutOfRange {
                field: "key accidentals",
                value: self.accidentals as u64,
            });
        }
        let mut data = self.accidentals;
        if self.key_type == KeyType::Minor {
            data |= KEY_MINOR;
        }
        if self.shown {
            data |= KEY_SHOWN;
        }
        if self.cancellation {
            data |= KEY_CANCELLATION;
        }
        w.write_u8(data)?;
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, _version: FileVersion) -> CodecResult<Self> {
        let data = r.read_u8()?;
        let accidentals = data & KEY_ACCIDENTALS_MASK;
        if accidentals > MAX_KEY_ACCIDENTALS {
            return Err(invalid(format!("key accidentals {accidentals}")));
        }
        Ok(KeySignature {
            key_type: if data & KEY_MINOR != 0 {
                KeyType::Minor
            } else {
                KeyType::Major
            },
            accidentals,
            shown: data & KEY_SHOWN != 0,
            cancellation: data & KEY_CANCELLATION != 0,
        })
    }
}

impl Serializable for TimeSignature {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        w.write_u8(self.beats_per_measure)?;
        w.write_u8(self.beat_amount)?;
        w.write_u8(pack_flags(&[self.shown, self.common_time, self.cut_time]))?;
        w.write_u8(self.pulses)?;
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, _version: FileVersion) -> CodecResult<Self> {
        let beats_per_measure = r.read_u8()?;
        let beat_amount = r.read_u8()?;
        let flags = r.read_u8()?;
        let pulses = r.read_u8()?;
        Ok(TimeSignature {
            beats_per_measure,
            beat_amount,
            shown: flag(flags, 0),
            common_time: flag(flags, 1),
            cut_time: flag(flags, 2),
            pulses,
        })
    }
}

impl Serializable for RehearsalSign {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        let letter = match self.letter {
            None => 0,
            Some(c) if c.is_ascii_uppercase() => c as u8,
            Some(c) => {
                return Err(CodecError::ValueOutOfRange {
                    field: "rehearsal sign letter",
                    value: c as u64,
                })
            }
        };
        w.write_u8(letter)?;
        write_string(w, &self.description)
    }

    fn deserialize<R: Read>(r: &mut R, _version: FileVersion) -> CodecResult<Self> {
        let letter = match r.read_u8()? {
            0 => None,
            b if b.is_ascii_uppercase() => Some(b as char),
            b => return Err(invalid(format!("rehearsal sign letter {b}"))),
        };
        let description = read_string(r)?;
        Ok(RehearsalSign {
            letter,
            description,
        })
    }
}

/// `type << 5 | repeat_count`, shared by barlines and the system's end bar.
pub(crate) fn barline_data_byte(bar: &Barline) -> CodecResult<u8> {
    if bar.repeat_count > MAX_REPEAT_COUNT {
        return Err(CodecError::ValueOutOfRange {
            field: "repeat count",
            value: bar.repeat_count as u64,
        });
    }
    Ok((bar.bar_type.code() << 5) | bar.repeat_count)
}

pub(crate) fn bar_type_from_code(code: u8) -> CodecResult<BarType> {
    BarType::from_code(code).ok_or_else(|| invalid(format!("bar type {code}")))
}

impl Serializable for Barline {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        write_position(w, self.position)?;
        w.write_u8(barline_data_byte(self)?)?;
        self.key_signature.serialize(w)?;
        self.time_signature.serialize(w)?;
        self.rehearsal_sign.serialize(w)
    }

    fn deserialize<R: Read>(r: &mut R, version: FileVersion) -> CodecResult<Self> {
        let position = read_position(r)?;
        let data = r.read_u8()?;
        Ok(Barline {
            position,
            bar_type: bar_type_from_code(data >> 5)?,
            repeat_count: data & MAX_REPEAT_COUNT,
            key_signature: KeySignature::deserialize(r, version)?,
            time_signature: TimeSignature::deserialize(r, version)?,
            rehearsal_sign: RehearsalSign::deserialize(r, version)?,
        })
    }
}

impl Serializable for Direction {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        if self.symbols.len() > MAX_DIRECTION_SYMBOLS {
            return Err(CodecError::ValueOutOfRange {
                field: "direction symbol count",
                value: self.symbols.len() as u64,
            });
        }
        write_position(w, self.position)?;
        w.write_u8(self.symbols.len() as u8)?;
        for symbol in &self.symbols {
            w.write_u8(symbol.kind)?;
            w.write_u8(symbol.active_symbol)?;
            w.write_u8(symbol.repeat_number)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, _version: FileVersion) -> CodecResult<Self> {
        let position = read_position(r)?;
        let count = r.read_u8()? as usize;
        if count > MAX_DIRECTION_SYMBOLS {
            return Err(invalid(format!("{count} direction symbols")));
        }
        let mut symbols = Vec::with_capacity(count);
        for _ in 0..count {
            symbols.push(DirectionSymbol {
                kind: r.read_u8()?,
                active_symbol: r.read_u8()?,
                repeat_number: r.read_u8()?,
            });
        }
        Ok(Direction { position, symbols })
    }
}

impl Serializable for ChordText {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        write_position(w, self.position)?;
        write_string(w, &self.name)
    }

    fn deserialize<R: Read>(r: &mut R, _version: FileVersion) -> CodecResult<Self> {
        Ok(ChordText {
            position: read_position(r)?,
            name: read_string(r)?,
        })
    }
}

impl Serializable for RhythmSlash {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        write_position(w, self.position)?;
        w.write_u8(self.duration_type)?;
        w.write_u8(pack_flags(&[self.dotted, self.rest, self.triplet]))?;
        w.write_u8(BeamPart::code(self.beam))?;
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, _version: FileVersion) -> CodecResult<Self> {
        let position = read_position(r)?;
        let duration_type = r.read_u8()?;
        let flags = r.read_u8()?;
        Ok(RhythmSlash {
            position,
            duration_type,
            dotted: flag(flags, 0),
            rest: flag(flags, 1),
            triplet: flag(flags, 2),
            beam: read_beam(r)?,
        })
    }
}

impl Serializable for Note {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        w.write_u8(self.string)?;
        w.write_u8(self.fret)?;
        w.write_u8(pack_flags(&[self.tied, self.muted]))?;
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, _version: FileVersion) -> CodecResult<Self> {
        let string = r.read_u8()?;
        let fret = r.read_u8()?;
        let flags = r.read_u8()?;
        Ok(Note {
            string,
            fret,
            tied: flag(flags, 0),
            muted: flag(flags, 1),
        })
    }
}

impl Serializable for Position {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        write_position(w, self.position)?;
        w.write_u8(self.duration_type)?;
        w.write_u8(pack_flags(&[
            self.dotted,
            self.rest,
            self.multibar_rest.is_some(),
        ]))?;
        w.write_u8(self.multibar_rest.unwrap_or(0))?;
        w.write_u8(BeamPart::code(self.beam))?;
        write_vec(w, &self.notes)
    }

    fn deserialize<R: Read>(r: &mut R, version: FileVersion) -> CodecResult<Self> {
        let position = read_position(r)?;
        let duration_type = r.read_u8()?;
        let flags = r.read_u8()?;
        let rest_count = r.read_u8()?;
        let beam = read_beam(r)?;
        Ok(Position {
            position,
            duration_type,
            dotted: flag(flags, 0),
            rest: flag(flags, 1),
            multibar_rest: flag(flags, 2).then_some(rest_count),
            beam,
            notes: read_vec(r, version)?,
        })
    }
}

impl Serializable for Staff {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        let mut data = self.string_count & STAFF_STRING_COUNT_MASK;
        if self.clef == Clef::Bass {
            data |= STAFF_BASS_CLEF;
        }
        if !self.shown {
            data |= STAFF_HIDDEN;
        }
        w.write_u8(data)?;
        w.write_u8(self.std_notation_above_spacing)?;
        w.write_u8(self.std_notation_below_spacing)?;
        w.write_u8(self.symbol_spacing)?;
        w.write_u8(self.tab_below_spacing)?;
        for voice in 0..NUM_STAFF_VOICES {
            write_vec(w, self.positions(voice))?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, version: FileVersion) -> CodecResult<Self> {
        let data = r.read_u8()?;
        let string_count = data & STAFF_STRING_COUNT_MASK;
        if !(MIN_STRING_COUNT..=MAX_STRING_COUNT).contains(&string_count) {
            return Err(invalid(format!("staff with {string_count} strings")));
        }
        let clef = if data & STAFF_BASS_CLEF != 0 {
            Clef::Bass
        } else {
            Clef::Treble
        };

        let mut staff = Staff::new(string_count, clef);
        staff.shown = data & STAFF_HIDDEN == 0;
        staff.std_notation_above_spacing = r.read_u8()?;
        staff.std_notation_below_spacing = r.read_u8()?;
        staff.symbol_spacing = r.read_u8()?;
        staff.tab_below_spacing = r.read_u8()?;

        for voice in 0..NUM_STAFF_VOICES {
            let mut positions: Vec<Position> = read_vec(r, version)?;
            if !positions.windows(2).all(|p| p[0].position < p[1].position) {
                log::warn!("staff voice {voice} positions out of order; sorting");
                positions.sort_by_key(|p| p.position);
                positions.dedup_by_key(|p| p.position);
            }
            staff.set_voice(voice, positions);
        }
        Ok(staff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode<T: Serializable>(bytes: &[u8]) -> CodecResult<T> {
        T::deserialize(&mut Cursor::new(bytes), FileVersion::CURRENT)
    }

    #[test]
    fn key_signature_bits() {
        let mut key = KeySignature::shown(KeyType::Minor, 10);
        key.cancellation = true;
        let mut buf = Vec::new();
        key.serialize(&mut buf).unwrap();
        assert_eq!(buf, vec![0x80 | 0x40 | 0x10 | 10]);
        assert_eq!(decode::<KeySignature>(&buf).unwrap(), key);

        assert!(decode::<KeySignature>(&[0x0f]).is_err());
    }

    #[test]
    fn barline_data_packs_type_and_repeats() {
        let mut bar = Barline::new(12, BarType::RepeatEnd);
        bar.repeat_count = 3;
        let mut buf = Vec::new();
        bar.serialize(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[12, (4 << 5) | 3]);

        bar.repeat_count = 40;
        assert!(matches!(
            bar.serialize(&mut Vec::new()),
            Err(CodecError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn positions_beyond_a_byte_are_rejected() {
        let chord = ChordText::new(300, "C");
        assert!(matches!(
            chord.serialize(&mut Vec::new()),
            Err(CodecError::ValueOutOfRange { field: "position", .. })
        ));
    }

    #[test]
    fn bad_rehearsal_letter_is_rejected() {
        assert!(matches!(
            decode::<RehearsalSign>(&[b'a', 0]),
            Err(CodecError::InvalidData(_))
        ));
        let sign: RehearsalSign = decode(&[b'B', 5, b'V', b'e', b'r', b's', b'e']).unwrap();
        assert_eq!(sign, RehearsalSign::new('B', "Verse"));
    }

    #[test]
    fn staff_string_count_is_validated() {
        // 9 strings, then spacing and two empty voices
        let bytes = [9, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            decode::<Staff>(&bytes),
            Err(CodecError::InvalidData(_))
        ));
    }
}
