//! System record.
//!
//! Fields in order: rectangle, end bar, position spacing, rhythm slash
//! spacing above and below, extra spacing, start bar, then the directions,
//! chord text, rhythm slashes, staves and interior barlines.
//!
//! 1.0 and 1.0.2 differ in the header: the start bar is a single key byte
//! read right after the rectangle, and the end bar is a `u16` whose high
//! byte is the bar type and low byte the repeat count. Those files also
//! kept the start bar inline as an interior barline at position 0, which is
//! folded back into the start bar after reading.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, trace, warn};

use super::entities::{bar_type_from_code, barline_data_byte};
use super::*;
use crate::model::{KeySignature, KeyType, MAX_REPEAT_COUNT};
use crate::system::System;

/// Writes `system` in the current layout.
pub fn encode_system<W: Write>(system: &System, w: &mut W) -> CodecResult<()> {
    system.serialize(w)
}

/// Reads a system stored under the file version `version`.
pub fn decode_system<R: Read>(r: &mut R, version: u16) -> CodecResult<System> {
    let version = FileVersion::from_tag(version)?;
    System::deserialize(r, version)
}

impl Serializable for System {
    fn serialize<W: Write>(&self, w: &mut W) -> CodecResult<()> {
        write_rect(w, &self.rect)?;
        w.write_u8(barline_data_byte(&self.end_bar)?)?;
        w.write_u8(self.position_spacing)?;
        w.write_u8(self.rhythm_slash_spacing_above)?;
        w.write_u8(self.rhythm_slash_spacing_below)?;
        w.write_u8(self.extra_spacing)?;

        self.start_bar.serialize(w)?;
        write_vec(w, &self.directions)?;
        write_vec(w, &self.chord_texts)?;
        write_vec(w, &self.rhythm_slashes)?;
        write_vec(w, &self.staves)?;
        write_vec(w, &self.barlines)?;

        trace!(
            "encoded system: {} barlines, {} staves",
            self.barlines.len(),
            self.staves.len()
        );
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R, version: FileVersion) -> CodecResult<Self> {
        let system = if version.is_legacy() {
            read_legacy(r, version)?
        } else {
            read_current(r, version)?
        };
        check_interior_barlines(&system)?;

        if !system.is_valid_spacing(system.position_spacing as i32) {
            warn!(
                "decoded system does not fit its content at spacing {}",
                system.position_spacing
            );
        }
        debug!(
            "decoded {version:?} system: {} positions, {} barlines, {} staves",
            system.position_count(),
            system.barlines.len(),
            system.staves.len()
        );
        Ok(system)
    }
}

fn read_current<R: Read>(r: &mut R, version: FileVersion) -> CodecResult<System> {
    let mut system = System::new();
    system.rect = read_rect(r)?;

    let end_bar = r.read_u8()?;
    system
        .end_bar
        .set_barline_data(bar_type_from_code(end_bar >> 5)?, end_bar & MAX_REPEAT_COUNT);
    read_spacing(r, &mut system)?;

    system.start_bar = Serializable::deserialize(r, version)?;
    system.start_bar.position = 0;
    read_containers(r, &mut system, version)?;

    system.sync_end_bar();
    Ok(system)
}

fn read_legacy<R: Read>(r: &mut R, version: FileVersion) -> CodecResult<System> {
    let mut system = System::new();
    system.rect = read_rect(r)?;

    let key = r.read_u8()?;
    let end_bar = r.read_u16::<LittleEndian>()?;
    read_spacing(r, &mut system)?;

    system.start_bar.key_signature = legacy_key_signature(key);
    let [repeat_count, bar_type] = end_bar.to_le_bytes();
    system
        .end_bar
        .set_barline_data(bar_type_from_code(bar_type)?, repeat_count);

    read_containers(r, &mut system, version)?;

    if system.barlines.first().is_some_and(|b| b.position == 0) {
        trace!("moving position 0 barline into the start bar");
        system.start_bar = system.barlines.remove(0);
    }
    propagate_legacy_keys(&mut system);

    system.sync_end_bar();
    Ok(system)
}

/// Interior barlines must sit strictly between the start and end bars.
fn check_interior_barlines(system: &System) -> CodecResult<()> {
    let count = system.position_count();
    if system.barlines.first().is_some_and(|b| b.position == 0) {
        return Err(CodecError::InvalidData(
            "interior barline at position 0".into(),
        ));
    }
    if let Some(last) = system.barlines.last().filter(|b| b.position >= count) {
        return Err(CodecError::InvalidData(format!(
            "barline at position {} is past the end bar at {count}",
            last.position
        )));
    }
    Ok(())
}

fn read_spacing<R: Read>(r: &mut R, system: &mut System) -> CodecResult<()> {
    system.position_spacing = r.read_u8()?;
    system.rhythm_slash_spacing_above = r.read_u8()?;
    system.rhythm_slash_spacing_below = r.read_u8()?;
    system.extra_spacing = r.read_u8()?;
    Ok(())
}

fn read_containers<R: Read>(
    r: &mut R,
    system: &mut System,
    version: FileVersion,
) -> CodecResult<()> {
    system.directions = sorted_by_position(read_vec(r, version)?, |d| d.position, "directions");
    system.chord_texts = sorted_by_position(read_vec(r, version)?, |c| c.position, "chord text");
    system.rhythm_slashes =
        sorted_by_position(read_vec(r, version)?, |s| s.position, "rhythm slashes");
    system.staves = read_vec(r, version)?;
    system.barlines = sorted_by_position(read_vec(r, version)?, |b| b.position, "barlines");
    Ok(())
}

/// Files written by other tools are not guaranteed to be ordered; restore
/// strictly increasing positions, keeping the first entry at each one.
fn sorted_by_position<T>(
    mut items: Vec<T>,
    position_of: impl Fn(&T) -> u32,
    what: &str,
) -> Vec<T> {
    if items
        .windows(2)
        .all(|pair| position_of(&pair[0]) < position_of(&pair[1]))
    {
        return items;
    }
    warn!("{what} out of order or duplicated; sorting");
    items.sort_by_key(|item| position_of(item));
    items.dedup_by_key(|item| position_of(item));
    items
}

/// Legacy start key byte: the high nibble holds the key type, where odd is
/// major, even is minor, and anything above 2 adds a cancellation. The low
/// nibble is the accidental count. The start key is always shown.
fn legacy_key_signature(key: u8) -> KeySignature {
    let key_type = (key >> 4) & 0x0f;
    let accidentals = key & 0x0f;

    let mut signature = KeySignature::shown(
        if key_type % 2 == 1 {
            KeyType::Major
        } else {
            KeyType::Minor
        },
        accidentals,
    );
    signature.cancellation = key_type > 2;
    signature
}

/// Walks the interior barlines once, forcing every hidden key that differs
/// from the active key to match it. Shown keys become the active key.
fn propagate_legacy_keys(system: &mut System) {
    let mut active = system.start_bar.key_signature.clone();

    for bar in &mut system.barlines {
        let key = &mut bar.key_signature;
        if *key == active {
            continue;
        }
        if key.shown {
            active = key.clone();
        } else {
            *key = KeySignature {
                shown: false,
                cancellation: false,
                ..active.clone()
            };
        }
    }
}
