//! Vibrato playback events.
//!
//! Vibrato is played as a modulation wheel message (controller 1) on the
//! note's channel. The widths used for normal and wide vibrato are user
//! preferences, carried in [`PlaybackSettings`] and handed to every event.

use serde::{Deserialize, Serialize};

/// MIDI controller number of the modulation wheel.
pub const MODULATION_CONTROLLER: u8 = 1;

const CONTROL_CHANGE: u8 = 0xB0;

/// Playback preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Modulation depth for normal vibrato (0–127)
    pub vibrato_width: u8,
    /// Modulation depth for wide vibrato (0–127)
    pub wide_vibrato_width: u8,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            vibrato_width: 85,
            wide_vibrato_width: 127,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VibratoType {
    Normal,
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VibratoEventType {
    On,
    Off,
}

/// A message ready for the sequencer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MidiEvent {
    /// Start time in milliseconds
    pub start_time_ms: f64,
    /// Timeline position the event belongs to
    pub position_index: u32,
    /// Raw MIDI message bytes (status + data)
    pub bytes: Vec<u8>,
}

/// Turns vibrato on or off for a channel at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibratoEvent {
    pub channel: u8,
    pub start_time_ms: f64,
    pub position_index: u32,
    pub event_type: VibratoEventType,
    pub vibrato_type: VibratoType,
}

impl VibratoEvent {
    pub fn new(
        channel: u8,
        start_time_ms: f64,
        position_index: u32,
        event_type: VibratoEventType,
        vibrato_type: VibratoType,
    ) -> Self {
        Self {
            channel,
            start_time_ms,
            position_index,
            event_type,
            vibrato_type,
        }
    }

    /// Modulation depth this event sets; 0 turns vibrato off.
    pub fn width(&self, settings: &PlaybackSettings) -> u8 {
        let width = match (self.event_type, self.vibrato_type) {
            (VibratoEventType::Off, _) => 0,
            (VibratoEventType::On, VibratoType::Normal) => settings.vibrato_width,
            (VibratoEventType::On, VibratoType::Wide) => settings.wide_vibrato_width,
        };
        width.min(0x7f)
    }

    /// The control change message for this event.
    pub fn perform(&self, settings: &PlaybackSettings) -> MidiEvent {
        MidiEvent {
            start_time_ms: self.start_time_ms,
            position_index: self.position_index,
            bytes: vec![
                CONTROL_CHANGE | (self.channel & 0x0f),
                MODULATION_CONTROLLER,
                self.width(settings),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_widths() {
        let settings = PlaybackSettings::default();
        let on = VibratoEvent::new(2, 500.0, 7, VibratoEventType::On, VibratoType::Normal);
        assert_eq!(on.perform(&settings).bytes, vec![0xB2, 1, 85]);

        let wide = VibratoEvent {
            vibrato_type: VibratoType::Wide,
            ..on.clone()
        };
        assert_eq!(wide.perform(&settings).bytes, vec![0xB2, 1, 127]);
    }

    #[test]
    fn off_is_always_zero() {
        let settings = PlaybackSettings {
            vibrato_width: 40,
            wide_vibrato_width: 90,
        };
        for vibrato_type in [VibratoType::Normal, VibratoType::Wide] {
            let off = VibratoEvent::new(0, 0.0, 0, VibratoEventType::Off, vibrato_type);
            assert_eq!(off.perform(&settings).bytes[2], 0);
        }
    }

    #[test]
    fn settings_are_not_global() {
        let event = VibratoEvent::new(15, 10.0, 3, VibratoEventType::On, VibratoType::Normal);
        let custom = PlaybackSettings {
            vibrato_width: 60,
            ..PlaybackSettings::default()
        };
        assert_eq!(event.perform(&custom).bytes, vec![0xBF, 1, 60]);
        assert_eq!(event.perform(&PlaybackSettings::default()).bytes[2], 85);

        let out = event.perform(&custom);
        assert_eq!(out.position_index, 3);
        assert_eq!(out.start_time_ms, 10.0);
    }

    #[test]
    fn width_is_clamped_to_seven_bits() {
        let settings = PlaybackSettings {
            vibrato_width: 200,
            wide_vibrato_width: 127,
        };
        let event = VibratoEvent::new(0, 0.0, 0, VibratoEventType::On, VibratoType::Normal);
        assert_eq!(event.width(&settings), 127);
    }
}
