// MIDI channel voice messages sent to external instruments

/// Controller number for "All Notes Off"
pub const ALL_NOTES_OFF: u8 = 123;

/// Channel index of General MIDI percussion (channel 10)
pub const PERCUSSION_CHANNEL: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiEvent {
    pub fn channel(&self) -> u8 {
        match self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. } => *channel,
        }
    }

    /// Encode as a raw 3-byte message
    /// Channel and data bytes are masked to their valid ranges.
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiEvent::NoteOff { channel, note } => [0x80 | (channel & 0x0F), note & 0x7F, 0],
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
        }
    }

    /// Parse a raw MIDI message; `None` for anything but the three channel messages above
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let [status, data1, data2, ..] = *bytes else {
            return None;
        };

        let channel = status & 0x0F;
        match status & 0xF0 {
            // Velocity 0 = Note Off
            0x90 if data2 == 0 => Some(MidiEvent::NoteOff {
                channel,
                note: data1,
            }),
            0x90 => Some(MidiEvent::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            0x80 => Some(MidiEvent::NoteOff {
                channel,
                note: data1,
            }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: data1,
                value: data2,
            }),
            _ => None,
        }
    }
}
