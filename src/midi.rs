//! MIDI events queued for a single render block
//!
//! An event is a frame offset inside the block plus a MIDI 1.0 channel
//! message. [`MidiEvent::bytes`] yields the raw status/data triple handed
//! to the plugin.

/// A MIDI event with sample-accurate timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Frame offset within the block the event is delivered with (0 = first frame)
    pub delta_frames: u32,
    /// The message
    pub kind: MidiEventKind,
}

/// Channel message carried by a [`MidiEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEventKind {
    NoteOn { note: u8, velocity: u8, channel: u8 },
    NoteOff { note: u8, velocity: u8, channel: u8 },
    PolyphonicAftertouch { note: u8, pressure: u8, channel: u8 },
    ControlChange { controller: u8, value: u8, channel: u8 },
    ProgramChange { program: u8, channel: u8 },
    ChannelAftertouch { pressure: u8, channel: u8 },
    /// 14-bit bend, 8192 = center
    PitchBend { value: u16, channel: u8 },
}

impl MidiEvent {
    /// Pitch bend center value (no pitch change)
    pub const PITCH_BEND_CENTER: u16 = 8192;

    /// Note On; note and velocity clamp to 0-127, channel to 0-15
    ///
    /// ```
    /// use plughost::MidiEvent;
    ///
    /// // Middle C at the start of the block
    /// let event = MidiEvent::note_on(60, 100, 0, 0);
    /// assert_eq!(event.bytes(), [0x90, 60, 100]);
    /// ```
    pub fn note_on(note: u8, velocity: u8, channel: u8, delta_frames: u32) -> Self {
        Self {
            delta_frames,
            kind: MidiEventKind::NoteOn {
                note: note.min(127),
                velocity: velocity.min(127),
                channel: channel.min(15),
            },
        }
    }

    /// Note Off
    pub fn note_off(note: u8, velocity: u8, channel: u8, delta_frames: u32) -> Self {
        Self {
            delta_frames,
            kind: MidiEventKind::NoteOff {
                note: note.min(127),
                velocity: velocity.min(127),
                channel: channel.min(15),
            },
        }
    }

    /// Control Change
    pub fn control_change(controller: u8, value: u8, channel: u8, delta_frames: u32) -> Self {
        Self {
            delta_frames,
            kind: MidiEventKind::ControlChange {
                controller: controller.min(127),
                value: value.min(127),
                channel: channel.min(15),
            },
        }
    }

    /// Program Change
    pub fn program_change(program: u8, channel: u8, delta_frames: u32) -> Self {
        Self {
            delta_frames,
            kind: MidiEventKind::ProgramChange {
                program: program.min(127),
                channel: channel.min(15),
            },
        }
    }

    /// Pitch Bend; value clamps to 0-16383
    pub fn pitch_bend(value: u16, channel: u8, delta_frames: u32) -> Self {
        Self {
            delta_frames,
            kind: MidiEventKind::PitchBend {
                value: value.min(16383),
                channel: channel.min(15),
            },
        }
    }

    /// Same message at a different frame offset
    pub fn at(self, delta_frames: u32) -> Self {
        Self {
            delta_frames,
            ..self
        }
    }

    /// Raw status/data triple; unused data bytes are zero
    pub fn bytes(&self) -> [u8; 3] {
        match self.kind {
            MidiEventKind::NoteOff { note, velocity, channel } => [0x80 | channel, note, velocity],
            MidiEventKind::NoteOn { note, velocity, channel } => [0x90 | channel, note, velocity],
            MidiEventKind::PolyphonicAftertouch { note, pressure, channel } => {
                [0xA0 | channel, note, pressure]
            }
            MidiEventKind::ControlChange { controller, value, channel } => {
                [0xB0 | channel, controller, value]
            }
            MidiEventKind::ProgramChange { program, channel } => [0xC0 | channel, program, 0],
            MidiEventKind::ChannelAftertouch { pressure, channel } => [0xD0 | channel, pressure, 0],
            MidiEventKind::PitchBend { value, channel } => {
                // LSB first, both 7-bit
                [0xE0 | channel, (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
            }
        }
    }

    /// Parse a raw channel message; `None` for system or malformed status bytes
    pub fn from_bytes(bytes: [u8; 3], delta_frames: u32) -> Option<Self> {
        let [status, data1, data2] = bytes;
        let channel = status & 0x0F;
        let (data1, data2) = (data1 & 0x7F, data2 & 0x7F);
        let kind = match status & 0xF0 {
            0x80 => MidiEventKind::NoteOff { note: data1, velocity: data2, channel },
            0x90 => MidiEventKind::NoteOn { note: data1, velocity: data2, channel },
            0xA0 => MidiEventKind::PolyphonicAftertouch { note: data1, pressure: data2, channel },
            0xB0 => MidiEventKind::ControlChange { controller: data1, value: data2, channel },
            0xC0 => MidiEventKind::ProgramChange { program: data1, channel },
            0xD0 => MidiEventKind::ChannelAftertouch { pressure: data1, channel },
            0xE0 => MidiEventKind::PitchBend {
                value: u16::from(data1) | (u16::from(data2) << 7),
                channel,
            },
            _ => return None,
        };
        Some(Self { delta_frames, kind })
    }
}
