/// MIDI output using midir, plus pitch helpers
use midir::{MidiOutput, MidiOutputConnection};

use crate::constants::FALLBACK_FREQUENCY;
use crate::error::{Error, Result};

const CLIENT_NAME: &str = "pianoroll MIDI output";

/// Mirrors playback note events to an external MIDI port
pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self { connection: None }
    }

    pub fn available_ports() -> Vec<String> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(e) => {
                log::warn!("MIDI unavailable: {}", e);
                vec![]
            }
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| Error::Midi(format!("failed to create output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or(Error::InvalidMidiPort(port_index))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "pianoroll")
            .map_err(|e| Error::Midi(format!("failed to connect: {}", e)))?;

        log::info!("MIDI output connected to {}", name);
        self.connection = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<()> {
        self.send(&[0x90, note & 0x7F, velocity & 0x7F])
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<()> {
        self.send(&[0x80, note & 0x7F, 0])
    }

    /// Channel mode message 123 on channel 1
    pub fn send_all_notes_off(&mut self) -> Result<()> {
        self.send(&[0xB0, 123, 0])
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(message)
                .map_err(|e| Error::Midi(format!("failed to send: {}", e)))?;
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

/// Frequency of the C major notes around middle C; anything else plays A4.
pub fn pitch_frequency(pitch: u8) -> f32 {
    match pitch {
        60 => 261.63,
        62 => 293.66,
        64 => 329.63,
        65 => 349.23,
        67 => 392.00,
        69 => 440.00,
        71 => 493.88,
        _ => FALLBACK_FREQUENCY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_names() {
        assert_eq!(midi_note_name(60), "C4");
        assert_eq!(midi_note_name(69), "A4");
        assert_eq!(midi_note_name(61), "C#4");
        assert_eq!(midi_note_name(0), "C-1");
    }

    #[test]
    fn test_mapped_pitches() {
        assert_eq!(pitch_frequency(60), 261.63);
        assert_eq!(pitch_frequency(67), 392.0);
        assert_eq!(pitch_frequency(71), 493.88);
    }

    #[test]
    fn test_unmapped_pitch_falls_back_to_a4() {
        assert_eq!(pitch_frequency(61), 440.0);
        assert_eq!(pitch_frequency(0), 440.0);
        assert_eq!(pitch_frequency(127), 440.0);
    }

    #[test]
    fn test_disconnected_sends_are_noops() {
        let mut device = MidiOutputDevice::new();
        assert!(!device.is_connected());
        assert!(device.send_note_on(60, 100).is_ok());
        assert!(device.send_note_off(60).is_ok());
        assert!(device.send_all_notes_off().is_ok());
    }
}
