/// pianoroll - a minimal step-sequencer piano roll
///
/// This library provides the core components behind the piano roll window:
/// - Note model and grid layout with scoped resize gestures
/// - Playback scheduling against an audio clock
/// - Enveloped tone synthesis rendered through cpal
/// - MIDI mirroring of playback for external gear

pub mod constants;
pub mod error;
pub mod sequencer;
pub mod audio;
pub mod midi;

// Re-export commonly used types
pub use error::{Error, Result};
pub use sequencer::{Note, NoteList, PianoRoll, Resolution, export};
pub use sequencer::grid::{GridLayout, NoteSpan, ResizeGesture};
pub use sequencer::playback::{PassPlan, PlaybackEngine, PlaybackEvent};
pub use audio::{AudioBackend, AudioClock, AudioOutput, CpalBackend};
pub use audio::synth::{Envelope, Mixer, SynthSettings, ToneEvent, Waveform};
pub use midi::{MidiOutputDevice, midi_note_name, pitch_frequency};
