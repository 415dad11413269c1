use thiserror::Error;

use crate::sequencer::Resolution;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("could not query output config: {0}")]
    DefaultStreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format {0:?}")]
    UnsupportedSampleFormat(cpal::SampleFormat),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported grid resolution {0}, expected 4, 8 or 16")]
    InvalidResolution(u32),

    #[error("cannot switch grid resolution {from} -> {to}: notes fall between steps")]
    ResolutionChangeRefused { from: Resolution, to: Resolution },

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("invalid MIDI port index {0}")]
    InvalidMidiPort(usize),

    #[error("MP3 export is not implemented")]
    ExportUnavailable,
}
