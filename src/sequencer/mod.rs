/// Core sequencer logic - note storage, grid resolution and the editing session
use std::fmt;

use crate::constants::{
    DEFAULT_NOTE_UNITS, FIXED_PITCH, REFERENCE_RESOLUTION, SECONDS_PER_UNIT,
};
use crate::error::{Error, Result};
use grid::{GridLayout, ResizeGesture};

pub mod grid;
pub mod playback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub start: u32,
    pub duration: u32,
    pub pitch: u8,
}

impl Note {
    pub fn new(start: u32, duration: u32, pitch: u8) -> Self {
        Self {
            start,
            duration: duration.max(1),
            pitch,
        }
    }

    /// First step after the note
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.duration)
    }

    pub fn covers(&self, step: u32) -> bool {
        step >= self.start && step < self.end()
    }
}

/// Notes in insertion order. Lookups by (start, pitch) return the first match.
#[derive(Debug, Clone, Default)]
pub struct NoteList {
    notes: Vec<Note>,
}

impl NoteList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a note unless one already starts at `start` with `pitch`.
    pub fn add_note(&mut self, start: u32, duration: u32, pitch: u8) -> bool {
        if self.find(start, pitch).is_some() {
            return false;
        }
        self.notes.push(Note::new(start, duration, pitch));
        true
    }

    /// Overwrites the duration of the first note at (start, pitch). Missing
    /// notes are ignored.
    pub fn update_duration(&mut self, start: u32, pitch: u8, duration: u32) -> bool {
        match self
            .notes
            .iter_mut()
            .find(|n| n.start == start && n.pitch == pitch)
        {
            Some(note) => {
                note.duration = duration.max(1);
                true
            }
            None => false,
        }
    }

    pub fn find(&self, start: u32, pitch: u8) -> Option<&Note> {
        self.notes
            .iter()
            .find(|n| n.start == start && n.pitch == pitch)
    }

    pub fn covering(&self, step: u32, pitch: u8) -> Option<&Note> {
        self.notes
            .iter()
            .find(|n| n.pitch == pitch && n.covers(step))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Note> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Latest end step over all notes, 0 when empty
    pub fn end_step(&self) -> u32 {
        self.notes.iter().map(Note::end).max().unwrap_or(0)
    }
}

impl<'a> IntoIterator for &'a NoteList {
    type Item = &'a Note;
    type IntoIter = std::slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Grid resolution; sets both grid density and playback tempo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    Quarter,
    Eighth,
    #[default]
    Sixteenth,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Self::Quarter, Self::Eighth, Self::Sixteenth];

    pub fn value(&self) -> u32 {
        match self {
            Self::Quarter => 4,
            Self::Eighth => 8,
            Self::Sixteenth => 16,
        }
    }

    /// Steps per reference unit
    pub fn steps_per_unit(&self) -> u32 {
        REFERENCE_RESOLUTION / self.value()
    }

    pub fn seconds_per_step(&self) -> f64 {
        SECONDS_PER_UNIT * (self.value() as f64 / REFERENCE_RESOLUTION as f64)
    }

    /// Duration given to a note created by clicking the grid
    pub fn default_note_duration(&self) -> u32 {
        DEFAULT_NOTE_UNITS * self.steps_per_unit()
    }

    /// Converts a step count at `from` into steps at `self`, keeping the
    /// absolute time. None when it does not land on a whole step.
    pub fn rescale_from(&self, from: Resolution, steps: u32) -> Option<u32> {
        let scaled = steps.checked_mul(from.value())?;
        (scaled % self.value() == 0).then(|| scaled / self.value())
    }
}

impl TryFrom<u32> for Resolution {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            4 => Ok(Self::Quarter),
            8 => Ok(Self::Eighth),
            16 => Ok(Self::Sixteenth),
            other => Err(Error::InvalidResolution(other)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Editing session: owns the notes, the resolution and any gesture in flight
#[derive(Debug, Clone, Default)]
pub struct PianoRoll {
    notes: NoteList,
    resolution: Resolution,
    gesture: Option<ResizeGesture>,
}

impl PianoRoll {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    pub fn notes(&self) -> &NoteList {
        &self.notes
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::new(self.resolution)
    }

    /// Places a note at the fixed pitch on an empty grid cell. Cells under an
    /// existing note belong to that note and are left alone.
    pub fn click_cell(&mut self, step: u32) -> bool {
        if step >= self.layout().time_steps() || self.note_at(step).is_some() {
            return false;
        }
        self.notes
            .add_note(step, self.resolution.default_note_duration(), FIXED_PITCH)
    }

    /// Note at the fixed pitch whose span includes `step`
    pub fn note_at(&self, step: u32) -> Option<&Note> {
        self.notes.covering(step, FIXED_PITCH)
    }

    /// Starts resizing the note under `step`, with the pointer at `pointer_x`.
    pub fn begin_resize(&mut self, step: u32, pointer_x: f32) -> bool {
        match self.note_at(step) {
            Some(note) => {
                self.gesture = Some(ResizeGesture::begin(note, pointer_x));
                true
            }
            None => false,
        }
    }

    /// Moves the active gesture, returning the previewed duration.
    pub fn drag_resize(&mut self, pointer_x: f32) -> Option<u32> {
        self.gesture.as_mut().map(|g| g.update(pointer_x))
    }

    /// Commits and drops the active gesture.
    pub fn end_resize(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            gesture.finish(&mut self.notes);
        }
    }

    pub fn active_gesture(&self) -> Option<&ResizeGesture> {
        self.gesture.as_ref()
    }

    /// Duration to draw for `note`, taking an in-flight resize into account
    pub fn displayed_duration(&self, note: &Note) -> u32 {
        match &self.gesture {
            Some(g) if g.targets(note) => g.preview(),
            _ => note.duration,
        }
    }

    /// Switches resolution and rescales every note to keep its timing. The
    /// change is refused, leaving everything as it was, if any note would
    /// fall between steps of the new grid.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<()> {
        if resolution == self.resolution {
            return Ok(());
        }
        let from = self.resolution;
        let mut rescaled = Vec::with_capacity(self.notes.len());
        for note in &self.notes {
            let start = resolution.rescale_from(from, note.start);
            let duration = resolution.rescale_from(from, note.duration);
            match (start, duration) {
                (Some(start), Some(duration)) => {
                    rescaled.push(Note::new(start, duration, note.pitch))
                }
                _ => {
                    log::warn!(
                        "grid resolution {} -> {} refused: note at step {} is off the grid",
                        from,
                        resolution,
                        note.start
                    );
                    return Err(Error::ResolutionChangeRefused { from, to: resolution });
                }
            }
        }
        log::info!(
            "grid resolution {} -> {}, rescaled {} notes",
            from,
            resolution,
            rescaled.len()
        );
        self.notes = NoteList { notes: rescaled };
        self.resolution = resolution;
        self.gesture = None;
        Ok(())
    }
}

/// Audio export is not available; always fails with `Error::ExportUnavailable`.
pub fn export(_notes: &NoteList) -> Result<()> {
    Err(Error::ExportUnavailable)
}
