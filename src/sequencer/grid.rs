/// Grid geometry and the resize gesture
///
/// Everything here is expressed in steps and points so the window code only
/// has to paint rectangles and forward pointer positions.
use crate::constants::{BASE_COLUMNS, BASE_TIME_STEPS, CELL_WIDTH};

use super::{Note, NoteList, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    resolution: Resolution,
}

/// One horizontal run of cells occupied by a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteSpan {
    pub row: u32,
    pub column: u32,
    pub len: u32,
}

impl GridLayout {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn time_steps(&self) -> u32 {
        BASE_TIME_STEPS * self.resolution.steps_per_unit()
    }

    pub fn columns(&self) -> u32 {
        BASE_COLUMNS * self.resolution.steps_per_unit()
    }

    pub fn rows(&self) -> u32 {
        self.time_steps().div_ceil(self.columns())
    }

    /// (column, row) of a step, or None past the end of the grid
    pub fn cell_position(&self, step: u32) -> Option<(u32, u32)> {
        if step >= self.time_steps() {
            return None;
        }
        Some((step % self.columns(), step / self.columns()))
    }

    pub fn step_at(&self, column: u32, row: u32) -> Option<u32> {
        if column >= self.columns() {
            return None;
        }
        let step = row * self.columns() + column;
        (step < self.time_steps()).then_some(step)
    }

    /// Cells covered by a note, wrapping at row ends and clipped to the grid.
    pub fn spans(&self, start: u32, duration: u32) -> Vec<NoteSpan> {
        let end = start.saturating_add(duration).min(self.time_steps());
        let mut spans = Vec::new();
        let mut step = start;
        while step < end {
            let (column, row) = (step % self.columns(), step / self.columns());
            let len = (self.columns() - column).min(end - step);
            spans.push(NoteSpan { row, column, len });
            step += len;
        }
        spans
    }
}

/// A resize in progress, alive only between press and release
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeGesture {
    start: u32,
    pitch: u8,
    origin_x: f32,
    base_duration: u32,
    preview: u32,
}

impl ResizeGesture {
    pub fn begin(note: &Note, origin_x: f32) -> Self {
        Self {
            start: note.start,
            pitch: note.pitch,
            origin_x,
            base_duration: note.duration,
            preview: note.duration,
        }
    }

    /// Signed step delta for a pointer displacement
    pub fn step_delta(displacement: f32) -> i64 {
        (displacement / CELL_WIDTH).round() as i64
    }

    pub fn update(&mut self, pointer_x: f32) -> u32 {
        let delta = Self::step_delta(pointer_x - self.origin_x);
        let resized = (self.base_duration as i64).saturating_add(delta).max(1);
        self.preview = u32::try_from(resized).unwrap_or(u32::MAX);
        self.preview
    }

    pub fn preview(&self) -> u32 {
        self.preview
    }

    pub fn targets(&self, note: &Note) -> bool {
        note.start == self.start && note.pitch == self.pitch
    }

    pub fn finish(self, notes: &mut NoteList) {
        notes.update_duration(self.start, self.pitch, self.preview);
    }
}
