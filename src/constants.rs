/// Grid cell width in points; also the drag distance of one step
pub const CELL_WIDTH: f32 = 30.0;

pub const ROW_HEIGHT: f32 = 28.0;

/// Time steps in the grid at the reference resolution
pub const BASE_TIME_STEPS: u32 = 128;

/// Grid columns at the reference resolution
pub const BASE_COLUMNS: u32 = 32;

/// Resolution value that maps one step to one reference unit
pub const REFERENCE_RESOLUTION: u32 = 16;

/// Length of one reference unit in seconds
pub const SECONDS_PER_UNIT: f64 = 0.25;

/// Reference units a freshly placed note lasts
pub const DEFAULT_NOTE_UNITS: u32 = 2;

/// Pitch every click-created note gets (C4)
pub const FIXED_PITCH: u8 = 60;

/// Steps of silence appended after the last note ends
pub const TAIL_STEPS: u32 = 2;

/// Lowest level an exponential ramp may reach
pub const RAMP_FLOOR: f32 = 0.001;

pub const OUTPUT_GAIN: f32 = 0.2;

pub const FALLBACK_FREQUENCY: f32 = 440.0;

pub const NOTE_VELOCITY: u8 = 100;
