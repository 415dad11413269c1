/// Tone synthesis: waveforms, ADSR envelopes and the voice mixer
use std::f32::consts::PI;
use std::fmt;

use crate::constants::{OUTPUT_GAIN, RAMP_FLOOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [Self::Sine, Self::Square, Self::Sawtooth, Self::Triangle];

    /// Sample at `phase` in [0, 1), starting from zero except for square
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Self::Sine => (phase * 2.0 * PI).sin(),
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Sawtooth => {
                if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 * phase - 2.0
                }
            }
            Self::Triangle => {
                if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                }
            }
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::Triangle => "triangle",
        };
        f.write_str(name)
    }
}

/// Attack, decay and release in seconds; sustain as a level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.05,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
        }
    }
}

impl Envelope {
    /// Sustain level as used by the exponential ramps
    pub fn sustain_level(&self) -> f32 {
        self.sustain.max(RAMP_FLOOR)
    }

    /// Time from tone start until the voice stops, for a held `duration`
    pub fn total_length(&self, duration: f32) -> f32 {
        self.attack + self.decay + duration + self.release
    }

    /// Gain `t` seconds after the tone started, holding sustain for `hold`.
    pub fn gain_at(&self, t: f32, hold: f32) -> f32 {
        if t < 0.0 {
            return 0.0;
        }
        let sustain = self.sustain_level();

        if t < self.attack {
            return t / self.attack;
        }
        let t = t - self.attack;

        if t < self.decay {
            return exponential_ramp(1.0, sustain, t / self.decay);
        }
        let t = t - self.decay;

        if t < hold {
            return sustain;
        }
        let t = t - hold;

        if t < self.release {
            return exponential_ramp(sustain, RAMP_FLOOR, t / self.release);
        }
        0.0
    }
}

fn exponential_ramp(from: f32, to: f32, fraction: f32) -> f32 {
    from * (to / from).powf(fraction)
}

/// Synth controls read at play time and shared by every note of a pass
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SynthSettings {
    pub waveform: Waveform,
    pub envelope: Envelope,
}

/// One enveloped oscillator tone placed on the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEvent {
    /// Clock time in seconds
    pub start: f64,
    /// Sustained length in seconds, not counting the envelope ramps
    pub duration: f64,
    pub frequency: f32,
    pub waveform: Waveform,
    pub envelope: Envelope,
}

impl ToneEvent {
    pub fn new(
        start: f64,
        duration: f64,
        frequency: f32,
        waveform: Waveform,
        envelope: Envelope,
    ) -> Self {
        Self {
            start,
            duration,
            frequency,
            waveform,
            envelope,
        }
    }

    pub fn stop_time(&self) -> f64 {
        self.start + self.envelope.total_length(self.duration as f32) as f64
    }

    pub fn gain_at(&self, time: f64) -> f32 {
        if time >= self.stop_time() {
            return 0.0;
        }
        self.envelope
            .gain_at((time - self.start) as f32, self.duration as f32)
    }
}

#[derive(Debug, Clone)]
struct Voice {
    tone: ToneEvent,
    phase: f32,
}

/// Sums scheduled tones into interleaved output buffers. Its clock is the
/// number of frames rendered so far.
#[derive(Debug)]
pub struct Mixer {
    sample_rate: f32,
    frames: u64,
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            frames: 0,
            voices: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn schedule(&mut self, tone: ToneEvent) {
        self.voices.push(Voice { tone, phase: 0.0 });
    }

    /// Voices that have not yet reached their stop time
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Renders `out.len() / channels` frames, writing the same mono signal to
    /// every channel.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let sample = self.next_sample();
            frame.fill(sample);
        }
    }

    fn next_sample(&mut self) -> f32 {
        let time = self.current_time();
        let sample_rate = self.sample_rate;
        let mut mix = 0.0;

        for voice in &mut self.voices {
            if time < voice.tone.start {
                continue;
            }
            mix += voice.tone.waveform.sample(voice.phase) * voice.tone.gain_at(time);
            voice.phase += voice.tone.frequency / sample_rate;
            voice.phase -= voice.phase.floor();
        }

        self.voices.retain(|v| time < v.tone.stop_time());
        self.frames += 1;
        mix * OUTPUT_GAIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_envelope_stages() {
        let env = Envelope {
            attack: 0.1,
            decay: 0.2,
            sustain: 0.5,
            release: 0.4,
        };
        assert_eq!(env.gain_at(-0.01, 1.0), 0.0);
        assert_eq!(env.gain_at(0.0, 1.0), 0.0);
        assert!(close(env.gain_at(0.05, 1.0), 0.5));
        assert!(close(env.gain_at(0.1, 1.0), 1.0));
        // halfway through the decay the exponential ramp is at sqrt(0.5)
        assert!(close(env.gain_at(0.2, 1.0), 0.5_f32.sqrt()));
        assert!(close(env.gain_at(0.3, 1.0), 0.5));
        assert!(close(env.gain_at(1.2, 1.0), 0.5));
        assert!(env.gain_at(1.5, 1.0) < 0.5);
        assert!(close(env.gain_at(1.6999, 1.0), RAMP_FLOOR));
        assert_eq!(env.gain_at(1.75, 1.0), 0.0);
    }

    #[test]
    fn test_zero_length_stages() {
        let env = Envelope {
            attack: 0.0,
            decay: 0.0,
            sustain: 0.8,
            release: 0.0,
        };
        assert!(close(env.gain_at(0.0, 1.0), 0.8));
        assert_eq!(env.gain_at(1.0, 1.0), 0.0);
    }

    #[test]
    fn test_zero_sustain_is_floored() {
        let env = Envelope {
            attack: 0.0,
            decay: 0.1,
            sustain: 0.0,
            release: 0.1,
        };
        assert!(close(env.gain_at(0.5, 1.0), RAMP_FLOOR));
        assert!(env.gain_at(0.05, 1.0).is_finite());
    }

    #[test]
    fn test_tone_stop_time() {
        let tone = ToneEvent::new(2.0, 1.0, 440.0, Waveform::Sine, Envelope::default());
        assert!((tone.stop_time() - 3.45).abs() < 1e-6);
        assert_eq!(tone.gain_at(3.5), 0.0);
        assert_eq!(tone.gain_at(1.0), 0.0);
    }

    #[test]
    fn test_waveform_shapes() {
        assert!(close(Waveform::Sine.sample(0.25), 1.0));
        assert_eq!(Waveform::Square.sample(0.1), 1.0);
        assert_eq!(Waveform::Square.sample(0.6), -1.0);
        assert!(close(Waveform::Sawtooth.sample(0.25), 0.5));
        assert!(close(Waveform::Sawtooth.sample(0.75), -0.5));
        assert!(close(Waveform::Triangle.sample(0.25), 1.0));
        assert!(close(Waveform::Triangle.sample(0.75), -1.0));
    }

    #[test]
    fn test_mixer_clock_advances_per_frame() {
        let mut mixer = Mixer::new(100.0);
        let mut buffer = vec![0.0; 20];
        mixer.render(&mut buffer, 2);
        assert!((mixer.current_time() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_mixer_is_silent_before_tone_start() {
        let mut mixer = Mixer::new(1000.0);
        mixer.schedule(ToneEvent::new(
            0.5,
            0.1,
            100.0,
            Waveform::Square,
            Envelope::default(),
        ));
        let mut buffer = vec![0.0; 400];
        mixer.render(&mut buffer, 1);
        assert!(buffer.iter().all(|s| *s == 0.0));
        assert_eq!(mixer.voice_count(), 1);
    }

    #[test]
    fn test_mixer_plays_and_drops_voice() {
        let env = Envelope {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
        };
        let mut mixer = Mixer::new(1000.0);
        mixer.schedule(ToneEvent::new(0.0, 0.1, 10.0, Waveform::Square, env));

        let mut buffer = vec![0.0; 2 * 50];
        mixer.render(&mut buffer, 2);
        assert!(close(buffer[0], OUTPUT_GAIN));
        assert_eq!(buffer[0], buffer[1]);

        let mut rest = vec![0.0; 200];
        mixer.render(&mut rest, 1);
        assert_eq!(mixer.voice_count(), 0);
        assert!(rest[150..].iter().all(|s| *s == 0.0));
    }
}
