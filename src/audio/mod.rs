/// Audio output using cpal
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use synth::{Mixer, ToneEvent};

pub mod synth;

/// A running audio clock that tones can be placed on. Dropping it tears the
/// clock down together with every tone still pending on it.
pub trait AudioClock {
    /// Clock time in seconds
    fn current_time(&self) -> f64;

    fn schedule_tone(&self, tone: ToneEvent);
}

/// Source of fresh audio clocks
pub trait AudioBackend {
    type Clock: AudioClock;

    fn acquire(&mut self) -> Result<Self::Clock>;
}

/// Opens the default cpal output device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    type Clock = AudioOutput;

    fn acquire(&mut self) -> Result<AudioOutput> {
        AudioOutput::new()
    }
}

pub struct AudioOutput {
    _stream: cpal::Stream,
    mixer: Arc<Mutex<Mixer>>,
}

impl AudioOutput {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0 as f32;
        let mixer = Arc::new(Mutex::new(Mixer::new(sample_rate)));
        let mixer_clone = Arc::clone(&mixer);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::setup_audio_stream::<f32>(&device, &config.into(), mixer_clone)?
            }
            cpal::SampleFormat::I16 => {
                Self::setup_audio_stream::<i16>(&device, &config.into(), mixer_clone)?
            }
            cpal::SampleFormat::U16 => {
                Self::setup_audio_stream::<u16>(&device, &config.into(), mixer_clone)?
            }
            other => return Err(Error::UnsupportedSampleFormat(other)),
        };
        stream.play()?;

        log::info!(
            "audio clock acquired: {} at {} Hz",
            device.name().unwrap_or_else(|_| "unknown device".to_string()),
            sample_rate
        );

        Ok(Self {
            _stream: stream,
            mixer,
        })
    }

    fn setup_audio_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mixer: Arc<Mutex<Mixer>>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                match mixer.lock() {
                    Ok(mut mixer) => mixer.render(&mut scratch, channels),
                    Err(_) => scratch.fill(0.0),
                }
                for (out, sample) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample(*sample);
                }
            },
            |err| log::error!("audio stream error: {}", err),
            None,
        )?;
        Ok(stream)
    }
}

impl AudioClock for AudioOutput {
    fn current_time(&self) -> f64 {
        self.mixer
            .lock()
            .map(|mixer| mixer.current_time())
            .unwrap_or(0.0)
    }

    fn schedule_tone(&self, tone: ToneEvent) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.schedule(tone);
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        log::info!("audio clock released");
    }
}
