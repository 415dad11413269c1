/// Playback engine - schedules a pass of tones and runs its transport
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{Note, NoteList, Resolution};
use crate::audio::synth::{SynthSettings, ToneEvent};
use crate::audio::{AudioBackend, AudioClock, CpalBackend};
use crate::constants::{NOTE_VELOCITY, TAIL_STEPS};
use crate::error::Result;
use crate::midi::pitch_frequency;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    StepAdvanced(u32),
    NoteOn(u8, u8), // note, velocity
    NoteOff(u8),    // note
    Finished,
}

/// Everything one playback pass puts on the clock
#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    pub t0: f64,
    pub seconds_per_step: f64,
    pub tones: Vec<ToneEvent>,
    /// Steps from pass start until the playing flag resets
    pub length_steps: u32,
}

impl PassPlan {
    /// One tone per note, in note insertion order.
    pub fn build(
        notes: &NoteList,
        resolution: Resolution,
        settings: &SynthSettings,
        t0: f64,
    ) -> Self {
        let seconds_per_step = resolution.seconds_per_step();
        let tones = notes
            .iter()
            .map(|note| {
                ToneEvent::new(
                    t0 + note.start as f64 * seconds_per_step,
                    note.duration as f64 * seconds_per_step,
                    pitch_frequency(note.pitch),
                    settings.waveform,
                    settings.envelope,
                )
            })
            .collect();

        Self {
            t0,
            seconds_per_step,
            tones,
            length_steps: notes.end_step().saturating_add(TAIL_STEPS),
        }
    }

    /// Seconds after `t0` at which the pass counts as finished
    pub fn end_offset(&self) -> f64 {
        self.length_steps as f64 * self.seconds_per_step
    }
}

pub struct PlaybackEngine<B: AudioBackend = CpalBackend> {
    backend: B,
    clock: Option<B::Clock>,
    sender: Sender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    // one flag per pass
    is_running: Arc<AtomicBool>,
}

impl PlaybackEngine<CpalBackend> {
    pub fn new() -> Self {
        Self::with_backend(CpalBackend)
    }
}

impl<B: AudioBackend> PlaybackEngine<B> {
    pub fn with_backend(backend: B) -> Self {
        let (sender, receiver) = channel();

        Self {
            backend,
            clock: None,
            sender,
            receiver,
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedules every note on the audio clock, acquiring the clock first if
    /// needed. Returns `Ok(false)` without scheduling while a pass is running.
    pub fn play(
        &mut self,
        notes: &NoteList,
        resolution: Resolution,
        settings: &SynthSettings,
    ) -> Result<bool> {
        if self.clock.is_none() {
            self.clock = Some(self.backend.acquire()?);
        }
        if self.is_running() {
            return Ok(false);
        }
        let Some(clock) = self.clock.as_ref() else {
            return Ok(false);
        };

        let plan = PassPlan::build(notes, resolution, settings, clock.current_time());
        for tone in &plan.tones {
            clock.schedule_tone(*tone);
        }
        log::debug!(
            "scheduled {} notes at t0={:.3}s, pass ends after {:.3}s",
            plan.tones.len(),
            plan.t0,
            plan.end_offset()
        );

        let is_running = Arc::new(AtomicBool::new(true));
        self.is_running = Arc::clone(&is_running);
        let sender = self.sender.clone();
        let notes: Vec<Note> = notes.iter().copied().collect();
        let seconds_per_step = plan.seconds_per_step;
        let length_steps = plan.length_steps;

        thread::spawn(move || {
            let started = Instant::now();
            let end_offset = length_steps as f64 * seconds_per_step;
            let mut next_step = 0;

            while is_running.load(Ordering::Acquire) {
                let elapsed = started.elapsed().as_secs_f64();
                let due = (elapsed / seconds_per_step) as u32;

                while next_step <= due
                    && next_step < length_steps
                    && is_running.load(Ordering::Acquire)
                {
                    let _ = sender.send(PlaybackEvent::StepAdvanced(next_step));
                    for note in notes.iter().filter(|n| n.end() == next_step) {
                        let _ = sender.send(PlaybackEvent::NoteOff(note.pitch));
                    }
                    for note in notes.iter().filter(|n| n.start == next_step) {
                        let _ = sender.send(PlaybackEvent::NoteOn(note.pitch, NOTE_VELOCITY));
                    }
                    next_step += 1;
                }

                if elapsed >= end_offset {
                    is_running.store(false, Ordering::Release);
                    let _ = sender.send(PlaybackEvent::Finished);
                    break;
                }

                thread::sleep(Duration::from_millis(1));
            }
        });

        Ok(true)
    }

    /// Releases the audio clock, silencing everything still scheduled on it.
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        self.poll_events();
        if self.clock.take().is_some() {
            log::info!("playback stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn has_clock(&self) -> bool {
        self.clock.is_some()
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for PlaybackEngine<CpalBackend> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synth::{Envelope, Waveform};
    use crate::error::Error;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Recorder {
        acquired: Rc<Cell<usize>>,
        released: Rc<Cell<usize>>,
        tones: Rc<RefCell<Vec<ToneEvent>>>,
    }

    struct RecordingClock {
        time: f64,
        recorder: Recorder,
    }

    impl AudioClock for RecordingClock {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn schedule_tone(&self, tone: ToneEvent) {
            self.recorder.tones.borrow_mut().push(tone);
        }
    }

    impl Drop for RecordingClock {
        fn drop(&mut self) {
            let released = &self.recorder.released;
            released.set(released.get() + 1);
        }
    }

    impl AudioBackend for Recorder {
        type Clock = RecordingClock;

        fn acquire(&mut self) -> Result<RecordingClock> {
            self.acquired.set(self.acquired.get() + 1);
            Ok(RecordingClock {
                time: 1.5,
                recorder: self.clone(),
            })
        }
    }

    struct NoDevice;

    impl AudioBackend for NoDevice {
        type Clock = RecordingClock;

        fn acquire(&mut self) -> Result<RecordingClock> {
            Err(Error::NoOutputDevice)
        }
    }

    fn long_notes() -> NoteList {
        let mut notes = NoteList::new();
        notes.add_note(0, 4, 60);
        notes.add_note(60, 40, 64);
        notes
    }

    fn wait_until_finished<B: AudioBackend>(engine: &PlaybackEngine<B>) -> Vec<PlaybackEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        // the transport sends Finished right after clearing the flag
        thread::sleep(Duration::from_millis(20));
        engine.poll_events()
    }

    #[test]
    fn test_single_note_plan() {
        let mut notes = NoteList::new();
        notes.add_note(0, 4, 60);
        let plan = PassPlan::build(
            &notes,
            Resolution::Sixteenth,
            &SynthSettings::default(),
            3.0,
        );
        assert_eq!(plan.seconds_per_step, 0.25);
        assert_eq!(plan.tones.len(), 1);
        let tone = plan.tones[0];
        assert_eq!(tone.start, 3.0);
        assert_eq!(tone.duration, 1.0);
        assert_eq!(tone.frequency, 261.63);
        assert_eq!(plan.end_offset(), 1.5);
    }

    #[test]
    fn test_plan_keeps_insertion_order_and_settings() {
        let mut notes = NoteList::new();
        notes.add_note(8, 1, 61);
        notes.add_note(0, 2, 69);
        let settings = SynthSettings {
            waveform: Waveform::Triangle,
            envelope: Envelope {
                attack: 0.2,
                decay: 0.0,
                sustain: 1.0,
                release: 0.5,
            },
        };
        let plan = PassPlan::build(&notes, Resolution::Eighth, &settings, 0.0);
        assert_eq!(plan.seconds_per_step, 0.125);
        assert_eq!(plan.tones[0].start, 1.0);
        assert_eq!(plan.tones[0].frequency, 440.0);
        assert_eq!(plan.tones[1].start, 0.0);
        assert_eq!(plan.tones[1].duration, 0.25);
        assert!(plan.tones.iter().all(|t| t.waveform == Waveform::Triangle));
        assert!(plan.tones.iter().all(|t| t.envelope == settings.envelope));
        assert_eq!(plan.length_steps, 11);
    }

    #[test]
    fn test_play_twice_schedules_one_pass() {
        let recorder = Recorder::default();
        let mut engine = PlaybackEngine::with_backend(recorder.clone());
        let notes = long_notes();

        assert!(engine
            .play(&notes, Resolution::Sixteenth, &SynthSettings::default())
            .unwrap());
        assert!(!engine
            .play(&notes, Resolution::Sixteenth, &SynthSettings::default())
            .unwrap());

        assert_eq!(recorder.tones.borrow().len(), 2);
        assert_eq!(recorder.acquired.get(), 1);
        assert_eq!(recorder.tones.borrow()[0].start, 1.5);
        engine.stop();
    }

    #[test]
    fn test_stop_releases_clock_and_play_reacquires() {
        let recorder = Recorder::default();
        let mut engine = PlaybackEngine::with_backend(recorder.clone());
        let notes = long_notes();
        let settings = SynthSettings::default();

        engine.play(&notes, Resolution::Sixteenth, &settings).unwrap();
        engine.stop();
        assert!(!engine.is_running());
        assert!(!engine.has_clock());
        assert_eq!(recorder.released.get(), 1);

        assert!(engine.play(&notes, Resolution::Sixteenth, &settings).unwrap());
        assert_eq!(recorder.acquired.get(), 2);
        assert_eq!(recorder.tones.borrow().len(), 4);
        engine.stop();
        assert_eq!(recorder.released.get(), 2);
    }

    #[test]
    fn test_stop_without_clock_is_noop() {
        let recorder = Recorder::default();
        let mut engine = PlaybackEngine::with_backend(recorder.clone());
        engine.stop();
        assert_eq!(recorder.released.get(), 0);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_acquire_failure_is_returned() {
        let mut engine = PlaybackEngine::with_backend(NoDevice);
        let result = engine.play(
            &long_notes(),
            Resolution::Sixteenth,
            &SynthSettings::default(),
        );
        assert!(matches!(result, Err(Error::NoOutputDevice)));
        assert!(!engine.is_running());
        assert!(!engine.has_clock());
    }

    #[test]
    fn test_transport_emits_note_boundaries_and_finishes() {
        let mut engine = PlaybackEngine::with_backend(Recorder::default());
        let mut notes = NoteList::new();
        notes.add_note(0, 1, 60);

        engine
            .play(&notes, Resolution::Quarter, &SynthSettings::default())
            .unwrap();
        let events = wait_until_finished(&engine);

        assert!(!engine.is_running());
        assert_eq!(
            events,
            vec![
                PlaybackEvent::StepAdvanced(0),
                PlaybackEvent::NoteOn(60, NOTE_VELOCITY),
                PlaybackEvent::StepAdvanced(1),
                PlaybackEvent::NoteOff(60),
                PlaybackEvent::StepAdvanced(2),
                PlaybackEvent::Finished,
            ]
        );
        // the clock outlives the pass until stop()
        assert!(engine.has_clock());
    }

    #[test]
    fn test_stop_discards_pending_events() {
        let mut engine = PlaybackEngine::with_backend(Recorder::default());
        let mut notes = NoteList::new();
        notes.add_note(0, 1, 60);

        engine
            .play(&notes, Resolution::Quarter, &SynthSettings::default())
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));

        engine.stop();
        assert!(engine.poll_events().is_empty());
    }

    #[test]
    fn test_play_again_after_pass_finished() {
        let recorder = Recorder::default();
        let mut engine = PlaybackEngine::with_backend(recorder.clone());
        let notes = NoteList::new();
        let settings = SynthSettings::default();

        engine.play(&notes, Resolution::Quarter, &settings).unwrap();
        wait_until_finished(&engine);
        assert!(engine.play(&notes, Resolution::Quarter, &settings).unwrap());
        assert_eq!(recorder.acquired.get(), 1);
        engine.stop();
    }
}
