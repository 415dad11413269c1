#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use pianoroll::{
    constants::{CELL_WIDTH, FIXED_PITCH, ROW_HEIGHT},
    export, midi_note_name, MidiOutputDevice, PianoRoll, PlaybackEngine, PlaybackEvent,
    Resolution, SynthSettings, Waveform,
};

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 420.0])
            .with_title("Piano Roll"),
        ..Default::default()
    };

    eframe::run_native(
        "pianoroll",
        options,
        Box::new(|_cc| Ok(Box::new(PianoRollApp::new()))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    env_logger::init();
    log::error!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
struct PianoRollApp {
    roll: PianoRoll,
    settings: SynthSettings,
    playback_engine: PlaybackEngine,
    midi_output: MidiOutputDevice,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    playhead: Option<u32>,
    notice: Option<String>,
}

#[cfg(feature = "gui")]
impl PianoRollApp {
    fn new() -> Self {
        Self {
            roll: PianoRoll::default(),
            settings: SynthSettings::default(),
            playback_engine: PlaybackEngine::new(),
            midi_output: MidiOutputDevice::new(),
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
            playhead: None,
            notice: None,
        }
    }

    fn handle_playback_events(&mut self) {
        for event in self.playback_engine.poll_events() {
            let sent = match event {
                PlaybackEvent::StepAdvanced(step) => {
                    if self.playback_engine.is_running() {
                        self.playhead = Some(step);
                    }
                    Ok(())
                }
                PlaybackEvent::NoteOn(note, velocity) => {
                    self.midi_output.send_note_on(note, velocity)
                }
                PlaybackEvent::NoteOff(note) => self.midi_output.send_note_off(note),
                PlaybackEvent::Finished => {
                    self.playhead = None;
                    Ok(())
                }
            };
            if let Err(e) = sent {
                log::warn!("{}", e);
            }
        }
    }

    fn start_playback(&mut self) {
        let result = self.playback_engine.play(
            self.roll.notes(),
            self.roll.resolution(),
            &self.settings,
        );
        if let Err(e) = result {
            log::error!("playback failed: {}", e);
            self.notice = Some(e.to_string());
        }
    }

    fn stop_playback(&mut self) {
        self.playback_engine.stop();
        self.playhead = None;
        if let Err(e) = self.midi_output.send_all_notes_off() {
            log::warn!("{}", e);
        }
    }

    fn show_transport(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("▶ Play").clicked() {
                self.start_playback();
            }
            if ui.button("⏹ Stop").clicked() {
                self.stop_playback();
            }

            ui.add_space(20.0);

            let mut resolution = self.roll.resolution();
            egui::ComboBox::from_label("Grid resolution")
                .selected_text(resolution.to_string())
                .show_ui(ui, |ui| {
                    for option in Resolution::ALL {
                        ui.selectable_value(&mut resolution, option, option.to_string());
                    }
                });
            if let Err(e) = self.roll.set_resolution(resolution) {
                self.notice = Some(e.to_string());
            }

            ui.add_space(20.0);

            egui::ComboBox::from_label("Waveform")
                .selected_text(self.settings.waveform.to_string())
                .show_ui(ui, |ui| {
                    for option in Waveform::ALL {
                        ui.selectable_value(
                            &mut self.settings.waveform,
                            option,
                            option.to_string(),
                        );
                    }
                });

            ui.add_space(20.0);

            if ui.button("Export").clicked() {
                if let Err(e) = export(self.roll.notes()) {
                    self.notice = Some(e.to_string());
                }
            }
        });

        ui.horizontal(|ui| {
            let envelope = &mut self.settings.envelope;
            ui.add(egui::Slider::new(&mut envelope.attack, 0.0..=2.0).text("Attack").suffix(" s"));
            ui.add(egui::Slider::new(&mut envelope.decay, 0.0..=2.0).text("Decay").suffix(" s"));
            ui.add(egui::Slider::new(&mut envelope.sustain, 0.0..=1.0).text("Sustain"));
            ui.add(egui::Slider::new(&mut envelope.release, 0.0..=3.0).text("Release").suffix(" s"));
        });
    }

    fn show_midi_ports(&mut self, ui: &mut egui::Ui) {
        let mut selected_port_changed = None;
        ui.horizontal(|ui| {
            ui.label("MIDI Output:");
            if self.available_midi_ports.is_empty() {
                ui.label("No MIDI ports available");
            } else {
                egui::ComboBox::from_id_source("midi_port")
                    .selected_text(
                        self.selected_port
                            .and_then(|i| self.available_midi_ports.get(i))
                            .map(String::as_str)
                            .unwrap_or("Select port..."),
                    )
                    .show_ui(ui, |ui| {
                        for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                            if ui
                                .selectable_label(self.selected_port == Some(i), port_name)
                                .clicked()
                            {
                                selected_port_changed = Some(i);
                            }
                        }
                    });
            }
        });

        if let Some(port_idx) = selected_port_changed {
            match self.midi_output.connect(port_idx) {
                Ok(()) => self.selected_port = Some(port_idx),
                Err(e) => self.notice = Some(e.to_string()),
            }
        }
    }

    fn show_grid(&mut self, ui: &mut egui::Ui) {
        let layout = self.roll.layout();
        let size = egui::vec2(
            layout.columns() as f32 * CELL_WIDTH,
            layout.rows() as f32 * ROW_HEIGHT,
        );
        let (response, painter) = ui.allocate_painter(size, egui::Sense::click_and_drag());
        let origin = response.rect.min;

        let step_at = |pos: egui::Pos2| -> Option<u32> {
            let local = pos - origin;
            if local.x < 0.0 || local.y < 0.0 {
                return None;
            }
            layout.step_at(
                (local.x / CELL_WIDTH) as u32,
                (local.y / ROW_HEIGHT) as u32,
            )
        };
        let cell_rect = |column: u32, row: u32, len: u32| {
            egui::Rect::from_min_size(
                origin + egui::vec2(column as f32 * CELL_WIDTH, row as f32 * ROW_HEIGHT),
                egui::vec2(len as f32 * CELL_WIDTH, ROW_HEIGHT),
            )
        };

        // Pointer handling: a press on a note starts a resize that lives
        // until release; a plain click on an empty cell places a note.
        if response.drag_started() {
            if let Some(press) = ui.input(|i| i.pointer.press_origin()) {
                if let Some(step) = step_at(press) {
                    self.roll.begin_resize(step, press.x);
                }
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.roll.drag_resize(pos.x);
            }
        }
        if response.drag_stopped() {
            self.roll.end_resize();
        }
        if response.clicked() {
            if let Some(step) = response.interact_pointer_pos().and_then(step_at) {
                self.roll.click_cell(step);
            }
        }

        let grid_line = ui.visuals().widgets.noninteractive.bg_stroke;
        for step in 0..layout.time_steps() {
            let Some((column, row)) = layout.cell_position(step) else {
                continue;
            };
            let rect = cell_rect(column, row, 1);
            if self.playhead == Some(step) {
                painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(100, 200, 100));
            } else if step % layout.resolution().steps_per_unit() == 0 {
                painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(40, 40, 40));
            } else {
                painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(30, 30, 30));
            }
            painter.rect_stroke(rect, 0.0, grid_line);
        }

        for note in self.roll.notes() {
            let resizing = self
                .roll
                .active_gesture()
                .is_some_and(|g| g.targets(note));
            let fill = if resizing {
                egui::Color32::from_rgb(120, 120, 240)
            } else {
                egui::Color32::from_rgb(60, 60, 200)
            };
            for span in layout.spans(note.start, self.roll.displayed_duration(note)) {
                let rect = cell_rect(span.column, span.row, span.len).shrink(2.0);
                painter.rect_filled(rect, 3.0, fill);
            }
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for PianoRollApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Piano Roll");
            ui.add_space(10.0);

            self.show_midi_ports(ui);
            ui.add_space(10.0);

            self.show_transport(ui);
            ui.add_space(10.0);

            egui::ScrollArea::horizontal().show(ui, |ui| {
                self.show_grid(ui);
            });

            // Info
            ui.separator();
            ui.label(format!(
                "Click a cell to place a {} note, drag a note to resize it",
                midi_note_name(FIXED_PITCH)
            ));
            if let Some(notice) = &self.notice {
                ui.colored_label(egui::Color32::YELLOW, format!("⚠ {}", notice));
            }
        });
    }
}
