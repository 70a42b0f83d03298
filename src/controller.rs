// src/controller.rs

use std::fmt::Write as FmtWrite;
use std::io::{Write, stdout};

use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};

use crate::audio_runtime::LooperRuntime;
use crate::engine::{TrackId, TrackState};
use crate::session::{SessionEvent, TrackSnapshot};
use crate::waveform::Peaks;
use crate::waveform::terminal::{meter_bar, render_ascii};

const SCOPE_COLS: usize = 96;
const SCOPE_ROWS: usize = 12;
const VOLUME_STEP: f32 = 0.05;

/// Keyboard front end over a `LooperRuntime`. Everything acts on the
/// active track except `space`, which drives the whole session.
pub struct LooperController {
    runtime: LooperRuntime,
    draw_buffer: String,
    last_event: Option<String>,
}

impl LooperController {
    pub fn new(runtime: LooperRuntime) -> Self {
        Self {
            runtime,
            draw_buffer: String::with_capacity(16 * 1024),
            last_event: None,
        }
    }

    pub fn should_quit(&self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        matches!(key, KeyCode::Char('q') | KeyCode::Esc)
            || (key == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL))
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('a') => {
                self.runtime.add_track();
            }
            KeyCode::Char('x') => {
                if let Some(id) = self.runtime.active() {
                    self.runtime.remove_track(id);
                }
            }
            KeyCode::Char(c @ '1'..='4') => {
                let slot = c as usize - '1' as usize;
                if let Some(t) = self.runtime.tracks().get(slot) {
                    self.runtime.set_active(t.id);
                }
            }
            KeyCode::Char('r') => self.toggle_record(),
            KeyCode::Char('p') => self.toggle_play(),
            KeyCode::Char(' ') => {
                let any_playing = self.runtime.tracks().iter().any(|t| t.state == TrackState::Playing);
                if any_playing {
                    self.runtime.stop_all();
                } else {
                    self.runtime.play_all();
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => self.nudge_volume(VOLUME_STEP),
            KeyCode::Char('-') | KeyCode::Down => self.nudge_volume(-VOLUME_STEP),
            _ => {}
        }
    }

    fn active_track(&self) -> Option<TrackSnapshot> {
        self.runtime.track(self.runtime.active()?)
    }

    fn toggle_record(&mut self) {
        let Some(track) = self.active_track() else {
            return;
        };
        let res = if track.state == TrackState::Recording {
            self.runtime.stop_recording(track.id)
        } else {
            self.runtime.start_recording(track.id)
        };
        if let Err(e) = res {
            self.last_event = Some(e.to_string());
        }
    }

    fn toggle_play(&mut self) {
        let Some(track) = self.active_track() else {
            return;
        };
        let res = if track.state == TrackState::Playing {
            self.runtime.stop(track.id)
        } else {
            self.runtime.play(track.id)
        };
        if let Err(e) = res {
            self.last_event = Some(e.to_string());
        }
    }

    fn nudge_volume(&mut self, delta: f32) {
        if let Some(id) = self.runtime.active() {
            self.runtime.adjust_volume(id, delta);
        }
    }

    /// Apply finished decodes and redraw.
    pub fn run_tick(&mut self) -> anyhow::Result<()> {
        for ev in self.runtime.poll() {
            self.last_event = Some(match ev {
                SessionEvent::RecordingReady { track, frames } => {
                    format!("track {track}: {frames} frames ready")
                }
                SessionEvent::RecordingFailed { track, error } => format!("track {track}: {error}"),
            });
        }
        self.draw()
    }

    fn draw(&mut self) -> anyhow::Result<()> {
        self.draw_buffer.clear();
        let reading = self.runtime.tap().read();
        let peaks = Peaks::from_mono(&reading.waveform, SCOPE_COLS);

        let _ = write!(self.draw_buffer, "{}{}", MoveTo(0, 0), Clear(ClearType::All));
        let _ = write!(
            self.draw_buffer,
            "LOOPER  [a]dd [x]remove [1-4]select [r]ec [p]lay [space]all [+/-]vol [q]uit\r\n\r\n"
        );

        if peaks.is_empty() {
            for _ in 0..SCOPE_ROWS {
                let _ = write!(self.draw_buffer, "\r\n");
            }
        } else {
            for line in render_ascii(&peaks, SCOPE_ROWS) {
                let _ = write!(self.draw_buffer, "{line}\r\n");
            }
        }

        let _ = write!(
            self.draw_buffer,
            "\r\nL {} {:5.2}\r\nR {} {:5.2}\r\n\r\n",
            meter_bar(reading.peak_l, 40),
            reading.rms_l,
            meter_bar(reading.peak_r, 40),
            reading.rms_r
        );

        let tracks = self.runtime.tracks();
        for (slot, t) in tracks.iter().enumerate() {
            self.draw_track_row(slot, t);
        }
        if tracks.is_empty() {
            let _ = write!(self.draw_buffer, "  (no tracks, press a)\r\n");
        }

        let _ = write!(self.draw_buffer, "\r\n{}", self.runtime.status());
        if let Some(ev) = &self.last_event {
            let _ = write!(self.draw_buffer, " | {ev}");
        }

        let mut stdout = stdout();
        execute!(stdout, BeginSynchronizedUpdate)?;
        stdout.write_all(self.draw_buffer.as_bytes())?;
        execute!(stdout, EndSynchronizedUpdate)?;
        stdout.flush()?;
        Ok(())
    }

    fn draw_track_row(&mut self, slot: usize, t: &TrackSnapshot) {
        let marker = if t.is_active { '>' } else { ' ' };
        let state = if t.decoding { "Processing" } else { t.state.label() };
        let _ = write!(
            self.draw_buffer,
            "{marker} {} Track {:<2} {:<10} vol {:>3.0}% {}",
            slot + 1,
            t.id,
            state,
            t.volume * 100.0,
            meter_bar(t.volume, 10),
        );

        if t.state == TrackState::Recording && !t.decoding {
            if let Some(rec) = self.runtime.capture_progress(t.id) {
                let _ = write!(
                    self.draw_buffer,
                    "  REC {:5.1}s {:>8} fr @{} Hz",
                    rec.elapsed.as_secs_f32(),
                    rec.frames,
                    rec.format.sample_rate
                );
            }
        } else if t.has_buffer {
            let _ = write!(self.draw_buffer, "  {:5.2}s", t.buffer_secs);
        }

        if let Some(pos) = self.position(t.id) {
            let _ = write!(self.draw_buffer, "  loop {}", pos);
        }
        let _ = write!(self.draw_buffer, "\r\n");
    }

    fn position(&self, id: TrackId) -> Option<String> {
        let pos = self.runtime.node_position(id)?;
        Some(format!("#{} @{}", pos.wraps + 1, pos.frame))
    }
}
