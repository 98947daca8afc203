// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The slow ASR-33 teletype: a ten-characters-per-second reader and
//! punch sharing one device object (spec.md §4.2).

use std::io::Write;
use std::sync::{Arc, Mutex};

use socdp8_hal_api::Platform;
use socdp8_io::{DeviceHandler, IoController};
use socdp8_io_api::{DeviceConfig, DeviceError, IopPulse};

use crate::clock::Clock;
use crate::reader::{text_to_asr33_bytes, ReaderState};

/// Owns the reader's registration with the I/O controller and its
/// buffer/cursor state; the punch side is stateless beyond its own
/// rate-limit timestamp, which lives inside [`PunchHandler`].
pub struct Asr33 {
    reader: Arc<Mutex<ReaderState>>,
}

impl Asr33 {
    pub const READER_DEVICE: u8 = 3;
    pub const PUNCH_DEVICE: u8 = 4;
    pub const READER_DELAY_MS: u64 = 100;
    pub const PUNCH_DELAY_MS: u64 = 100;

    /// Registers both the reader and punch devices with `io` and returns
    /// a handle for installing input and clearing state from the shell.
    pub fn register<P: Platform + 'static>(
        io: &mut IoController<P>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DeviceError> {
        let reader = Arc::new(Mutex::new(ReaderState::new()));

        io.register_device(
            Self::READER_DEVICE,
            DeviceConfig {
                iop_for_skip_flag: IopPulse::Iop1,
                iop_for_ac_clear: IopPulse::Iop2,
                iop_for_flag_clear: IopPulse::Iop2,
                iop_for_interrupt: IopPulse::Iop2,
                iop_for_ac_load: IopPulse::Iop4,
                set_flag_on_write: true,
                ..Default::default()
            },
            Box::new(ReaderHandler {
                state: reader.clone(),
                clock: clock.clone(),
            }),
        )?;

        io.register_device(
            Self::PUNCH_DEVICE,
            DeviceConfig {
                iop_for_skip_flag: IopPulse::Iop1,
                iop_for_flag_clear: IopPulse::Iop2,
                iop_for_interrupt: IopPulse::Iop2,
                iop_for_register_load: IopPulse::Iop4,
                set_flag_on_write: true,
                ..Default::default()
            },
            Box::new(PunchHandler {
                last_accepted_at: None,
                clock: clock.clone(),
            }),
        )?;

        Ok(Asr33 { reader })
    }

    /// Installs a raw byte buffer verbatim (shell's `load low <path>`).
    pub fn set_reader_input(&self, data: Vec<u8>) {
        self.reader.lock().unwrap().install_bytes(data, true);
    }

    /// Uppercases `input`, sets the high bit on each byte, and installs it
    /// (shell's `input` command); progress lines are suppressed for text
    /// input, matching the original.
    pub fn set_string_input(&self, input: &str) {
        self.reader
            .lock()
            .unwrap()
            .install_bytes(text_to_asr33_bytes(input), false);
    }

    /// Empties the reader buffer and clears both devices' fabric flags.
    pub fn clear<P: Platform>(&self, io: &mut IoController<P>) -> Result<(), DeviceError> {
        self.reader.lock().unwrap().clear();
        io.clear_device_flag(Self::READER_DEVICE)?;
        io.clear_device_flag(Self::PUNCH_DEVICE)?;
        Ok(())
    }
}

struct ReaderHandler {
    state: Arc<Mutex<ReaderState>>,
    clock: Arc<dyn Clock>,
}

impl<P: Platform> DeviceHandler<P> for ReaderHandler {
    fn on_flag_unset(&mut self, io: &mut IoController<P>) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock().unwrap();
        if let Some(last) = state.last_delivered_at {
            if now.saturating_sub(last) < Asr33::READER_DELAY_MS {
                return;
            }
        }
        if state.pos >= state.buffer.len() {
            return;
        }
        let byte = state.buffer[state.pos];
        if io.write_device_register(Asr33::READER_DEVICE, byte as u16).is_err() {
            return;
        }
        state.pos += 1;
        state.last_delivered_at = Some(now);
        if state.show_progress {
            println!("ASR33-Read {} / {}", state.pos, state.buffer.len());
        }
    }
}

struct PunchHandler {
    last_accepted_at: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl<P: Platform> DeviceHandler<P> for PunchHandler {
    fn on_flag_unset(&mut self, io: &mut IoController<P>) {
        let now = self.clock.now_ms();
        if let Some(last) = self.last_accepted_at {
            if now.saturating_sub(last) < Asr33::PUNCH_DELAY_MS {
                return;
            }
        }
        let Ok((data, has_new_data)) = io.read_device_register(Asr33::PUNCH_DEVICE) else {
            return;
        };
        if !has_new_data {
            return;
        }
        let c = (data & 0x7F) as u8 as char;
        if io.write_device_register(Asr33::PUNCH_DEVICE, 0).is_err() {
            return;
        }
        self.last_accepted_at = Some(now);
        print!("{c}");
        let _ = std::io::stdout().flush();
    }
}
