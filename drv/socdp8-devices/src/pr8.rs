// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The high-speed PR8 paper-tape reader/punch: same two-device shape as
//! [`crate::asr33::Asr33`] but wired to different IOP pulses and a 3 ms
//! per-byte delay (spec.md §4.3). Unlike the ASR-33, both the reader and
//! the punch always log progress; there is no silent text-input mode for
//! this device, so there is nothing to gate the logging on (SPEC_FULL.md
//! §4.3, taken from `PR8.cpp`).

use std::sync::{Arc, Mutex};

use socdp8_hal_api::Platform;
use socdp8_io::{DeviceHandler, IoController};
use socdp8_io_api::{DeviceConfig, DeviceError, IopPulse};

use crate::clock::Clock;
use crate::reader::ReaderState;

pub struct Pr8 {
    reader: Arc<Mutex<ReaderState>>,
}

impl Pr8 {
    pub const READER_DEVICE: u8 = 1;
    pub const PUNCH_DEVICE: u8 = 2;
    pub const READER_DELAY_MS: u64 = 3;
    pub const PUNCH_DELAY_MS: u64 = 3;

    pub fn register<P: Platform + 'static>(
        io: &mut IoController<P>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DeviceError> {
        let reader = Arc::new(Mutex::new(ReaderState::new()));

        io.register_device(
            Self::READER_DEVICE,
            DeviceConfig {
                iop_for_skip_flag: IopPulse::Iop1,
                iop_for_ac_load: IopPulse::Iop2,
                iop_for_flag_clear: IopPulse::Iop2,
                iop_for_interrupt: IopPulse::Iop4,
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

        Ok(Pr8 { reader })
    }

    pub fn set_reader_input(&self, data: Vec<u8>) {
        self.reader.lock().unwrap().install_bytes(data, true);
    }

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
            if now.saturating_sub(last) < Pr8::READER_DELAY_MS {
                return;
            }
        }
        if state.pos >= state.buffer.len() {
            return;
        }
        let byte = state.buffer[state.pos];
        if io.write_device_register(Pr8::READER_DEVICE, byte as u16).is_err() {
            return;
        }
        state.pos += 1;
        state.last_delivered_at = Some(now);
        println!("PR8-Read {} / {}", state.pos, state.buffer.len());
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
            if now.saturating_sub(last) < Pr8::PUNCH_DELAY_MS {
                return;
            }
        }
        let Ok((data, has_new_data)) = io.read_device_register(Pr8::PUNCH_DEVICE) else {
            return;
        };
        if !has_new_data {
            return;
        }
        let c = (data & 0x7F) as u8 as char;
        if io.write_device_register(Pr8::PUNCH_DEVICE, 0).is_err() {
            return;
        }
        self.last_accepted_at = Some(now);
        println!("PR8-Punch '{c}'");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use socdp8_hal_api::MemPlatform;

    fn fabric_deliver<P: Platform>(io: &mut IoController<P>, device: u8, word: u16) {
        io.platform_mut().poke_io(
            device as u32,
            io.platform().peek_io(device as u32) & !0x0FFF | (word as u32 & 0x0FFF)
                | (1 << socdp8_io_api::NEW_DATA_BIT),
        );
    }

    #[test]
    fn reader_delivers_at_three_millisecond_rate() {
        let clock = Arc::new(VirtualClock::new());
        let mut ctrl = IoController::new(MemPlatform::new());
        let pr8 = Pr8::register(&mut ctrl, clock.clone()).unwrap();
        pr8.set_reader_input(vec![0o001, 0o002]);

        ctrl.check_devices();
        assert_eq!(ctrl.read_device_register(Pr8::READER_DEVICE).unwrap().0, 0o001);

        clock.set_ms(1);
        ctrl.check_devices();
        assert_eq!(ctrl.read_device_register(Pr8::READER_DEVICE).unwrap().0, 0o001);

        clock.set_ms(4);
        ctrl.check_devices();
        assert_eq!(ctrl.read_device_register(Pr8::READER_DEVICE).unwrap().0, 0o002);
    }

    #[test]
    fn punch_resets_register_after_accepting() {
        let clock = Arc::new(VirtualClock::new());
        let mut ctrl = IoController::new(MemPlatform::new());
        Pr8::register(&mut ctrl, clock.clone()).unwrap();

        fabric_deliver(&mut ctrl, Pr8::PUNCH_DEVICE, 0o101);
        ctrl.check_devices();
        assert_eq!(ctrl.read_device_register(Pr8::PUNCH_DEVICE).unwrap().0, 0);
    }

    #[test]
    fn clear_resets_buffer_and_flags() {
        let clock = Arc::new(VirtualClock::new());
        let mut ctrl = IoController::new(MemPlatform::new());
        let pr8 = Pr8::register(&mut ctrl, clock).unwrap();
        pr8.set_reader_input(vec![1, 2, 3]);
        pr8.clear(&mut ctrl).unwrap();
        assert_eq!(pr8.reader.lock().unwrap().pos, 0);
        assert_eq!(ctrl.platform().peek_io(0), Pr8::PUNCH_DEVICE as u32);
    }
}
