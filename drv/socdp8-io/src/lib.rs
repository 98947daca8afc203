// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The I/O controller: the broker between fabric device-flag transitions
//! and firmware-side device logic. Owns the device table and the single
//! platform handle, and runs the flag-dispatch sweep that device
//! emulations are driven by.

use std::collections::BTreeMap;

use socdp8_hal_api::Platform;
use socdp8_io_api::{DeviceConfig, DeviceError, ADDR_FLAGS_HIGH, ADDR_FLAGS_LOW, RESERVED_DEVICE};

/// Records the device number passed to [`IoController::register_device`];
/// inspectable via the shell's ring buffer dump.
ringbuf::ringbuf!(REGISTRATIONS, u8, 64, 0);

/// Snapshot of every device registration recorded so far, oldest first.
/// Backs the shell's `debug ringbuf` command.
pub fn registrations_snapshot() -> Vec<ringbuf::RingbufEntry<u8>> {
    REGISTRATIONS.snapshot()
}

/// A device's flag-driven behavior, value-moved into the controller's
/// device table at registration time. Receiving `&mut IoController<P>`
/// rather than capturing a shared handle to it means a callback can issue
/// register I/O against any device, including its own, without taking a
/// second lock on anything the controller's own owner might be holding.
///
/// Both methods default to doing nothing, since most devices (see §4.2,
/// §4.3) bind only one of the two.
pub trait DeviceHandler<P: Platform>: Send {
    fn on_flag_set(&mut self, _io: &mut IoController<P>) {}
    fn on_flag_unset(&mut self, _io: &mut IoController<P>) {}
}

struct DeviceEntry<P: Platform> {
    config: DeviceConfig,
    handler: Option<Box<dyn DeviceHandler<P>>>,
}

/// Owns the I/O register file on behalf of every registered virtual
/// device. One controller exists per process; device emulations register
/// a [`DeviceHandler`] with it and are driven entirely through
/// [`check_devices`](Self::check_devices).
pub struct IoController<P: Platform> {
    platform: P,
    devices: BTreeMap<u8, DeviceEntry<P>>,
}

impl<P: Platform> IoController<P> {
    /// Bounded timeout the worker's wake-wait uses as a safety tick
    /// independent of fabric interrupts (spec.md §4.1 gives a 5-10 ms
    /// range; the original hardcodes 10, see DESIGN.md).
    pub const TASK_DELAY_MS: u64 = 10;

    pub fn new(platform: P) -> Self {
        IoController {
            platform,
            devices: BTreeMap::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Stores `config` under `device` and writes the packed configuration
    /// word to the fabric register for that device. Overwrites any prior
    /// registration for the same number.
    pub fn register_device(
        &mut self,
        device: u8,
        config: DeviceConfig,
        handler: Box<dyn DeviceHandler<P>>,
    ) -> Result<(), DeviceError> {
        if device == RESERVED_DEVICE {
            return Err(DeviceError::ReservedDevice);
        }
        self.platform.poke_io(device as u32, config.pack());
        self.devices.insert(
            device,
            DeviceEntry {
                config,
                handler: Some(handler),
            },
        );
        ringbuf::ringbuf_entry!(REGISTRATIONS, device);
        Ok(())
    }

    /// Returns a previously registered device's configuration, e.g. for a
    /// device-inspection command.
    pub fn device_config(&self, device: u8) -> Result<DeviceConfig, DeviceError> {
        self.known(device)?;
        Ok(self.devices[&device].config)
    }

    /// Device numbers with a registered handler, ascending.
    pub fn registered_devices(&self) -> Vec<u8> {
        self.devices.keys().copied().collect()
    }

    /// Clears bits [11:0] and bit 27 of the device's register, then ORs
    /// in the low 12 bits of `data` and writes the result back.
    pub fn write_device_register(&mut self, device: u8, data: u16) -> Result<(), DeviceError> {
        self.known(device)?;
        let current = self.platform.peek_io(device as u32);
        let cleared = current & !0x0FFF & !(1 << socdp8_io_api::NEW_DATA_BIT);
        self.platform
            .poke_io(device as u32, cleared | (data as u32 & 0x0FFF));
        Ok(())
    }

    /// Returns the 12-bit data word and whether bit 27 ("new data") is set.
    pub fn read_device_register(&self, device: u8) -> Result<(u16, bool), DeviceError> {
        self.known(device)?;
        let word = self.platform.peek_io(device as u32);
        let data = (word & 0x0FFF) as u16;
        let new_data = (word >> socdp8_io_api::NEW_DATA_BIT) & 1 != 0;
        Ok((data, new_data))
    }

    /// Writes `device` to fabric's flag-clear register at offset 0.
    pub fn clear_device_flag(&mut self, device: u8) -> Result<(), DeviceError> {
        self.known(device)?;
        self.platform.poke_io(0, device as u32);
        Ok(())
    }

    fn known(&self, device: u8) -> Result<(), DeviceError> {
        if self.devices.contains_key(&device) {
            Ok(())
        } else {
            Err(DeviceError::UnknownDevice(device))
        }
    }

    /// One pass of the flag-dispatch sweep: reads both halves of the
    /// 64-bit flag bitmap, then for every registered device (ascending
    /// order) invokes `on_flag_set` or `on_flag_unset` depending on
    /// whether that device's bit is set.
    ///
    /// Only the handler is pulled out of its entry for the duration of its
    /// own callback, so it can be handed `&mut self` without aliasing its
    /// own `Box`; the entry itself (and its config) stays in the table the
    /// whole time, so register I/O the callback issues against its own
    /// device number still finds it registered.
    pub fn check_devices(&mut self) {
        let low = self.platform.peek_io(ADDR_FLAGS_LOW) as u64;
        let high = self.platform.peek_io(ADDR_FLAGS_HIGH) as u64;
        let bitmap = low | (high << 32);

        let device_nums: Vec<u8> = self.devices.keys().copied().collect();
        for device in device_nums {
            let Some(mut handler) = self.devices.get_mut(&device).and_then(|e| e.handler.take())
            else {
                continue;
            };
            let flag_set = (bitmap >> device) & 1 != 0;
            if flag_set {
                handler.on_flag_set(self);
            } else {
                handler.on_flag_unset(self);
            }
            if let Some(entry) = self.devices.get_mut(&device) {
                entry.handler = Some(handler);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socdp8_hal_api::MemPlatform;
    use socdp8_io_api::IopPulse;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn register_device_writes_packed_word() {
        let mut ctrl = IoController::new(MemPlatform::new());
        let cfg = DeviceConfig {
            iop_for_ac_load: IopPulse::Iop4,
            set_flag_on_write: true,
            ..Default::default()
        };
        ctrl.register_device(3, cfg, Box::new(NullHandler))
            .unwrap();
        assert_eq!(ctrl.platform().peek_io(3), 0x0010_1000);
    }

    #[test]
    fn register_device_zero_is_rejected() {
        let mut ctrl = IoController::new(MemPlatform::new());
        let err = ctrl
            .register_device(0, DeviceConfig::default(), Box::new(NullHandler))
            .unwrap_err();
        assert_eq!(err, DeviceError::ReservedDevice);
    }

    #[test]
    fn write_then_read_masks_to_twelve_bits() {
        let mut ctrl = IoController::new(MemPlatform::new());
        ctrl.register_device(5, DeviceConfig::default(), Box::new(NullHandler))
            .unwrap();
        ctrl.write_device_register(5, 0xFFFF).unwrap();
        let (data, new_data) = ctrl.read_device_register(5).unwrap();
        assert_eq!(data, 0x0FFF);
        assert!(!new_data);
    }

    #[test]
    fn write_preserves_config_bits_and_clears_status() {
        let mut ctrl = IoController::new(MemPlatform::new());
        let cfg = DeviceConfig {
            iop_for_ac_load: IopPulse::Iop4,
            set_flag_on_write: true,
            ..Default::default()
        };
        ctrl.register_device(3, cfg, Box::new(NullHandler))
            .unwrap();
        // Simulate fabric raising the "new data" status bit out of band.
        let word = ctrl.platform().peek_io(3);
        ctrl.platform_mut()
            .poke_io(3, word | (1 << socdp8_io_api::NEW_DATA_BIT));

        ctrl.write_device_register(3, 0x0AB).unwrap();
        let after = ctrl.platform().peek_io(3);
        assert_eq!(after & 0x0FFF, 0x0AB);
        assert_eq!(after & (1 << socdp8_io_api::NEW_DATA_BIT), 0);
        assert_eq!(after & 0x0010_0000, 0x0010_0000); // config bit untouched
    }

    #[test]
    fn read_reports_new_data_bit() {
        let mut ctrl = IoController::new(MemPlatform::new());
        ctrl.register_device(2, DeviceConfig::default(), Box::new(NullHandler))
            .unwrap();
        ctrl.platform_mut()
            .poke_io(2, 0x0AB | (1 << socdp8_io_api::NEW_DATA_BIT));
        let (data, new_data) = ctrl.read_device_register(2).unwrap();
        assert_eq!(data, 0x0AB);
        assert!(new_data);
    }

    #[test]
    fn device_config_and_registered_devices_are_queryable() {
        let mut ctrl = IoController::new(MemPlatform::new());
        let cfg = DeviceConfig {
            iop_for_ac_load: IopPulse::Iop4,
            set_flag_on_write: true,
            ..Default::default()
        };
        ctrl.register_device(3, cfg, Box::new(NullHandler)).unwrap();
        ctrl.register_device(5, DeviceConfig::default(), Box::new(NullHandler))
            .unwrap();

        assert_eq!(ctrl.device_config(3).unwrap(), cfg);
        assert_eq!(ctrl.registered_devices(), vec![3, 5]);
        assert_eq!(
            ctrl.device_config(9).unwrap_err(),
            DeviceError::UnknownDevice(9)
        );
    }

    #[test]
    fn clear_flag_writes_device_number_to_offset_zero() {
        let mut ctrl = IoController::new(MemPlatform::new());
        ctrl.register_device(7, DeviceConfig::default(), Box::new(NullHandler))
            .unwrap();
        ctrl.clear_device_flag(7).unwrap();
        assert_eq!(ctrl.platform().peek_io(0), 7);
    }

    #[test]
    fn unknown_device_operations_error() {
        let ctrl = IoController::new(MemPlatform::new());
        assert_eq!(
            ctrl.read_device_register(9).unwrap_err(),
            DeviceError::UnknownDevice(9)
        );
    }

    struct NullHandler;
    impl DeviceHandler<MemPlatform> for NullHandler {}

    struct CountingHandler {
        set_count: Arc<AtomicU32>,
        unset_count: Arc<AtomicU32>,
    }

    impl DeviceHandler<MemPlatform> for CountingHandler {
        fn on_flag_set(&mut self, _io: &mut IoController<MemPlatform>) {
            self.set_count.fetch_add(1, Ordering::SeqCst);
        }
        fn on_flag_unset(&mut self, _io: &mut IoController<MemPlatform>) {
            self.unset_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// S4: flag bitmap with only device 1 set, devices 1 and 2 registered.
    #[test]
    fn sweep_dispatches_flag_set_and_unset_exactly_once() {
        let mut ctrl = IoController::new(MemPlatform::new());
        let set_count = Arc::new(AtomicU32::new(0));
        let unset_count = Arc::new(AtomicU32::new(0));
        let other_set = Arc::new(AtomicU32::new(0));
        let other_unset = Arc::new(AtomicU32::new(0));

        ctrl.register_device(
            1,
            DeviceConfig::default(),
            Box::new(CountingHandler {
                set_count: set_count.clone(),
                unset_count: other_unset.clone(),
            }),
        )
        .unwrap();

        ctrl.register_device(
            2,
            DeviceConfig::default(),
            Box::new(CountingHandler {
                set_count: other_set.clone(),
                unset_count: unset_count.clone(),
            }),
        )
        .unwrap();

        ctrl.platform_mut().poke_io(ADDR_FLAGS_LOW, 0b010);
        ctrl.platform_mut().poke_io(ADDR_FLAGS_HIGH, 0);
        ctrl.check_devices();

        assert_eq!(set_count.load(Ordering::SeqCst), 1);
        assert_eq!(unset_count.load(Ordering::SeqCst), 1);
        assert_eq!(other_set.load(Ordering::SeqCst), 0);
        assert_eq!(other_unset.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sweep_visits_devices_in_ascending_order() {
        struct OrderRecorder {
            device: u8,
            order: Arc<Mutex<Vec<u8>>>,
        }
        impl DeviceHandler<MemPlatform> for OrderRecorder {
            fn on_flag_unset(&mut self, _io: &mut IoController<MemPlatform>) {
                self.order.lock().unwrap().push(self.device);
            }
        }

        let mut ctrl = IoController::new(MemPlatform::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        for device in [5u8, 1, 3] {
            ctrl.register_device(
                device,
                DeviceConfig::default(),
                Box::new(OrderRecorder {
                    device,
                    order: order.clone(),
                }),
            )
            .unwrap();
        }

        ctrl.check_devices();
        assert_eq!(*order.lock().unwrap(), vec![1, 3, 5]);
    }

    /// A callback that issues register I/O against its own device,
    /// exercising the "no re-entrant lock" property of passing `&mut
    /// IoController` directly rather than a shared handle.
    #[test]
    fn callback_can_write_its_own_register() {
        struct SelfWriter {
            device: u8,
        }
        impl DeviceHandler<MemPlatform> for SelfWriter {
            fn on_flag_unset(&mut self, io: &mut IoController<MemPlatform>) {
                io.write_device_register(self.device, 0o123).unwrap();
            }
        }

        let mut ctrl = IoController::new(MemPlatform::new());
        ctrl.register_device(4, DeviceConfig::default(), Box::new(SelfWriter { device: 4 }))
            .unwrap();
        ctrl.check_devices();
        assert_eq!(ctrl.read_device_register(4).unwrap().0, 0o123);
    }

    /// Same as `callback_can_write_its_own_register` but for the
    /// read-then-write shape a punch handler uses: the device must still
    /// be known to the controller mid-callback, or this would error out
    /// and silently drop every accepted byte.
    #[test]
    fn callback_can_read_then_write_its_own_register() {
        struct SelfReadWriter {
            device: u8,
        }
        impl DeviceHandler<MemPlatform> for SelfReadWriter {
            fn on_flag_unset(&mut self, io: &mut IoController<MemPlatform>) {
                let (data, _) = io.read_device_register(self.device).unwrap();
                io.write_device_register(self.device, data + 1).unwrap();
            }
        }

        let mut ctrl = IoController::new(MemPlatform::new());
        ctrl.register_device(6, DeviceConfig::default(), Box::new(SelfReadWriter { device: 6 }))
            .unwrap();
        ctrl.write_device_register(6, 0o10).unwrap();
        ctrl.check_devices();
        assert_eq!(ctrl.read_device_register(6).unwrap().0, 0o11);
    }
}
