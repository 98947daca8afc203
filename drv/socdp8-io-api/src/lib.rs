// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure data types shared between the I/O core and its clients: the IOP
//! pulse identifiers, a device's configuration, and the bit layout used to
//! pack a configuration into the 32-bit word fabric expects in a device's
//! register.

/// Which IOP pulse (if any) triggers an action in fabric.
///
/// `None` disables the action entirely; `Iop1`/`Iop2`/`Iop4` name the
/// PDP-8 pulses by their conventional numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IopPulse {
    #[default]
    None = 0,
    Iop1 = 1,
    Iop2 = 2,
    Iop4 = 3,
}

impl IopPulse {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(IopPulse::None),
            1 => Some(IopPulse::Iop1),
            2 => Some(IopPulse::Iop2),
            3 => Some(IopPulse::Iop4),
            _ => None,
        }
    }

    /// The field stores each pulse identifier Gray-coded rather than as a
    /// straight binary count, so a register read during a pulse-select
    /// transition never observes more than one bit changing. Two-bit Gray
    /// sequence: 0->00, 1->01, 2->11, 3->10.
    fn to_gray(self) -> u32 {
        let v = self as u32;
        v ^ (v >> 1)
    }

    fn from_gray(code: u32) -> Self {
        let hi = (code >> 1) & 1;
        let lo = (code & 1) ^ hi;
        let v = (hi << 1) | lo;
        IopPulse::from_u8(v as u8).unwrap_or(IopPulse::None)
    }
}

/// A device's full configuration as registered with the I/O core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub iop_for_interrupt: IopPulse,
    pub iop_for_register_load: IopPulse,
    pub iop_for_ac_clear: IopPulse,
    pub iop_for_ac_load: IopPulse,
    pub iop_for_flag_set: IopPulse,
    pub iop_for_flag_clear: IopPulse,
    pub iop_for_skip_flag: IopPulse,
    pub set_flag_on_write: bool,
}

const SHIFT_INTERRUPT: u32 = 25;
const SHIFT_REGISTER_LOAD: u32 = 23;
const SHIFT_AC_CLEAR: u32 = 21;
const SHIFT_AC_LOAD: u32 = 19;
const SHIFT_FLAG_SET: u32 = 17;
const SHIFT_FLAG_CLEAR: u32 = 15;
const SHIFT_SKIP_FLAG: u32 = 13;
const SHIFT_SET_FLAG_ON_WRITE: u32 = 12;

/// Bit reflecting "new data present" in a register read; never set on write.
pub const NEW_DATA_BIT: u32 = 27;

/// Mask covering the two 2-bit pulse fields plus the flag bit, i.e. every
/// bit the controller ever sets when packing a configuration.
const CONFIG_MASK: u32 = 0b111_1111_1111_1111 << SHIFT_SET_FLAG_ON_WRITE;

impl DeviceConfig {
    /// Serialize to the 32-bit word written into the device's I/O register.
    pub fn pack(&self) -> u32 {
        (self.iop_for_interrupt.to_gray() << SHIFT_INTERRUPT)
            | (self.iop_for_register_load.to_gray() << SHIFT_REGISTER_LOAD)
            | (self.iop_for_ac_clear.to_gray() << SHIFT_AC_CLEAR)
            | (self.iop_for_ac_load.to_gray() << SHIFT_AC_LOAD)
            | (self.iop_for_flag_set.to_gray() << SHIFT_FLAG_SET)
            | (self.iop_for_flag_clear.to_gray() << SHIFT_FLAG_CLEAR)
            | (self.iop_for_skip_flag.to_gray() << SHIFT_SKIP_FLAG)
            | ((self.set_flag_on_write as u32) << SHIFT_SET_FLAG_ON_WRITE)
    }

    /// Recover a configuration from a previously packed word. Used by tests
    /// and the shell's device inspection command; ignores any data or
    /// status bits outside [`CONFIG_MASK`].
    pub fn unpack(word: u32) -> Self {
        let field = |shift: u32| (word >> shift) & 0b11;
        DeviceConfig {
            iop_for_interrupt: IopPulse::from_gray(field(SHIFT_INTERRUPT)),
            iop_for_register_load: IopPulse::from_gray(field(SHIFT_REGISTER_LOAD)),
            iop_for_ac_clear: IopPulse::from_gray(field(SHIFT_AC_CLEAR)),
            iop_for_ac_load: IopPulse::from_gray(field(SHIFT_AC_LOAD)),
            iop_for_flag_set: IopPulse::from_gray(field(SHIFT_FLAG_SET)),
            iop_for_flag_clear: IopPulse::from_gray(field(SHIFT_FLAG_CLEAR)),
            iop_for_skip_flag: IopPulse::from_gray(field(SHIFT_SKIP_FLAG)),
            set_flag_on_write: (word >> SHIFT_SET_FLAG_ON_WRITE) & 1 != 0,
        }
    }
}

/// The 64-device flag bitmap lives at this I/O register offset and the
/// following one (devices 0..=31 and 32..=63 respectively).
pub const ADDR_FLAGS_LOW: u32 = 64;
pub const ADDR_FLAGS_HIGH: u32 = 65;

/// Highest device number fabric's register file has room for.
pub const MAX_DEVICE: u8 = 63;

/// Device 0 is reserved: on the real bus it addresses no device and a
/// write to it is a no-op, so registering a handler there could never
/// fire.
pub const RESERVED_DEVICE: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Device 0 cannot be registered; it is reserved.
    ReservedDevice,
    /// Referenced a device number nothing has registered.
    UnknownDevice(u8),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::ReservedDevice => write!(f, "device 0 is reserved"),
            DeviceError::UnknownDevice(d) => write!(f, "no device registered at {d}"),
        }
    }
}

impl std::error::Error for DeviceError {}
