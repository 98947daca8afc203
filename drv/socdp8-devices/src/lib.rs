// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Paper-tape device emulations driven by the [`socdp8_io`] controller:
//! the slow ASR-33 teletype ([`asr33::Asr33`]) and the high-speed PR8
//! reader/punch ([`pr8::Pr8`]), per spec.md §4.2/§4.3.

pub mod asr33;
pub mod clock;
pub mod pr8;
mod reader;

pub use asr33::Asr33;
pub use clock::{Clock, SystemClock, VirtualClock};
pub use pr8::Pr8;
