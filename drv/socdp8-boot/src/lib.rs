// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The RIM loader poke sequence (spec.md §4.5): an opaque 18-word
//! bootstrap program toggled into high core memory so the PDP-8 can read
//! a paper tape. This crate does not interpret the program; it only
//! knows where it goes.

use socdp8_hal_api::Platform;

/// `(address, word)` pairs reproduced verbatim from the original's
/// `storeRIMLoader`. Opaque PDP-8 machine code; not interpreted here.
const RIM_LOADER: [(u16, u16); 17] = [
    (0o7756, 0o6032),
    (0o7757, 0o6031),
    (0o7760, 0o5357),
    (0o7761, 0o6036),
    (0o7762, 0o7106),
    (0o7763, 0o7006),
    (0o7764, 0o7510),
    (0o7765, 0o5357),
    (0o7766, 0o7006),
    (0o7767, 0o6031),
    (0o7770, 0o5367),
    (0o7771, 0o6034),
    (0o7772, 0o7420),
    (0o7773, 0o3776),
    (0o7774, 0o3376),
    (0o7775, 0o5356),
    (0o7776, 0o0000),
];

/// Pokes the RIM loader into core memory at 07756-07776.
pub fn store_rim_loader<P: Platform + ?Sized>(platform: &mut P) {
    for (addr, word) in RIM_LOADER {
        platform.poke_mem(addr, word);
    }
}
