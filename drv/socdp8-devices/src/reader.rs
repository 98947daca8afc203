// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The buffer/cursor/timestamp state shared by every reader-class device
//! (spec.md §3, "reader state"). A new buffer and its reset cursor are
//! always published together (behind one lock) so the worker thread never
//! observes a cursor from one buffer paired with the bytes of another.

/// Finite input buffer plus delivery cursor, per spec.md §3.
///
/// `last_delivered_at` is `None` until the first byte actually goes out;
/// the rate gate only applies once there is a prior delivery to measure
/// from, so the very first byte of a freshly installed buffer is never
/// held back waiting for a window that hasn't started yet.
pub struct ReaderState {
    pub buffer: Vec<u8>,
    pub pos: usize,
    pub last_delivered_at: Option<u64>,
    pub show_progress: bool,
}

impl ReaderState {
    pub fn new() -> Self {
        ReaderState {
            buffer: Vec::new(),
            pos: 0,
            last_delivered_at: None,
            show_progress: false,
        }
    }

    /// Installs a raw byte buffer verbatim, resetting the cursor and the
    /// delivery gate so the first byte of the new buffer goes out on the
    /// next sweep regardless of when the previous buffer last delivered.
    pub fn install_bytes(&mut self, data: Vec<u8>, show_progress: bool) {
        self.buffer = data;
        self.pos = 0;
        self.last_delivered_at = None;
        self.show_progress = show_progress;
    }

    /// Empties the buffer; the caller is still responsible for clearing
    /// the device's fabric flag.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pos = 0;
    }
}

impl Default for ReaderState {
    fn default() -> Self {
        Self::new()
    }
}

/// Uppercases `input` and sets the high bit on each byte, producing the
/// 8-bit form PDP-8 ASR-33 tapes use (spec.md §4.2). CR/LF is appended by
/// the injecting layer (the shell's `input` command), not here.
pub fn text_to_asr33_bytes(input: &str) -> Vec<u8> {
    input
        .bytes()
        .map(|b| b.to_ascii_uppercase() | 0x80)
        .collect()
}
