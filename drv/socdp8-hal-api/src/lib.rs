// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The platform abstraction contract: the seam between the I/O core and
//! whatever owns the fabric's memory-mapped registers, the interrupt
//! vector, and the backing file store.
//!
//! A real board implementation talks to fabric over `/dev/uio*` or an
//! equivalent memory-mapped window and installs a real interrupt handler;
//! none of that lives here. [`MemPlatform`] is the one concrete
//! implementation this crate ships, backing everything with plain memory
//! so the rest of the workspace is testable without hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    NotFound(String),
    Io(String),
}

impl std::fmt::Display for HalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HalError::NotFound(path) => write!(f, "not found: {path}"),
            HalError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for HalError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
}

/// Number of 12-bit words addressable in one core-memory field.
pub const CORE_MEM_WORDS: usize = 4096;

/// The contract the I/O core and the shell consume from the board.
///
/// `peek`/`poke` are infallible, matching the original's direct register
/// access (there is no failure mode for a memory-mapped read/write once
/// `setup` has succeeded). File operations can fail and return
/// [`HalError`].
pub trait Platform: Send {
    fn setup(&mut self) -> Result<(), HalError>;

    /// Read/write a 12-bit core-memory word at a 15-bit address.
    fn peek_mem(&self, addr: u16) -> u16;
    fn poke_mem(&mut self, addr: u16, value: u16);

    /// Read/write a 32-bit word in the I/O controller's register window.
    fn peek_io(&self, offset: u32) -> u32;
    fn poke_io(&mut self, offset: u32, value: u32);

    /// Install the single I/O interrupt handler. Replaces any previously
    /// installed handler.
    fn set_io_interrupt_handler(&mut self, handler: Box<dyn Fn() + Send + Sync>);

    fn list_files(&self) -> Result<Vec<FileEntry>, HalError>;
    fn read_file(&self, path: &str) -> Result<Vec<u8>, HalError>;
    fn save_file(&self, path: &str, data: &[u8]) -> Result<(), HalError>;
}

/// An in-memory stand-in for a real board, used by tests and by the shell
/// when no fabric is attached.
pub struct MemPlatform {
    mem: Vec<u16>,
    io: Vec<u32>,
    handler: Option<Arc<dyn Fn() + Send + Sync>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemPlatform {
    pub fn new() -> Self {
        MemPlatform {
            mem: vec![0; CORE_MEM_WORDS * 8], // eight fields' worth of address space
            io: vec![0; 256],
            handler: None,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Fire the installed interrupt handler, simulating a fabric IRQ.
    pub fn raise_interrupt(&self) {
        if let Some(handler) = &self.handler {
            handler();
        }
    }
}

impl Default for MemPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MemPlatform {
    fn setup(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    fn peek_mem(&self, addr: u16) -> u16 {
        self.mem.get(addr as usize).copied().unwrap_or(0) & 0xFFF
    }

    fn poke_mem(&mut self, addr: u16, value: u16) {
        if let Some(slot) = self.mem.get_mut(addr as usize) {
            *slot = value & 0xFFF;
        }
    }

    fn peek_io(&self, offset: u32) -> u32 {
        self.io.get(offset as usize).copied().unwrap_or(0)
    }

    fn poke_io(&mut self, offset: u32, value: u32) {
        if let Some(slot) = self.io.get_mut(offset as usize) {
            *slot = value;
        }
    }

    fn set_io_interrupt_handler(
        &mut self,
        handler: Box<dyn Fn() + Send + Sync>,
    ) {
        self.handler = Some(Arc::from(handler));
    }

    fn list_files(&self) -> Result<Vec<FileEntry>, HalError> {
        let files = self.files.lock().unwrap();
        let mut out: Vec<FileEntry> = files
            .keys()
            .map(|name| FileEntry {
                name: name.clone(),
                is_directory: false,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, HalError> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .cloned()
            .ok_or_else(|| HalError::NotFound(path.to_string()))
    }

    fn save_file(&self, path: &str, data: &[u8]) -> Result<(), HalError> {
        let mut files = self.files.lock().unwrap();
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_round_trips_low_twelve_bits() {
        let mut hal = MemPlatform::new();
        hal.poke_mem(5, 0xFFFF);
        assert_eq!(hal.peek_mem(5), 0xFFF);
    }

    #[test]
    fn file_round_trips() {
        let hal = MemPlatform::new();
        hal.save_file("/tmp/x", &[1, 2, 3]).unwrap();
        assert_eq!(hal.read_file("/tmp/x").unwrap(), vec![1, 2, 3]);
        assert!(hal.read_file("/tmp/missing").is_err());
    }

    #[test]
    fn interrupt_fires_installed_handler() {
        let mut hal = MemPlatform::new();
        let fired = Arc::new(Mutex::new(false));
        let fired2 = fired.clone();
        hal.set_io_interrupt_handler(Box::new(move || {
            *fired2.lock().unwrap() = true;
        }));
        hal.raise_interrupt();
        assert!(*fired.lock().unwrap());
    }
}
