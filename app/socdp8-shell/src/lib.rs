// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The interactive line shell (spec.md §6): tokenizes a line on
//! whitespace and dispatches to one of a fixed set of commands that
//! inspect or drive the I/O core and its two paper-tape devices.
//!
//! There is no line-editing front end here (the original links
//! `linenoise`; nothing in the retrieved stack plays that role), so
//! input is plain buffered stdin reads, one line per command, which is
//! what `Shell::taskLoop`'s `istringstream`/`istream_iterator` tokenizing
//! amounts to functionally.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use socdp8_devices::{Asr33, Clock, Pr8};
use socdp8_hal_api::Platform;
use socdp8_io::IoController;
use socdp8_io_server::IoServer;

/// Everything a command needs: the running I/O core and the two device
/// handles the shell's `load`/`input`/`clear` commands target.
pub struct Session<P: Platform + 'static> {
    pub server: IoServer<P>,
    pub asr33: Asr33,
    pub pr8: Pr8,
}

impl<P: Platform + 'static> Session<P> {
    /// Registers both device pairs with a fresh [`IoServer`] and starts
    /// its worker thread. `clock` drives both devices' rate limiting;
    /// pass a [`socdp8_devices::SystemClock`] for a real run.
    pub fn start(platform: P, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut server = IoServer::new(platform);
        let (asr33, pr8) = {
            let mut ctrl = server.controller();
            let asr33 = Asr33::register(&mut ctrl, clock.clone())
                .context("registering ASR-33 devices")?;
            let pr8 = Pr8::register(&mut ctrl, clock).context("registering PR8 devices")?;
            (asr33, pr8)
        };
        server.start();
        Ok(Session { server, asr33, pr8 })
    }

    /// Runs one shell command line (already tokenized) against this
    /// session. Returns `Ok(true)` to keep reading, `Ok(false)` on
    /// `quit`/`exit`. All command-level failures surface as `Err` for the
    /// caller to print as a single diagnostic line and continue (spec.md
    /// §7).
    pub fn dispatch(&mut self, cmd: &str, args: &[&str]) -> Result<bool> {
        match cmd {
            "rimloader" => {
                socdp8_boot::store_rim_loader(self.server.controller().platform_mut());
                println!("RIM loader installed at 07756-07776");
            }
            "ls" => {
                let files = self.server.controller().platform().list_files()?;
                for file in files {
                    println!("{}", file.name);
                }
            }
            "load" => self.cmd_load(args)?,
            "input" => self.cmd_input(args),
            "clear" => self.cmd_clear(args)?,
            "dump" => self.cmd_dump(args)?,
            "state" => self.cmd_state(args)?,
            "debug" => self.cmd_debug(args),
            "quit" | "exit" => return Ok(false),
            other => println!("Unknown command: {other}"),
        }
        Ok(true)
    }

    fn cmd_load(&mut self, args: &[&str]) -> Result<()> {
        let [side, path] = args else {
            println!("Usage: load <low | high> <path>");
            return Ok(());
        };
        let content = match self.server.controller().platform().read_file(path) {
            Ok(content) => content,
            Err(_) => {
                println!("Couldn't load file");
                return Ok(());
            }
        };
        if *side == "high" {
            self.pr8.set_reader_input(content);
            println!("Attached to PR8");
        } else {
            self.asr33.set_reader_input(content);
            println!("Attached to ASR33");
        }
        Ok(())
    }

    fn cmd_input(&mut self, args: &[&str]) {
        let mut line = args.join(" ");
        line.push_str("\r\n");
        self.asr33.set_string_input(&line);
    }

    fn cmd_clear(&mut self, args: &[&str]) -> Result<()> {
        let [side] = args else {
            println!("Usage: clear <low | high>");
            return Ok(());
        };
        let mut ctrl = self.server.controller();
        if *side == "high" {
            self.pr8.clear(&mut ctrl)?;
        } else {
            self.asr33.clear(&mut ctrl)?;
        }
        Ok(())
    }

    fn cmd_dump(&mut self, args: &[&str]) -> Result<()> {
        let [start, end] = args else {
            println!("Usage: dump <start_oct> <end_oct>");
            return Ok(());
        };
        let start = parse_octal(start)?;
        let end = parse_octal(end)?;
        let ctrl = self.server.controller();
        print!("{}", dump_range(&*ctrl, start, end));
        Ok(())
    }

    fn cmd_state(&mut self, args: &[&str]) -> Result<()> {
        let [op, path] = args else {
            println!("Usage: state <load | save> <file>");
            return Ok(());
        };
        match *op {
            "save" => {
                let ctrl = self.server.controller();
                let data = save_state(&*ctrl);
                ctrl.platform().save_file(path, &data)?;
            }
            "load" => {
                let mut ctrl = self.server.controller();
                let data = ctrl.platform().read_file(path)?;
                load_state(&mut ctrl, &data);
            }
            other => bail!("unknown state subcommand: {other}"),
        }
        Ok(())
    }

    /// `debug ringbuf`/`debug devices`: dumps the in-process trace buffers
    /// (device registrations, worker interrupts/sweeps) the way `humility
    /// ringbuf` would on real hardware, per SPEC_FULL.md's ambient
    /// logging note, or the packed configuration word of every registered
    /// device.
    fn cmd_debug(&mut self, args: &[&str]) {
        match args {
            ["ringbuf"] => {
                println!("-- device registrations --");
                for entry in socdp8_io::registrations_snapshot() {
                    println!("device {} (x{})", entry.payload, entry.count);
                }
                println!("-- worker sweeps --");
                for entry in socdp8_io_server::sweeps_snapshot() {
                    println!("{:?} (x{})", entry.payload, entry.count);
                }
            }
            ["devices"] => {
                let ctrl = self.server.controller();
                for device in ctrl.registered_devices() {
                    let cfg = ctrl.device_config(device).unwrap();
                    println!("device {device}: {cfg:?}");
                }
            }
            _ => println!("Usage: debug <ringbuf | devices>"),
        }
    }
}

/// Highest core-memory address the `state` command dumps/restores, per
/// spec.md §6 ("up to 077777").
const STATE_MAX_ADDR: u16 = 0o77777;

fn parse_octal(s: &str) -> Result<u16> {
    u16::from_str_radix(s, 8).with_context(|| format!("not an octal number: {s}"))
}

/// Formats `dump start end` exactly as the original: a `<05o>: ` address
/// header whenever the address is a multiple of 8, then each word as
/// `<04o> `, eight words per line.
fn dump_range<P: Platform>(ctrl: &IoController<P>, start: u16, end: u16) -> String {
    let mut out = String::new();
    for addr in start..=end {
        if addr % 8 == 0 {
            out.push_str(&format!("\n{addr:05o}: "));
        }
        out.push_str(&format!("{:04o} ", ctrl.platform().peek_mem(addr)));
    }
    out.push('\n');
    out
}

fn save_state<P: Platform>(ctrl: &IoController<P>) -> Vec<u8> {
    let mut data = Vec::with_capacity((STATE_MAX_ADDR as usize + 1) * 2);
    for addr in 0..=STATE_MAX_ADDR {
        let word = ctrl.platform().peek_mem(addr);
        data.push((word & 0xFF) as u8);
        data.push(((word >> 8) & 0xFF) as u8);
    }
    data
}

fn load_state<P: Platform>(ctrl: &mut IoController<P>, data: &[u8]) {
    for (addr, pair) in data.chunks_exact(2).enumerate() {
        if addr > STATE_MAX_ADDR as usize {
            break;
        }
        let word = pair[0] as u16 | ((pair[1] as u16) << 8);
        ctrl.platform_mut().poke_mem(addr as u16, word);
    }
}

/// Splits a raw input line the way `istringstream`/`istream_iterator`
/// does: whitespace-separated tokens, empty line yields no tokens.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}
