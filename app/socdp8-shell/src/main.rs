// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wires a [`MemPlatform`], the I/O core, and both device pairs together
//! and runs the REPL — what `main.cpp`'s `run()` did for the original,
//! minus the FreeRTOS scheduler: here the worker is a plain thread
//! started by [`Session::start`] before the REPL ever reads a line.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use socdp8_devices::SystemClock;
use socdp8_hal_api::MemPlatform;
use socdp8_shell::{tokenize, Session};

fn main() {
    if let Err(e) = run() {
        eprintln!("Uncaught error: {e:#}");
        std::process::exit(1);
    }
    println!("End");
}

fn run() -> anyhow::Result<()> {
    println!("SoCDP8 starting...");
    let mut session = Session::start(MemPlatform::new(), Arc::new(SystemClock::new()))?;
    println!("Ready!");

    let stdin = io::stdin();
    loop {
        print!("SoCDP8> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let tokens = tokenize(&line);
        let Some((&cmd, args)) = tokens.split_first() else {
            continue;
        };

        match session.dispatch(cmd, args) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("Error: {e:#}"),
        }
    }
    Ok(())
}
