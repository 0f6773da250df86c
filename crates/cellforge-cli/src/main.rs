//! cellforge session shell.
//!
//! A thin binary over `cellforge-core`/`cellforge-formula`: with no
//! arguments it reads commands from stdin as an interactive session; given
//! process arguments it runs a single command and exits. Either way, `open`/
//! `create`/`save`/`saveas` operate against an in-memory-only workbook
//! backed by a tiny line-oriented dump file, never an OOXML container.

mod commands;
mod exec;
mod render;
mod session;

use std::io::{self, BufRead, Write};

use clap::Parser;

use commands::{parse_line, Cli, Command};
use session::Session;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() <= 1 {
        run_repl();
        return;
    }

    let cli = Cli::parse_from(args);
    let mut session = Session::new();
    if let Err(e) = exec::dispatch(&mut session, cli.command) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run_repl() {
    let stdin = io::stdin();
    let mut session = Session::new();
    let mut had_error = false;

    print!("cellforge> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            match parse_line(trimmed) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(e) = exec::dispatch(&mut session, command) {
                        eprintln!("error: {e:#}");
                        had_error = true;
                    }
                }
                Err(e) => {
                    eprintln!("{e}");
                    had_error = true;
                }
            }
        }
        print!("cellforge> ");
        io::stdout().flush().ok();
    }
    println!();

    if had_error {
        std::process::exit(1);
    }
}
