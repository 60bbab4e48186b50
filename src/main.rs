// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// main.rs
//
// This file contains the main entry point for the speculative MIPS64
// simulator. It loads a machine configuration and an assembly program,
// runs the engine to completion and reports the final state.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use smips_rust::engine::trace::{TextTrace, TraceSink};
use smips_rust::parser::parse_file;
use smips_rust::{Simulator, SimulatorConfig, SimulatorError};

#[derive(Parser)]
#[command(name = "smips_rust")]
#[command(about = "A cycle-accurate speculative out-of-order MIPS64 simulator")]
#[command(version)]
struct Cli {
    /// Machine configuration (JSON)
    config: PathBuf,

    /// Assembly source file
    program: PathBuf,

    /// Write a per-cycle trace of the engine state to this file
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Abort the simulation after this many cycles
    #[arg(long, default_value = "100000")]
    max_cycles: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn run(cli: &Cli) -> Result<(), SimulatorError> {
    let config = SimulatorConfig::from_file(&cli.config)?;
    let instructions = parse_file(&cli.program)?;

    let mut simulator = Simulator::new(&config, instructions)?;
    simulator.set_max_cycles(cli.max_cycles);

    println!("{}", "Initial state".bold());
    println!("Registers: {}", simulator.regs.dump());
    println!("Memory:    {}", simulator.memory.dump());

    let mut sinks: Vec<Box<dyn TraceSink>> = Vec::new();
    if let Some(path) = &cli.trace {
        sinks.push(Box::new(TextTrace::to_file(path)?));
    }

    let cycles = simulator.run_with_trace(&mut sinks)?;
    println!("Simulation completed at clock cycle {}.", cycles);

    println!("{}", "Final state".bold());
    println!("Registers: {}", simulator.regs.dump());
    println!("Memory:    {}", simulator.memory.dump());
    println!(
        "Instructions issued: {}, committed: {}, branch mispredictions: {}",
        simulator.instructions_issued,
        simulator.instructions_committed,
        simulator.branch_mispredictions
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .parse_filters(&cli.log_level)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::from(err.exit_code() as u8)
        },
    }
}
