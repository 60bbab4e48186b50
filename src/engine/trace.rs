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

// trace.rs
//
// This file contains the per-cycle trace emitter. After every tick the
// driver hands each sink a read-only view of the engine; the text sink
// renders the reservation stations, the ROB and the register file as
// aligned ASCII tables. ROB references render 1-based as #<n>.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::engine::instruction::Reg;
use crate::engine::simulator::Simulator;
use crate::errors::SimulatorError;

/// Consumer of the engine state at the end of each tick.
pub trait TraceSink {
    fn update(&mut self, sim: &Simulator) -> Result<(), SimulatorError>;
}

/// Minimal aligned-table formatter for the trace output.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }

        let separator = {
            let mut line = String::from("+");
            for width in &widths {
                line.push_str(&"-".repeat(width + 2));
                line.push('+');
            }
            line
        };
        let format_row = |cells: &[String]| {
            let mut line = String::from("|");
            for (i, &width) in widths.iter().enumerate() {
                let empty = String::new();
                let cell = cells.get(i).unwrap_or(&empty);
                line.push_str(&format!(" {:<width$} |", cell, width = width));
            }
            line
        };

        let mut out = String::new();
        out.push_str(&separator);
        out.push('\n');
        out.push_str(&format_row(&self.headers));
        out.push('\n');
        out.push_str(&separator);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&format_row(row));
            out.push('\n');
        }
        out.push_str(&separator);
        out.push('\n');
        out
    }
}

fn opt_cell<T: Display>(value: Option<T>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

/// 1-based ROB slot reference, the notation used everywhere in the
/// trace.
fn rob_ref(slot: Option<usize>) -> String {
    slot.map_or_else(String::new, |n| format!("#{}", n + 1))
}

/// Plain-text trace writer.
pub struct TextTrace {
    out: Box<dyn Write>,
}

impl TextTrace {
    pub fn to_file<P: AsRef<Path>>(path: P) -> Result<Self, SimulatorError> {
        let file = File::create(path)?;
        Ok(Self {
            out: Box::new(BufWriter::new(file)),
        })
    }

    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    fn stations_table(sim: &Simulator) -> Table {
        let mut table = Table::new(&[
            "Station", "Op", "Time", "Vj", "Vk", "Qj", "Qk", "Dest", "A",
        ]);
        for unit in sim.stations.units() {
            table.add_row(vec![
                unit.name.clone(),
                opt_cell(unit.instr.as_ref().map(|instr| instr.opcode.mnemonic())),
                opt_cell(unit.time),
                opt_cell(unit.vj),
                opt_cell(unit.vk),
                rob_ref(unit.qj),
                rob_ref(unit.qk),
                rob_ref(unit.dest),
                opt_cell(unit.a),
            ]);
        }
        table
    }

    fn rob_table(sim: &Simulator) -> Table {
        let mut table = Table::new(&["Entry", "Instruction", "", "State", "Dest.", "Value"]);
        for entry in sim.rob.iter() {
            let (mnemonic, operands) = entry.instr.as_ref().map_or_else(
                || (String::new(), String::new()),
                |instr| {
                    let operands = instr
                        .operands
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    (instr.opcode.mnemonic().to_string(), operands)
                },
            );
            table.add_row(vec![
                format!("{}", entry.index + 1),
                mnemonic,
                operands,
                entry.state.name().to_string(),
                opt_cell(entry.dest),
                opt_cell(entry.value),
            ]);
        }
        table
    }

    fn registers_table(sim: &Simulator) -> Table {
        let mut table = Table::new(&["", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
        for bank in ['R', 'F'] {
            for row_start in (0..32).step_by(10) {
                let row_end = (row_start + 10).min(32);
                let padding = 10 - (row_end - row_start);

                let mut stat_row = vec!["ROB#".to_string()];
                let mut value_row = vec![format!("{}{}", bank, row_start)];
                for n in row_start..row_end {
                    let reg = if bank == 'R' {
                        Reg::R(n as u8)
                    } else {
                        Reg::F(n as u8)
                    };
                    stat_row.push(rob_ref(sim.regs.stat(reg)));
                    value_row.push(sim.regs.get(reg).to_string());
                }
                for _ in 0..padding {
                    stat_row.push("X".to_string());
                    value_row.push("X".to_string());
                }
                table.add_row(stat_row);
                table.add_row(value_row);
            }
        }
        table
    }
}

impl TraceSink for TextTrace {
    fn update(&mut self, sim: &Simulator) -> Result<(), SimulatorError> {
        writeln!(self.out, "{}", "=".repeat(80))?;
        writeln!(self.out, "Cycle: {}", sim.clock)?;
        writeln!(self.out, "Program Counter: {}", sim.pc)?;
        writeln!(
            self.out,
            "Reservation stations:\n{}",
            Self::stations_table(sim).render()
        )?;
        writeln!(self.out, "ROB:\n{}", Self::rob_table(sim).render())?;
        writeln!(
            self.out,
            "Registers:\n{}",
            Self::registers_table(sim).render()
        )?;
        self.out.flush()?;
        Ok(())
    }
}
