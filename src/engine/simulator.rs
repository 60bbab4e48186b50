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

// simulator.rs
//
// This file contains the pipeline controller of the speculative engine.
// Each clock tick runs commit, the execute/writeback sweep, and issue
// in reverse pipeline order so that no instruction crosses more than
// one stage per cycle.

use log::debug;

use crate::engine::components::{ReorderBuffer, ReservationStations, RobEntry, State};
use crate::engine::config::SimulatorConfig;
use crate::engine::instruction::{BinOp, Instruction, Opcode, Operand, Reg, UnitKind};
use crate::engine::memory::Memory;
use crate::engine::registers::RegisterFile;
use crate::engine::trace::TraceSink;
use crate::engine::value::Value;
use crate::errors::SimulatorError;

/// Default runaway guard. Configurable through `set_max_cycles`.
pub const DEFAULT_MAX_CYCLES: u64 = 100_000;

pub struct Simulator {
    pub clock: u64,
    /// Index of the next instruction to issue.
    pub pc: usize,
    /// Pending redirect, applied right before the next issue stage.
    pub new_pc: Option<usize>,
    /// Set while a second branch waits for the speculated one to
    /// commit.
    pub stall: bool,
    pub instructions: Vec<Instruction>,
    pub rob: ReorderBuffer,
    pub stations: ReservationStations,
    pub regs: RegisterFile,
    pub memory: Memory,
    max_cycles: u64,

    // Performance counters
    pub instructions_issued: u64,
    pub instructions_committed: u64,
    pub branch_mispredictions: u64,
}

impl Simulator {
    pub fn new(
        config: &SimulatorConfig,
        instructions: Vec<Instruction>,
    ) -> Result<Self, SimulatorError> {
        Ok(Self {
            clock: 0,
            pc: 0,
            new_pc: None,
            stall: false,
            instructions,
            rob: ReorderBuffer::new(config.rob_size),
            stations: config.build_stations(),
            regs: config.build_registers()?,
            memory: config.build_memory()?,
            max_cycles: DEFAULT_MAX_CYCLES,
            instructions_issued: 0,
            instructions_committed: 0,
            branch_mispredictions: 0,
        })
    }

    pub fn set_max_cycles(&mut self, max_cycles: u64) {
        self.max_cycles = max_cycles;
    }

    /// Clean termination: the PC ran past the program and every
    /// in-flight instruction has committed.
    pub fn is_finished(&self) -> bool {
        self.pc >= self.instructions.len() && self.rob.is_empty()
    }

    /// Run one clock tick. Returns true once the simulation finished.
    pub fn step(&mut self) -> Result<bool, SimulatorError> {
        self.clock += 1;

        self.commit_instr()?;
        self.advance_units()?;

        // Apply any pending redirect before issuing. Branch targets
        // recorded at issue, structural re-issues and misprediction
        // recovery all funnel through new_pc.
        if let Some(target) = self.new_pc.take() {
            self.pc = target;
        }

        if !self.stall && self.pc < self.instructions.len() {
            self.issue_instr()?;
        } else {
            debug!("no instruction issued (clock {})", self.clock);
        }

        Ok(self.is_finished())
    }

    /// Run to completion without tracing.
    pub fn run(&mut self) -> Result<u64, SimulatorError> {
        self.run_with_trace(&mut [])
    }

    /// Run to completion, handing every sink a read-only view at the
    /// end of each tick.
    pub fn run_with_trace(
        &mut self,
        sinks: &mut [Box<dyn TraceSink>],
    ) -> Result<u64, SimulatorError> {
        loop {
            let finished = self.step()?;
            for sink in sinks.iter_mut() {
                sink.update(self)?;
            }
            if finished {
                return Ok(self.clock);
            }
            if self.clock >= self.max_cycles {
                return Err(SimulatorError::CycleLimitExceeded(self.max_cycles));
            }
        }
    }

    /// Commit the head of the ROB if its writeback has landed. At most
    /// one instruction commits per cycle, in program order.
    fn commit_instr(&mut self) -> Result<(), SimulatorError> {
        if self.rob.is_empty() {
            return Ok(());
        }
        let head_idx = self.rob.head;
        let (instr, dest, value, addr, prediction) = {
            let head = self.rob.head_entry();
            if head.state != State::Write || !head.ready {
                return Ok(());
            }
            (
                head.instr.clone(),
                head.dest,
                head.value,
                head.addr,
                head.prediction,
            )
        };
        let Some(instr) = instr else {
            return Ok(());
        };

        debug!("commit: {} (ROB #{})", instr, head_idx + 1);

        if let Some(dest) = dest {
            if let Some(value) = value {
                self.regs.set(dest, value)?;
            }
            // Clear the rename marker unless a newer in-flight writer
            // already claimed it.
            if self.regs.stat(dest) == Some(head_idx) {
                self.regs.set_stat(dest, None);
            }
        }

        match instr.unit {
            UnitKind::Store => {
                if let (Some(addr), Some(value)) = (addr, value) {
                    let data = if instr.opcode.is_float() {
                        Value::Float(value.as_float())
                    } else {
                        Value::Int(value.as_int())
                    };
                    self.memory.store(addr, data)?;
                }
            },
            UnitKind::Branch => {
                self.stall = false;
                let taken = matches!(value, Some(Value::Bool(true)));
                let predicted = prediction.unwrap_or(false);
                if predicted != taken {
                    // Misprediction recovery: squash all speculative
                    // work and redirect the front end.
                    self.branch_mispredictions += 1;
                    let target = if taken {
                        instr.branch_target().ok_or_else(|| {
                            SimulatorError::UnknownBranch(instr.opcode.mnemonic().to_string())
                        })?
                    } else {
                        instr.addr + 1
                    };
                    debug!(
                        "misprediction at instruction {}: restarting at {}",
                        instr.addr, target
                    );
                    self.new_pc = Some(target);
                    self.rob.reset();
                    self.regs.reset_stat();
                    self.stations.reset_all();
                    self.instructions_committed += 1;
                    return Ok(());
                }
            },
            _ => {},
        }

        self.rob[head_idx].state = State::Commit;
        self.rob.retire_head();
        self.instructions_committed += 1;
        Ok(())
    }

    /// The two-pass execute/writeback sweep. Pass A advances running
    /// units and writes back completions; pass B starts units whose
    /// operands arrived, so nothing started this cycle also runs this
    /// cycle.
    fn advance_units(&mut self) -> Result<(), SimulatorError> {
        let pairs = self.stations.index_pairs();
        let mut touched = vec![false; pairs.len()];

        for (i, &(gi, ui)) in pairs.iter().enumerate() {
            let (busy, time) = {
                let unit = self.stations.unit(gi, ui);
                (unit.busy, unit.time)
            };
            if !busy {
                continue;
            }
            let Some(time) = time else {
                continue;
            };
            touched[i] = true;

            if time >= 1 {
                let dest = {
                    let unit = self.stations.unit_mut(gi, ui);
                    unit.time = Some(time - 1);
                    unit.dest
                };
                if let Some(dest) = dest {
                    self.rob[dest].state = State::Execute;
                }
                continue;
            }

            // Latency has elapsed. Loads resolve their effective
            // address first and complete on a later cycle.
            let (kind, pending_base, dest) = {
                let unit = self.stations.unit(gi, ui);
                (unit.kind, unit.vj, unit.dest)
            };
            if kind == UnitKind::Load {
                if let (Some(base), Some(dest)) = (pending_base, dest) {
                    if self.load_blocked_by_store(dest) {
                        continue;
                    }
                    let unit = self.stations.unit_mut(gi, ui);
                    let offset = unit.a.unwrap_or(0);
                    unit.a = Some(base.as_int() + offset);
                    unit.vj = None;
                    self.rob[dest].state = State::Execute;
                    continue;
                }
            }

            self.complete_unit(gi, ui)?;
        }

        for (i, &(gi, ui)) in pairs.iter().enumerate() {
            if touched[i] {
                continue;
            }
            let unit = self.stations.unit_mut(gi, ui);
            if unit.busy && unit.time.is_none() && unit.qj.is_none() && unit.qk.is_none() {
                unit.time = Some(unit.dispatch_latency());
            }
        }
        Ok(())
    }

    /// Load-store disambiguation: a Load may not resolve its address
    /// while any Store sits between the ROB head and the Load itself.
    fn load_blocked_by_store(&self, load_slot: usize) -> bool {
        self.rob
            .iter()
            .take_while(|entry| entry.index != load_slot)
            .any(|entry| {
                entry
                    .instr
                    .as_ref()
                    .map_or(false, |instr| instr.unit == UnitKind::Store)
            })
    }

    /// Execute the instruction held by a finished unit, broadcast the
    /// result on the common data bus, and release the unit.
    fn complete_unit(&mut self, gi: usize, ui: usize) -> Result<(), SimulatorError> {
        let (instr, vj, vk, a, dest) = {
            let unit = self.stations.unit(gi, ui);
            (unit.instr.clone(), unit.vj, unit.vk, unit.a, unit.dest)
        };
        let (Some(instr), Some(dest)) = (instr, dest) else {
            return Ok(());
        };

        let value = match instr.unit {
            UnitKind::Branch => {
                let taken = match instr.opcode {
                    Opcode::Beq => vj == vk,
                    Opcode::Bne => vj != vk,
                    Opcode::Beqz => matches!(vk, Some(v) if v.is_zero()),
                    Opcode::Bnez => vj.map_or(true, |v| !v.is_zero()),
                    Opcode::J => true,
                    _ => {
                        return Err(SimulatorError::UnknownBranch(
                            instr.opcode.mnemonic().to_string(),
                        ))
                    },
                };
                self.stations.unit_mut(gi, ui).notify_outcome(taken);
                Some(Value::Bool(taken))
            },
            UnitKind::Store => {
                // Only the destination address is finalized here; the
                // memory write happens at commit.
                let base = vk.map_or(0, |v| v.as_int());
                self.rob[dest].addr = Some(base + a.unwrap_or(0));
                None
            },
            UnitKind::Load => {
                let addr = a.unwrap_or(0);
                Some(self.memory.load(addr, instr.opcode.is_float())?)
            },
            _ => {
                let operator = instr.operator.ok_or(SimulatorError::UnknownOperator('?'))?;
                Some(apply_operator(operator, instr.opcode.is_float(), vj, vk)?)
            },
        };
        self.rob[dest].state = State::Execute;

        debug!("writeback: {} (ROB #{})", instr, dest + 1);

        match value {
            None => {
                // Stores keep their data in the ROB entry; nothing on
                // the bus waits for a store.
                self.rob[dest].value = vj;
            },
            Some(value) => {
                for unit in self.stations.units_mut() {
                    if unit.busy && unit.time.is_none() {
                        if unit.qj == Some(dest) {
                            unit.vj = Some(value);
                            unit.qj = None;
                        }
                        if unit.qk == Some(dest) {
                            unit.vk = Some(value);
                            unit.qk = None;
                        }
                    }
                }
                self.rob[dest].value = Some(value);
            },
        }
        self.rob[dest].ready = true;
        self.rob[dest].state = State::Write;
        self.stations.unit_mut(gi, ui).reset();
        Ok(())
    }

    /// Issue the instruction at the PC: claim a ROB slot and a free
    /// functional unit, capture operand availability, and rename the
    /// destination register.
    fn issue_instr(&mut self) -> Result<(), SimulatorError> {
        let instr = self.instructions[self.pc].clone();

        // Branches speculate one at a time; a second branch holds the
        // front end until the first commits.
        if instr.unit == UnitKind::Branch && self.rob.iter().any(RobEntry::is_branch) {
            self.stall = true;
            self.new_pc = Some(self.pc);
            return Ok(());
        }

        let slot = match self.stations.find_free(instr.unit) {
            Some(slot) if self.rob.has_free_entry() => Some(slot),
            _ => None,
        };
        let Some((gi, ui)) = slot else {
            // Structural hazard: hold the PC and retry next cycle.
            self.new_pc = Some(self.pc);
            return Ok(());
        };
        let Some(rob_idx) = self.rob.allocate() else {
            self.new_pc = Some(self.pc);
            return Ok(());
        };

        debug!(
            "issue: {} -> {} (ROB #{})",
            instr,
            self.stations.unit(gi, ui).name,
            rob_idx + 1
        );

        {
            let entry = &mut self.rob[rob_idx];
            entry.instr = Some(instr.clone());
            entry.state = State::Issue;
            entry.ready = false;
        }
        {
            let unit = self.stations.unit_mut(gi, ui);
            unit.occupy(instr.clone());
            unit.dest = Some(rob_idx);
        }

        // Which operand positions are sources depends on the class.
        let sources: Vec<usize> = match instr.unit {
            UnitKind::Store => vec![0, 1],
            UnitKind::Branch => match instr.opcode {
                Opcode::Beqz | Opcode::Bnez => vec![0],
                Opcode::Beq | Opcode::Bne => vec![0, 1],
                _ => vec![],
            },
            _ => vec![1, 2],
        };

        let mut first_operand = true;
        for &index in &sources {
            let Some(operand) = instr.operands.get(index).copied() else {
                continue;
            };
            let (value, waits_on) = match operand {
                Operand::Imm(value) => (Some(Value::Int(value)), None),
                Operand::Reg(reg) => self.resolve_register(reg),
                Operand::Mem { offset, base } => {
                    self.stations.unit_mut(gi, ui).a = Some(offset);
                    self.resolve_register(base)
                },
            };
            let unit = self.stations.unit_mut(gi, ui);
            if first_operand {
                unit.vj = value;
                unit.qj = waits_on;
            } else {
                unit.vk = value;
                unit.qk = waits_on;
            }
            first_operand = false;
        }

        // Every operand present: start the countdown right away.
        {
            let unit = self.stations.unit_mut(gi, ui);
            if unit.qj.is_none() && unit.qk.is_none() {
                unit.time = Some(unit.dispatch_latency());
            }
        }

        // The destination is the one operand position that is not a
        // source. Branch "destinations" are labels, not registers.
        if instr.unit != UnitKind::Branch {
            let dest_pos = (0..instr.operands.len()).find(|pos| !sources.contains(pos));
            if let Some(Operand::Reg(reg)) =
                dest_pos.and_then(|pos| instr.operands.get(pos).copied())
            {
                self.rob[rob_idx].dest = Some(reg);
                self.regs.set_stat(reg, Some(rob_idx));
            }
        }

        if instr.unit == UnitKind::Branch {
            let target = instr.branch_target().ok_or_else(|| {
                SimulatorError::UnknownBranch(instr.opcode.mnemonic().to_string())
            })?;
            let predicted = {
                let unit = self.stations.unit_mut(gi, ui);
                unit.a = Some(target as i64);
                unit.prediction(self.pc, target).unwrap_or(false)
            };
            self.rob[rob_idx].prediction = Some(predicted);
            self.new_pc = Some(if predicted { target } else { self.pc + 1 });
        } else {
            self.new_pc = Some(self.pc + 1);
        }

        self.instructions_issued += 1;
        Ok(())
    }

    /// Resolve a register source into a ready value or a pointer to the
    /// in-flight ROB entry that will produce it.
    fn resolve_register(&self, reg: Reg) -> (Option<Value>, Option<usize>) {
        match self.regs.stat(reg) {
            Some(slot) => {
                let entry = &self.rob[slot];
                // A writer that already wrote back can be read out of
                // the ROB directly.
                if entry.state == State::Write || entry.state == State::Commit {
                    (entry.value, None)
                } else {
                    (None, Some(slot))
                }
            },
            None => (Some(self.regs.get(reg)), None),
        }
    }
}

/// Explicit operator dispatch. Integer classes operate on (and produce)
/// integers, float classes on doubles.
fn apply_operator(
    op: BinOp,
    float: bool,
    vj: Option<Value>,
    vk: Option<Value>,
) -> Result<Value, SimulatorError> {
    let vj = vj.unwrap_or(Value::Int(0));
    let vk = vk.unwrap_or(Value::Int(0));
    if float {
        let (a, b) = (vj.as_float(), vk.as_float());
        let result = match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::And => return Err(SimulatorError::UnknownOperator(op.symbol())),
        };
        Ok(Value::Float(result))
    } else {
        let (a, b) = (vj.as_int(), vk.as_int());
        let result = match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => {
                if b == 0 {
                    return Err(SimulatorError::DivisionByZero);
                }
                a.wrapping_div(b)
            },
            BinOp::And => a & b,
        };
        Ok(Value::Int(result))
    }
}
