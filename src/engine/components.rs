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

// components.rs
//
// This file contains the hardware structures of the speculative engine:
// the reorder buffer (a fixed ring committed in issue order), the
// functional units with their reservation-station operand captures, and
// the ordered per-type unit table.

use std::ops::{Index, IndexMut};

use crate::engine::branch_predictor::BranchPredictor;
use crate::engine::instruction::{BinOp, Instruction, Reg, UnitKind};
use crate::engine::value::Value;

/// Lifecycle of a reorder-buffer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unused,
    Issue,
    Execute,
    Write,
    Commit,
}

impl State {
    /// Trace label. The Write stage renders as "Writeback".
    pub fn name(&self) -> &'static str {
        match self {
            State::Unused => "Unused",
            State::Issue => "Issue",
            State::Execute => "Execute",
            State::Write => "Writeback",
            State::Commit => "Commit",
        }
    }
}

/// One slot of the reorder buffer.
#[derive(Debug, Clone)]
pub struct RobEntry {
    /// Slot position; stable for the lifetime of the entry.
    pub index: usize,
    pub state: State,
    /// Set at writeback, consumed at commit.
    pub ready: bool,
    pub instr: Option<Instruction>,
    /// Architectural register written at commit; None for stores and
    /// branches.
    pub dest: Option<Reg>,
    pub value: Option<Value>,
    /// Effective address, finalized at execute for stores.
    pub addr: Option<i64>,
    /// The predictor's verdict recorded at issue (branches only).
    pub prediction: Option<bool>,
}

impl RobEntry {
    fn new(index: usize) -> Self {
        Self {
            index,
            state: State::Unused,
            ready: false,
            instr: None,
            dest: None,
            value: None,
            addr: None,
            prediction: None,
        }
    }

    pub fn free(&mut self) {
        self.state = State::Unused;
        self.ready = false;
        self.instr = None;
        self.dest = None;
        self.value = None;
        self.addr = None;
        self.prediction = None;
    }

    pub fn is_branch(&self) -> bool {
        self.instr
            .as_ref()
            .map_or(false, |instr| instr.unit == UnitKind::Branch)
    }
}

/// Fixed-capacity ring buffer of in-flight instructions. Entries are
/// allocated at the tail and retired at the head, so commit order is
/// issue order.
#[derive(Debug, Clone)]
pub struct ReorderBuffer {
    pub entries: Vec<RobEntry>,
    pub head: usize,
    pub tail: usize,
    pub count: usize,
}

impl ReorderBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: (0..capacity).map(RobEntry::new).collect(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn has_free_entry(&self) -> bool {
        self.count < self.capacity()
    }

    /// Claim the tail slot. Returns its index, or None when full.
    pub fn allocate(&mut self) -> Option<usize> {
        if !self.has_free_entry() {
            return None;
        }
        let index = self.tail;
        self.tail = (self.tail + 1) % self.capacity();
        self.count += 1;
        Some(index)
    }

    pub fn head_entry(&self) -> &RobEntry {
        &self.entries[self.head]
    }

    /// Retiring the head is the only way an entry leaves the buffer.
    pub fn retire_head(&mut self) {
        if self.count > 0 {
            self.entries[self.head].free();
            self.count -= 1;
            self.head = (self.head + 1) % self.capacity();
        }
    }

    /// Flush every entry. Used on misprediction recovery.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.free();
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    /// Entries from head toward tail, in issue order.
    pub fn iter(&self) -> impl Iterator<Item = &RobEntry> {
        let capacity = self.capacity().max(1);
        (0..self.count).map(move |offset| &self.entries[(self.head + offset) % capacity])
    }
}

impl Index<usize> for ReorderBuffer {
    type Output = RobEntry;

    fn index(&self, index: usize) -> &RobEntry {
        &self.entries[index]
    }
}

impl IndexMut<usize> for ReorderBuffer {
    fn index_mut(&mut self, index: usize) -> &mut RobEntry {
        &mut self.entries[index]
    }
}

/// Variant payload of a functional unit. Only Mult units carry a
/// division latency and only Branch units carry a predictor.
#[derive(Debug)]
pub enum UnitExt {
    Plain,
    Mult { div_latency: u64 },
    Branch { predictor: Box<dyn BranchPredictor> },
}

/// A functional unit together with its reservation-station state.
#[derive(Debug)]
pub struct FuncUnit {
    /// Type plus 1-based index, e.g. "Load2".
    pub name: String,
    pub kind: UnitKind,
    pub latency: u64,
    pub busy: bool,
    /// The ROB slot this unit will produce.
    pub dest: Option<usize>,
    pub vj: Option<Value>,
    pub vk: Option<Value>,
    pub qj: Option<usize>,
    pub qk: Option<usize>,
    /// Immediate offset for memory ops; branch target for branches.
    pub a: Option<i64>,
    /// Remaining cycles; None while waiting for operands.
    pub time: Option<u64>,
    pub instr: Option<Instruction>,
    pub ext: UnitExt,
}

impl FuncUnit {
    pub fn new(name: String, kind: UnitKind, latency: u64, ext: UnitExt) -> Self {
        Self {
            name,
            kind,
            latency,
            busy: false,
            dest: None,
            vj: None,
            vk: None,
            qj: None,
            qk: None,
            a: None,
            time: None,
            instr: None,
            ext,
        }
    }

    pub fn reset(&mut self) {
        self.busy = false;
        self.dest = None;
        self.vj = None;
        self.vk = None;
        self.qj = None;
        self.qk = None;
        self.a = None;
        self.time = None;
        self.instr = None;
    }

    /// Claim the unit for an instruction at issue.
    pub fn occupy(&mut self, instr: Instruction) {
        self.reset();
        self.busy = true;
        self.instr = Some(instr);
    }

    /// Latency for the held instruction. Mult units use their division
    /// latency when the operator is '/'.
    pub fn dispatch_latency(&self) -> u64 {
        if let UnitExt::Mult { div_latency } = self.ext {
            let operator = self.instr.as_ref().and_then(|instr| instr.operator);
            if operator == Some(BinOp::Div) {
                return div_latency;
            }
        }
        self.latency
    }

    /// Ask the attached predictor for a verdict. None on non-branch
    /// units.
    pub fn prediction(&self, pc: usize, dest: usize) -> Option<bool> {
        match &self.ext {
            UnitExt::Branch { predictor } => Some(predictor.predict(pc, dest)),
            _ => None,
        }
    }

    /// Report a resolved outcome to the attached predictor.
    pub fn notify_outcome(&mut self, taken: bool) {
        if let UnitExt::Branch { predictor } = &mut self.ext {
            predictor.update(taken);
        }
    }
}

/// Ordered table of reservation stations, grouped by unit type. Group
/// order follows the configuration order (Load, Store, Add, Mult, ALU,
/// Branch) so every sweep over the units is deterministic.
#[derive(Debug)]
pub struct ReservationStations {
    pub groups: Vec<(UnitKind, Vec<FuncUnit>)>,
}

impl ReservationStations {
    pub fn new(groups: Vec<(UnitKind, Vec<FuncUnit>)>) -> Self {
        Self { groups }
    }

    /// First free unit of the given type, as (group, unit) indices.
    pub fn find_free(&self, kind: UnitKind) -> Option<(usize, usize)> {
        let (gi, (_, units)) = self
            .groups
            .iter()
            .enumerate()
            .find(|(_, (k, _))| *k == kind)?;
        let ui = units.iter().position(|unit| !unit.busy)?;
        Some((gi, ui))
    }

    pub fn unit(&self, gi: usize, ui: usize) -> &FuncUnit {
        &self.groups[gi].1[ui]
    }

    pub fn unit_mut(&mut self, gi: usize, ui: usize) -> &mut FuncUnit {
        &mut self.groups[gi].1[ui]
    }

    /// All units in table order.
    pub fn units(&self) -> impl Iterator<Item = &FuncUnit> {
        self.groups.iter().flat_map(|(_, units)| units.iter())
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut FuncUnit> {
        self.groups.iter_mut().flat_map(|(_, units)| units.iter_mut())
    }

    /// (group, unit) index pairs, in table order. Lets the sweep walk
    /// the table without holding a borrow across mutations.
    pub fn index_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (gi, (_, units)) in self.groups.iter().enumerate() {
            for ui in 0..units.len() {
                pairs.push((gi, ui));
            }
        }
        pairs
    }

    /// Return every unit to idle. Used on misprediction recovery.
    pub fn reset_all(&mut self) {
        for unit in self.units_mut() {
            unit.reset();
        }
    }
}
