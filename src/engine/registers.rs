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

// registers.rs
//
// This file contains the architectural register file and its parallel
// rename table. 32 integer registers and 32 floating registers, with
// R0 hardwired to zero at the write boundary.

use crate::engine::instruction::Reg;
use crate::engine::value::Value;
use crate::errors::SimulatorError;

#[derive(Debug, Clone)]
pub struct RegisterFile {
    int: [i64; 32],
    float: [f64; 32],
    int_stat: [Option<usize>; 32],
    float_stat: [Option<usize>; 32],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            int: [0; 32],
            float: [0.0; 32],
            int_stat: [None; 32],
            float_stat: [None; 32],
        }
    }

    /// Architected value of a register.
    pub fn get(&self, reg: Reg) -> Value {
        match reg {
            Reg::R(n) => Value::Int(self.int[n as usize]),
            Reg::F(n) => Value::Float(self.float[n as usize]),
        }
    }

    /// Write an architected value. Integer registers truncate floats,
    /// float registers widen integers. R0 is a constant.
    pub fn set(&mut self, reg: Reg, value: Value) -> Result<(), SimulatorError> {
        if reg.is_zero() {
            return Err(SimulatorError::R0Write);
        }
        match reg {
            Reg::R(n) => self.int[n as usize] = value.as_int(),
            Reg::F(n) => self.float[n as usize] = value.as_float(),
        }
        Ok(())
    }

    /// Rename-table entry: the ROB slot of the latest in-flight writer,
    /// or None when the architected value is current.
    pub fn stat(&self, reg: Reg) -> Option<usize> {
        match reg {
            Reg::R(n) => self.int_stat[n as usize],
            Reg::F(n) => self.float_stat[n as usize],
        }
    }

    pub fn set_stat(&mut self, reg: Reg, slot: Option<usize>) {
        match reg {
            Reg::R(n) => self.int_stat[n as usize] = slot,
            Reg::F(n) => self.float_stat[n as usize] = slot,
        }
    }

    /// Forget every in-flight writer. Used on misprediction flush.
    pub fn reset_stat(&mut self) {
        self.int_stat = [None; 32];
        self.float_stat = [None; 32];
    }

    /// Number of registers currently waiting on a ROB entry.
    pub fn pending_writers(&self) -> usize {
        self.int_stat.iter().flatten().count() + self.float_stat.iter().flatten().count()
    }

    pub fn dump(&self) -> String {
        let mut parts = Vec::with_capacity(64);
        for reg in Reg::all() {
            parts.push(format!("{}: {}", reg, self.get(reg)));
        }
        parts.join(", ")
    }
}
