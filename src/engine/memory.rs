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

// memory.rs
//
// This file contains the simulated data memory: a flat array of 64-bit
// cells addressed in 8-byte units. Each cell remembers whether it holds
// an integer or a float, and loads must agree with that typing.

use crate::engine::value::Value;
use crate::errors::SimulatorError;

#[derive(Debug, Clone)]
pub struct Memory {
    pub data: Vec<Value>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![Value::Float(0.0); size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Seed a cell during configuration load, before simulation starts.
    pub fn init_cell(&mut self, index: usize, value: Value) -> Result<(), SimulatorError> {
        if index >= self.data.len() {
            return Err(SimulatorError::MemoryOutOfBounds((index * 8) as i64));
        }
        self.data[index] = value;
        Ok(())
    }

    /// Byte address -> cell index. Addresses must be non-negative
    /// multiples of 8 inside the configured memory.
    fn cell_index(&self, addr: i64) -> Result<usize, SimulatorError> {
        if addr % 8 != 0 {
            return Err(SimulatorError::MemoryMisaligned(addr));
        }
        let index = addr / 8;
        if index < 0 || index as usize >= self.data.len() {
            return Err(SimulatorError::MemoryOutOfBounds(addr));
        }
        Ok(index as usize)
    }

    /// Read a cell as the requested type. Reading a float cell as an
    /// integer (or vice versa) is a fatal type mismatch.
    pub fn load(&self, addr: i64, float: bool) -> Result<Value, SimulatorError> {
        let index = self.cell_index(addr)?;
        let cell = self.data[index];
        let expected = if float { "float" } else { "int" };
        match (float, cell) {
            (true, Value::Float(_)) | (false, Value::Int(_)) => Ok(cell),
            _ => Err(SimulatorError::TypeMismatch {
                addr,
                expected,
                found: cell.kind(),
            }),
        }
    }

    pub fn store(&mut self, addr: i64, value: Value) -> Result<(), SimulatorError> {
        let index = self.cell_index(addr)?;
        self.data[index] = value;
        Ok(())
    }

    pub fn dump(&self) -> String {
        self.data
            .iter()
            .map(|cell| cell.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
