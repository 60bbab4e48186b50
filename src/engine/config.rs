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

// config.rs
//
// This file contains the machine configuration document: functional
// unit counts and latencies, the branch speculation policies, the ROB
// capacity, and the initial register and memory state. The on-disk
// format is JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::engine::branch_predictor::{SpecPolicy, StaticPredictor};
use crate::engine::components::{FuncUnit, ReservationStations, UnitExt};
use crate::engine::instruction::{Reg, UnitKind};
use crate::engine::memory::Memory;
use crate::engine::registers::RegisterFile;
use crate::engine::value::Value;
use crate::errors::SimulatorError;

/// Reference reorder-buffer capacity.
pub const DEFAULT_ROB_SIZE: usize = 24;

fn default_number() -> usize {
    1
}

fn default_latency() -> u64 {
    1
}

fn default_rob_size() -> usize {
    DEFAULT_ROB_SIZE
}

fn default_spec_forward() -> SpecPolicy {
    SpecPolicy::NotTaken
}

fn default_spec_backward() -> SpecPolicy {
    SpecPolicy::Taken
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitConfig {
    #[serde(default = "default_number")]
    pub number: usize,
    #[serde(default = "default_latency")]
    pub latency: u64,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            number: 1,
            latency: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultConfig {
    #[serde(default = "default_number")]
    pub number: usize,
    #[serde(default = "default_latency")]
    pub latency: u64,
    #[serde(default = "default_latency")]
    pub div_latency: u64,
}

impl Default for MultConfig {
    fn default() -> Self {
        Self {
            number: 1,
            latency: 1,
            div_latency: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchConfig {
    #[serde(default = "default_number")]
    pub number: usize,
    #[serde(default = "default_latency")]
    pub latency: u64,
    #[serde(default = "default_spec_forward")]
    pub spec_forward: SpecPolicy,
    #[serde(default = "default_spec_backward")]
    pub spec_backward: SpecPolicy,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            number: 1,
            latency: 1,
            spec_forward: SpecPolicy::NotTaken,
            spec_backward: SpecPolicy::Taken,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitsConfig {
    #[serde(default)]
    pub load: UnitConfig,
    #[serde(default)]
    pub store: UnitConfig,
    #[serde(default)]
    pub add: UnitConfig,
    #[serde(default)]
    pub mult: MultConfig,
    #[serde(default)]
    pub alu: UnitConfig,
    #[serde(default)]
    pub branch: BranchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    pub size: usize,
    #[serde(default)]
    pub init: Vec<serde_json::Number>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default = "default_rob_size")]
    pub rob_size: usize,
    #[serde(default)]
    pub registers: BTreeMap<String, serde_json::Number>,
    pub memory: MemoryConfig,
}

impl SimulatorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimulatorError> {
        let text = fs::read_to_string(&path).map_err(|err| {
            SimulatorError::ConfigError(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SimulatorError> {
        let config: SimulatorConfig = serde_json::from_str(text)
            .map_err(|err| SimulatorError::ConfigError(err.to_string()))?;
        if config.rob_size == 0 {
            return Err(SimulatorError::ConfigError(
                "rob_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Instantiate the reservation-station table in configuration
    /// order: Load, Store, Add, Mult, ALU, Branch.
    pub fn build_stations(&self) -> ReservationStations {
        let mut groups = Vec::with_capacity(UnitKind::ALL.len());
        for kind in UnitKind::ALL {
            let (number, latency) = match kind {
                UnitKind::Load => (self.units.load.number, self.units.load.latency),
                UnitKind::Store => (self.units.store.number, self.units.store.latency),
                UnitKind::Add => (self.units.add.number, self.units.add.latency),
                UnitKind::Mult => (self.units.mult.number, self.units.mult.latency),
                UnitKind::Alu => (self.units.alu.number, self.units.alu.latency),
                UnitKind::Branch => (self.units.branch.number, self.units.branch.latency),
            };
            let units = (1..=number)
                .map(|i| {
                    let ext = match kind {
                        UnitKind::Mult => UnitExt::Mult {
                            div_latency: self.units.mult.div_latency,
                        },
                        UnitKind::Branch => UnitExt::Branch {
                            predictor: Box::new(StaticPredictor {
                                forward: self.units.branch.spec_forward,
                                backward: self.units.branch.spec_backward,
                            }),
                        },
                        _ => UnitExt::Plain,
                    };
                    FuncUnit::new(format!("{}{}", kind.name(), i), kind, latency, ext)
                })
                .collect();
            groups.push((kind, units));
        }
        ReservationStations::new(groups)
    }

    /// Seed the architectural register file. Integer registers demand
    /// integer literals; R0 cannot be seeded.
    pub fn build_registers(&self) -> Result<RegisterFile, SimulatorError> {
        let mut regs = RegisterFile::new();
        for (name, number) in &self.registers {
            let reg = Reg::from_str(name)?;
            let value = if reg.is_float() {
                Value::Float(number.as_f64().ok_or_else(|| {
                    SimulatorError::ConfigError(format!("invalid value for {}: {}", name, number))
                })?)
            } else {
                Value::Int(number.as_i64().ok_or_else(|| {
                    SimulatorError::ConfigError(format!(
                        "integer register {} initialized with non-integer {}",
                        name, number
                    ))
                })?)
            };
            regs.set(reg, value)?;
        }
        Ok(regs)
    }

    /// Seed memory. Integer literals make int cells, fractional
    /// literals make float cells; everything else stays Float(0.0).
    pub fn build_memory(&self) -> Result<Memory, SimulatorError> {
        if self.memory.init.len() > self.memory.size {
            return Err(SimulatorError::ConfigError(format!(
                "memory init has {} cells but size is {}",
                self.memory.init.len(),
                self.memory.size
            )));
        }
        let mut memory = Memory::new(self.memory.size);
        for (index, number) in self.memory.init.iter().enumerate() {
            let cell = if let Some(int) = number.as_i64() {
                Value::Int(int)
            } else {
                Value::Float(number.as_f64().ok_or_else(|| {
                    SimulatorError::ConfigError(format!("invalid memory cell value: {}", number))
                })?)
            };
            memory.init_cell(index, cell)?;
        }
        Ok(memory)
    }
}
