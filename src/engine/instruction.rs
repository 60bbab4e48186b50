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

// instruction.rs
//
// This file contains the decoded representation of MIPS64 instructions:
// register names, operand tokens, mnemonics and their functional-unit
// and operator mappings.

use std::fmt;
use std::str::FromStr;

use crate::errors::SimulatorError;

/// Architectural register name: the integer (R) or floating (F) bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    R(u8),
    F(u8),
}

impl Reg {
    pub fn is_zero(&self) -> bool {
        matches!(self, Reg::R(0))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Reg::F(_))
    }

    /// All register names in trace order: R0..R31 then F0..F31.
    pub fn all() -> impl Iterator<Item = Reg> {
        (0..32).map(Reg::R).chain((0..32).map(Reg::F))
    }
}

impl FromStr for Reg {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SimulatorError::InvalidRegister(s.to_string());
        let (bank, rest): (fn(u8) -> Reg, &str) = if let Some(rest) = s.strip_prefix('R') {
            (Reg::R, rest)
        } else if let Some(rest) = s.strip_prefix('F') {
            (Reg::F, rest)
        } else {
            return Err(invalid());
        };
        let num: u8 = rest.parse().map_err(|_| invalid())?;
        if num >= 32 {
            return Err(invalid());
        }
        Ok(bank(num))
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::R(n) => write!(f, "R{}", n),
            Reg::F(n) => write!(f, "F{}", n),
        }
    }
}

/// Operand token after label resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
    Mem { offset: i64, base: Reg },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Imm(n) => write!(f, "#{}", n),
            Operand::Mem { offset, base } => write!(f, "{}({})", offset, base),
        }
    }
}

/// Functional-unit class an instruction dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Load,
    Store,
    Add,
    Mult,
    Alu,
    Branch,
}

impl UnitKind {
    /// Configuration order. Reservation-station iteration follows it.
    pub const ALL: [UnitKind; 6] = [
        UnitKind::Load,
        UnitKind::Store,
        UnitKind::Add,
        UnitKind::Mult,
        UnitKind::Alu,
        UnitKind::Branch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UnitKind::Load => "Load",
            UnitKind::Store => "Store",
            UnitKind::Add => "Add",
            UnitKind::Mult => "Mult",
            UnitKind::Alu => "ALU",
            UnitKind::Branch => "Branch",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Binary operator attached to arithmetic mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
}

impl BinOp {
    pub fn symbol(&self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
            BinOp::And => '&',
        }
    }
}

/// Assembly mnemonic recognized by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    // Memory
    Ld,
    LdD,
    Lw,
    Sd,
    SdD,
    Sw,
    // Floating point
    AddD,
    SubD,
    MulD,
    DivD,
    // Integer
    Dadd,
    Daddu,
    Daddi,
    Daddiu,
    Addiu,
    Dsub,
    Dsubu,
    Dmul,
    Dmulu,
    Ddiv,
    Ddivu,
    And,
    // Branches
    Beq,
    Bne,
    Beqz,
    Bnez,
    J,
}

impl Opcode {
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        let op = match mnemonic {
            "LD" => Opcode::Ld,
            "L.D" => Opcode::LdD,
            "LW" => Opcode::Lw,
            "SD" => Opcode::Sd,
            "S.D" => Opcode::SdD,
            "SW" => Opcode::Sw,
            "ADD.D" => Opcode::AddD,
            "SUB.D" => Opcode::SubD,
            "MUL.D" => Opcode::MulD,
            "DIV.D" => Opcode::DivD,
            "DADD" => Opcode::Dadd,
            "DADDU" => Opcode::Daddu,
            "DADDI" => Opcode::Daddi,
            "DADDIU" => Opcode::Daddiu,
            "ADDIU" => Opcode::Addiu,
            "DSUB" => Opcode::Dsub,
            "DSUBU" => Opcode::Dsubu,
            "DMUL" => Opcode::Dmul,
            "DMULU" => Opcode::Dmulu,
            "DDIV" => Opcode::Ddiv,
            "DDIVU" => Opcode::Ddivu,
            "AND" => Opcode::And,
            "BEQ" => Opcode::Beq,
            "BNE" => Opcode::Bne,
            "BEQZ" => Opcode::Beqz,
            "BNEZ" => Opcode::Bnez,
            "J" => Opcode::J,
            _ => return None,
        };
        Some(op)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Ld => "LD",
            Opcode::LdD => "L.D",
            Opcode::Lw => "LW",
            Opcode::Sd => "SD",
            Opcode::SdD => "S.D",
            Opcode::Sw => "SW",
            Opcode::AddD => "ADD.D",
            Opcode::SubD => "SUB.D",
            Opcode::MulD => "MUL.D",
            Opcode::DivD => "DIV.D",
            Opcode::Dadd => "DADD",
            Opcode::Daddu => "DADDU",
            Opcode::Daddi => "DADDI",
            Opcode::Daddiu => "DADDIU",
            Opcode::Addiu => "ADDIU",
            Opcode::Dsub => "DSUB",
            Opcode::Dsubu => "DSUBU",
            Opcode::Dmul => "DMUL",
            Opcode::Dmulu => "DMULU",
            Opcode::Ddiv => "DDIV",
            Opcode::Ddivu => "DDIVU",
            Opcode::And => "AND",
            Opcode::Beq => "BEQ",
            Opcode::Bne => "BNE",
            Opcode::Beqz => "BEQZ",
            Opcode::Bnez => "BNEZ",
            Opcode::J => "J",
        }
    }

    pub fn unit(&self) -> UnitKind {
        match self {
            Opcode::Ld | Opcode::LdD | Opcode::Lw => UnitKind::Load,
            Opcode::Sd | Opcode::SdD | Opcode::Sw => UnitKind::Store,
            Opcode::AddD | Opcode::SubD => UnitKind::Add,
            Opcode::MulD | Opcode::DivD => UnitKind::Mult,
            Opcode::Dadd
            | Opcode::Daddu
            | Opcode::Daddi
            | Opcode::Daddiu
            | Opcode::Addiu
            | Opcode::Dsub
            | Opcode::Dsubu
            | Opcode::Dmul
            | Opcode::Dmulu
            | Opcode::Ddiv
            | Opcode::Ddivu
            | Opcode::And => UnitKind::Alu,
            Opcode::Beq | Opcode::Bne | Opcode::Beqz | Opcode::Bnez | Opcode::J => UnitKind::Branch,
        }
    }

    pub fn operator(&self) -> Option<BinOp> {
        match self {
            Opcode::AddD | Opcode::Dadd | Opcode::Daddu | Opcode::Daddi | Opcode::Daddiu
            | Opcode::Addiu => Some(BinOp::Add),
            Opcode::SubD | Opcode::Dsub | Opcode::Dsubu => Some(BinOp::Sub),
            Opcode::MulD | Opcode::Dmul | Opcode::Dmulu => Some(BinOp::Mul),
            Opcode::DivD | Opcode::Ddiv | Opcode::Ddivu => Some(BinOp::Div),
            Opcode::And => Some(BinOp::And),
            _ => None,
        }
    }

    /// Floating-point instruction class: governs memory-cell typing for
    /// loads/stores and the result type of arithmetic.
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Opcode::LdD | Opcode::SdD | Opcode::AddD | Opcode::SubD | Opcode::MulD | Opcode::DivD
        )
    }
}

/// A decoded instruction as produced by the parser. `addr` is the
/// instruction's index in the program stream; branch targets resolved
/// from labels are immediates in the same index space.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub addr: usize,
    pub opcode: Opcode,
    pub unit: UnitKind,
    pub operator: Option<BinOp>,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(addr: usize, opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self {
            addr,
            opcode,
            unit: opcode.unit(),
            operator: opcode.operator(),
            operands,
        }
    }

    /// Branch target: the last operand, resolved by the parser to an
    /// instruction index.
    pub fn branch_target(&self) -> Option<usize> {
        match self.operands.last() {
            Some(Operand::Imm(n)) if *n >= 0 => Some(*n as usize),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", op)?;
            } else {
                write!(f, ",{}", op)?;
            }
        }
        Ok(())
    }
}
