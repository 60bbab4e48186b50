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

// parser.rs
//
// This file contains the MIPS64 assembly front end. It strips comments,
// collects standalone labels, resolves them to instruction indices and
// produces the decoded instruction stream the engine executes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::engine::instruction::{Instruction, Opcode, Operand, Reg};
use crate::errors::SimulatorError;

/// Strip comments: ';' opens a comment anywhere; '#' only at the start
/// of a line or after whitespace. A '#' glued to the preceding token is
/// an immediate marker, not a comment.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &byte) in bytes.iter().enumerate() {
        if byte == b';' {
            return &line[..i];
        }
        if byte == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}

fn parse_error(line: usize, message: impl Into<String>) -> SimulatorError {
    SimulatorError::ParseError {
        line,
        message: message.into(),
    }
}

/// Parse one operand token. Labels were collected beforehand and
/// resolve to immediates in instruction-index space.
fn parse_operand(
    token: &str,
    labels: &HashMap<String, usize>,
    line: usize,
) -> Result<Operand, SimulatorError> {
    if token.is_empty() {
        return Err(parse_error(line, "empty operand"));
    }

    if let Some(&target) = labels.get(token) {
        return Ok(Operand::Imm(target as i64));
    }

    if let Some(imm) = token.strip_prefix('#') {
        let value = imm
            .parse::<i64>()
            .map_err(|_| parse_error(line, format!("invalid immediate: {}", token)))?;
        return Ok(Operand::Imm(value));
    }

    // Memory reference: <signed int>(<register>)
    if let Some((offset, rest)) = token.split_once('(') {
        let base = rest
            .strip_suffix(')')
            .ok_or_else(|| parse_error(line, format!("invalid memory operand: {}", token)))?;
        let offset = offset
            .parse::<i64>()
            .map_err(|_| parse_error(line, format!("invalid memory offset: {}", token)))?;
        let base = Reg::from_str(base)?;
        return Ok(Operand::Mem { offset, base });
    }

    if token.starts_with('R') || token.starts_with('F') {
        return Ok(Operand::Reg(Reg::from_str(token)?));
    }

    Err(parse_error(line, format!("invalid operand: {}", token)))
}

/// Parse an assembly source into the decoded instruction stream.
/// `Instruction::addr` equals the instruction's index in the returned
/// vector; branch targets live in the same index space.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, SimulatorError> {
    // First pass: find the standalone labels and the instruction index
    // each one names. A label at the end of the file points one past
    // the last instruction.
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut code_lines: Vec<(usize, &str)> = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let line_no = i + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let first = tokens.next().unwrap_or("");
        if first.ends_with(':') && tokens.next().is_none() {
            let name = first.trim_end_matches(':').to_string();
            if name.is_empty() {
                return Err(parse_error(line_no, "empty label name"));
            }
            if labels.insert(name.clone(), code_lines.len()).is_some() {
                return Err(parse_error(line_no, format!("duplicate label: {}", name)));
            }
            continue;
        }
        code_lines.push((line_no, line));
    }

    // Second pass: decode mnemonics and operands.
    let mut instructions = Vec::with_capacity(code_lines.len());
    for (addr, (line_no, line)) in code_lines.iter().enumerate() {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest.trim()),
            None => (*line, ""),
        };
        let opcode = Opcode::from_mnemonic(&mnemonic.to_uppercase())
            .ok_or_else(|| parse_error(*line_no, format!("unknown mnemonic: {}", mnemonic)))?;

        let operands = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',')
                .map(|token| parse_operand(token.trim(), &labels, *line_no))
                .collect::<Result<Vec<_>, _>>()?
        };

        instructions.push(Instruction::new(addr, opcode, operands));
    }

    Ok(instructions)
}

/// Read and parse an assembly source file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Instruction>, SimulatorError> {
    let source = fs::read_to_string(&path).map_err(|err| {
        SimulatorError::ParseError {
            line: 0,
            message: format!("cannot read {}: {}", path.as_ref().display(), err),
        }
    })?;
    parse_program(&source)
}
