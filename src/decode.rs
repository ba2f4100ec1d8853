//! Parsers for the device's two text formats.
//!
//! Programs: an `#ip <N>` header followed by one `<mnemonic> <a> <b> <c>`
//! line per instruction. Sample dumps: `Before:`/instruction/`After:` triples
//! separated by blank lines, the samples ending at two consecutive blank
//! lines, optionally followed by a raw numeric test program.
//!
//! Errors carry 1-based line numbers and are raised eagerly; a malformed
//! line aborts the whole parse with no partial result.

use crate::exec::Program;
use crate::identify::{RawInstruction, Sample};
use crate::isa::{Instruction, Opcode, UnknownMnemonic};
use crate::state::Registers;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line {line}: expected '#ip <N>' header, got '{text}'")]
    IpHeader { line: usize, text: String },
    #[error("line {line}: {source}")]
    Mnemonic {
        line: usize,
        #[source]
        source: UnknownMnemonic,
    },
    #[error("line {line}: expected '<op> <a> <b> <c>', got '{text}'")]
    Instruction { line: usize, text: String },
    #[error("line {line}: expected '{label}: [r0, r1, ...]', got '{text}'")]
    Snapshot {
        line: usize,
        label: &'static str,
        text: String,
    },
    #[error("line {line}: sample is truncated")]
    TruncatedSample { line: usize },
    #[error("line {line}: before/after snapshots have different lengths")]
    SnapshotLength { line: usize },
    #[error("program has no instructions")]
    EmptyProgram,
}

/// Parse an ip-bound program (`#ip <N>` header plus mnemonic lines).
pub fn parse_program(text: &str) -> Result<Program, DecodeError> {
    let mut lines = text.lines().enumerate();
    let (index, header) = lines
        .by_ref()
        .find(|(_, line)| !line.trim().is_empty())
        .ok_or(DecodeError::EmptyProgram)?;
    let ip_reg = header
        .trim()
        .strip_prefix("#ip")
        .and_then(|rest| rest.trim().parse::<usize>().ok())
        .ok_or_else(|| DecodeError::IpHeader {
            line: index + 1,
            text: header.to_string(),
        })?;

    let mut instructions = Vec::new();
    for (index, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        instructions.push(parse_instruction(line, index + 1)?);
    }
    if instructions.is_empty() {
        return Err(DecodeError::EmptyProgram);
    }
    Ok(Program::new(ip_reg, instructions))
}

/// Parse one `<mnemonic> <a> <b> <c>` line.
fn parse_instruction(line: &str, line_no: usize) -> Result<Instruction, DecodeError> {
    let mut tokens = line.split_whitespace();
    let mnemonic = tokens.next().ok_or_else(|| DecodeError::Instruction {
        line: line_no,
        text: line.to_string(),
    })?;
    let op: Opcode = mnemonic.parse().map_err(|source| DecodeError::Mnemonic {
        line: line_no,
        source,
    })?;
    let [a, b, c] = parse_operands(tokens, line, line_no)?;
    Ok(Instruction::new(op, a, b, c))
}

/// Parse one `<opcode> <a> <b> <c>` line with a numeric opcode.
fn parse_raw_instruction(line: &str, line_no: usize) -> Result<RawInstruction, DecodeError> {
    let mut tokens = line.split_whitespace();
    let opcode = tokens
        .next()
        .and_then(|tok| tok.parse::<u8>().ok())
        .ok_or_else(|| DecodeError::Instruction {
            line: line_no,
            text: line.to_string(),
        })?;
    let [a, b, c] = parse_operands(tokens, line, line_no)?;
    Ok(RawInstruction::new(opcode, a, b, c))
}

/// Pull exactly three non-negative operands off a token stream.
fn parse_operands<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    line: &str,
    line_no: usize,
) -> Result<[i64; 3], DecodeError> {
    let err = || DecodeError::Instruction {
        line: line_no,
        text: line.to_string(),
    };
    let mut operands = [0i64; 3];
    for slot in operands.iter_mut() {
        let value = tokens
            .next()
            .and_then(|tok| tok.parse::<i64>().ok())
            .filter(|&value| value >= 0)
            .ok_or_else(err)?;
        *slot = value;
    }
    if tokens.next().is_some() {
        return Err(err());
    }
    Ok(operands)
}

/// Parse a `Before: [..]` / `After: [..]` snapshot line.
fn parse_snapshot(
    line: &str,
    label: &'static str,
    line_no: usize,
) -> Result<Registers, DecodeError> {
    let err = || DecodeError::Snapshot {
        line: line_no,
        label,
        text: line.to_string(),
    };
    let body = line
        .trim()
        .strip_prefix(label)
        .and_then(|rest| rest.trim_start().strip_prefix(':'))
        .map(str::trim)
        .and_then(|rest| rest.strip_prefix('['))
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(err)?;
    let values = body
        .split(',')
        .map(|tok| tok.trim().parse::<i64>())
        .collect::<Result<Vec<i64>, _>>()
        .map_err(|_| err())?;
    Ok(Registers::from_values(values))
}

/// Parse only the samples of a device dump.
pub fn parse_samples(text: &str) -> Result<Vec<Sample>, DecodeError> {
    Ok(parse_device_dump(text)?.0)
}

/// Parse a full device dump: the samples plus the raw test program that
/// follows the double blank line.
pub fn parse_device_dump(text: &str) -> Result<(Vec<Sample>, Vec<RawInstruction>), DecodeError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut samples = Vec::new();
    let mut cursor = 0usize;

    loop {
        while cursor < lines.len() && lines[cursor].trim().is_empty() {
            cursor += 1;
        }
        if cursor >= lines.len() || !lines[cursor].trim_start().starts_with("Before") {
            break;
        }
        let before = parse_snapshot(lines[cursor], "Before", cursor + 1)?;
        let instr_line = lines
            .get(cursor + 1)
            .filter(|line| !line.trim().is_empty())
            .ok_or(DecodeError::TruncatedSample { line: cursor + 2 })?;
        let instruction = parse_raw_instruction(instr_line, cursor + 2)?;
        let after_line = lines
            .get(cursor + 2)
            .filter(|line| !line.trim().is_empty())
            .ok_or(DecodeError::TruncatedSample { line: cursor + 3 })?;
        let after = parse_snapshot(after_line, "After", cursor + 3)?;
        if before.len() != after.len() {
            return Err(DecodeError::SnapshotLength { line: cursor + 3 });
        }
        samples.push(Sample {
            before,
            instruction,
            after,
        });
        cursor += 3;
    }

    let mut program = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(cursor) {
        if line.trim().is_empty() {
            continue;
        }
        program.push(parse_raw_instruction(line, index + 1)?);
    }
    Ok((samples, program))
}
