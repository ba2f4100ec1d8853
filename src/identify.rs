//! Opcode identification from before/after register samples.
//!
//! A device dump labels instructions with raw numeric opcodes whose meaning
//! is unknown. Each sample (before-state, raw instruction, after-state) rules
//! out every instruction semantics that could not have produced the observed
//! transition; intersecting that evidence per numeric opcode, then repeatedly
//! finalizing singletons and eliminating them elsewhere, recovers the full
//! opcode table. Candidate sets only ever shrink, so the worklist needs no
//! backtracking and converges within one pass per opcode.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::isa::{Instruction, Opcode};
use crate::state::{RegisterError, Registers};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifyError {
    #[error("samples leave {unresolved} opcode(s) with more than one candidate")]
    Ambiguous { unresolved: usize },
    #[error("samples for opcode {opcode} are inconsistent with every known instruction")]
    Contradiction { opcode: u8 },
    #[error("test program uses opcode {opcode}, which the samples never resolved")]
    UnmappedOpcode { opcode: u8 },
    #[error(transparent)]
    Register(#[from] RegisterError),
}

/// An instruction as it appears in a sample dump: numeric opcode, unknown
/// semantics, plus the usual three operand fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstruction {
    pub opcode: u8,
    pub a: i64,
    pub b: i64,
    pub c: i64,
}

impl RawInstruction {
    pub fn new(opcode: u8, a: i64, b: i64, c: i64) -> Self {
        Self { opcode, a, b, c }
    }

    /// Bind this raw instruction to concrete semantics.
    pub fn with_opcode(self, op: Opcode) -> Instruction {
        Instruction::new(op, self.a, self.b, self.c)
    }
}

/// One observed transition: register state around a single raw instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub before: Registers,
    pub instruction: RawInstruction,
    pub after: Registers,
}

/// A subset of the 16 opcodes, packed one bit per [`Opcode::index`].
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct OpcodeSet(u16);

impl OpcodeSet {
    pub const EMPTY: OpcodeSet = OpcodeSet(0);

    /// The full 16-opcode universe.
    pub fn all() -> Self {
        OpcodeSet(u16::MAX)
    }

    pub fn contains(self, op: Opcode) -> bool {
        self.0 & (1 << op.index()) != 0
    }

    pub fn insert(&mut self, op: Opcode) {
        self.0 |= 1 << op.index();
    }

    pub fn remove(&mut self, op: Opcode) {
        self.0 &= !(1 << op.index());
    }

    pub fn intersect(self, other: OpcodeSet) -> OpcodeSet {
        OpcodeSet(self.0 & other.0)
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The sole member, when the set is a singleton.
    pub fn single(self) -> Option<Opcode> {
        if self.len() == 1 {
            self.iter().next()
        } else {
            None
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Opcode> {
        Opcode::ALL.into_iter().filter(move |op| self.contains(*op))
    }
}

impl FromIterator<Opcode> for OpcodeSet {
    fn from_iter<I: IntoIterator<Item = Opcode>>(iter: I) -> Self {
        let mut set = OpcodeSet::EMPTY;
        for op in iter {
            set.insert(op);
        }
        set
    }
}

impl fmt::Debug for OpcodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Opcode::mnemonic)).finish()
    }
}

/// Every instruction semantics consistent with the sample's transition.
///
/// An opcode whose register-mode operands are out of range for the sample's
/// file simply cannot have produced the transition, so it never matches;
/// bounds violations are only errors for programs.
pub fn matching_opcodes(sample: &Sample) -> OpcodeSet {
    Opcode::ALL
        .into_iter()
        .filter(|op| {
            let mut regs = sample.before.clone();
            sample.instruction.with_opcode(*op).apply(&mut regs).is_ok() && regs == sample.after
        })
        .collect()
}

/// Count samples matched by at least `threshold` distinct instructions.
pub fn count_ambiguous(samples: &[Sample], threshold: usize) -> usize {
    samples
        .iter()
        .filter(|sample| matching_opcodes(sample).len() >= threshold)
        .count()
}

/// Recover the numeric-opcode table from a sample set.
///
/// Per numeric opcode the candidate set starts at the full universe and is
/// intersected with each sample's matching set; the worklist then finalizes
/// singletons and eliminates their mnemonics from every other set until
/// nothing changes. Only opcodes observed in the samples appear in the
/// result.
pub fn resolve_opcode_mapping(samples: &[Sample]) -> Result<BTreeMap<u8, Opcode>, IdentifyError> {
    let mut candidates: BTreeMap<u8, OpcodeSet> = BTreeMap::new();
    for sample in samples {
        let entry = candidates
            .entry(sample.instruction.opcode)
            .or_insert_with(OpcodeSet::all);
        *entry = entry.intersect(matching_opcodes(sample));
        if entry.is_empty() {
            return Err(IdentifyError::Contradiction {
                opcode: sample.instruction.opcode,
            });
        }
    }

    let mut resolved: BTreeMap<u8, Opcode> = BTreeMap::new();
    loop {
        let mut changed = false;
        let singletons: Vec<(u8, Opcode)> = candidates
            .iter()
            .filter_map(|(&num, set)| set.single().map(|op| (num, op)))
            .collect();
        for (num, op) in singletons {
            candidates.remove(&num);
            resolved.insert(num, op);
            changed = true;
            // Global uniqueness: no other numeric opcode may mean the same thing.
            for (&other, set) in candidates.iter_mut() {
                set.remove(op);
                if set.is_empty() {
                    return Err(IdentifyError::Contradiction { opcode: other });
                }
            }
        }
        if !changed {
            break;
        }
    }

    if !candidates.is_empty() {
        return Err(IdentifyError::Ambiguous {
            unresolved: candidates.len(),
        });
    }
    Ok(resolved)
}

/// Execute a raw-opcode program through a resolved mapping.
///
/// The dump's trailing test program has no ip binding: instructions run
/// strictly in order against the sample-sized register file. An opcode the
/// samples never resolved is [`IdentifyError::UnmappedOpcode`]; an
/// out-of-range operand is a plain [`RegisterError`] (program-format error,
/// not an inference failure).
pub fn run_identified_program(
    mapping: &BTreeMap<u8, Opcode>,
    program: &[RawInstruction],
    mut regs: Registers,
) -> Result<Registers, IdentifyError> {
    for raw in program {
        let op = *mapping
            .get(&raw.opcode)
            .ok_or(IdentifyError::UnmappedOpcode { opcode: raw.opcode })?;
        raw.with_opcode(op).apply(&mut regs)?;
    }
    Ok(regs)
}
