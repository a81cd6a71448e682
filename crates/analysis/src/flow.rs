//! Subroutine discovery and jump classification.
//!
//! Entry points come from `JSR` targets plus the implicit entry at the
//! first instruction. Each subroutine's extent runs to the next entry
//! point. Resolution walks an explicit work-list over the entry table;
//! no call-stack recursion, so mutually recursive scripts cannot
//! overflow the analyzer.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use ncsdc_common::{Opcode, Script};

use crate::diag::{DiagKind, Diagnostic};
use crate::stack::emulate;

/// Resolution state of one subroutine in the work-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Entry point known, extent not yet classified.
    Discovered,
    /// Currently on the work-list being classified.
    Resolving,
    /// Control flow fully classified.
    Resolved,
    /// Classification failed; emit as a flat raw block.
    Raw,
}

/// One structured construct recognized inside a subroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlShape {
    /// Forward conditional branch at `branch_at` skipping to `then_end`;
    /// `else_end` is the join after the alternative body, when present.
    Conditional {
        branch_at: u32,
        then_end: u32,
        else_end: Option<u32>,
    },
    /// Backward jump at `back_at` returning to `head`.
    Loop { head: u32, back_at: u32 },
    /// Forward unconditional jump straight to the subroutine's exit.
    ExitJump { at: u32 },
}

/// A discovered subroutine and its classified control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct Subroutine {
    /// Entry byte offset; doubles as the subroutine's name.
    pub entry: u32,
    /// One past the last owned byte.
    pub end: u32,
    /// Index range into `Script::instructions`.
    pub start_index: usize,
    pub end_index: usize,
    /// Offsets of every `JSR` referencing this entry.
    pub callers: Vec<u32>,
    pub state: Resolution,
    pub control: Vec<ControlShape>,
    /// Branch offsets absorbed into a construct (else intros and loop
    /// back-edges); the tree builder emits nothing for these.
    pub consumed: BTreeSet<u32>,
    /// True for the entry introduced by position rather than a `JSR`.
    pub implicit: bool,
}

impl Subroutine {
    pub fn contains(&self, offset: u32) -> bool {
        (self.entry..self.end).contains(&offset)
    }

    pub fn is_raw(&self) -> bool {
        self.state == Resolution::Raw
    }
}

/// Full analysis output: subroutines in entry-offset order plus every
/// diagnostic collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub subroutines: Vec<Subroutine>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    /// Subroutine owning `offset`, if any.
    pub fn subroutine_at(&self, offset: u32) -> Option<&Subroutine> {
        self.subroutines.iter().find(|s| s.contains(offset))
    }

    /// Whether `entry` names a discovered subroutine.
    pub fn is_entry(&self, entry: u32) -> bool {
        self.subroutines.iter().any(|s| s.entry == entry)
    }
}

/// Discover subroutines and classify their control flow.
pub fn analyze(script: &Script) -> Analysis {
    let mut diagnostics = Vec::new();

    // Pass 1: gather entry points and caller lists from JSR operands.
    let mut entries: BTreeSet<u32> = BTreeSet::new();
    let mut callers: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    let mut bad_calls: Vec<u32> = Vec::new();

    if let Some(first) = script.instructions.first() {
        entries.insert(first.offset);
    }
    for inst in &script.instructions {
        if inst.opcode != Opcode::Jsr {
            continue;
        }
        match resolved_target(script, inst.branch_target(), false) {
            Some(target) => {
                entries.insert(target);
                callers.entry(target).or_default().push(inst.offset);
            }
            None => bad_calls.push(inst.offset),
        }
    }

    // Pass 2: partition the stream into extents between entry points.
    let bounds: Vec<u32> = entries.iter().copied().collect();
    let mut table: BTreeMap<u32, Subroutine> = BTreeMap::new();
    for (i, &entry) in bounds.iter().enumerate() {
        let end = bounds
            .get(i + 1)
            .copied()
            .unwrap_or_else(|| script.end_offset());
        let start_index = script.index_of(entry).unwrap_or(script.len());
        let end_index = script.index_of(end).unwrap_or(script.len());
        let callers = callers.remove(&entry).unwrap_or_default();
        let implicit = i == 0 && callers.is_empty();
        table.insert(
            entry,
            Subroutine {
                entry,
                end,
                start_index,
                end_index,
                callers,
                state: Resolution::Discovered,
                control: Vec::new(),
                consumed: BTreeSet::new(),
                implicit,
            },
        );
    }

    // Pass 3: resolve each subroutine off an explicit work-list.
    let mut worklist: VecDeque<u32> = table.keys().copied().collect();
    while let Some(entry) = worklist.pop_front() {
        let sub = table.get_mut(&entry).unwrap_or_else(|| unreachable!());
        if sub.state != Resolution::Discovered {
            continue;
        }
        sub.state = Resolution::Resolving;
        resolve(script, sub, &bad_calls, &mut diagnostics);
    }

    diagnostics.sort_by_key(|d| d.offset);
    Analysis {
        subroutines: table.into_values().collect(),
        diagnostics,
    }
}

/// A branch target is valid when it lands on an instruction boundary,
/// or exactly one past the last instruction for plain jumps. A call
/// must land on a real instruction.
fn resolved_target(script: &Script, target: Option<i64>, allow_end: bool) -> Option<u32> {
    let target = target?;
    if target < 0 || target > i64::from(u32::MAX) {
        return None;
    }
    let target = target as u32;
    if script.index_of(target).is_some() || (allow_end && target == script.end_offset()) {
        Some(target)
    } else {
        None
    }
}

fn resolve(
    script: &Script,
    sub: &mut Subroutine,
    bad_calls: &[u32],
    diagnostics: &mut Vec<Diagnostic>,
) {
    // A call with an unresolvable target demotes its own subroutine.
    let mut demoted = false;
    for &call_at in bad_calls {
        if sub.contains(call_at) {
            diagnostics.push(Diagnostic::new(
                call_at,
                DiagKind::InvalidBranchTarget,
                "call target is outside the buffer or off an instruction boundary",
            ));
            demoted = true;
        }
    }

    // Every branch inside the extent must land on a boundary.
    let extent = &script.instructions[sub.start_index..sub.end_index];
    for inst in extent {
        if !matches!(inst.opcode, Opcode::Jmp | Opcode::Jz | Opcode::Jnz) {
            continue;
        }
        if resolved_target(script, inst.branch_target(), true).is_none() {
            diagnostics.push(Diagnostic::new(
                inst.offset,
                DiagKind::InvalidBranchTarget,
                "branch target is outside the buffer or off an instruction boundary",
            ));
            demoted = true;
        }
    }
    if demoted {
        sub.state = Resolution::Raw;
        return;
    }

    // Stack discipline; an abort demotes to raw.
    let emulation = emulate(script, sub.start_index, sub.end_index);
    diagnostics.extend(emulation.diagnostics);
    if let Some(abort) = emulation.abort {
        diagnostics.push(Diagnostic::new(
            abort.offset(),
            abort.kind(),
            abort.to_string(),
        ));
        sub.state = Resolution::Raw;
        return;
    }

    classify(script, sub);
    sub.state = Resolution::Resolved;
}

/// Classify every branch in a validated extent.
fn classify(script: &Script, sub: &mut Subroutine) {
    let extent = &script.instructions[sub.start_index..sub.end_index];
    for inst in extent {
        let Some(raw_target) = inst.branch_target() else {
            continue;
        };
        // Targets were validated in resolve().
        let target = raw_target as u32;
        match inst.opcode {
            Opcode::Jz | Opcode::Jnz => {
                if target <= inst.offset {
                    // Backward conditional branch closes an iteration.
                    sub.consumed.insert(inst.offset);
                    sub.control.push(ControlShape::Loop {
                        head: target,
                        back_at: inst.offset,
                    });
                } else {
                    let else_end = else_join(script, sub, target);
                    sub.control.push(ControlShape::Conditional {
                        branch_at: inst.offset,
                        then_end: target,
                        else_end,
                    });
                }
            }
            Opcode::Jmp => {
                if target <= inst.offset {
                    sub.consumed.insert(inst.offset);
                    sub.control.push(ControlShape::Loop {
                        head: target,
                        back_at: inst.offset,
                    });
                } else if sub.consumed.contains(&inst.offset) {
                    // Already absorbed as an else intro.
                } else if target >= sub.end {
                    sub.consumed.insert(inst.offset);
                    sub.control.push(ControlShape::ExitJump { at: inst.offset });
                }
            }
            _ => {}
        }
    }
    sub.control.sort_by_key(|shape| match shape {
        ControlShape::Conditional { branch_at, .. } => *branch_at,
        ControlShape::Loop { back_at, .. } => *back_at,
        ControlShape::ExitJump { at } => *at,
    });
}

/// When the instruction just before a conditional's join is a forward
/// `JMP`, that jump introduces the else body and its target is the
/// real join.
fn else_join(script: &Script, sub: &mut Subroutine, then_end: u32) -> Option<u32> {
    let join_index = script.index_of(then_end)?;
    if join_index == 0 || join_index <= sub.start_index {
        return None;
    }
    let before = &script.instructions[join_index - 1];
    if before.opcode != Opcode::Jmp {
        return None;
    }
    let target = resolved_target(script, before.branch_target(), true)?;
    if target <= before.offset {
        return None;
    }
    sub.consumed.insert(before.offset);
    Some(target)
}
