//! Typed stack emulation.
//!
//! Replays a subroutine's instructions against a stack of typed 4-byte
//! cells. Only counts and types are tracked, never runtime values: the
//! emulator exists to validate stack discipline and to expose depth
//! traces to the control-flow passes, not to execute scripts.

use std::collections::BTreeMap;

use ncsdc_common::{Instruction, Opcode, Operands, Qualifier, Script};
use thiserror::Error;

use crate::diag::{DiagKind, Diagnostic};

/// Type of one 4-byte stack cell. Vectors occupy three `Float` cells.
///
/// `Opaque` is the type-erased fallback pushed after a type mismatch
/// and matches any expected type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Int,
    Float,
    Str,
    Object,
    Effect,
    Event,
    Location,
    Talent,
    Opaque,
}

impl CellType {
    fn name(&self) -> &'static str {
        match self {
            CellType::Int => "int",
            CellType::Float => "float",
            CellType::Str => "string",
            CellType::Object => "object",
            CellType::Effect => "effect",
            CellType::Event => "event",
            CellType::Location => "location",
            CellType::Talent => "talent",
            CellType::Opaque => "opaque",
        }
    }

    fn accepts(&self, found: CellType) -> bool {
        *self == CellType::Opaque || found == CellType::Opaque || *self == found
    }
}

/// Conditions that end a subroutine's emulation early.
///
/// The caller demotes the affected subroutine to a raw block; the rest
/// of the run is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmulateAbort {
    #[error("stack underflow at {offset:#010x}")]
    StackUnderflow { offset: u32 },

    #[error("frame index {index} out of range (frame holds {frame} cells) at {offset:#010x}")]
    FrameIndexOutOfRange { offset: u32, index: i64, frame: usize },
}

impl EmulateAbort {
    pub fn offset(&self) -> u32 {
        match self {
            EmulateAbort::StackUnderflow { offset } => *offset,
            EmulateAbort::FrameIndexOutOfRange { offset, .. } => *offset,
        }
    }

    pub fn kind(&self) -> DiagKind {
        match self {
            EmulateAbort::StackUnderflow { .. } => DiagKind::StackUnderflow,
            EmulateAbort::FrameIndexOutOfRange { .. } => DiagKind::FrameIndexOutOfRange,
        }
    }
}

/// Result of emulating one subroutine extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Emulation {
    /// `(offset, depth)` after each instruction, in walk order.
    pub trace: Vec<(u32, usize)>,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the walk stopped early; `trace` covers the prefix.
    pub abort: Option<EmulateAbort>,
}

/// Emulate the instruction range `[start, end)` of `script` with a
/// fresh stack and frame.
pub fn emulate(script: &Script, start: usize, end: usize) -> Emulation {
    let mut emu = Emulator::default();
    let mut abort = None;
    for inst in &script.instructions[start..end] {
        if let Err(stop) = emu.step(inst) {
            abort = Some(stop);
            break;
        }
        emu.trace.push((inst.offset, emu.stack.len()));
    }
    Emulation {
        trace: emu.trace,
        diagnostics: emu.diagnostics,
        abort,
    }
}

#[derive(Default)]
struct Emulator {
    stack: Vec<CellType>,
    /// Base pointer: index one past the frame cells, if a frame is live.
    bp: Option<usize>,
    saved_bp: Vec<Option<usize>>,
    /// Depth expected when the walk reaches a recorded branch target.
    expected: BTreeMap<u32, usize>,
    diagnostics: Vec<Diagnostic>,
    trace: Vec<(u32, usize)>,
}

/// `(cell type, cell count)` for one side of a paired qualifier.
fn sides(qualifier: Qualifier) -> Option<((CellType, usize), (CellType, usize))> {
    use CellType::*;
    Some(match qualifier {
        Qualifier::IntInt => ((Int, 1), (Int, 1)),
        Qualifier::FloatFloat => ((Float, 1), (Float, 1)),
        Qualifier::ObjectObject => ((Object, 1), (Object, 1)),
        Qualifier::StrStr => ((Str, 1), (Str, 1)),
        Qualifier::IntFloat => ((Int, 1), (Float, 1)),
        Qualifier::FloatInt => ((Float, 1), (Int, 1)),
        Qualifier::EffectEffect => ((Effect, 1), (Effect, 1)),
        Qualifier::EventEvent => ((Event, 1), (Event, 1)),
        Qualifier::LocationLocation => ((Location, 1), (Location, 1)),
        Qualifier::TalentTalent => ((Talent, 1), (Talent, 1)),
        Qualifier::VecVec => ((Float, 3), (Float, 3)),
        Qualifier::VecFloat => ((Float, 3), (Float, 1)),
        Qualifier::FloatVec => ((Float, 1), (Float, 3)),
        _ => return None,
    })
}

fn reserve_cell(qualifier: Qualifier) -> CellType {
    match qualifier {
        Qualifier::Int => CellType::Int,
        Qualifier::Float => CellType::Float,
        Qualifier::Str => CellType::Str,
        Qualifier::Object => CellType::Object,
        Qualifier::Effect => CellType::Effect,
        Qualifier::Event => CellType::Event,
        Qualifier::Location => CellType::Location,
        Qualifier::Talent => CellType::Talent,
        _ => CellType::Opaque,
    }
}

fn is_comparison(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Equal
            | Opcode::NotEqual
            | Opcode::GreaterEq
            | Opcode::Greater
            | Opcode::Less
            | Opcode::LessEq
            | Opcode::LogAnd
            | Opcode::LogOr
            | Opcode::IncOr
            | Opcode::ExcOr
            | Opcode::BoolAnd
            | Opcode::ShLeft
            | Opcode::ShRight
            | Opcode::UShRight
    )
}

fn result_cells(opcode: Opcode, qualifier: Qualifier) -> (CellType, usize) {
    if is_comparison(opcode) {
        return (CellType::Int, 1);
    }
    match qualifier {
        Qualifier::IntInt => (CellType::Int, 1),
        Qualifier::IntFloat | Qualifier::FloatInt | Qualifier::FloatFloat => (CellType::Float, 1),
        Qualifier::StrStr => (CellType::Str, 1),
        Qualifier::VecVec | Qualifier::VecFloat | Qualifier::FloatVec => (CellType::Float, 3),
        _ => (CellType::Opaque, 1),
    }
}

impl Emulator {
    fn step(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        self.check_convergence(inst.offset);

        match inst.opcode {
            Opcode::Const => self.stack.push(reserve_cell(inst.qualifier)),
            Opcode::Reserve => self.stack.push(reserve_cell(inst.qualifier)),

            Opcode::CopyTopSp => self.copy_top_sp(inst)?,
            Opcode::CopyDownSp => self.copy_down_sp(inst)?,
            Opcode::CopyTopBp => self.copy_top_bp(inst)?,
            Opcode::CopyDownBp => self.copy_down_bp(inst)?,

            Opcode::MoveSp => self.move_sp(inst)?,
            Opcode::IncSp | Opcode::DecSp => self.touch_sp_int(inst)?,
            Opcode::IncBp | Opcode::DecBp => self.touch_bp_int(inst)?,

            Opcode::Neg => {
                let want = match inst.qualifier {
                    Qualifier::Float => CellType::Float,
                    _ => CellType::Int,
                };
                self.pop_typed(inst, want)?;
                self.stack.push(want);
            }
            Opcode::Comp | Opcode::Not => {
                self.pop_typed(inst, CellType::Int)?;
                self.stack.push(CellType::Int);
            }

            Opcode::Equal | Opcode::NotEqual
                if inst.qualifier == Qualifier::StructStruct =>
            {
                let size = match inst.operands {
                    Operands::StructSize(size) => size as usize / 4,
                    _ => 0,
                };
                self.pop_cells(inst.offset, size * 2)?;
                self.stack.push(CellType::Int);
            }

            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Equal
            | Opcode::NotEqual
            | Opcode::GreaterEq
            | Opcode::Greater
            | Opcode::Less
            | Opcode::LessEq
            | Opcode::LogAnd
            | Opcode::LogOr
            | Opcode::IncOr
            | Opcode::ExcOr
            | Opcode::BoolAnd
            | Opcode::ShLeft
            | Opcode::ShRight
            | Opcode::UShRight => self.binary(inst)?,

            Opcode::Jz | Opcode::Jnz => {
                self.pop_typed(inst, CellType::Int)?;
                self.record_target(inst);
            }
            Opcode::Jmp => self.record_target(inst),

            Opcode::Action => {
                let arg_count = match inst.operands {
                    Operands::Action { arg_count, .. } => arg_count as usize,
                    _ => 0,
                };
                self.pop_cells(inst.offset, arg_count)?;
                // Result slot for the engine routine.
                self.stack.push(CellType::Opaque);
            }

            Opcode::Destruct => self.destruct(inst)?,

            Opcode::SaveBp => {
                self.saved_bp.push(self.bp);
                self.stack.push(CellType::Opaque);
                self.bp = Some(self.stack.len());
            }
            Opcode::RestoreBp => {
                self.pop(inst.offset)?;
                self.bp = self.saved_bp.pop().flatten();
            }

            Opcode::Jsr
            | Opcode::Ret
            | Opcode::StoreState
            | Opcode::StoreStateAll
            | Opcode::Nop => {}
        }
        Ok(())
    }

    /// Compare the live depth against the depth recorded by whichever
    /// branch targeted this offset; keep the larger depth on mismatch.
    fn check_convergence(&mut self, offset: u32) {
        if let Some(&want) = self.expected.get(&offset) {
            let found = self.stack.len();
            if want != found {
                self.diagnostics.push(Diagnostic::new(
                    offset,
                    DiagKind::UnbalancedBranch,
                    format!("branch sides converge at depth {want} vs {found}"),
                ));
                while self.stack.len() < want {
                    self.stack.push(CellType::Opaque);
                }
            }
        }
    }

    fn record_target(&mut self, inst: &Instruction) {
        if let Some(target) = inst.branch_target() {
            if target > i64::from(inst.offset) && target <= u32::MAX.into() {
                self.expected.insert(target as u32, self.stack.len());
            }
        }
    }

    fn pop(&mut self, at: u32) -> Result<CellType, EmulateAbort> {
        self.stack
            .pop()
            .ok_or(EmulateAbort::StackUnderflow { offset: at })
    }

    fn pop_cells(&mut self, at: u32, n: usize) -> Result<(), EmulateAbort> {
        if self.stack.len() < n {
            return Err(EmulateAbort::StackUnderflow { offset: at });
        }
        self.stack.truncate(self.stack.len() - n);
        Ok(())
    }

    fn pop_typed(&mut self, inst: &Instruction, want: CellType) -> Result<(), EmulateAbort> {
        let found = self.pop(inst.offset)?;
        if !want.accepts(found) {
            self.mismatch(inst, want, found);
        }
        Ok(())
    }

    fn mismatch(&mut self, inst: &Instruction, want: CellType, found: CellType) {
        self.diagnostics.push(Diagnostic::new(
            inst.offset,
            DiagKind::StackTypeMismatch,
            format!(
                "{}{} expects {}, found {} on the stack",
                inst.opcode.mnemonic(),
                inst.qualifier.suffix(),
                want.name(),
                found.name()
            ),
        ));
    }

    fn binary(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Some((left, right)) = sides(inst.qualifier) else {
            // Unknown pairing; consume nothing, push an opaque result.
            self.stack.push(CellType::Opaque);
            return Ok(());
        };
        let mut clean = true;
        // Right operand sits on top.
        for (want, count) in [right, left] {
            for _ in 0..count {
                let found = self.pop(inst.offset)?;
                if clean && !want.accepts(found) {
                    self.mismatch(inst, want, found);
                    clean = false;
                }
            }
        }
        let (cell, count) = result_cells(inst.opcode, inst.qualifier);
        let cell = if clean { cell } else { CellType::Opaque };
        for _ in 0..count {
            self.stack.push(cell);
        }
        Ok(())
    }

    /// Resolve a negative byte offset relative to the stack top to a
    /// cell range of `cells` elements.
    fn sp_range(&self, at: u32, byte_offset: i32, cells: usize) -> Result<usize, EmulateAbort> {
        let start = self.stack.len() as i64 + i64::from(byte_offset) / 4;
        if start < 0 || start as usize + cells > self.stack.len() {
            return Err(EmulateAbort::StackUnderflow { offset: at });
        }
        Ok(start as usize)
    }

    fn copy_top_sp(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::StackCopy { offset, size } = inst.operands else {
            return Ok(());
        };
        let cells = size as usize / 4;
        let start = self.sp_range(inst.offset, offset, cells)?;
        for i in 0..cells {
            self.stack.push(self.stack[start + i]);
        }
        Ok(())
    }

    fn copy_down_sp(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::StackCopy { offset, size } = inst.operands else {
            return Ok(());
        };
        let cells = size as usize / 4;
        if self.stack.len() < cells {
            return Err(EmulateAbort::StackUnderflow {
                offset: inst.offset,
            });
        }
        let start = self.sp_range(inst.offset, offset, cells)?;
        let top = self.stack.len() - cells;
        for i in 0..cells {
            self.stack[start + i] = self.stack[top + i];
        }
        Ok(())
    }

    /// Resolve a negative byte offset relative to the base pointer.
    fn bp_range(&self, at: u32, byte_offset: i32, cells: usize) -> Result<usize, EmulateAbort> {
        let frame = self.bp.unwrap_or(0);
        let index = frame as i64 + i64::from(byte_offset) / 4;
        if index < 0 || index as usize + cells > frame {
            return Err(EmulateAbort::FrameIndexOutOfRange {
                offset: at,
                index,
                frame,
            });
        }
        Ok(index as usize)
    }

    fn copy_top_bp(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::StackCopy { offset, size } = inst.operands else {
            return Ok(());
        };
        let cells = size as usize / 4;
        let start = self.bp_range(inst.offset, offset, cells)?;
        for i in 0..cells {
            self.stack.push(self.stack[start + i]);
        }
        Ok(())
    }

    fn copy_down_bp(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::StackCopy { offset, size } = inst.operands else {
            return Ok(());
        };
        let cells = size as usize / 4;
        if self.stack.len() < cells {
            return Err(EmulateAbort::StackUnderflow {
                offset: inst.offset,
            });
        }
        let start = self.bp_range(inst.offset, offset, cells)?;
        let top = self.stack.len() - cells;
        for i in 0..cells {
            self.stack[start + i] = self.stack[top + i];
        }
        Ok(())
    }

    fn move_sp(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::Adjust(bytes) = inst.operands else {
            return Ok(());
        };
        let cells = i64::from(bytes) / 4;
        if cells < 0 {
            self.pop_cells(inst.offset, (-cells) as usize)?;
        } else {
            for _ in 0..cells {
                self.stack.push(CellType::Opaque);
            }
        }
        Ok(())
    }

    fn touch_sp_int(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::Adjust(bytes) = inst.operands else {
            return Ok(());
        };
        let start = self.sp_range(inst.offset, bytes, 1)?;
        let found = self.stack[start];
        if !CellType::Int.accepts(found) {
            self.mismatch(inst, CellType::Int, found);
        }
        Ok(())
    }

    fn touch_bp_int(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::Adjust(bytes) = inst.operands else {
            return Ok(());
        };
        let start = self.bp_range(inst.offset, bytes, 1)?;
        let found = self.stack[start];
        if !CellType::Int.accepts(found) {
            self.mismatch(inst, CellType::Int, found);
        }
        Ok(())
    }

    fn destruct(&mut self, inst: &Instruction) -> Result<(), EmulateAbort> {
        let Operands::Destruct {
            size,
            keep_offset,
            keep_size,
        } = inst.operands
        else {
            return Ok(());
        };
        let total = size as usize / 4;
        let keep = keep_size as usize / 4;
        let keep_at = keep_offset.max(0) as usize / 4;
        if self.stack.len() < total || keep_at + keep > total {
            return Err(EmulateAbort::StackUnderflow {
                offset: inst.offset,
            });
        }
        let base = self.stack.len() - total;
        let kept: Vec<CellType> = self.stack[base + keep_at..base + keep_at + keep].to_vec();
        self.stack.truncate(base);
        self.stack.extend(kept);
        Ok(())
    }
}
