//! # Test Case Sequencer
//!
//! Walks the combination space of segment × instruction × addressing shape ×
//! register assignment and produces one [`TestCase`] per combination.
//!
//! ## Layout
//!
//! Every case stores its result exactly at the current [`Cursor`] offset, and
//! the cursor then advances by the instruction's result width, so read windows
//! are contiguous and never overlap. Register values and displacements are
//! derived from the cursor; the expected address is then recomputed from
//! those inputs by [`crate::effective`] and must land back on the cursor.
//!
//! ## Order
//!
//! Segments in [`crate::catalog::DATA_SEGMENTS`] order, instructions in catalog
//! order, then per stream: direct forms, SIB forms, escape forms. Case numbers
//! and the memory layout depend on this order, so reordering is a breaking
//! change for anything comparing against previously generated vectors.

mod cursor;
mod direct;
mod sib;
mod special;

pub use cursor::{
    split_disp8, Cursor, HARNESS_EPILOGUE_LEN, HARNESS_PROLOGUE_LEN, HARNESS_STACK_BYTES,
};

use crate::addressing::AddressingForm;
use crate::case::{CaseKind, RegisterLoad, TestCase};
use crate::catalog::{Catalog, Instruction, Segment, STACK_ARRAY};
use crate::config::GeneratorConfig;
use crate::effective;
use crate::encoder::encode_instruction;
use crate::error::{GenerationError, Result};
use crate::fragment::StackPointerGuard;

/// All cases for one (segment, instruction) pair, in generation order.
#[derive(Debug, Clone)]
pub struct Stream {
    pub segment: Segment,
    pub instruction: Instruction,
    pub cases: Vec<TestCase>,
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct Generation {
    pub streams: Vec<Stream>,

    /// Cursor after the last case.
    pub cursor: Cursor,
}

impl Generation {
    pub fn case_count(&self) -> usize {
        self.streams.iter().map(|s| s.cases.len()).sum()
    }

    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.streams.iter().flat_map(|s| s.cases.iter())
    }

    /// Total bytes of test code including the harness prologue and epilogue.
    pub fn code_len(&self) -> u32 {
        self.cursor.code_len + HARNESS_EPILOGUE_LEN
    }
}

/// Drives enumeration over a [`Catalog`].
#[derive(Debug, Clone)]
pub struct Sequencer<'a> {
    catalog: &'a Catalog,
    config: GeneratorConfig,
}

impl<'a> Sequencer<'a> {
    pub fn new(catalog: &'a Catalog, config: GeneratorConfig) -> Self {
        Self { catalog, config }
    }

    /// Generate every stream. Stops at the first structural error.
    pub fn run(&self) -> Result<Generation> {
        let mut cursor = Cursor::start();
        let mut streams = Vec::new();

        for segment in self.catalog.segments() {
            cursor = cursor.for_segment();
            for instruction in self.catalog.instructions() {
                let (stream, next) = self.generate_stream(*segment, *instruction, cursor)?;
                streams.push(stream);
                cursor = next;
            }
            tracing::debug!(
                segment = segment.name,
                bytes = cursor.offset,
                "segment layout complete"
            );
        }

        tracing::info!(
            cases = cursor.case_number,
            code_bytes = cursor.code_len + HARNESS_EPILOGUE_LEN,
            "generation complete"
        );

        Ok(Generation { streams, cursor })
    }

    /// Generate the cases for one (segment, instruction) pair starting at
    /// `cursor`, returning them with the cursor after the last one.
    pub fn generate_stream(
        &self,
        segment: Segment,
        instruction: Instruction,
        cursor: Cursor,
    ) -> Result<(Stream, Cursor)> {
        let mut ctx = StreamContext {
            config: &self.config,
            segment,
            instruction,
            cases: Vec::new(),
        };

        let first = cursor.case_number;
        let cursor = direct::enumerate(&mut ctx, cursor)?;
        let cursor = sib::enumerate(&mut ctx, cursor)?;
        let cursor = special::enumerate(&mut ctx, cursor)?;

        tracing::info!(
            instruction = instruction.mnemonic,
            segment = segment.name,
            cases = cursor.case_number - first,
            end_offset = cursor.offset,
            "stream generated"
        );

        Ok((
            Stream {
                segment,
                instruction,
                cases: ctx.cases,
            },
            cursor,
        ))
    }
}

/// Per-stream state shared by the enumeration steps.
pub(crate) struct StreamContext<'c> {
    config: &'c GeneratorConfig,
    segment: Segment,
    instruction: Instruction,
    cases: Vec<TestCase>,
}

impl StreamContext<'_> {
    pub(crate) fn width(&self) -> u32 {
        self.instruction.width.bytes()
    }

    /// Validate, encode and record one case at `cursor`.
    pub(crate) fn emit(
        &mut self,
        cursor: Cursor,
        kind: CaseKind,
        form: AddressingForm,
        loads: Vec<RegisterLoad>,
        displacement: i32,
    ) -> Result<Cursor> {
        if form.rm > 7 {
            return Err(self.invalid(cursor, format!("ModRM rm {} out of range", form.rm)));
        }
        if let Some(sib) = form.sib {
            if sib.base == sib.index {
                return Err(self.invalid(
                    cursor,
                    format!("SIB base and index are both {}", sib.base.name()),
                ));
            }
            if sib.scale > 3 {
                return Err(self.invalid(cursor, format!("SIB scale {} out of range", sib.scale)));
            }
        }

        let disp_width = form.displacement_width();
        if !disp_width.fits(displacement) {
            return Err(self.invalid(
                cursor,
                format!("displacement {displacement} does not fit in {disp_width:?}"),
            ));
        }

        let mut case = TestCase {
            number: cursor.case_number,
            kind,
            segment: self.segment,
            instruction: self.instruction,
            form,
            loads,
            displacement,
            expected_address: 0,
            bytes: encode_instruction(&self.segment, &self.instruction, &form, displacement),
            stack_scratch: StackPointerGuard::scratch_for(&form),
        };
        case.expected_address = effective::for_form(&form, &case, displacement);

        if case.expected_address != cursor.offset {
            return Err(self.invalid(
                cursor,
                format!(
                    "effective address {:#x} does not match cursor {:#x}",
                    case.expected_address, cursor.offset
                ),
            ));
        }

        let array = case.check_array();
        let capacity = if array == STACK_ARRAY {
            self.config
                .segment_capacity
                .saturating_sub(HARNESS_STACK_BYTES)
        } else {
            self.config.segment_capacity
        };
        let width = self.width();
        if u64::from(cursor.offset) + u64::from(width) > u64::from(capacity) {
            return Err(self.overflow(cursor, array, cursor.offset, width, capacity));
        }

        let code_len = case.code_len();
        let code_end =
            u64::from(cursor.code_len) + u64::from(code_len) + u64::from(HARNESS_EPILOGUE_LEN);
        if code_end > u64::from(self.config.code_capacity) {
            return Err(self.overflow(
                cursor,
                "code",
                cursor.code_len,
                code_len,
                self.config.code_capacity,
            ));
        }

        self.cases.push(case);
        Ok(cursor.advance(width, code_len))
    }

    fn invalid(&self, cursor: Cursor, reason: String) -> GenerationError {
        GenerationError::InvalidAddressingCombination {
            instruction: self.instruction.mnemonic,
            segment: self.segment.name,
            case: cursor.case_number,
            reason,
        }
    }

    fn overflow(
        &self,
        cursor: Cursor,
        stream: &'static str,
        offset: u32,
        width: u32,
        capacity: u32,
    ) -> GenerationError {
        GenerationError::LayoutOverflow {
            stream,
            instruction: self.instruction.mnemonic,
            segment: self.segment.name,
            case: cursor.case_number,
            offset,
            width,
            capacity,
        }
    }
}

/// Loads for a SIB form: base first, then index.
pub(crate) fn sib_loads(form: &AddressingForm, base: i32, index: i32) -> Vec<RegisterLoad> {
    match form.sib {
        Some(sib) => vec![
            RegisterLoad {
                register: sib.base,
                value: base,
            },
            RegisterLoad {
                register: sib.index,
                value: index,
            },
        ],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::Mod;
    use crate::catalog::{InstructionScope, Register, DS, SMSW};

    fn context(config: &GeneratorConfig) -> StreamContext<'_> {
        StreamContext {
            config,
            segment: DS,
            instruction: SMSW,
            cases: Vec::new(),
        }
    }

    #[test]
    fn test_emit_rejects_equal_base_and_index() {
        let config = GeneratorConfig::default();
        let mut ctx = context(&config);
        let form = AddressingForm::sib(Mod::Disp32, 0, Register::Ecx, Register::Ecx);
        let loads = sib_loads(&form, 0, 0);

        let err = ctx
            .emit(Cursor::start(), CaseKind::Regular, form, loads, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::InvalidAddressingCombination { case: 0, .. }
        ));
        assert!(ctx.cases.is_empty());
    }

    #[test]
    fn test_emit_rejects_wide_scale() {
        let config = GeneratorConfig::default();
        let mut ctx = context(&config);
        let mut form = AddressingForm::sib(Mod::Disp32, 0, Register::Ecx, Register::Eax);
        if let Some(sib) = form.sib.as_mut() {
            sib.scale = 4;
        }
        let loads = sib_loads(&form, 0, 0);

        let err = ctx
            .emit(Cursor::start(), CaseKind::Regular, form, loads, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::InvalidAddressingCombination { case: 0, .. }
        ));
        assert!(err.to_string().contains("scale 4"));
        assert!(ctx.cases.is_empty());
    }

    #[test]
    fn test_emit_rejects_wide_rm() {
        let config = GeneratorConfig::default();
        let mut ctx = context(&config);
        let form = AddressingForm {
            mode: Mod::Indirect,
            rm: 9,
            sib: None,
        };

        let err = ctx
            .emit(Cursor::start(), CaseKind::Regular, form, Vec::new(), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::InvalidAddressingCombination { case: 0, .. }
        ));
        assert!(err.to_string().contains("rm 9"));
        assert!(ctx.cases.is_empty());
    }

    #[test]
    fn test_emit_rejects_wide_disp8() {
        let config = GeneratorConfig::default();
        let mut ctx = context(&config);
        let form = AddressingForm::direct(Mod::Disp8, Register::Eax);
        let loads = vec![RegisterLoad {
            register: Register::Eax,
            value: -200,
        }];

        let err = ctx
            .emit(Cursor::start(), CaseKind::Regular, form, loads, 200)
            .unwrap_err();
        assert!(err.to_string().contains("does not fit"));
    }

    #[test]
    fn test_emit_rejects_misplaced_address() {
        let config = GeneratorConfig::default();
        let mut ctx = context(&config);
        let form = AddressingForm::absolute();

        let err = ctx
            .emit(Cursor::start(), CaseKind::Special, form, Vec::new(), 4)
            .unwrap_err();
        assert!(err.to_string().contains("does not match cursor"));
    }

    #[test]
    fn test_emit_advances_cursor() {
        let config = GeneratorConfig::default();
        let mut ctx = context(&config);
        let form = AddressingForm::absolute();

        let cursor = ctx
            .emit(Cursor::start(), CaseKind::Special, form, Vec::new(), 0)
            .unwrap();
        assert_eq!(cursor.offset, 2);
        assert_eq!(cursor.case_number, 1);
        // opcode (2) + modrm (1) + disp32 (4)
        assert_eq!(cursor.code_len, HARNESS_PROLOGUE_LEN + 7);
        assert_eq!(ctx.cases[0].bytes, vec![0x0F, 0x01, 0x25, 0, 0, 0, 0]);
    }

    #[test]
    fn test_emit_reports_overflow() {
        let config = GeneratorConfig::default().with_segment_capacity(1);
        let mut ctx = context(&config);

        let err = ctx
            .emit(
                Cursor::start(),
                CaseKind::Special,
                AddressingForm::absolute(),
                Vec::new(),
                0,
            )
            .unwrap_err();
        assert_eq!(
            err,
            GenerationError::LayoutOverflow {
                stream: "data",
                instruction: "smsw",
                segment: "ds",
                case: 0,
                offset: 0,
                width: 2,
                capacity: 1,
            }
        );
    }

    #[test]
    fn test_stream_is_contiguous() {
        let catalog = Catalog::new(InstructionScope::Default);
        let sequencer = Sequencer::new(&catalog, GeneratorConfig::default());
        let (stream, cursor) = sequencer
            .generate_stream(DS, SMSW, Cursor::start())
            .unwrap();

        for (i, case) in stream.cases.iter().enumerate() {
            assert_eq!(case.number as usize, i);
            assert_eq!(case.expected_address as usize, i * 2);
        }
        assert_eq!(cursor.offset as usize, stream.cases.len() * 2);
    }
}
