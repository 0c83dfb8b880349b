//! A single generated test vector

use crate::addressing::AddressingForm;
use crate::catalog::{Instruction, Register, Segment};
use crate::effective::RegisterValues;

/// A `mov $imm32, %reg` executed before the instruction under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLoad {
    pub register: Register,
    pub value: i32,
}

/// Whether a case exercises an escape encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKind {
    Regular,
    /// Absolute disp32, SIB no-index or SIB no-base forms.
    Special,
}

/// One generated vector: the encoded instruction, the register state it runs
/// under, and the address it is expected to store its result at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Sequence number, unique across the whole run.
    pub number: u32,

    pub kind: CaseKind,

    /// Stream segment; determines the override prefix.
    pub segment: Segment,

    pub instruction: Instruction,

    pub form: AddressingForm,

    /// Register loads in execution order (base before index).
    pub loads: Vec<RegisterLoad>,

    /// Signed displacement. Zero when the form carries none.
    pub displacement: i32,

    /// Offset the instruction stores at, relative to the checked array.
    pub expected_address: u32,

    /// Prefix, opcode, ModRM, SIB and displacement bytes.
    pub bytes: Vec<u8>,

    /// Register holding ESP while the case clobbers it, if it does.
    pub stack_scratch: Option<Register>,
}

impl TestCase {
    /// Array the harness reads the result from.
    ///
    /// With an override prefix this is the prefix segment's array; otherwise
    /// it follows the form's default segment, which is SS for EBP/ESP bases.
    pub fn check_array(&self) -> &'static str {
        match self.segment.prefix {
            Some(_) => self.segment.array,
            None => self.form.default_segment().array,
        }
    }

    /// Value loaded into `reg` before the instruction, or zero.
    pub fn register_value(&self, reg: Register) -> i32 {
        self.loads
            .iter()
            .find(|load| load.register == reg)
            .map_or(0, |load| load.value)
    }

    /// Number of bytes the instruction stores.
    pub fn width(&self) -> u32 {
        self.instruction.width.bytes()
    }
}

impl RegisterValues for TestCase {
    fn value(&self, reg: Register) -> i32 {
        self.register_value(reg)
    }
}
