//! # Register, Segment and Instruction Catalog
//!
//! This module holds the static tables the generator enumerates over: the eight
//! 32-bit general purpose registers, the segments a test stream can target, and
//! the UMIP-protected instructions under test.
//!
//! Nothing here has behavior beyond lookups. A [`Catalog`] is built once from an
//! [`InstructionScope`] and is read-only for the rest of the run.

/// 32-bit general purpose register.
///
/// The discriminant is the 3-bit encoding used in the ModRM `rm`/`reg` fields
/// and in the SIB `index`/`base` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    /// Stack pointer. As a SIB index this encoding means "no index".
    Esp = 4,
    /// Frame pointer. As an `rm` or SIB base at mod 0 this encoding means
    /// "no base, disp32 follows".
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

impl Register {
    /// All registers in encoding order.
    pub const ALL: [Register; 8] = [
        Register::Eax,
        Register::Ecx,
        Register::Edx,
        Register::Ebx,
        Register::Esp,
        Register::Ebp,
        Register::Esi,
        Register::Edi,
    ];

    /// Look up a register by its 3-bit encoding.
    pub fn from_encoding(encoding: u8) -> Option<Register> {
        Self::ALL.get(encoding as usize).copied()
    }

    /// 3-bit field encoding (0-7).
    pub fn encoding(self) -> u8 {
        self as u8
    }

    /// Display name, e.g. `"eax"`.
    pub fn name(self) -> &'static str {
        match self {
            Register::Eax => "eax",
            Register::Ecx => "ecx",
            Register::Edx => "edx",
            Register::Ebx => "ebx",
            Register::Esp => "esp",
            Register::Ebp => "ebp",
            Register::Esi => "esi",
            Register::Edi => "edi",
        }
    }

    /// AT&T operand spelling, e.g. `"%eax"`.
    pub fn att(self) -> &'static str {
        match self {
            Register::Eax => "%eax",
            Register::Ecx => "%ecx",
            Register::Edx => "%edx",
            Register::Ebx => "%ebx",
            Register::Esp => "%esp",
            Register::Ebp => "%ebp",
            Register::Esi => "%esi",
            Register::Edi => "%edi",
        }
    }
}

/// Backing array the harness uses for SS-relative accesses.
pub const STACK_ARRAY: &str = "stack";

/// Backing array the harness uses for DS-relative accesses.
pub const DATA_ARRAY: &str = "data";

/// Segment a test stream targets.
///
/// Segments without an override prefix use the hardware default segment for
/// the addressing form (DS or SS), so the array a case is checked against
/// depends on the form as well as the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Segment register name (e.g. "ds", "fs").
    pub name: &'static str,

    /// Segment override prefix byte, if the stream needs one.
    pub prefix: Option<u8>,

    /// Name of the array backing this segment in the check harness.
    pub array: &'static str,
}

pub const DS: Segment = Segment {
    name: "ds",
    prefix: None,
    array: DATA_ARRAY,
};

pub const SS: Segment = Segment {
    name: "ss",
    prefix: None,
    array: STACK_ARRAY,
};

pub const ES: Segment = Segment {
    name: "es",
    prefix: Some(0x26),
    array: "data_es",
};

pub const FS: Segment = Segment {
    name: "fs",
    prefix: Some(0x64),
    array: "data_fs",
};

pub const GS: Segment = Segment {
    name: "gs",
    prefix: Some(0x65),
    array: "data_gs",
};

/// Segments that get a test stream, in generation order.
pub const DATA_SEGMENTS: [Segment; 4] = [DS, ES, FS, GS];

/// Number of bytes an instruction stores at its memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultWidth {
    /// 16-bit selector or machine status word.
    Word,

    /// 16-bit limit followed by a 32-bit base (GDTR/IDTR image).
    TableDescriptor,
}

impl ResultWidth {
    pub fn bytes(self) -> u32 {
        match self {
            ResultWidth::Word => 2,
            ResultWidth::TableDescriptor => 6,
        }
    }
}

/// A UMIP-protected instruction with a single memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Lowercase mnemonic, also used in generated labels.
    pub mnemonic: &'static str,

    /// Opcode bytes preceding the ModRM byte.
    pub opcode: &'static [u8],

    /// Opcode extension placed in the ModRM `reg` field.
    pub reg_field: u8,

    /// Size of the value stored at the memory operand.
    pub width: ResultWidth,

    /// C expression naming the value the check routine compares against.
    pub expected_symbol: &'static str,
}

pub const SMSW: Instruction = Instruction {
    mnemonic: "smsw",
    opcode: &[0x0F, 0x01],
    reg_field: 4,
    width: ResultWidth::Word,
    expected_symbol: "expected_msw",
};

pub const SLDT: Instruction = Instruction {
    mnemonic: "sldt",
    opcode: &[0x0F, 0x00],
    reg_field: 0,
    width: ResultWidth::Word,
    expected_symbol: "expected_ldt",
};

pub const STR: Instruction = Instruction {
    mnemonic: "str",
    opcode: &[0x0F, 0x00],
    reg_field: 1,
    width: ResultWidth::Word,
    expected_symbol: "expected_tr",
};

pub const SGDT: Instruction = Instruction {
    mnemonic: "sgdt",
    opcode: &[0x0F, 0x01],
    reg_field: 0,
    width: ResultWidth::TableDescriptor,
    expected_symbol: "&expected_gdt",
};

pub const SIDT: Instruction = Instruction {
    mnemonic: "sidt",
    opcode: &[0x0F, 0x01],
    reg_field: 1,
    width: ResultWidth::TableDescriptor,
    expected_symbol: "&expected_idt",
};

/// Every instruction the generator knows, in generation order.
pub const INSTRUCTION_TABLE: [Instruction; 5] = [SMSW, SLDT, STR, SGDT, SIDT];

/// Which instructions get test vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstructionScope {
    /// SMSW, SGDT and SIDT only. SLDT and STR are not emulated by every
    /// kernel, so they are opt-in.
    #[default]
    Default,

    /// All five UMIP-protected instructions.
    All,
}

impl InstructionScope {
    fn includes(self, instruction: &Instruction) -> bool {
        match self {
            InstructionScope::All => true,
            InstructionScope::Default => *instruction != SLDT && *instruction != STR,
        }
    }
}

/// Immutable view of the instructions and segments a run enumerates.
#[derive(Debug, Clone)]
pub struct Catalog {
    instructions: Vec<Instruction>,
    segments: Vec<Segment>,
}

impl Catalog {
    /// Build the catalog for `scope`. Table order is preserved.
    pub fn new(scope: InstructionScope) -> Self {
        Self {
            instructions: INSTRUCTION_TABLE
                .iter()
                .filter(|insn| scope.includes(insn))
                .copied()
                .collect(),
            segments: DATA_SEGMENTS.to_vec(),
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(InstructionScope::default())
    }
}
