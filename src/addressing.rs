//! # 32-bit Memory Addressing Forms
//!
//! This module describes the memory operand shapes a ModRM byte (optionally
//! followed by a SIB byte) can select in 32-bit mode, and the architectural
//! escape encodings that turn a register field into "absent operand":
//!
//! - `mod=0, rm=5`: no base register, a bare disp32 follows
//! - SIB `index=4`: no index register, the scale is ignored
//! - `mod=0`, SIB `base=5`: no base register, a disp32 follows
//!
//! Register-direct addressing (`mod=3`) has no memory operand and is not
//! modelled.

use crate::catalog::{Register, Segment, DS, SS};

/// `rm` value that announces a SIB byte.
pub const RM_SIB: u8 = 4;

/// `rm` value that selects a bare disp32 at mod 0.
pub const RM_ABSOLUTE: u8 = 5;

/// SIB `index` value meaning "no index".
pub const SIB_NO_INDEX: u8 = 4;

/// SIB `base` value meaning "no base" at mod 0.
pub const SIB_NO_BASE: u8 = 5;

/// The ModRM `mod` field for memory operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mod {
    /// `mod=0`: no displacement, except for the disp32 escapes.
    Indirect = 0,

    /// `mod=1`: sign-extended 8-bit displacement.
    Disp8 = 1,

    /// `mod=2`: 32-bit displacement.
    Disp32 = 2,
}

impl Mod {
    pub const ALL: [Mod; 3] = [Mod::Indirect, Mod::Disp8, Mod::Disp32];

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u8) -> Option<Mod> {
        match bits {
            0 => Some(Mod::Indirect),
            1 => Some(Mod::Disp8),
            2 => Some(Mod::Disp32),
            _ => None,
        }
    }

    /// Registers usable as `rm` without triggering an escape.
    ///
    /// ESP always means "SIB follows"; EBP at mod 0 means "disp32 only".
    pub fn direct_registers(self) -> &'static [Register] {
        match self {
            Mod::Indirect => &DIRECT_MOD0,
            Mod::Disp8 | Mod::Disp32 => &DIRECT_DISP,
        }
    }

    /// Registers usable as a SIB base without triggering an escape.
    pub fn sib_bases(self) -> &'static [Register] {
        // Same register sets as direct addressing: ESP is a legal SIB base but
        // is never loaded with a test value, EBP at mod 0 is the no-base escape.
        self.direct_registers()
    }
}

const DIRECT_MOD0: [Register; 6] = [
    Register::Eax,
    Register::Ecx,
    Register::Edx,
    Register::Ebx,
    Register::Esi,
    Register::Edi,
];

const DIRECT_DISP: [Register; 7] = [
    Register::Eax,
    Register::Ecx,
    Register::Edx,
    Register::Ebx,
    Register::Ebp,
    Register::Esi,
    Register::Edi,
];

/// Registers usable as a SIB index without triggering the no-index escape.
pub const SIB_INDEXES: [Register; 7] = DIRECT_DISP;

/// Size of the displacement that follows ModRM/SIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplacementWidth {
    None,
    Byte,
    Dword,
}

impl DisplacementWidth {
    pub fn bytes(self) -> usize {
        match self {
            DisplacementWidth::None => 0,
            DisplacementWidth::Byte => 1,
            DisplacementWidth::Dword => 4,
        }
    }

    /// Whether `value` is representable without truncation.
    pub fn fits(self, value: i32) -> bool {
        match self {
            DisplacementWidth::None => value == 0,
            DisplacementWidth::Byte => i8::try_from(value).is_ok(),
            DisplacementWidth::Dword => true,
        }
    }
}

/// Scale/index/base triple carried by a SIB byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sib {
    /// Scale exponent (0-3); the index is multiplied by `1 << scale`.
    pub scale: u8,
    pub index: Register,
    pub base: Register,
}

/// A complete memory operand shape: ModRM `mod`/`rm` plus an optional SIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressingForm {
    pub mode: Mod,

    /// Raw `rm` field. [`RM_SIB`] whenever `sib` is present.
    pub rm: u8,

    pub sib: Option<Sib>,
}

impl AddressingForm {
    /// `[reg + disp]` without a SIB byte.
    pub fn direct(mode: Mod, reg: Register) -> Self {
        Self {
            mode,
            rm: reg.encoding(),
            sib: None,
        }
    }

    /// `[disp32]` via the `mod=0, rm=5` escape.
    pub fn absolute() -> Self {
        Self {
            mode: Mod::Indirect,
            rm: RM_ABSOLUTE,
            sib: None,
        }
    }

    /// `[base + index * (1 << scale) + disp]`.
    pub fn sib(mode: Mod, scale: u8, index: Register, base: Register) -> Self {
        Self {
            mode,
            rm: RM_SIB,
            sib: Some(Sib { scale, index, base }),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.sib.is_none() && self.mode == Mod::Indirect && self.rm == RM_ABSOLUTE
    }

    pub fn index_is_escaped(&self) -> bool {
        self.sib
            .is_some_and(|sib| sib.index.encoding() == SIB_NO_INDEX)
    }

    pub fn base_is_escaped(&self) -> bool {
        self.mode == Mod::Indirect
            && self
                .sib
                .is_some_and(|sib| sib.base.encoding() == SIB_NO_BASE)
    }

    pub fn displacement_width(&self) -> DisplacementWidth {
        displacement_width(self.mode, self.rm, self.sib.map(|sib| sib.base.encoding()))
    }

    /// Register whose value forms the base of the address, if any.
    ///
    /// For direct forms this is the `rm` register.
    pub fn base_register(&self) -> Option<Register> {
        if self.is_absolute() || self.base_is_escaped() {
            return None;
        }
        match self.sib {
            Some(sib) => Some(sib.base),
            None => Register::from_encoding(self.rm),
        }
    }

    /// Segment the CPU uses when no override prefix is present.
    ///
    /// A base of EBP or ESP implies SS; everything else, including the disp32
    /// escapes, implies DS.
    pub fn default_segment(&self) -> Segment {
        match self.base_register() {
            Some(Register::Ebp) | Some(Register::Esp) => SS,
            _ => DS,
        }
    }
}

/// Displacement size selected by the raw `mod`/`rm`/SIB-base fields.
///
/// `sib_base` is `Some` exactly when a SIB byte is present.
pub fn displacement_width(mode: Mod, rm: u8, sib_base: Option<u8>) -> DisplacementWidth {
    match mode {
        Mod::Disp8 => DisplacementWidth::Byte,
        Mod::Disp32 => DisplacementWidth::Dword,
        Mod::Indirect => match sib_base {
            Some(SIB_NO_BASE) => DisplacementWidth::Dword,
            Some(_) => DisplacementWidth::None,
            None if rm == RM_ABSOLUTE => DisplacementWidth::Dword,
            None => DisplacementWidth::None,
        },
    }
}
