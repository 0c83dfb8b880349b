//! # Effective Address Calculation
//!
//! Computes the 32-bit offset a CPU forms for a memory operand, independently
//! of how the operand was encoded. All arithmetic wraps modulo 2^32; register
//! values and displacements are taken as two's complement.
//!
//! The escape rules are applied here rather than trusted from the encoder:
//!
//! | form                          | base    | index   |
//! |-------------------------------|---------|---------|
//! | `mod=0, rm=5` (no SIB)        | dropped | n/a     |
//! | SIB index field = 4 (ESP)     | used    | dropped |
//! | `mod=0`, SIB base field = 5   | dropped | used    |

use crate::addressing::{AddressingForm, Mod, RM_ABSOLUTE};
use crate::catalog::Register;

/// Address for a form without a SIB byte: `rm_value + disp`.
///
/// At `mod=0, rm=5` the register is not consulted and the address is the
/// displacement alone.
pub fn no_sib(mode: Mod, rm: u8, rm_value: i32, disp: i32) -> u32 {
    let base = if mode == Mod::Indirect && rm == RM_ABSOLUTE {
        0
    } else {
        rm_value as u32
    };
    base.wrapping_add(disp as u32)
}

/// Address for a SIB form: `base + index * 2^scale + disp`, with escaped
/// operands contributing zero.
///
/// `index_is_escaped` holds when the SIB index field is ESP's encoding;
/// the scale is then irrelevant. `base_is_escaped` holds at `mod=0` with a SIB
/// base field of 5.
pub fn with_sib(
    base_value: i32,
    index_value: i32,
    scale: u8,
    disp: i32,
    index_is_escaped: bool,
    base_is_escaped: bool,
) -> u32 {
    let index = if index_is_escaped {
        0
    } else {
        (index_value as u32).wrapping_shl(u32::from(scale))
    };
    let base = if base_is_escaped { 0 } else { base_value as u32 };
    index.wrapping_add(base).wrapping_add(disp as u32)
}

/// Register contents visible to an addressing form.
pub trait RegisterValues {
    fn value(&self, reg: Register) -> i32;
}

impl<F: Fn(Register) -> i32> RegisterValues for F {
    fn value(&self, reg: Register) -> i32 {
        self(reg)
    }
}

/// Address `form` resolves to under `regs` and `disp`.
pub fn for_form(form: &AddressingForm, regs: &impl RegisterValues, disp: i32) -> u32 {
    match form.sib {
        None => {
            let rm_value = match Register::from_encoding(form.rm) {
                Some(reg) if !form.is_absolute() => regs.value(reg),
                _ => 0,
            };
            no_sib(form.mode, form.rm, rm_value, disp)
        }
        Some(sib) => with_sib(
            regs.value(sib.base),
            regs.value(sib.index),
            sib.scale,
            disp,
            form.index_is_escaped(),
            form.base_is_escaped(),
        ),
    }
}
