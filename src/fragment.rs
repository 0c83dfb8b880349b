//! Rendering of a [`TestCase`] into harness text
//!
//! Each case becomes a commented block of GNU inline-assembly string lines
//! (register loads followed by the literal instruction bytes) and a C check
//! statement that reads the stored value back at the expected address.

use std::ops::{Deref, DerefMut};

use crate::addressing::{AddressingForm, Mod};
use crate::case::{CaseKind, TestCase};
use crate::catalog::{Register, ResultWidth};

/// Counter incremented by `pr_result` on a match.
pub const PASS_COUNTER: &str = "test_passed";

/// Counter incremented by `pr_result` on a mismatch.
pub const FAIL_COUNTER: &str = "test_failed";

/// Counter reserved for harness errors.
pub const ERROR_COUNTER: &str = "test_errors";

/// Encoded length of `mov $imm32, %reg` (B8+r id).
pub const MOV_IMM32_LEN: u32 = 5;

/// Encoded length of `mov %reg, %reg` (89 /r).
pub const MOV_REG_LEN: u32 = 2;

/// Saves ESP into a scratch register for the lifetime of the guard and
/// restores it when dropped.
///
/// Text written through the guard lands between the save and the restore, so
/// a case that loads ESP with a test value cannot leave it clobbered.
pub struct StackPointerGuard<'a> {
    out: &'a mut String,
    scratch: Register,
}

impl<'a> StackPointerGuard<'a> {
    pub fn save(out: &'a mut String, scratch: Register) -> Self {
        asm_line(out, &format!("mov {}, {}", Register::Esp.att(), scratch.att()));
        Self { out, scratch }
    }

    /// Scratch register for `form`, if the form loads ESP.
    ///
    /// The first register in encoding order that is neither the base nor the
    /// index is used.
    pub fn scratch_for(form: &AddressingForm) -> Option<Register> {
        let sib = form.sib?;
        if sib.base != Register::Esp && sib.index != Register::Esp {
            return None;
        }
        Register::ALL
            .into_iter()
            .find(|reg| *reg != sib.base && *reg != sib.index)
    }
}

impl Deref for StackPointerGuard<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        self.out
    }
}

impl DerefMut for StackPointerGuard<'_> {
    fn deref_mut(&mut self) -> &mut String {
        self.out
    }
}

impl Drop for StackPointerGuard<'_> {
    fn drop(&mut self) {
        asm_line(
            self.out,
            &format!("mov {}, {}", self.scratch.att(), Register::Esp.att()),
        );
    }
}

/// Append one `"<text>\n\t"` inline-assembly line.
pub(crate) fn asm_line(out: &mut String, text: &str) {
    out.push_str(&format!("\t\"{text}\\n\\t\"\n"));
}

/// Hex with a leading minus for negative values, e.g. `-0x7f`.
pub(crate) fn signed_hex(value: i32) -> String {
    if value < 0 {
        format!("-{:#x}", value.unsigned_abs())
    } else {
        format!("{value:#x}")
    }
}

impl TestCase {
    /// Human-readable description, embedded in both the code and the check.
    pub fn comment(&self) -> String {
        let mut text = String::new();
        if self.kind == CaseKind::Special {
            text.push_str("Special ");
        }
        text.push_str(&format!(
            "Test case {}: SEG[{}] INSN: {}",
            self.number,
            self.check_array(),
            self.instruction.mnemonic
        ));

        let disp_suffix = match self.form.mode {
            Mod::Indirect => "",
            Mod::Disp8 => " + disp8",
            Mod::Disp32 => " + disp32",
        };

        match self.form.sib {
            None if self.form.is_absolute() => text.push_str(" (disp32). "),
            None => {
                let reg = Register::from_encoding(self.form.rm).map_or("?", Register::name);
                text.push_str(&format!("({reg}{disp_suffix}). "));
            }
            Some(sib) => {
                text.push_str(&format!(
                    " SIB(b:{} i:{} s:{}{disp_suffix}). ",
                    sib.base.name(),
                    sib.index.name(),
                    sib.scale
                ));
            }
        }

        text.push_str(&format!("EFF_ADDR[{:#x}].", self.expected_address));
        for load in &self.loads {
            let label = match self.form.sib {
                Some(sib) if load.register == sib.base => "b",
                Some(_) => "i",
                None => load.register.name(),
            };
            text.push_str(&format!(" {label}[{}]", signed_hex(load.value)));
        }

        match self.form.displacement_width().bytes() {
            1 => text.push_str(&format!(" disp8[{}]", signed_hex(self.displacement))),
            4 => text.push_str(&format!(" disp32[{}]", signed_hex(self.displacement))),
            _ => {}
        }
        text
    }

    /// Inline-assembly lines for this case.
    pub fn code_fragment(&self) -> String {
        let mut out = format!("\t/* {} */\n", self.comment());
        match self.stack_scratch {
            Some(scratch) => {
                let mut guarded = StackPointerGuard::save(&mut out, scratch);
                self.write_body(&mut guarded);
            }
            None => self.write_body(&mut out),
        }
        out
    }

    fn write_body(&self, out: &mut String) {
        for load in &self.loads {
            asm_line(
                out,
                &format!("mov ${:#x}, {}", load.value as u32, load.register.att()),
            );
        }
        let bytes: Vec<String> = self.bytes.iter().map(|b| format!("{b:#04x}")).collect();
        asm_line(out, &format!(".byte {}", bytes.join(", ")));
    }

    /// Bytes the fragment assembles to.
    pub fn code_len(&self) -> u32 {
        let loads = self.loads.len() as u32 * MOV_IMM32_LEN;
        let guard = if self.stack_scratch.is_some() {
            2 * MOV_REG_LEN
        } else {
            0
        };
        loads + guard + self.bytes.len() as u32
    }

    /// C statements comparing the stored value against `expected`.
    pub fn check_statement(&self) -> String {
        let array = self.check_array();
        let address = self.expected_address;
        let comment = self.comment();
        match self.instruction.width {
            ResultWidth::Word => format!(
                "\tgot = *(unsigned short *)({array} + {address:#x});\n\
                 \tpr_result(got, expected, \"{comment}\", {PASS_COUNTER}, {FAIL_COUNTER});\n"
            ),
            ResultWidth::TableDescriptor => format!(
                "\tgot = (struct table_desc *)({array} + {address:#x});\n\
                 \tpr_result_table(got, expected, \"{comment}\", {PASS_COUNTER}, {FAIL_COUNTER});\n"
            ),
        }
    }
}
