//! Escape encodings: absolute disp32, SIB no-index, SIB no-base, and both

use super::{sib_loads, Cursor, StreamContext};
use crate::addressing::{AddressingForm, Mod};
use crate::case::CaseKind;
use crate::catalog::Register;
use crate::error::Result;

/// Loaded into ESP as a SIB index; must never reach the address.
const IGNORED_INDEX: i32 = 0xFFFF;

/// Loaded into EBP as an escaped SIB base; must never reach the address.
const IGNORED_BASE: i32 = 0xEEEE;

/// ESP/EBP contents for the combined no-base, no-index case.
const IGNORED_COMBINED_INDEX: i32 = 0xBBBB;
const IGNORED_COMBINED_BASE: i32 = 0xCCCC;

pub(super) fn enumerate(ctx: &mut StreamContext<'_>, cursor: Cursor) -> Result<Cursor> {
    let cursor = absolute(ctx, cursor)?;
    let cursor = no_index(ctx, cursor)?;
    let cursor = no_base(ctx, cursor)?;
    let cursor = no_base_no_index(ctx, cursor)?;

    tracing::debug!(
        instruction = ctx.instruction.mnemonic,
        segment = ctx.segment.name,
        end_offset = cursor.offset,
        "escape forms done"
    );
    Ok(cursor)
}

/// `mod=0, rm=5`: the disp32 is the whole address.
fn absolute(ctx: &mut StreamContext<'_>, cursor: Cursor) -> Result<Cursor> {
    ctx.emit(
        cursor,
        CaseKind::Special,
        AddressingForm::absolute(),
        Vec::new(),
        cursor.signed(),
    )
}

/// SIB index = ESP at every mod. ESP holds a junk value that the CPU must
/// ignore together with the scale.
fn no_index(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    for mode in Mod::ALL {
        let section = cursor.signed();
        for &base in mode.sib_bases() {
            let (base_value, disp) = match mode {
                Mod::Indirect => (cursor.signed(), 0),
                Mod::Disp8 | Mod::Disp32 => (section, cursor.signed().wrapping_sub(section)),
            };
            let form = AddressingForm::sib(mode, 3, Register::Esp, base);
            let loads = sib_loads(&form, base_value, IGNORED_INDEX);
            cursor = ctx.emit(cursor, CaseKind::Special, form, loads, disp)?;
        }
    }
    Ok(cursor)
}

/// `mod=0`, SIB base = EBP: EBP is ignored and a disp32 replaces it.
fn no_base(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    for scale in 0..4u8 {
        // Index carries the offset rounded down to the scale; the disp32 makes
        // up the remainder and the growth across the group.
        let index_value = (cursor.offset >> scale) as i32;
        let scaled = index_value.wrapping_shl(u32::from(scale));
        for &index in Mod::Indirect.direct_registers() {
            let disp = cursor.signed().wrapping_sub(scaled);
            let form = AddressingForm::sib(Mod::Indirect, scale, index, Register::Ebp);
            let loads = sib_loads(&form, IGNORED_BASE, index_value);
            cursor = ctx.emit(cursor, CaseKind::Special, form, loads, disp)?;
        }
    }
    Ok(cursor)
}

/// `mod=0`, SIB base = EBP and index = ESP: only the disp32 remains.
fn no_base_no_index(ctx: &mut StreamContext<'_>, cursor: Cursor) -> Result<Cursor> {
    let form = AddressingForm::sib(Mod::Indirect, 3, Register::Esp, Register::Ebp);
    let loads = sib_loads(&form, IGNORED_COMBINED_BASE, IGNORED_COMBINED_INDEX);
    ctx.emit(cursor, CaseKind::Special, form, loads, cursor.signed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DS, SIDT};
    use crate::config::GeneratorConfig;

    #[test]
    fn test_escape_section() {
        let config = GeneratorConfig::default();
        let mut ctx = StreamContext {
            config: &config,
            segment: DS,
            instruction: SIDT,
            cases: Vec::new(),
        };
        let start = Cursor::start().advance(0x101, 0);
        let cursor = enumerate(&mut ctx, start).unwrap();
        let cases = &ctx.cases;

        // absolute + no-index (6 + 7 + 7) + no-base (4 x 6) + combined
        assert_eq!(cases.len(), 1 + 20 + 24 + 1);
        assert_eq!(cursor.offset, 0x101 + 46 * 6);
        assert!(cases.iter().all(|c| c.kind == CaseKind::Special));

        assert!(cases[0].form.is_absolute());
        assert_eq!(cases[0].displacement, 0x101);

        for case in &cases[1..21] {
            assert!(case.form.index_is_escaped());
            assert!(case.stack_scratch.is_some());
        }

        for case in &cases[21..45] {
            assert!(case.form.base_is_escaped());
            assert_eq!(case.check_array(), "data");
        }

        let last = cases.last().unwrap();
        assert!(last.form.base_is_escaped() && last.form.index_is_escaped());
        assert_eq!(last.stack_scratch, Some(Register::Eax));
        assert_eq!(last.expected_address, last.displacement as u32);
    }
}
