//! `[reg]`, `[reg + disp8]` and `[reg + disp32]` without a SIB byte

use super::{split_disp8, Cursor, StreamContext};
use crate::addressing::{AddressingForm, Mod};
use crate::case::{CaseKind, RegisterLoad};
use crate::catalog::Register;
use crate::error::Result;

/// Offset pushed into the disp32 so the first mod 2 register values are negative.
const NEGATIVE_BIAS: i32 = 127;

pub(super) fn enumerate(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    for &reg in Mod::Indirect.direct_registers() {
        cursor = emit(ctx, cursor, Mod::Indirect, reg, cursor.signed(), 0)?;
    }

    // Constant disp8 across the section: keep it in range by carrying the rest
    // of the offset in the register.
    let (_, disp8) = split_disp8(cursor.offset, 0);
    for &reg in Mod::Disp8.direct_registers() {
        let value = cursor.signed().wrapping_sub(disp8);
        cursor = emit(ctx, cursor, Mod::Disp8, reg, value, disp8)?;
    }

    let disp32 = cursor.signed().wrapping_add(NEGATIVE_BIAS);
    for &reg in Mod::Disp32.direct_registers() {
        let value = cursor.signed().wrapping_sub(disp32);
        cursor = emit(ctx, cursor, Mod::Disp32, reg, value, disp32)?;
    }

    tracing::debug!(
        instruction = ctx.instruction.mnemonic,
        segment = ctx.segment.name,
        end_offset = cursor.offset,
        "direct forms done"
    );
    Ok(cursor)
}

fn emit(
    ctx: &mut StreamContext<'_>,
    cursor: Cursor,
    mode: Mod,
    reg: Register,
    value: i32,
    disp: i32,
) -> Result<Cursor> {
    let form = AddressingForm::direct(mode, reg);
    let loads = vec![RegisterLoad {
        register: reg,
        value,
    }];
    ctx.emit(cursor, CaseKind::Regular, form, loads, disp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DS, SGDT};
    use crate::config::GeneratorConfig;

    #[test]
    fn test_direct_section_shape() {
        let config = GeneratorConfig::default();
        let mut ctx = StreamContext {
            config: &config,
            segment: DS,
            instruction: SGDT,
            cases: Vec::new(),
        };
        let start = Cursor::start();
        let cursor = enumerate(&mut ctx, start).unwrap();

        assert_eq!(ctx.cases.len(), 6 + 7 + 7);
        assert_eq!(cursor.offset, 20 * 6);

        // mod 1 starts at offset 36: disp8 carries all of it
        let first_disp8 = &ctx.cases[6];
        assert_eq!(first_disp8.form.mode, Mod::Disp8);
        assert_eq!(first_disp8.displacement, 36);
        assert_eq!(first_disp8.loads[0].value, 0);

        // mod 2 starts at offset 78 with a negative register value
        let first_disp32 = &ctx.cases[13];
        assert_eq!(first_disp32.form.mode, Mod::Disp32);
        assert_eq!(first_disp32.displacement, 78 + 127);
        assert_eq!(first_disp32.loads[0].value, -127);
        assert_eq!(first_disp32.expected_address, 78);
    }
}
