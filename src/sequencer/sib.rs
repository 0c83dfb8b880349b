//! `[base + index * scale + disp]` forms without escapes
//!
//! Base and index never share a register. Using the same register for both is
//! legal on hardware, but the generator does not cover it.

use super::{sib_loads, split_disp8, Cursor, StreamContext};
use crate::addressing::{AddressingForm, Mod, SIB_INDEXES};
use crate::case::CaseKind;
use crate::catalog::Register;
use crate::error::Result;

/// Index register value used by every non-negative section.
const INDEX_VALUE: i32 = 3;

/// Amount moved from index to base to force a negative index.
const NEGATIVE_INDEX_SHIFT: i32 = 100;

/// Starting displacement of the negative-displacement section.
const NEGATIVE_DISP: i32 = -200;

pub(super) fn enumerate(ctx: &mut StreamContext<'_>, cursor: Cursor) -> Result<Cursor> {
    let cursor = indirect(ctx, cursor)?;
    let cursor = disp8(ctx, cursor)?;
    let cursor = negative_index(ctx, cursor)?;
    let cursor = negative_displacement(ctx, cursor)?;
    let cursor = negative_base(ctx, cursor)?;

    tracing::debug!(
        instruction = ctx.instruction.mnemonic,
        segment = ctx.segment.name,
        end_offset = cursor.offset,
        "SIB forms done"
    );
    Ok(cursor)
}

/// Bases paired with `index` at `mode`, skipping `base == index`.
fn bases_for(mode: Mod, index: Register) -> impl Iterator<Item = Register> {
    mode.sib_bases()
        .iter()
        .copied()
        .filter(move |base| *base != index)
}

fn emit(
    ctx: &mut StreamContext<'_>,
    cursor: Cursor,
    mode: Mod,
    scale: u8,
    (index, index_value): (Register, i32),
    (base, base_value): (Register, i32),
    disp: i32,
) -> Result<Cursor> {
    let form = AddressingForm::sib(mode, scale, index, base);
    let loads = sib_loads(&form, base_value, index_value);
    ctx.emit(cursor, CaseKind::Regular, form, loads, disp)
}

/// mod 0, all scales: base carries the cursor minus the scaled index.
fn indirect(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    for scale in 0..4u8 {
        for index in SIB_INDEXES {
            for base in bases_for(Mod::Indirect, index) {
                let base_value = cursor.signed().wrapping_sub(INDEX_VALUE << scale);
                cursor = emit(
                    ctx,
                    cursor,
                    Mod::Indirect,
                    scale,
                    (index, INDEX_VALUE),
                    (base, base_value),
                    0,
                )?;
            }
        }
    }
    Ok(cursor)
}

/// mod 1, all scales: per index register the base stays fixed and the disp8
/// grows, re-based so the last displacement still fits in a byte.
fn disp8(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    for scale in 0..4u8 {
        for index in SIB_INDEXES {
            let group_start = cursor;
            let count = bases_for(Mod::Disp8, index).count() as u32;
            let span = count.saturating_sub(1) * ctx.width();
            let (carried, first_disp) = split_disp8(group_start.offset, span);
            let base_value = carried.wrapping_sub(INDEX_VALUE << scale);

            for base in bases_for(Mod::Disp8, index) {
                let disp = first_disp + (cursor.offset - group_start.offset) as i32;
                cursor = emit(
                    ctx,
                    cursor,
                    Mod::Disp8,
                    scale,
                    (index, INDEX_VALUE),
                    (base, base_value),
                    disp,
                )?;
            }
        }
    }
    Ok(cursor)
}

/// mod 2, scale 0: index register holds a negative value.
fn negative_index(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    let scale = 0u8;
    let section = cursor.signed();
    let index_value = INDEX_VALUE - NEGATIVE_INDEX_SHIFT;
    let base_value = section
        .wrapping_sub(INDEX_VALUE << scale)
        .wrapping_add(NEGATIVE_INDEX_SHIFT << scale);

    for index in SIB_INDEXES {
        for base in bases_for(Mod::Disp32, index) {
            let disp = cursor.signed().wrapping_sub(section);
            cursor = emit(
                ctx,
                cursor,
                Mod::Disp32,
                scale,
                (index, index_value),
                (base, base_value),
                disp,
            )?;
        }
    }
    Ok(cursor)
}

/// mod 2, scales 0 to 2: displacement starts negative and grows.
fn negative_displacement(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    for scale in 0..3u8 {
        let section = cursor.signed();
        let base_value = section
            .wrapping_sub(INDEX_VALUE << scale)
            .wrapping_sub(NEGATIVE_DISP);

        for index in SIB_INDEXES {
            for base in bases_for(Mod::Disp32, index) {
                let disp = NEGATIVE_DISP.wrapping_add(cursor.signed().wrapping_sub(section));
                cursor = emit(
                    ctx,
                    cursor,
                    Mod::Disp32,
                    scale,
                    (index, INDEX_VALUE),
                    (base, base_value),
                    disp,
                )?;
            }
        }
    }
    Ok(cursor)
}

/// mod 2, scale 3: base register holds a negative value, the disp32 carries
/// the whole offset.
fn negative_base(ctx: &mut StreamContext<'_>, mut cursor: Cursor) -> Result<Cursor> {
    let scale = 3u8;
    let base_value = -(INDEX_VALUE << scale);

    for index in SIB_INDEXES {
        for base in bases_for(Mod::Disp32, index) {
            let disp = cursor.signed();
            cursor = emit(
                ctx,
                cursor,
                Mod::Disp32,
                scale,
                (index, INDEX_VALUE),
                (base, base_value),
                disp,
            )?;
        }
    }
    Ok(cursor)
}
