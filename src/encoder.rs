//! ModRM, SIB and displacement encoding
//!
//! Pure bit packing. Field values wider than their slot are caller bugs and
//! panic rather than being masked.

use crate::addressing::{displacement_width, AddressingForm, DisplacementWidth, Mod};
use crate::catalog::{Instruction, Segment};

/// Pack `(mod << 6) | (reg << 3) | rm`.
///
/// # Panics
///
/// Panics if `mode` does not fit in 2 bits or `reg`/`rm` do not fit in 3 bits.
pub fn encode_modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    assert!(mode < 4, "ModRM mod field out of range: {mode}");
    assert!(reg < 8, "ModRM reg field out of range: {reg}");
    assert!(rm < 8, "ModRM rm field out of range: {rm}");
    (mode << 6) | (reg << 3) | rm
}

/// Pack `(scale << 6) | (index << 3) | base`.
///
/// # Panics
///
/// Panics if `scale` does not fit in 2 bits or `index`/`base` do not fit in 3 bits.
pub fn encode_sib(scale: u8, index: u8, base: u8) -> u8 {
    assert!(scale < 4, "SIB scale field out of range: {scale}");
    assert!(index < 8, "SIB index field out of range: {index}");
    assert!(base < 8, "SIB base field out of range: {base}");
    (scale << 6) | (index << 3) | base
}

/// Unpack a ModRM byte into `(mod, reg, rm)`.
pub fn decode_modrm(byte: u8) -> (u8, u8, u8) {
    (byte >> 6, (byte >> 3) & 0x7, byte & 0x7)
}

/// Unpack a SIB byte into `(scale, index, base)`.
pub fn decode_sib(byte: u8) -> (u8, u8, u8) {
    (byte >> 6, (byte >> 3) & 0x7, byte & 0x7)
}

/// Encode the displacement that follows ModRM (and SIB, when `sib_base` is
/// `Some`).
///
/// Returns no bytes unless the fields select a disp8 or disp32. The value is
/// truncated to the selected width in two's complement; disp32 is little-endian.
pub fn encode_displacement(mode: Mod, rm: u8, sib_base: Option<u8>, value: i32) -> Vec<u8> {
    match displacement_width(mode, rm, sib_base) {
        DisplacementWidth::None => Vec::new(),
        DisplacementWidth::Byte => vec![value as u8],
        DisplacementWidth::Dword => value.to_le_bytes().to_vec(),
    }
}

/// Encode a complete instruction: optional segment override, opcode, ModRM,
/// optional SIB and displacement.
pub fn encode_instruction(
    segment: &Segment,
    instruction: &Instruction,
    form: &AddressingForm,
    displacement: i32,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(9);

    if let Some(prefix) = segment.prefix {
        bytes.push(prefix);
    }
    bytes.extend_from_slice(instruction.opcode);
    bytes.push(encode_modrm(form.mode.bits(), instruction.reg_field, form.rm));

    let sib_base = form.sib.map(|sib| {
        bytes.push(encode_sib(sib.scale, sib.index.encoding(), sib.base.encoding()));
        sib.base.encoding()
    });

    bytes.extend(encode_displacement(form.mode, form.rm, sib_base, displacement));
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Register, DS, FS, SGDT, SMSW};

    #[test]
    fn test_modrm_packing() {
        assert_eq!(encode_modrm(1, 4, 0), 0x60);
        assert_eq!(encode_modrm(0, 0, 5), 0x05);
        assert_eq!(encode_modrm(2, 1, 4), 0x8C);
        assert_eq!(encode_modrm(3, 7, 7), 0xFF);
    }

    #[test]
    fn test_sib_packing() {
        assert_eq!(encode_sib(0, 4, 5), 0x25);
        assert_eq!(encode_sib(3, 1, 0), 0xC8);
    }

    #[test]
    #[should_panic(expected = "ModRM rm field out of range")]
    fn test_modrm_rejects_wide_rm() {
        encode_modrm(0, 0, 8);
    }

    #[test]
    #[should_panic(expected = "SIB scale field out of range")]
    fn test_sib_rejects_wide_scale() {
        encode_sib(4, 0, 0);
    }

    #[test]
    fn test_displacement_bytes() {
        assert_eq!(encode_displacement(Mod::Indirect, 0, None, 0x1234), Vec::<u8>::new());
        assert_eq!(encode_displacement(Mod::Disp8, 0, None, -1), vec![0xFF]);
        assert_eq!(encode_displacement(Mod::Disp8, 0, None, 5), vec![0x05]);
        assert_eq!(
            encode_displacement(Mod::Indirect, 5, None, 0x1000),
            vec![0x00, 0x10, 0x00, 0x00]
        );
        assert_eq!(
            encode_displacement(Mod::Indirect, 4, Some(5), -200),
            vec![0x38, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(encode_displacement(Mod::Indirect, 4, Some(1), -200), Vec::<u8>::new());
    }

    #[test]
    fn test_encode_instruction_direct_disp8() {
        let form = AddressingForm::direct(Mod::Disp8, Register::Eax);
        let bytes = encode_instruction(&DS, &SMSW, &form, 5);
        assert_eq!(bytes, vec![0x0F, 0x01, 0x60, 0x05]);
    }

    #[test]
    fn test_encode_instruction_sib_with_prefix() {
        let form = AddressingForm::sib(Mod::Disp32, 2, Register::Esi, Register::Ebx);
        let bytes = encode_instruction(&FS, &SGDT, &form, -1);
        assert_eq!(bytes, vec![0x64, 0x0F, 0x01, 0x84, 0xB3, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
