//! Address cursor threaded through enumeration

/// Bytes of harness code before the first case: stack setup and the three
/// pushes that save the caller's cs/esp/ss.
pub const HARNESS_PROLOGUE_LEN: u32 = 5 + 2 + 1 + 1 + 1;

/// Bytes of harness code after the last case: two pops, `push $imm32`, `retf`.
pub const HARNESS_EPILOGUE_LEN: u32 = 1 + 1 + 5 + 1;

/// Bytes at the top of the stack array occupied by the harness's pushes.
pub const HARNESS_STACK_BYTES: u32 = 3 * 4;

/// Generation state passed from one enumeration step to the next.
///
/// `offset` is the next free byte in the current segment's arrays and restarts
/// for every segment. `case_number` and `code_len` run across the whole
/// generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u32,
    pub case_number: u32,
    pub code_len: u32,
}

impl Cursor {
    /// Cursor for the first case of a run.
    pub fn start() -> Self {
        Self {
            offset: 0,
            case_number: 0,
            code_len: HARNESS_PROLOGUE_LEN,
        }
    }

    /// Same counters, offset rewound for a new segment stream.
    pub fn for_segment(self) -> Self {
        Self { offset: 0, ..self }
    }

    /// Cursor after a case storing `width` bytes and assembling to `code_len`
    /// bytes of test code.
    pub fn advance(self, width: u32, code_len: u32) -> Self {
        Self {
            offset: self.offset + width,
            case_number: self.case_number + 1,
            code_len: self.code_len + code_len,
        }
    }

    /// Offset as a signed register value (two's complement).
    pub fn signed(self) -> i32 {
        self.offset as i32
    }
}

/// Split `start` into a carried base and a disp8 so that
/// `base + disp == start` and `disp + span` stays within `i8::MAX`.
///
/// Used before a run of disp8 cases whose displacement grows by `span` in
/// total.
pub fn split_disp8(start: u32, span: u32) -> (i32, i32) {
    let room = (i8::MAX as u32).saturating_sub(span);
    let disp = start.min(room);
    ((start - disp) as i32, disp as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_and_rewind() {
        let cursor = Cursor::start().advance(2, 8).advance(6, 14);
        assert_eq!(cursor.offset, 8);
        assert_eq!(cursor.case_number, 2);
        assert_eq!(cursor.code_len, HARNESS_PROLOGUE_LEN + 22);

        let rewound = cursor.for_segment();
        assert_eq!(rewound.offset, 0);
        assert_eq!(rewound.case_number, 2);
        assert_eq!(rewound.code_len, cursor.code_len);
    }

    #[test]
    fn test_split_disp8_small_start_stays_in_disp() {
        assert_eq!(split_disp8(40, 0), (0, 40));
        assert_eq!(split_disp8(100, 20), (0, 100));
    }

    #[test]
    fn test_split_disp8_rebases_large_start() {
        assert_eq!(split_disp8(1000, 0), (873, 127));
        assert_eq!(split_disp8(1000, 30), (903, 97));
        assert_eq!(split_disp8(110, 30), (13, 97));
    }
}
