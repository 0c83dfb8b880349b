use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Failures that abort generation.
///
/// `InvalidConfig` is raised before enumeration starts. The two structural
/// kinds identify the stream (instruction and segment) and the number of
/// the case that could not be produced. Generation stops at the first one;
/// nothing generated before it is written out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error(
        "{stream} layout overflow at test case {case} ({instruction} in {segment}): \
         offset {offset:#x} + {width} bytes exceeds capacity {capacity:#x}"
    )]
    LayoutOverflow {
        /// Backing array that ran out of room ("code", "data", "stack", ...).
        stream: &'static str,
        instruction: &'static str,
        segment: &'static str,
        case: u32,
        offset: u32,
        width: u32,
        capacity: u32,
    },

    #[error("invalid addressing combination at test case {case} ({instruction} in {segment}): {reason}")]
    InvalidAddressingCombination {
        instruction: &'static str,
        segment: &'static str,
        case: u32,
        reason: String,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}
