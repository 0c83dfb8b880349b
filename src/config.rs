//! Generator configuration

use crate::catalog::InstructionScope;
use crate::error::{GenerationError, Result};

/// Size of each backing array in the check harness (`SEGMENT_SIZE`).
pub const DEFAULT_SEGMENT_CAPACITY: u32 = 262_144;

/// Size of the executable buffer the test code is copied into (`CODE_MEM_SIZE`).
pub const DEFAULT_CODE_CAPACITY: u32 = 262_144;

/// Knobs for a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Capacity in bytes of every data/stack array.
    pub segment_capacity: u32,

    /// Capacity in bytes of the code buffer.
    pub code_capacity: u32,

    /// Which instructions are enumerated.
    pub scope: InstructionScope,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            code_capacity: DEFAULT_CODE_CAPACITY,
            scope: InstructionScope::Default,
        }
    }
}

impl GeneratorConfig {
    pub fn with_scope(mut self, scope: InstructionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_segment_capacity(mut self, bytes: u32) -> Self {
        self.segment_capacity = bytes;
        self
    }

    pub fn with_code_capacity(mut self, bytes: u32) -> Self {
        self.code_capacity = bytes;
        self
    }

    /// Reject configurations no layout can satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.segment_capacity == 0 {
            return Err(GenerationError::InvalidConfig {
                reason: "segment capacity must be non-zero",
            });
        }
        if self.code_capacity == 0 {
            return Err(GenerationError::InvalidConfig {
                reason: "code capacity must be non-zero",
            });
        }
        Ok(())
    }
}
