//! # UMIP Addressing-Mode Test Generator
//!
//! Generates exhaustive 32-bit x86 test vectors for the UMIP-protected
//! instructions (SMSW, SLDT, STR, SGDT, SIDT) across every ModRM/SIB memory
//! addressing form and data segment override.
//!
//! Each generated case loads known values into the address registers, emits the
//! raw instruction bytes, and pairs them with a C check that reads the result
//! back from the exact offset the hardware is expected to write to.
//!
//! ## Quick Start
//!
//! ```rust
//! use umip_testgen::{generate, Artifacts, GeneratorConfig};
//!
//! let config = GeneratorConfig::default();
//! let generation = generate(&config).unwrap();
//!
//! // 4 data segments x 3 instructions x 588 forms
//! assert_eq!(generation.case_count(), 4 * 3 * 588);
//!
//! let artifacts = Artifacts::assemble(&generation, &config);
//! assert!(artifacts.header.contains("#define SEGMENT_SIZE"));
//! ```
//!
//! ## Modules
//!
//! - `catalog` - registers, segments and instruction descriptors
//! - `addressing` - ModRM/SIB addressing forms and their escapes
//! - `encoder` - ModRM, SIB and displacement byte encoding
//! - `effective` - reference effective-address calculation
//! - `sequencer` - enumeration and memory layout
//! - `fragment` - per-case assembly and C check rendering
//! - `output` - the three generated harness files

pub mod addressing;
pub mod case;
pub mod catalog;
pub mod config;
pub mod effective;
pub mod encoder;
pub mod fragment;
pub mod output;
pub mod sequencer;

mod error;

// Re-export public API
pub use addressing::{AddressingForm, Mod};
pub use case::{CaseKind, RegisterLoad, TestCase};
pub use catalog::{Catalog, Instruction, InstructionScope, Register, Segment};
pub use config::GeneratorConfig;
pub use error::{GenerationError, Result};
pub use output::Artifacts;
pub use sequencer::{Generation, Sequencer};

/// Run the sequencer over the catalog selected by `config.scope`.
pub fn generate(config: &GeneratorConfig) -> Result<Generation> {
    let catalog = Catalog::new(config.scope);
    Sequencer::new(&catalog, *config).run()
}
