//! Assembly of the generated harness files
//!
//! Turns a [`Generation`] into the three text artifacts the C harness
//! includes: the test code (inline assembly), the check routines, and a small
//! header with the layout constants.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::catalog::{ResultWidth, STACK_ARRAY};
use crate::config::GeneratorConfig;
use crate::fragment::{asm_line, ERROR_COUNTER, FAIL_COUNTER, PASS_COUNTER};
use crate::sequencer::{Generation, Stream};

pub const CODE_FILE: &str = "test_umip_code_32.h";
pub const CHECK_FILE: &str = "test_umip_ldt_32.c";
pub const HEADER_FILE: &str = "test_umip_ldt_32.h";

const BANNER: &str = "/* ******************** AUTOGENERATED CODE ******************** */";

/// The three generated files, held in memory until written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub code: String,
    pub checks: String,
    pub header: String,
}

impl Artifacts {
    pub fn assemble(generation: &Generation, config: &GeneratorConfig) -> Self {
        Self {
            code: code_file(generation, config),
            checks: check_file(generation),
            header: header_file(config),
        }
    }

    fn files(&self) -> [(&'static str, &str); 3] {
        [
            (CODE_FILE, self.code.as_str()),
            (CHECK_FILE, self.checks.as_str()),
            (HEADER_FILE, self.header.as_str()),
        ]
    }

    /// Write all three files into `dir`, returning their paths.
    ///
    /// Every file is staged under a temporary name first and only renamed into
    /// place once all three have been written. If a rename fails, the files
    /// already moved by this call are removed again.
    pub fn write_to(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let mut staged = Vec::with_capacity(3);
        for (name, contents) in self.files() {
            let mut file = NamedTempFile::new_in(dir)?;
            file.write_all(contents.as_bytes())?;
            staged.push((dir.join(name), file));
        }

        let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
        for (path, file) in staged {
            if let Err(err) = file.persist(&path) {
                for done in &written {
                    if let Err(cleanup) = fs::remove_file(done) {
                        tracing::warn!(path = %done.display(), error = %cleanup, "cleanup failed");
                    }
                }
                return Err(err.error);
            }
            tracing::debug!(path = %path.display(), "wrote artifact");
            written.push(path);
        }
        Ok(written)
    }
}

fn stream_label(stream: &Stream) -> String {
    format!(
        "test_umip_{}_{}",
        stream.instruction.mnemonic, stream.segment.name
    )
}

fn check_fn_name(stream: &Stream) -> String {
    format!(
        "check_tests_{}_{}",
        stream.instruction.mnemonic, stream.segment.name
    )
}

fn code_file(generation: &Generation, config: &GeneratorConfig) -> String {
    let mut out = String::from(
        "/* This is an autogenerated file. If you intend to debug, better to debug the generator. */\n\n\n",
    );
    out.push_str("\tasm(\n");
    out.push_str(&format!("\t {BANNER}\n"));
    asm_line(&mut out, ".pushsection .rodata");
    out.push_str("\t\"test_umip:\\t\\n\"\n");
    out.push_str("\t/* setup stack */\n");
    asm_line(&mut out, &format!("mov ${}, %esp", config.segment_capacity));
    asm_line(&mut out, "mov %ecx, %ss");
    out.push_str("\t/* save old cs as passed by us before retf'ing here */\n");
    asm_line(&mut out, "push %edx");
    out.push_str("\t/* save old esp as passed by us before retf'ing here */\n");
    asm_line(&mut out, "push %eax");
    out.push_str("\t/* save old ss as passed by us before retf'ing here */\n");
    asm_line(&mut out, "push %ebx");

    for stream in &generation.streams {
        let label = stream_label(stream);
        out.push_str(&format!(
            "\t /* ==================== Test code for {} ==================== */\n",
            stream.instruction.mnemonic
        ));
        out.push_str(&format!("\t\"{label}:\\t\\n\"\n"));
        for case in &stream.cases {
            out.push_str(&case.code_fragment());
        }
        out.push_str(&format!("\t\"{label}_end:\\t\\n\"\n"));
    }

    out.push_str("\t/* preparing to return */\n");
    out.push_str("\t/* restore ss */\n");
    asm_line(&mut out, "pop %ebx");
    out.push_str("\t/* restore esp */\n");
    asm_line(&mut out, "pop %eax");
    out.push_str("\t/* setting return IP, CS is already in stack */\n");
    asm_line(&mut out, "push $finish_testing");
    asm_line(&mut out, "retf");
    out.push_str("\t\"test_umip_end:\\t\\n\"\n");
    asm_line(&mut out, ".popsection");
    out.push_str("\t);\n");
    out
}

fn check_file(generation: &Generation) -> String {
    let mut out = String::new();
    out.push_str(&format!("{BANNER}\n"));
    out.push_str("#include <stdio.h>\n");
    out.push_str(&format!("#include \"{HEADER_FILE}\"\n\n"));
    out.push_str("#include \"umip_test_defs.h\"\n\n\n");
    for counter in [PASS_COUNTER, FAIL_COUNTER, ERROR_COUNTER] {
        out.push_str(&format!("int {counter};\n"));
    }
    out.push('\n');
    for array in ["data", "data_es", "data_fs", "data_gs", STACK_ARRAY] {
        out.push_str(&format!("unsigned char {array}[SEGMENT_SIZE];\n"));
    }
    out.push('\n');

    let mut dispatch = String::new();
    for stream in &generation.streams {
        let name = check_fn_name(stream);
        out.push_str("\n/* AUTOGENERATED CODE */\n");
        match stream.instruction.width {
            ResultWidth::Word => {
                out.push_str(&format!("static void {name}(const unsigned short expected)\n"));
                out.push_str("{\n\tunsigned short got;\n\n");
            }
            ResultWidth::TableDescriptor => {
                out.push_str(&format!("static void {name}(const struct table_desc *expected)\n"));
                out.push_str("{\n\tstruct table_desc *got;\n\n");
            }
        }
        out.push_str(&format!(
            "\tprintf(\"=======Results for {} in segment {}=============\\n\");\n",
            stream.instruction.mnemonic, stream.segment.name
        ));
        for case in &stream.cases {
            out.push_str(&case.check_statement());
        }
        out.push_str("}\n\n");

        dispatch.push_str(&format!(
            "\t{name}({});\n",
            stream.instruction.expected_symbol
        ));
    }

    out.push_str("\nvoid check_results(void)\n{\n");
    out.push_str(&dispatch);
    out.push_str("}\n\n");
    out
}

fn header_file(config: &GeneratorConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!("{BANNER}\n"));
    out.push_str(&format!("#define SEGMENT_SIZE {}\n", config.segment_capacity));
    out.push_str(&format!("#define CODE_MEM_SIZE {}\n", config.code_capacity));
    out.push_str("\nvoid check_results(void);\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, InstructionScope};
    use crate::sequencer::Sequencer;

    fn artifacts(scope: InstructionScope) -> (Generation, Artifacts) {
        let config = GeneratorConfig::default().with_scope(scope);
        let catalog = Catalog::new(scope);
        let generation = Sequencer::new(&catalog, config).run().unwrap();
        let artifacts = Artifacts::assemble(&generation, &config);
        (generation, artifacts)
    }

    #[test]
    fn test_header_defines_layout() {
        let (_, artifacts) = artifacts(InstructionScope::Default);
        assert!(artifacts.header.contains("#define SEGMENT_SIZE 262144\n"));
        assert!(artifacts.header.contains("#define CODE_MEM_SIZE 262144\n"));
        assert!(artifacts.header.contains("void check_results(void);"));
    }

    #[test]
    fn test_code_has_one_block_per_stream() {
        let (generation, artifacts) = artifacts(InstructionScope::Default);
        for stream in &generation.streams {
            let label = stream_label(stream);
            assert!(artifacts.code.contains(&format!("\t\"{label}:\\t\\n\"\n")));
            assert!(artifacts.code.contains(&format!("\t\"{label}_end:\\t\\n\"\n")));
        }
        assert!(artifacts.code.contains("\"mov $262144, %esp\\n\\t\""));
        assert!(artifacts.code.trim_end().ends_with(");"));
        assert_eq!(
            artifacts.code.matches(".byte ").count(),
            generation.case_count()
        );
    }

    #[test]
    fn test_check_file_dispatches_every_stream() {
        let (generation, artifacts) = artifacts(InstructionScope::All);
        assert_eq!(generation.streams.len(), 5 * 4);
        assert!(artifacts
            .checks
            .contains("static void check_tests_smsw_ds(const unsigned short expected)"));
        assert!(artifacts
            .checks
            .contains("static void check_tests_sgdt_gs(const struct table_desc *expected)"));
        assert!(artifacts.checks.contains("\tcheck_tests_str_fs(expected_tr);\n"));
        assert!(artifacts.checks.contains("\tcheck_tests_sidt_es(&expected_idt);\n"));
        assert!(artifacts.checks.contains(
            "\tprintf(\"=======Results for smsw in segment ds=============\\n\");\n"
        ));
        assert_eq!(
            artifacts.checks.matches("\tgot = ").count(),
            generation.case_count()
        );
    }

    #[test]
    fn test_write_to_creates_files() {
        let (_, artifacts) = artifacts(InstructionScope::Default);
        let dir = tempfile::tempdir().unwrap();
        let written = artifacts.write_to(dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        for path in written {
            assert!(path.exists());
        }
        let header = fs::read_to_string(dir.path().join(HEADER_FILE)).unwrap();
        assert_eq!(header, artifacts.header);
    }

    #[test]
    fn test_write_to_leaves_nothing_behind_on_failure() {
        let (_, artifacts) = artifacts(InstructionScope::Default);
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the last file makes its rename fail.
        fs::create_dir(dir.path().join(HEADER_FILE)).unwrap();

        assert!(artifacts.write_to(dir.path()).is_err());
        assert!(!dir.path().join(CODE_FILE).exists());
        assert!(!dir.path().join(CHECK_FILE).exists());

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(HEADER_FILE)]);
    }
}
