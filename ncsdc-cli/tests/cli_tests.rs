//! Integration tests for the NCS decompiler CLI.
//!
//! These tests invoke the `ncsdc` binary as a subprocess and check
//! exit codes, stdout, and stderr.

use assert_cmd::Command;
use ncsdc_common::{Opcode, Operands, Qualifier, Script};
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn ncsdc() -> Command {
    Command::cargo_bin("ncsdc").unwrap()
}

/// Write an assembled script into `dir` and return its path.
fn write_script(
    dir: &TempDir,
    name: &str,
    parts: Vec<(Opcode, Qualifier, Operands)>,
) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, Script::assemble(parts).encode()).unwrap();
    path
}

fn add_and_return() -> Vec<(Opcode, Qualifier, Operands)> {
    vec![
        (Opcode::Const, Qualifier::Int, Operands::ConstInt(5)),
        (Opcode::Const, Qualifier::Int, Operands::ConstInt(3)),
        (Opcode::Add, Qualifier::IntInt, Operands::None),
        (Opcode::Ret, Qualifier::None, Operands::None),
    ]
}

// ---- No-args / help ----

#[test]
fn no_args_prints_usage_and_exits_1() {
    ncsdc()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage: ncsdc"));
}

#[test]
fn help_exits_0() {
    ncsdc()
        .arg("--help")
        .assert()
        .success()
        .stderr(predicate::str::contains("decompile"));
}

#[test]
fn unknown_command_exits_1() {
    ncsdc()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown command"));
}

// ---- decompile ----

#[test]
fn decompile_prints_structured_text() {
    let dir = TempDir::new().unwrap();
    let input = write_script(&dir, "a.ncs", add_and_return());
    ncsdc()
        .args(["decompile", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("main:"))
        .stdout(predicate::str::contains("(5 + 3)"))
        .stdout(predicate::str::contains("return"));
}

#[test]
fn decompile_writes_output_file_with_o_flag() {
    let dir = TempDir::new().unwrap();
    let input = write_script(&dir, "a.ncs", add_and_return());
    let output = dir.path().join("a.txt");
    ncsdc()
        .args([
            "decompile",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("(5 + 3)"));
}

#[test]
fn decompile_missing_file_exits_1() {
    ncsdc()
        .args(["decompile", "/nonexistent/x.ncs"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn decompile_bad_magic_exits_1() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.ncs");
    fs::write(&path, b"XXXXXXXX\x42\x00\x00\x00\x0d").unwrap();
    ncsdc()
        .args(["decompile", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("bad magic"));
}

#[test]
fn decompile_reports_diagnostics_on_stderr() {
    let dir = TempDir::new().unwrap();
    // JZ to a mid-instruction offset: best-effort output, warning noted.
    let input = write_script(
        &dir,
        "warn.ncs",
        vec![
            (Opcode::Const, Qualifier::Int, Operands::ConstInt(0)),
            (Opcode::Jz, Qualifier::None, Operands::Branch(9)),
            (Opcode::Ret, Qualifier::None, Operands::None),
        ],
    );
    ncsdc()
        .args(["decompile", input.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("invalid-branch-target"));
}

// ---- disassemble ----

#[test]
fn disassemble_lists_one_line_per_instruction() {
    let dir = TempDir::new().unwrap();
    let input = write_script(&dir, "a.ncs", add_and_return());
    ncsdc()
        .args(["disassemble", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("CONSTI"))
        .stdout(predicate::str::contains("ADDII"))
        .stdout(predicate::str::contains("RETN"));
}

// ---- info ----

#[test]
fn info_reports_counts() {
    let dir = TempDir::new().unwrap();
    let input = write_script(&dir, "a.ncs", add_and_return());
    ncsdc()
        .args(["info", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("instructions:  4"))
        .stdout(predicate::str::contains("subroutines:   1"));
}

// ---- batch ----

#[test]
fn batch_continues_past_a_bad_file() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "good.ncs", add_and_return());
    fs::write(dir.path().join("bad.ncs"), b"not a script").unwrap();
    ncsdc()
        .args(["batch", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("decompiled 1 files, 1 failures"));
    let text = fs::read_to_string(dir.path().join("good.txt")).unwrap();
    assert!(text.contains("(5 + 3)"));
}

#[test]
fn batch_all_good_exits_0() {
    let dir = TempDir::new().unwrap();
    write_script(&dir, "a.ncs", add_and_return());
    write_script(&dir, "b.ncs", add_and_return());
    ncsdc()
        .args(["batch", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("decompiled 2 files, 0 failures"));
    assert!(dir.path().join("a.txt").exists());
    assert!(dir.path().join("b.txt").exists());
}
