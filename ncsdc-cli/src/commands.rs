//! CLI command implementations.

use std::fs;
use std::path::Path;

use ncsdc_common::Script;

/// Decompile a .ncs file to structured text.
pub fn decompile(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: decompile requires an input file");
        eprintln!("Usage: ncsdc decompile <input.ncs> [-o output.txt]");
        return Err(1);
    }

    let input = &args[0];

    // Parse -o flag
    let output = if args.len() >= 3 && args[1] == "-o" {
        Some(args[2].clone())
    } else {
        None
    };

    let bytes = read_bytes(input)?;
    let out = ncsdc_decompile::decompile(&bytes).map_err(|e| {
        eprintln!("error: {input}: {e}");
        1
    })?;

    for diag in &out.diagnostics {
        eprintln!("warning: {input}: {diag}");
    }

    let text = out.text();
    match output {
        Some(path) => {
            fs::write(&path, &text).map_err(|e| {
                eprintln!("error: cannot write '{path}': {e}");
                1
            })?;
            eprintln!(
                "decompiled {} subroutines -> {path}",
                out.tree.children(out.tree.root()).len()
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Flat disassembly listing of a .ncs file.
pub fn disassemble(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: disassemble requires an input file");
        eprintln!("Usage: ncsdc disassemble <input.ncs>");
        return Err(1);
    }

    let script = read_script(&args[0])?;
    for inst in &script.instructions {
        println!("{}", inst.fmt_line());
    }
    Ok(())
}

/// Header fields and instruction/subroutine counts.
pub fn info(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: info requires an input file");
        eprintln!("Usage: ncsdc info <input.ncs>");
        return Err(1);
    }

    let input = &args[0];
    let script = read_script(input)?;
    let analysis = ncsdc_analysis::analyze(&script);

    println!("file:          {input}");
    println!("declared size: {} bytes", script.header.declared_size);
    println!("instructions:  {}", script.len());
    println!("subroutines:   {}", analysis.subroutines.len());
    println!("diagnostics:   {}", analysis.diagnostics.len());
    Ok(())
}

/// Decompile every .ncs file in a directory; failures are reported and
/// the batch continues.
pub fn batch(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: batch requires a directory");
        eprintln!("Usage: ncsdc batch <dir>");
        return Err(1);
    }

    let dir = &args[0];
    let entries = fs::read_dir(dir).map_err(|e| {
        eprintln!("error: cannot read directory '{dir}': {e}");
        1
    })?;

    let mut done = 0usize;
    let mut failed = 0usize;
    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|ext| ext == "ncs").unwrap_or(false))
        .collect();
    paths.sort();

    for path in paths {
        match decompile_one(&path) {
            Ok(()) => done += 1,
            Err(message) => {
                eprintln!("error: {}: {message}", path.display());
                failed += 1;
            }
        }
    }

    eprintln!("decompiled {done} files, {failed} failures");
    if failed > 0 {
        Err(1)
    } else {
        Ok(())
    }
}

fn decompile_one(path: &Path) -> Result<(), String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let out = ncsdc_decompile::decompile(&bytes).map_err(|e| e.to_string())?;
    for diag in &out.diagnostics {
        eprintln!("warning: {}: {diag}", path.display());
    }
    let target = path.with_extension("txt");
    fs::write(&target, out.text()).map_err(|e| e.to_string())?;
    Ok(())
}

fn read_bytes(input: &str) -> Result<Vec<u8>, i32> {
    fs::read(input).map_err(|e| {
        eprintln!("error: cannot read '{input}': {e}");
        1
    })
}

fn read_script(input: &str) -> Result<Script, i32> {
    let bytes = read_bytes(input)?;
    Script::decode(&bytes).map_err(|e| {
        eprintln!("error: {input}: {e}");
        1
    })
}
