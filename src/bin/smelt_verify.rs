//! smelt-verify: Check that an NDJSON output has one line per input record
//!
//! Usage:
//!   smelt-verify ClinVarFullRelease.xml clinvar.jsonl
//!   smelt-verify data.xml out.jsonl --path Set/Group/Entry

use anyhow::{Context, Result};
use clap::Parser;
use smelt::verify;
use smelt::TagPath;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "smelt-verify")]
#[command(about = "Compare record counts between an XML input and its NDJSON output", long_about = None)]
struct Args {
    /// XML input file
    input: PathBuf,

    /// NDJSON output file
    output: PathBuf,

    /// Path of record elements in the input
    #[arg(long, default_value = "ReleaseSet/ClinVarSet/ReferenceClinVarAssertion")]
    path: String,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let path = TagPath::parse(&args.path);

    println!("Counting records in input XML...");
    let input_count = verify::count_elements(&args.input, &path)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    println!("Counting documents in output JSON...");
    let output_count = verify::count_lines(&args.output)
        .with_context(|| format!("Failed to read {}", args.output.display()))?;

    let result = verify::Verification {
        input_count,
        output_count,
    };
    println!("{result}");

    Ok(if result.is_match() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
