//! smelt: Extract records from a large XML document into NDJSON
//!
//! Usage:
//!   # Single pass, output to stdout
//!   smelt ClinVarFullRelease.xml -s schemas/clinvar.json
//!
//!   # Split into 8 fragments and extract them in parallel
//!   smelt ClinVarFullRelease.xml -s schemas/clinvar.json -n 8 -o clinvar.jsonl
//!
//!   # Keep the fragment files for inspection
//!   smelt data.xml -n 4 --keep-parts --parts-dir /tmp/parts -o out.jsonl

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use smelt::{CoordinatorOptions, Schema, SplitOptions};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "smelt")]
#[command(about = "Transform an XML datasource into JSON documents according to a schema", long_about = None)]
struct Args {
    /// XML input file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// JSON schema file
    #[arg(long, short = 's', default_value = "schemas/clinvar.json")]
    schema: PathBuf,

    /// Output file (stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Split the input into this many parts and process them in parallel
    #[arg(long = "n-parts", short = 'n')]
    parts: Option<usize>,

    /// Keep fragment files after a parallel run
    #[arg(long, requires = "parts")]
    keep_parts: bool,

    /// Directory for fragment files (defaults to the input's directory)
    #[arg(long, requires = "parts")]
    parts_dir: Option<PathBuf>,

    /// Records buffered between workers and the output writer
    #[arg(long, default_value_t = CoordinatorOptions::default().queue_capacity)]
    queue_capacity: usize,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let schema = Schema::from_json_file(&args.schema)
        .with_context(|| format!("Failed to load schema {}", args.schema.display()))?;
    let plan = schema.compile().context("Invalid schema")?;

    let sink: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    match args.parts {
        Some(parts) => {
            let mut split = SplitOptions::new(parts);
            if let Some(dir) = args.parts_dir {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                split = split.output_dir(dir);
            }
            let options = CoordinatorOptions {
                queue_capacity: args.queue_capacity,
            };

            smelt::split_and_extract(&args.input, &plan, split, options, args.keep_parts, sink)
                .with_context(|| format!("Failed to process {}", args.input.display()))?;
        }
        None => {
            smelt::extract_file(&args.input, &plan, sink)
                .with_context(|| format!("Failed to process {}", args.input.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_is_bundled() {
        let args = Args::parse_from(["smelt", "input.xml"]);
        assert!(args.schema.exists(), "{} is missing", args.schema.display());
        Schema::from_json_file(&args.schema).unwrap().compile().unwrap();
        assert_eq!(args.parts, None);
        assert_eq!(args.queue_capacity, 1024);
    }
}
