//! # weft CLI
//!
//! Command-line front end for the weft document preprocessor. Reads
//! marked-up input files (or standard input), expands them, and writes
//! HTML framed by the `weft.head` and `weft.tail` templates.

use anyhow::Context as _;
use clap::Parser;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use weft_core::tags;
use weft_core::Pipeline;

#[derive(Parser)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input files, processed in order. Reads standard input when empty.
    files: Vec<PathBuf>,

    /// Write output here instead of standard output
    #[arg(short, long, visible_alias = "out")]
    output: Option<PathBuf>,

    /// Directory holding weft.head, weft.tail, and weft.macros
    #[arg(long, env = "WEFT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn read_optional(dir: Option<&Path>, name: &str) -> anyhow::Result<Option<String>> {
    let Some(dir) = dir else { return Ok(None) };
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(content))
}

fn run(cli: Cli) -> anyhow::Result<usize> {
    let mut pipeline = Pipeline::new();

    if let Some(definitions) = read_optional(cli.config.as_deref(), "weft.macros")? {
        let ctx = pipeline.context_mut();
        let weft_core::Context { macros, diags, .. } = ctx;
        macros.load_at_head(&definitions, diags);
    }

    let mut documents = Vec::new();
    if cli.files.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("reading standard input")?;
        documents.push(input);
    } else {
        for file in &cli.files {
            documents.push(
                fs::read_to_string(file)
                    .with_context(|| format!("reading {}", file.display()))?,
            );
        }
    }

    // Each file expands as its own document through the one pipeline.
    // Numbering and labels carry across files, but delimiters cannot
    // pair across a file boundary and a structural error in one file
    // does not stop the rest.
    let mut doc = String::new();
    for mut document in documents {
        pipeline.expand(&mut document);
        doc.push_str(&document);
    }
    let errors = pipeline.context().diags.error_count();

    // Head additions collected during expansion get spliced into the
    // template's <head> element, so the frame is assembled only after
    // every pass has run.
    let head = read_optional(cli.config.as_deref(), "weft.head")?;
    let tail = read_optional(cli.config.as_deref(), "weft.tail")?;

    let mut output = String::new();
    if let Some(head) = head {
        output.push_str(&tags::append_additions_to_head(&head, pipeline.context_mut()));
    }
    output.push_str(&doc);
    if let Some(tail) = tail {
        output.push_str(&tail);
    }

    match &cli.output {
        Some(path) => fs::write(path, output.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout()
            .write_all(output.as_bytes())
            .context("writing standard output")?,
    }

    for message in pipeline.context().diags.messages() {
        eprintln!("{message}");
    }
    Ok(errors)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::WARN.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let errors = run(cli)?;
    std::process::exit(errors.min(i32::MAX as usize) as i32);
}
