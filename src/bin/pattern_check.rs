//! Codeplug pattern checker
//! Parses and verifies a pattern document, optionally writing it back in
//! canonical form.

use codeplug_rs::pattern::{MetaFlags, PatternTree};
use std::env;
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

fn print_layout(tree: &PatternTree) {
    let Some(root) = tree.root() else {
        return;
    };
    let meta = tree[root].meta();
    if meta.has_name() {
        println!("Codeplug: {}", meta.name);
    }
    if !meta.firmware.is_empty() {
        println!("Firmware: {}", meta.firmware);
    }
    println!("Patterns: {}", tree.descendants(root).len());

    for child in tree.children(root) {
        let size = tree
            .extent(*child)
            .map(|size| size.to_string())
            .unwrap_or_else(|| "variable".to_string());
        let flags = match tree.combined_flags(*child) {
            MetaFlags::None => String::new(),
            flags => format!(" [{}]", flags.tag().unwrap_or_default()),
        };
        println!("  {} ({}){}", tree.describe(*child), size, flags);
    }
}

fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <pattern.xml> [output.xml]", args[0]);
        eprintln!("Example: {} d878uv.xml", args[0]);
        eprintln!("\nParses and verifies the pattern; with an output file the");
        eprintln!("pattern is written back in canonical form.");
        std::process::exit(1);
    }

    let tree = PatternTree::load(&args[1])?;
    print_layout(&tree);

    if let Err(err) = tree.verify_root() {
        anyhow::bail!("Verification failed: {}", err);
    }
    println!("Pattern is valid.");

    if let Some(output) = args.get(2) {
        tree.save(output)?;
        println!("Written to {}", output);
    }

    Ok(())
}
