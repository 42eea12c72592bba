//! # protoimport
//!
//! Compiles protobuf schemas through virtual path mappings and reports
//! what was found.
//!
//! ```text
//! protoimport -I /proto=/app/test/proto \
//!             -I google/protobuf=/app/lib/protobuf-3.19.4/src/google/protobuf \
//!             /proto/happyday.proto
//! ```
//!
//! Exit status: 0 when every root compiled without a single diagnostic,
//! 1 when anything was reported, 2 for usage errors.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use proto_importer::descriptor::{FieldDescriptor, MessageDescriptor};
use proto_importer::diagnostic::{
    DiagnosticOptions, DiagnosticSummary, DisplayStyle, format_diagnostics_with_sources,
};
use proto_importer::file::DiskMapping;
use proto_importer::syntax::FieldLabel;
use proto_importer::{ConfigBuilder, Importer, SourceTree, VirtualPath, config};

/// Resolve, parse and link protobuf schemas over a virtual source tree.
#[derive(Parser, Debug)]
#[command(name = "protoimport", version, about)]
struct Cli {
    /// Map a virtual prefix onto a directory: `PREFIX=ROOT`, or just `ROOT`
    /// for the empty prefix. Later mappings win on equal prefixes.
    #[arg(short = 'I', long = "map", value_name = "PREFIX=ROOT", value_parser = parse_mapping)]
    mappings: Vec<Mapping>,

    /// Root files: virtual paths, or disk paths under a mapped root.
    roots: Vec<String>,

    /// Compile every schema file reachable through the mappings.
    #[arg(long)]
    all: bool,

    /// Print the fields of one message (full name, or `..Name` to search
    /// by simple name).
    #[arg(long, value_name = "NAME")]
    message: Option<String>,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,

    /// Diagnostic layout.
    #[arg(long, value_enum, default_value_t = Format::Rich)]
    format: Format,

    /// Disable colored diagnostics.
    #[arg(long)]
    no_color: bool,

    /// Warn about imports nothing refers to.
    #[arg(long)]
    warn_unused_imports: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Short,
    Rich,
}

#[derive(Debug, Clone)]
struct Mapping {
    prefix: String,
    root: PathBuf,
}

fn parse_mapping(arg: &str) -> Result<Mapping, String> {
    let (prefix, root) = arg.split_once('=').unwrap_or(("", arg));
    if root.is_empty() {
        return Err(format!("mapping \"{arg}\" has no root directory"));
    }
    Ok(Mapping {
        prefix: prefix.to_owned(),
        root: PathBuf::from(root),
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether everything compiled cleanly.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut tree = SourceTree::new();
    for mapping in &cli.mappings {
        tree.map_path(&mapping.prefix, &mapping.root)
            .with_context(|| format!("invalid mapping prefix \"{}\"", mapping.prefix))?;
    }
    if tree.is_empty() {
        tree.map_path("", ".")?;
    }

    let style = match cli.format {
        Format::Short => DisplayStyle::Short,
        Format::Rich => DisplayStyle::Rich,
    };
    let colored = !cli.no_color && std::io::stderr().is_terminal();
    ConfigBuilder::new()
        .warn_unused_imports(cli.warn_unused_imports)
        .diagnostics(DiagnosticOptions::default().with_style(style).with_colored(colored))
        .init();

    let importer = Importer::new(tree);

    let mut roots = Vec::new();
    for arg in &cli.roots {
        roots.push(root_path(importer.source_tree(), arg)?);
    }
    if cli.all {
        roots.extend(importer.discover().context("cannot list schema files")?);
    }
    if roots.is_empty() {
        bail!("no root files given (pass paths or --all)");
    }
    roots.sort();
    roots.dedup();

    let results = importer.compile_all(&roots);
    let all_ok = results.iter().all(Result::is_ok);

    let mut message_found = true;
    if let Some(name) = &cli.message {
        let registry = importer.registry();
        match registry.resolve_message(name) {
            Ok(message) => print_message(message),
            Err(err) => {
                eprintln!("error: {err}");
                message_found = false;
            }
        }
    } else if cli.json {
        let summary: Vec<_> = importer.compiled().iter().map(|desc| desc.summary_json()).collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for desc in importer.compiled() {
            let counts = desc.counts();
            let status = if desc.is_complete() { "" } else { " (incomplete)" };
            println!(
                "{}{status}: {} messages, {} enums, {} services, {} fields, {} methods",
                desc.path, counts.messages, counts.enums, counts.services, counts.fields, counts.methods,
            );
        }
    }

    let diagnostics = importer.drain_diagnostics();
    if !diagnostics.is_empty() {
        let options = &config::get().diagnostics;
        let tree = importer.source_tree();
        let sources = |path: &VirtualPath| tree.map(path).and_then(|p| std::fs::read_to_string(p).ok());
        eprint!("{}", format_diagnostics_with_sources(&diagnostics, options, &sources));
        eprintln!("{}", DiagnosticSummary::from_diagnostics(&diagnostics));
    }

    Ok(all_ok && message_found && diagnostics.is_empty())
}

/// Interpret a root argument: an existing disk file under a mapped root is
/// reverse-mapped, anything else is taken as a virtual path.
fn root_path(tree: &SourceTree, arg: &str) -> anyhow::Result<VirtualPath> {
    let disk = Path::new(arg);
    if disk.is_file() {
        let absolute = std::path::absolute(disk).unwrap_or_else(|_| disk.to_path_buf());
        for candidate in [disk, absolute.as_path()] {
            match tree.disk_file_to_virtual(candidate) {
                DiskMapping::Virtual(path) => return Ok(path),
                DiskMapping::Shadowed { path, by } => {
                    bail!("{arg} is shadowed: \"{path}\" resolves to {}", by.display())
                }
                DiskMapping::NoMapping => {}
            }
        }
        tracing::debug!(%arg, "file is outside every mapped root; trying it as a virtual path");
    }
    VirtualPath::new(arg).with_context(|| format!("invalid root \"{arg}\""))
}

fn print_message(message: &MessageDescriptor) {
    println!("message {} {{", message.full_name);
    for field in &message.fields {
        println!("  {}", describe_field(message, field));
    }
    println!("}}");
}

fn describe_field(message: &MessageDescriptor, field: &FieldDescriptor) -> String {
    let label = match field.label {
        Some(FieldLabel::Optional) => "optional ",
        Some(FieldLabel::Required) => "required ",
        Some(FieldLabel::Repeated) => "repeated ",
        None => "",
    };
    let oneof = field
        .oneof
        .and_then(|index| message.oneofs.get(index))
        .map(|name| format!("  // oneof {name}"))
        .unwrap_or_default();
    format!("{label}{} {} = {};{oneof}", field.ty, field.name, field.number)
}
