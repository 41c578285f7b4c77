//! akkado: compile an Akkado patch to Cedar bytecode.
//!
//! Exit status: 0 on success, 1 when the program has errors, 2 when the
//! tool itself could not run (bad config, unwritable output).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use akkado::bytecode;
use akkado::config::{CompilerConfig, OutputFormat};
use akkado::dsl::stdlib::{STDLIB, STDLIB_FILENAME};
use akkado::dsl::{format_diagnostic, CompileResult, Compiler};
use akkado::error::AkkadoError;

/// Compile an Akkado patch to Cedar bytecode
#[derive(Parser)]
#[command(name = "akkado")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source file to compile
    file: PathBuf,

    /// Output format (overrides the config file)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write raw bytecode to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a disassembly of the generated bytecode
    #[arg(long)]
    dump: bool,

    /// Register an extra sample name (repeatable)
    #[arg(long = "sample", value_name = "NAME")]
    samples: Vec<String>,

    /// Do not register the built-in drum names
    #[arg(long)]
    no_default_samples: bool,

    /// Config file to use instead of ~/.akkado/config.yaml
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("AKKADO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("akkado: {err}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether compilation succeeded.
fn run(cli: &Cli) -> Result<bool, AkkadoError> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load_from(path)?,
        None => CompilerConfig::load().unwrap_or_default(),
    };
    config.samples.extend(cli.samples.iter().cloned());
    if cli.no_default_samples {
        config.default_samples = false;
    }
    let format = cli.format.unwrap_or(config.format);

    let compiler = Compiler::with_registry(config.registry());
    let (source, result) = match std::fs::read_to_string(&cli.file) {
        Ok(source) => {
            let result = compiler.compile(&source, &cli.file.display().to_string());
            (source, result)
        }
        Err(_) => (String::new(), compiler.compile_file(&cli.file)),
    };

    match format {
        OutputFormat::Text => print_text(&result, &source),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if cli.dump && result.success {
        if let Ok(instructions) = result.instructions() {
            print!("{}", bytecode::disassemble(&instructions));
        }
    }

    if let (Some(path), true) = (&cli.output, result.success) {
        std::fs::write(path, &result.bytecode).map_err(|source| AkkadoError::Write {
            path: path.clone(),
            source,
        })?;
    }

    Ok(result.success)
}

fn print_text(result: &CompileResult, source: &str) {
    for diag in &result.diagnostics {
        let text = if diag.filename == STDLIB_FILENAME {
            STDLIB
        } else {
            source
        };
        eprint!("{}", format_diagnostic(diag, text));
    }

    if !result.success {
        let errors = result.errors().count();
        eprintln!("compilation failed with {errors} error(s)");
        return;
    }

    println!(
        "{} instruction(s), {} bytes",
        result.instruction_count(),
        result.bytecode.len()
    );
    if !result.state_inits.is_empty() {
        println!("{} sequence state(s)", result.state_inits.len());
    }
    if !result.required_samples.is_empty() {
        println!("samples: {}", result.required_samples.join(", "));
    }
    for param in &result.param_decls {
        println!(
            "param {} ({:?}) default {} range [{}, {}]",
            param.name, param.kind, param.default, param.min, param.max
        );
    }
}
