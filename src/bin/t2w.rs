//! texword CLI - LaTeX / Markdown / BibTeX to Word (.docx) converter

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use texword::{convert_file, TexmathRenderer};

#[derive(Parser)]
#[command(name = "t2w")]
#[command(version)]
#[command(about = "texword - LaTeX / Markdown / BibTeX to Word (.docx) converter", long_about = None)]
struct Cli {
    /// Input file (.tex, .md, or .bib)
    input: PathBuf,

    /// Output file path (defaults to the input path with a .docx extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to the texmath executable
    #[arg(long)]
    renderer: Option<PathBuf>,

    /// Per-formula renderer timeout in seconds
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Verbose output (debug-level logging)
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: suppress warning output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut renderer = TexmathRenderer::new().with_timeout(Duration::from_secs(cli.timeout));
    if let Some(program) = &cli.renderer {
        renderer = renderer.with_program(program);
    }

    match convert_file(&cli.input, cli.output.as_deref(), &renderer) {
        Ok((path, warnings)) => {
            if !cli.quiet {
                for warning in &warnings {
                    eprintln!("{}", warning);
                }
            }
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
