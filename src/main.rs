use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use bfjit::{FoldMode, RuntimeConfig, TimingsFormat};

// Wrapper type for clap ValueEnum support
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum TimingsFormatArg {
    #[default]
    Human,
    Json,
}

impl From<TimingsFormatArg> for TimingsFormat {
    fn from(arg: TimingsFormatArg) -> Self {
        match arg {
            TimingsFormatArg::Human => TimingsFormat::Human,
            TimingsFormatArg::Json => TimingsFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(name = "bfjit")]
#[command(about = "JIT compiler for the eight-symbol tape language", long_about = None)]
struct Cli {
    /// The source file to compile and run
    file: Option<PathBuf>,

    /// Compile one op per symbol instead of folding runs
    #[arg(long)]
    no_fold: bool,

    /// Trace JIT compilation events
    #[arg(long)]
    trace_jit: bool,

    /// Dump the folded op sequence to stderr
    #[arg(long)]
    dump_ops: bool,

    /// Hex-dump the emitted machine code to stderr
    #[arg(long)]
    dump_code: bool,

    /// Print pipeline timings (human or json format)
    #[arg(long, value_enum, require_equals = true, num_args = 0..=1, default_missing_value = "human")]
    timings: Option<TimingsFormatArg>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(path) = cli.file else {
        eprint!("{}", Cli::command().render_usage());
        eprintln!();
        return ExitCode::SUCCESS;
    };

    let config = RuntimeConfig {
        fold: if cli.no_fold { FoldMode::Off } else { FoldMode::On },
        trace_jit: cli.trace_jit,
        dump_ops: cli.dump_ops,
        dump_code: cli.dump_code,
        timings: cli.timings.map(|t| t.into()),
        ..Default::default()
    };

    // SAFETY: the language leaves the tape pointer unchecked; a program that
    // walks off the tape is outside its defined behavior.
    if let Err(e) = unsafe { bfjit::run_file(&path, &config) } {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
