pub mod dump;
pub mod ops;
pub mod parser;

pub use ops::{Op, Program};
pub use parser::{Parser, parse};

use crate::config::{RuntimeConfig, TimingsFormat};
use crate::error::Error;
use crate::jit::{Assembly, JitCompiler, TapeEmitter, X86_64Emitter};
use crate::tape::Tape;
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

/// Wall-clock time spent in each phase of one compile-and-run cycle.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimings {
    pub parse: Duration,
    pub emit: Duration,
    pub load: Duration,
    pub run: Duration,
}

#[derive(Serialize)]
struct TimingsReport {
    parse_us: u128,
    emit_us: u128,
    load_us: u128,
    run_us: u128,
    total_us: u128,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.parse + self.emit + self.load + self.run
    }

    /// Render the timings in the requested format (no trailing newline).
    pub fn render(&self, format: TimingsFormat) -> String {
        match format {
            TimingsFormat::Human => format!(
                "[TIME] parse: {:?}, emit: {:?}, load: {:?}, run: {:?}, total: {:?}",
                self.parse,
                self.emit,
                self.load,
                self.run,
                self.total()
            ),
            TimingsFormat::Json => {
                let report = TimingsReport {
                    parse_us: self.parse.as_micros(),
                    emit_us: self.emit.as_micros(),
                    load_us: self.load.as_micros(),
                    run_us: self.run.as_micros(),
                    total_us: self.total().as_micros(),
                };
                serde_json::to_string(&report).unwrap_or_default()
            }
        }
    }
}

/// Parse and emit machine code for `source` without mapping or running it.
pub fn compile(source: &[u8], config: &RuntimeConfig) -> Result<Assembly, Error> {
    let mut timings = PhaseTimings::default();
    compile_timed(source, config, &mut timings)
}

fn compile_timed(
    source: &[u8],
    config: &RuntimeConfig,
    timings: &mut PhaseTimings,
) -> Result<Assembly, Error> {
    let start = Instant::now();
    let program = Parser::new(source).with_fold(config.fold).parse();
    timings.parse = start.elapsed();

    if config.dump_ops {
        eprint!("{}", dump::format_ops(&program));
    }

    let emitter = X86_64Emitter::new(config.input_fd, config.output_fd);
    if config.trace_jit {
        eprintln!(
            "[JIT] Target: {}, fold: {:?}, ops: {}",
            emitter.target_name(),
            config.fold,
            program.len()
        );
    }

    let start = Instant::now();
    let assembly = JitCompiler::new(emitter).compile(&program);
    timings.emit = start.elapsed();

    let assembly = match assembly {
        Ok(assembly) => assembly,
        Err(e) => {
            if config.trace_jit {
                eprintln!("[JIT] Compilation failed: {}", e);
            }
            return Err(e.into());
        }
    };

    if config.trace_jit {
        eprintln!("[JIT] Emitted {} bytes", assembly.code().len());
    }
    if config.dump_code {
        eprint!("{}", dump::format_code(assembly.code()));
    }

    Ok(assembly)
}

/// Compile `source`, map it, and run it once on a fresh tape.
///
/// Returns the tape as the program left it.
///
/// # Safety
/// The generated code does not bounds-check the tape pointer. `source`
/// must not move the pointer off either end of the tape and access a cell
/// there.
pub unsafe fn run_source(source: &[u8], config: &RuntimeConfig) -> Result<Tape, Error> {
    let mut timings = PhaseTimings::default();
    let assembly = compile_timed(source, config, &mut timings)?;

    let start = Instant::now();
    let program = assembly.load()?;
    timings.load = start.elapsed();

    if config.trace_jit {
        eprintln!(
            "[JIT] Loaded {} bytes into {} bytes of executable memory",
            program.code_len(),
            program.mapped_size()
        );
    }

    let mut tape = Tape::new();
    let start = Instant::now();
    // SAFETY: tape bounds are the caller's obligation, see above.
    unsafe { program.run(&mut tape) };
    timings.run = start.elapsed();

    if config.trace_jit {
        eprintln!("[JIT] Execution finished in {:?}", timings.run);
    }
    if let Some(format) = config.timings {
        eprintln!("{}", timings.render(format));
    }

    Ok(tape)
}

/// Read a source file fully and run it.
///
/// # Safety
/// Same contract as [`run_source`].
pub unsafe fn run_file(path: &Path, config: &RuntimeConfig) -> Result<Tape, Error> {
    let source = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // SAFETY: forwarded from the caller.
    unsafe { run_source(&source, config) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::CompileError;

    #[test]
    fn test_compile_reports_unmatched_bracket() {
        let err = compile(b"]", &RuntimeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Compile(CompileError::UnmatchedLoopEnd { op_index: 0 })
        ));
    }

    #[test]
    fn test_compile_respects_fold_mode() {
        let folded = compile(b"+++", &RuntimeConfig::default()).unwrap();
        let config = RuntimeConfig {
            fold: crate::config::FoldMode::Off,
            ..Default::default()
        };
        let unfolded = compile(b"+++", &config).unwrap();
        assert_eq!(folded.op_offsets().len(), 2);
        assert_eq!(unfolded.op_offsets().len(), 4);
    }

    #[test]
    fn test_timings_json() {
        let timings = PhaseTimings {
            parse: Duration::from_micros(1),
            emit: Duration::from_micros(2),
            load: Duration::from_micros(3),
            run: Duration::from_micros(4),
        };
        assert_eq!(
            timings.render(TimingsFormat::Json),
            r#"{"parse_us":1,"emit_us":2,"load_us":3,"run_us":4,"total_us":10}"#
        );
        assert!(timings.render(TimingsFormat::Human).starts_with("[TIME] parse: 1µs"));
    }

    #[test]
    fn test_run_file_missing() {
        let err = unsafe {
            run_file(Path::new("/nonexistent/program.bf"), &RuntimeConfig::default())
        }
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().starts_with("failed to read /nonexistent/program.bf"));
    }
}
