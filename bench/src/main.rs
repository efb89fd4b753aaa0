use bfjit::{FoldMode, RuntimeConfig, run_source};
use serde::Serialize;
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Serialize)]
struct BenchmarkResult {
    name: String,
    folded_secs: f64,
    unfolded_secs: f64,
    folded_code_bytes: usize,
    unfolded_code_bytes: usize,
}

#[derive(Serialize)]
struct BenchmarkOutput {
    results: Vec<BenchmarkResult>,
}

const HELLO: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

/// Three nested 255-iteration loops.
const COUNTDOWN: &str = "-[>-[>-[-]<-]<-]";

/// Long runs of `+` and `>` that folding collapses.
const RUNS: &str = "++++++++++++++++[>++++++++++++++++[>>>>>>>>++++++++++++++++<<<<<<<<-]<-]";

fn run_benchmark(name: &str, source: &str, output_fd: i32) -> Result<BenchmarkResult, String> {
    let mut secs = [0.0; 2];
    let mut code_bytes = [0; 2];

    for (i, fold) in [FoldMode::On, FoldMode::Off].into_iter().enumerate() {
        let config = RuntimeConfig {
            fold,
            output_fd,
            ..Default::default()
        };

        code_bytes[i] = bfjit::compile(source.as_bytes(), &config)
            .map_err(|e| format!("{} (fold={:?}) failed: {}", name, fold, e))?
            .code()
            .len();

        let start = Instant::now();
        // SAFETY: the bundled programs stay within the tape.
        unsafe { run_source(source.as_bytes(), &config) }
            .map_err(|e| format!("{} (fold={:?}) failed: {}", name, fold, e))?;
        secs[i] = start.elapsed().as_secs_f64();
    }

    Ok(BenchmarkResult {
        name: name.to_string(),
        folded_secs: secs[0],
        unfolded_secs: secs[1],
        folded_code_bytes: code_bytes[0],
        unfolded_code_bytes: code_bytes[1],
    })
}

fn main() -> ExitCode {
    let sink = match OpenOptions::new().write(true).open("/dev/null") {
        Ok(file) => file,
        Err(e) => {
            eprintln!("failed to open /dev/null: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut results = Vec::new();
    for (name, source) in [("hello", HELLO), ("countdown", COUNTDOWN), ("runs", RUNS)] {
        match run_benchmark(name, source, sink.as_raw_fd()) {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let output = BenchmarkOutput { results };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("failed to serialize results: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
