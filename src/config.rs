//! Runtime configuration types.

/// Run-length folding mode for the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FoldMode {
    /// Collapse runs of identical symbols into one op
    #[default]
    On,
    /// One op per symbol
    Off,
}

/// Output format for `--timings`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimingsFormat {
    #[default]
    Human,
    Json,
}

/// Runtime configuration for a compile-and-run cycle
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub fold: FoldMode,
    pub trace_jit: bool,
    /// Print the folded op sequence to stderr before running
    pub dump_ops: bool,
    /// Hex-dump the emitted machine code to stderr before running
    pub dump_code: bool,
    pub timings: Option<TimingsFormat>,
    /// Descriptor the generated code reads `,` bytes from
    pub input_fd: i32,
    /// Descriptor the generated code writes `.` bytes to
    pub output_fd: i32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fold: FoldMode::On,
            trace_jit: false,
            dump_ops: false,
            dump_code: false,
            timings: None,
            input_fd: 0,
            output_fd: 1,
        }
    }
}
