//! Error types for lualink-lib.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while bridging between the host and Lua.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("validation failed for field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("sandbox violation: {0}")]
    Sandbox(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("environment error: {0}")]
    Env(String),

    #[error("watcher error: {0}")]
    Watch(String),
}

/// Result type for lualink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One frame of a Lua stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Chunk name or `[C]` for host frames.
    pub source: String,
    /// Line number within the chunk, when known.
    pub line: Option<u32>,
    /// Function name, when the trace names one.
    pub function: Option<String>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.function, self.line) {
            (Some(func), Some(line)) => write!(f, "at {} ({}:{})", func, self.source, line),
            (Some(func), None) => write!(f, "at {} ({})", func, self.source),
            (None, Some(line)) => write!(f, "at {}:{}", self.source, line),
            (None, None) => write!(f, "at {}", self.source),
        }
    }
}

/// Extract Lua stack frames from an mlua error.
///
/// Callback errors carry an explicit traceback; runtime errors embed one in
/// their message after a `stack traceback:` marker. Returns an empty vec when
/// the error has no usable trace.
pub fn stack_frames(err: &mlua::Error) -> Vec<StackFrame> {
    match err {
        mlua::Error::CallbackError { traceback, .. } => parse_traceback(traceback),
        mlua::Error::RuntimeError(msg) | mlua::Error::SyntaxError { message: msg, .. } => {
            match msg.find("stack traceback:") {
                Some(idx) => parse_traceback(&msg[idx..]),
                None => parse_first_line(msg).into_iter().collect(),
            }
        }
        mlua::Error::WithContext { cause, .. } => stack_frames(cause),
        _ => Vec::new(),
    }
}

/// Parse the body of a `stack traceback:` section into frames.
fn parse_traceback(traceback: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut in_trace = false;

    for raw in traceback.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("stack traceback:") {
            in_trace = true;
            continue;
        }
        if !in_trace {
            continue;
        }
        if let Some(frame) = parse_frame_line(line) {
            frames.push(frame);
        }
    }

    frames
}

/// Parse a single traceback line such as:
///
/// ```text
/// config.lua:7: in function 'connect'
/// [string "inline"]:3: in main chunk
/// [C]: in ?
/// ```
fn parse_frame_line(line: &str) -> Option<StackFrame> {
    // Host frames have no line number.
    if let Some(rest) = line.strip_prefix("[C]:") {
        return Some(StackFrame {
            source: "[C]".to_string(),
            line: None,
            function: parse_function_name(rest),
        });
    }

    // Source frames are `<source>:<line>: <description>`. The source itself may
    // contain colons (e.g. `[string "a:b"]`), so scan for the last
    // `:<digits>:` occurrence.
    let (source, line_no, rest) = split_source_line(line)?;
    Some(StackFrame {
        source: source.to_string(),
        line: Some(line_no),
        function: parse_function_name(rest),
    })
}

fn split_source_line(line: &str) -> Option<(&str, u32, &str)> {
    let mut search_end = line.len();
    while let Some(colon) = line[..search_end].rfind(':') {
        let after = &line[colon + 1..];
        if let Some(end) = after.find(':') {
            if let Ok(n) = after[..end].parse::<u32>() {
                return Some((&line[..colon], n, &after[end + 1..]));
            }
        }
        search_end = colon;
    }
    None
}

fn parse_function_name(rest: &str) -> Option<String> {
    let rest = rest.trim();
    let name = rest
        .strip_prefix("in function '")
        .or_else(|| rest.strip_prefix("in method '"))
        .or_else(|| rest.strip_prefix("in upvalue '"))
        .or_else(|| rest.strip_prefix("in local '"))?;
    name.strip_suffix('\'').map(|n| n.to_string())
}

/// Fall back to the error's first line (`<source>:<line>: message`) when no
/// traceback section is present.
fn parse_first_line(msg: &str) -> Option<StackFrame> {
    let first = msg.lines().next()?.trim();
    let (source, line, _) = split_source_line(first)?;
    Some(StackFrame {
        source: source.to_string(),
        line: Some(line),
        function: None,
    })
}
