//! Error types and diagnostic reporting

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use landstalker_format::CodecError;
use thiserror::Error;

/// The four data subsystems, named in every fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Sprite,
    Graphics,
    String,
    Room,
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Subsystem::Sprite => "sprite data",
            Subsystem::Graphics => "graphics data",
            Subsystem::String => "string data",
            Subsystem::Room => "room data",
        };
        f.write_str(name)
    }
}

/// Data-layer error. Load errors are fatal at subsystem-construction
/// granularity: no partial subsystem is ever returned.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("{subsystem} failed to load ({step}): {detail}")]
    Load {
        subsystem: Subsystem,
        /// The sub-loader that failed, e.g. "sprite frame data"
        step: &'static str,
        detail: String,
    },

    #[error("{subsystem} failed to save ({step})")]
    Save {
        subsystem: Subsystem,
        step: &'static str,
    },

    #[error("assembly source error in {file}: {message}")]
    AsmParse {
        file: String,
        message: String,
        span: Option<std::ops::Range<usize>>,
    },

    #[error("unknown ROM label: {0}")]
    UnknownLabel(String),

    #[error("ROM read out of bounds: {addr:#08X}+{len} (rom is {rom_len:#X} bytes)")]
    RomBounds { addr: u32, len: usize, rom_len: usize },

    /// A dangling name lookup or duplicate insert. Never caught or
    /// retried; a logic bug, not a runtime condition.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub fn load(subsystem: Subsystem, step: &'static str, detail: impl Into<String>) -> Self {
        Self::Load {
            subsystem,
            step,
            detail: detail.into(),
        }
    }

    pub fn save(subsystem: Subsystem, step: &'static str) -> Self {
        Self::Save { subsystem, step }
    }

    pub fn asm_parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AsmParse {
            file: file.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::InternalConsistency(message.into())
    }
}

pub type DataResult<T> = Result<T, DataError>;

/// Attach subsystem/step context to a codec or IO failure inside one
/// sub-loader.
pub fn load_context<T, E: std::fmt::Display>(
    result: Result<T, E>,
    subsystem: Subsystem,
    step: &'static str,
) -> DataResult<T> {
    result.map_err(|e| DataError::load(subsystem, step, e.to_string()))
}

/// Diagnostic reporter for pretty assembly-source error output
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    writer: StandardStream,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            files: SimpleFiles::new(),
            writer: StandardStream::stderr(ColorChoice::Auto),
            config: term::Config::default(),
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        self.files.add(name.into(), source.into())
    }

    pub fn report_error(&self, file_id: usize, error: &DataError) {
        let diagnostic = match error {
            DataError::AsmParse {
                message,
                span: Some(span),
                ..
            } => Diagnostic::error()
                .with_message("Assembly source error")
                .with_labels(vec![
                    Label::primary(file_id, span.clone()).with_message(message),
                ]),
            other => Diagnostic::error().with_message(other.to_string()),
        };

        let _ = term::emit(&mut self.writer.lock(), &self.config, &self.files, &diagnostic);
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_names_subsystem_and_step() {
        let err = DataError::load(Subsystem::Sprite, "sprite frame data", "bad pointer");
        assert_eq!(
            err.to_string(),
            "sprite data failed to load (sprite frame data): bad pointer"
        );
    }

    #[test]
    fn test_save_error_cites_step_category_only() {
        let err = DataError::save(Subsystem::Graphics, "inventory graphics");
        assert_eq!(
            err.to_string(),
            "graphics data failed to save (inventory graphics)"
        );
    }
}
