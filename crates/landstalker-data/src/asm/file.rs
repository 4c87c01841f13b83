//! AsmFile: parse and emit the label + include index files
//!
//! An index file is a flat sequence of labels, include directives and
//! data directives. Reading is cursor-based: `goto(label)` positions the
//! cursor just past a label, then sequential `read_*` calls consume the
//! following items, mirroring how the save side writes them.

use std::path::{Path, PathBuf};

use logos::Logos;

use super::token::TokenKind;
use crate::error::{DataError, DataResult};

/// How an included file is to be assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `incbin`: raw binary payload
    Binary,
    /// `include`: nested assembler source
    Assembler,
}

/// An include directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeFile {
    pub path: PathBuf,
    pub kind: IncludeKind,
}

/// Width of a data directive value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Long,
}

/// One parsed item of an index file
#[derive(Debug, Clone, PartialEq)]
enum Item {
    Label(String),
    Include(IncludeFile),
    Value(u32, Width),
}

/// A parsed (or under-construction) assembly index file
#[derive(Debug, Clone, Default)]
pub struct AsmFile {
    name: String,
    items: Vec<Item>,
    cursor: usize,
}

impl AsmFile {
    /// Parse from source text. `name` is used in diagnostics only.
    pub fn from_source(name: impl Into<String>, source: &str) -> DataResult<Self> {
        let name = name.into();
        let mut items = Vec::new();
        let mut lexer = TokenKind::lexer(source);
        while let Some(token) = lexer.next() {
            let token = token.map_err(|()| DataError::AsmParse {
                file: name.clone(),
                message: format!("unrecognised input {:?}", lexer.slice()),
                span: Some(lexer.span()),
            })?;
            match token {
                TokenKind::Label(label) => items.push(Item::Label(label)),
                TokenKind::Include | TokenKind::Incbin => {
                    let kind = if token == TokenKind::Incbin {
                        IncludeKind::Binary
                    } else {
                        IncludeKind::Assembler
                    };
                    match lexer.next() {
                        Some(Ok(TokenKind::Str(path))) => items.push(Item::Include(IncludeFile {
                            path: PathBuf::from(path),
                            kind,
                        })),
                        _ => {
                            return Err(DataError::AsmParse {
                                file: name,
                                message: "include directive needs a quoted path".to_string(),
                                span: Some(lexer.span()),
                            });
                        }
                    }
                }
                TokenKind::DcB | TokenKind::DcW | TokenKind::DcL => {
                    let width = match token {
                        TokenKind::DcB => Width::Byte,
                        TokenKind::DcW => Width::Word,
                        _ => Width::Long,
                    };
                    // Values of a dc directive run to the next non-number
                    let mut any = false;
                    let mut peek = lexer.clone();
                    while let Some(Ok(TokenKind::Number(value))) = peek.next() {
                        items.push(Item::Value(value, width));
                        lexer = peek.clone();
                        any = true;
                    }
                    if !any {
                        return Err(DataError::AsmParse {
                            file: name,
                            message: "data directive needs at least one value".to_string(),
                            span: Some(lexer.span()),
                        });
                    }
                }
                other => {
                    return Err(DataError::AsmParse {
                        file: name,
                        message: format!("unexpected token {other:?}"),
                        span: Some(lexer.span()),
                    });
                }
            }
        }
        Ok(Self {
            name,
            items,
            cursor: 0,
        })
    }

    /// Read and parse from disk
    pub fn load(path: &Path) -> DataResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_source(path.display().to_string(), &source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// More items remain at the cursor
    pub fn is_good(&self) -> bool {
        self.cursor < self.items.len()
    }

    /// The item at the cursor is a label
    pub fn is_label(&self) -> bool {
        matches!(self.items.get(self.cursor), Some(Item::Label(_)))
    }

    /// Consume a label at the cursor
    pub fn read_label(&mut self) -> DataResult<String> {
        match self.items.get(self.cursor) {
            Some(Item::Label(label)) => {
                let label = label.clone();
                self.cursor += 1;
                Ok(label)
            }
            other => Err(DataError::asm_parse(
                self.name.clone(),
                format!("expected a label, found {other:?}"),
            )),
        }
    }

    /// Position the cursor just past the named label
    pub fn goto(&mut self, label: &str) -> DataResult<()> {
        for (i, item) in self.items.iter().enumerate() {
            if matches!(item, Item::Label(l) if l == label) {
                self.cursor = i + 1;
                return Ok(());
            }
        }
        Err(DataError::asm_parse(
            self.name.clone(),
            format!("label not found: {label}"),
        ))
    }

    /// Consume the next include directive at the cursor
    pub fn read_include(&mut self) -> DataResult<IncludeFile> {
        match self.items.get(self.cursor) {
            Some(Item::Include(include)) => {
                let include = include.clone();
                self.cursor += 1;
                Ok(include)
            }
            other => Err(DataError::asm_parse(
                self.name.clone(),
                format!("expected an include directive, found {other:?}"),
            )),
        }
    }

    /// Consume the next data value at the cursor
    pub fn read_value(&mut self) -> DataResult<u32> {
        match self.items.get(self.cursor) {
            Some(Item::Value(value, _)) => {
                let value = *value;
                self.cursor += 1;
                Ok(value)
            }
            other => Err(DataError::asm_parse(
                self.name.clone(),
                format!("expected a data value, found {other:?}"),
            )),
        }
    }

    // ---- writer side ----

    /// Start an empty file for writing
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            cursor: 0,
        }
    }

    pub fn write_label(&mut self, label: impl Into<String>) {
        self.items.push(Item::Label(label.into()));
    }

    pub fn write_include(&mut self, path: impl Into<PathBuf>, kind: IncludeKind) {
        self.items.push(Item::Include(IncludeFile {
            path: path.into(),
            kind,
        }));
    }

    pub fn write_value(&mut self, value: u32, width: Width) {
        self.items.push(Item::Value(value, width));
    }

    /// Render to source text, with a comment header naming the file's
    /// purpose.
    pub fn to_source(&self, title: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("; {title}\n; Generated file - do not edit by hand\n\n"));
        let mut pending_width: Option<Width> = None;
        for item in &self.items {
            match item {
                Item::Label(label) => {
                    if pending_width.take().is_some() {
                        out.push('\n');
                    }
                    out.push_str(&format!("{label}:\n"));
                }
                Item::Include(include) => {
                    if pending_width.take().is_some() {
                        out.push('\n');
                    }
                    let directive = match include.kind {
                        IncludeKind::Binary => "incbin",
                        IncludeKind::Assembler => "include",
                    };
                    // Forward slashes regardless of host platform
                    let path = include.path.to_string_lossy().replace('\\', "/");
                    out.push_str(&format!("\t{directive} \"{path}\"\n"));
                }
                Item::Value(value, width) => {
                    if pending_width == Some(*width) {
                        out.push_str(&format!(", {value}"));
                    } else {
                        if pending_width.take().is_some() {
                            out.push('\n');
                        }
                        let directive = match width {
                            Width::Byte => "dc.b",
                            Width::Word => "dc.w",
                            Width::Long => "dc.l",
                        };
                        out.push_str(&format!("\t{directive} {value}"));
                        pending_width = Some(*width);
                    }
                    continue;
                }
            }
        }
        if pending_width.is_some() {
            out.push('\n');
        }
        out
    }

    /// Render and write to disk
    pub fn save(&self, path: &Path, title: &str) -> DataResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_source(title))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_back_written_file() {
        let mut file = AsmFile::new("test.asm");
        file.write_label("SpriteFrames");
        file.write_include("sprites/frames.asm", IncludeKind::Assembler);
        file.write_label("FrameCount");
        file.write_value(3, Width::Word);
        file.write_value(7, Width::Word);

        let source = file.to_source("Sprite index");
        let mut parsed = AsmFile::from_source("test.asm", &source).unwrap();

        parsed.goto("SpriteFrames").unwrap();
        let include = parsed.read_include().unwrap();
        assert_eq!(include.path, PathBuf::from("sprites/frames.asm"));
        assert_eq!(include.kind, IncludeKind::Assembler);

        parsed.goto("FrameCount").unwrap();
        assert_eq!(parsed.read_value().unwrap(), 3);
        assert_eq!(parsed.read_value().unwrap(), 7);
    }

    #[test]
    fn test_sequential_label_include_pairs() {
        let source = "A:\n\tincbin \"a.bin\"\nB:\n\tincbin \"b.bin\"\n";
        let mut file = AsmFile::from_source("pairs.asm", source).unwrap();
        let mut seen = Vec::new();
        while file.is_good() {
            assert!(file.is_label());
            let label = file.read_label().unwrap();
            let include = file.read_include().unwrap();
            seen.push((label, include.path));
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "A");
        assert_eq!(seen[1].1, PathBuf::from("b.bin"));
    }

    #[test]
    fn test_goto_missing_label_is_error() {
        let mut file = AsmFile::from_source("x.asm", "A:\n").unwrap();
        assert!(file.goto("Missing").is_err());
    }

    #[test]
    fn test_malformed_include_is_error() {
        assert!(AsmFile::from_source("bad.asm", "incbin 42\n").is_err());
    }
}
