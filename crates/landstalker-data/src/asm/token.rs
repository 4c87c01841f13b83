//! Token definitions for the assembly include DSL
//!
//! The data tree's index files use a tiny subset of assembler syntax:
//! labels, `include`/`incbin` directives and `dc.b`/`dc.w`/`dc.l` data
//! directives. Comments run from `;` to end of line.

use logos::Logos;

/// All token kinds in the include DSL
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n,]+")]
#[logos(skip r";[^\n]*")]
pub enum TokenKind {
    #[token("include")]
    Include,
    #[token("incbin")]
    Incbin,
    #[token("dc.b")]
    DcB,
    #[token("dc.w")]
    DcW,
    #[token("dc.l")]
    DcL,

    /// A label: identifier immediately followed by a colon
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*:", |lex| {
        let s = lex.slice();
        s[..s.len() - 1].to_string()
    })]
    Label(String),

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    #[regex(r"\$[0-9A-Fa-f]+", |lex| {
        u32::from_str_radix(&lex.slice()[1..], 16).ok()
    })]
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u32>().ok())]
    Number(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> Vec<TokenKind> {
        TokenKind::lexer(source).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_label_and_incbin() {
        let tokens = lex("SpriteFrame000:\n\tincbin \"sprites/frames/sprite_frame_000.bin\"\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Label("SpriteFrame000".to_string()),
                TokenKind::Incbin,
                TokenKind::Str("sprites/frames/sprite_frame_000.bin".to_string()),
            ]
        );
    }

    #[test]
    fn test_data_directives_and_comments() {
        let tokens = lex("Counts:\tdc.w $0102, 7 ; two values\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Label("Counts".to_string()),
                TokenKind::DcW,
                TokenKind::Number(0x0102),
                TokenKind::Number(7),
            ]
        );
    }
}
