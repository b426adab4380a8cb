//! Tokenization of DLX assembly source.
//!
//! The lexer is a single pass over the raw bytes: [logos] recognizes
//! the token shapes and a thin wrapper tracks 1-based line/column
//! positions and classifies identifiers against the opcode and register
//! tables (names are case-insensitive). Non-ASCII input only survives
//! inside comments; anywhere else every unrecognized byte becomes its
//! own [TokenKind::Unknown] token so downstream consumers can point at
//! it precisely.

use logos::Logos;

use crate::instruction::OpCode;
use crate::registers::{FloatRegisterId, IntRegisterId};

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
enum RawToken {
    #[error]
    #[regex(r"[ \t\r]+", logos::skip)]
    Error,

    #[token("\n")]
    NewLine,

    #[regex(r";[^\n]*")]
    Comment,

    #[token(":")]
    Colon,

    #[token(",")]
    Comma,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[regex(r"#[+-]?[0-9]+")]
    ImmediateInteger,

    #[regex(r"-?[0-9]+|0x[0-9a-fA-F]+|0b[01]+")]
    IntegerLiteral,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
}

/// What a lexeme was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    OpCode,
    RegisterInt,
    RegisterFloat,
    RegisterStatus,
    IntegerLiteral,
    ImmediateInteger,
    LabelIdentifier,
    /// Assigned by the parser when it consumes `identifier ':'` as a
    /// label definition; the lexer itself never emits this.
    LabelDefinition,
    Colon,
    Comma,
    OpenParen,
    CloseParen,
    Comment,
    NewLine,
    Unknown,
}

/// One lexeme with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// 1-based line of the first byte.
    pub line: u32,
    /// 1-based byte column of the first byte within its line.
    pub column: u32,
    /// Length in bytes.
    pub length: u32,
}

impl Token {
    fn new(kind: TokenKind, lexeme: &str, line: u32, column: u32) -> Token {
        Token {
            kind,
            lexeme: lexeme.to_string(),
            line,
            column,
            length: lexeme.len() as u32,
        }
    }
}

fn classify_identifier(lexeme: &str) -> TokenKind {
    if OpCode::from_name(lexeme).is_some() {
        return TokenKind::OpCode;
    }
    if lexeme.parse::<IntRegisterId>().is_ok() {
        return TokenKind::RegisterInt;
    }
    if lexeme.parse::<FloatRegisterId>().is_ok() {
        return TokenKind::RegisterFloat;
    }
    if lexeme.eq_ignore_ascii_case("FPSR") {
        return TokenKind::RegisterStatus;
    }

    TokenKind::LabelIdentifier
}

/// Tokenizes `source` completely. Never fails; malformed input turns
/// into [TokenKind::Unknown] tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    let mut lexer = RawToken::lexer(source);
    let mut line: u32 = 1;
    let mut line_start: usize = 0;

    while let Some(raw) = lexer.next() {
        let span = lexer.span();
        let column = (span.start - line_start) as u32 + 1;
        let slice = lexer.slice();

        match raw {
            RawToken::NewLine => {
                tokens.push(Token::new(TokenKind::NewLine, slice, line, column));
                line += 1;
                line_start = span.end;
            }
            RawToken::Comment => {
                tokens.push(Token::new(TokenKind::Comment, slice, line, column));
            }
            RawToken::Colon => tokens.push(Token::new(TokenKind::Colon, slice, line, column)),
            RawToken::Comma => tokens.push(Token::new(TokenKind::Comma, slice, line, column)),
            RawToken::OpenParen => {
                tokens.push(Token::new(TokenKind::OpenParen, slice, line, column));
            }
            RawToken::CloseParen => {
                tokens.push(Token::new(TokenKind::CloseParen, slice, line, column));
            }
            RawToken::ImmediateInteger => {
                tokens.push(Token::new(TokenKind::ImmediateInteger, slice, line, column));
            }
            RawToken::IntegerLiteral => {
                tokens.push(Token::new(TokenKind::IntegerLiteral, slice, line, column));
            }
            RawToken::Identifier => {
                tokens.push(Token::new(classify_identifier(slice), slice, line, column));
            }
            RawToken::Error => {
                // One Unknown token per byte, so error markers can point
                // at the exact offender even in runs of garbage.
                for (offset, byte) in slice.bytes().enumerate() {
                    tokens.push(Token {
                        kind: TokenKind::Unknown,
                        lexeme: (byte as char).to_string(),
                        line,
                        column: column + offset as u32,
                        length: 1,
                    });
                }
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn classifies_a_simple_statement() {
        assert_eq!(
            kinds("ADDI R1, R0, #5\n"),
            vec![
                TokenKind::OpCode,
                TokenKind::RegisterInt,
                TokenKind::Comma,
                TokenKind::RegisterInt,
                TokenKind::Comma,
                TokenKind::ImmediateInteger,
                TokenKind::NewLine,
            ]
        );
    }

    #[test]
    fn register_classification() {
        assert_eq!(kinds("r0 f31 fpsr"), vec![
            TokenKind::RegisterInt,
            TokenKind::RegisterFloat,
            TokenKind::RegisterStatus,
        ]);
        // R32 is not a register name.
        assert_eq!(kinds("R32"), vec![TokenKind::LabelIdentifier]);
    }

    #[test]
    fn integer_forms() {
        assert_eq!(kinds("42 -17 0x2A 0b1010"), vec![TokenKind::IntegerLiteral; 4]);
        assert_eq!(kinds("#5 #-3 #+7"), vec![TokenKind::ImmediateInteger; 3]);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let tokens = tokenize("ADD R1, R2, R3 ; sum\nNOP");
        let comment = tokens.iter().find(|t| t.kind == TokenKind::Comment).unwrap();
        assert_eq!(comment.lexeme, "; sum");
        // The newline is emitted separately.
        assert!(tokens.iter().any(|t| t.kind == TokenKind::NewLine));
    }

    #[test]
    fn positions_are_one_based_bytes() {
        let tokens = tokenize("J L\nL: NOP");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        assert_eq!(tokens[1].column, 3);

        let second_line: Vec<_> = tokens.iter().filter(|t| t.line == 2).collect();
        assert_eq!(second_line[0].lexeme, "L");
        assert_eq!(second_line[0].column, 1);
        assert_eq!(second_line[1].kind, TokenKind::Colon);
        assert_eq!(second_line[1].column, 2);
    }

    #[test]
    fn crlf_collapses_to_one_newline() {
        assert_eq!(
            kinds("NOP\r\nNOP"),
            vec![TokenKind::OpCode, TokenKind::NewLine, TokenKind::OpCode]
        );
    }

    #[test]
    fn unknown_bytes_are_single_tokens() {
        let tokens = tokenize("$$");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Unknown && t.length == 1));
        assert_eq!(tokens[1].column, 2);
    }

    #[test]
    fn non_ascii_survives_inside_comments() {
        let tokens = tokenize("; tämä on kommentti\n");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].lexeme, "; tämä on kommentti");
    }
}
