//! Parsing token streams into [ParsedProgram]s.
//!
//! The parser walks the token stream once, one statement per line:
//! `(label ':')* opcode arg (',' arg)*`. Every diagnostic is recorded
//! as data and the parser resynchronizes at the next newline, so a
//! program is always produced; callers decide whether a program with
//! errors is usable. Branch targets are checked in a post-pass once
//! all labels are known.

use crate::error::{ParseError, ParseErrorKind};
use crate::instruction::{ArgumentType, Instruction, InstructionArg};
use crate::lexer::{self, Token, TokenKind};
use crate::library::InstructionLibrary;
use crate::program::{LabelTable, ParsedProgram};
use crate::registers::{FloatRegisterId, IntRegisterId};

/// Parses `source` completely. Never fails; diagnostics are data on
/// the returned program.
pub fn parse(source: &str) -> ParsedProgram {
    Parser::new(lexer::tokenize(source)).run()
}

/// Parses a decimal/hex/binary integer literal lexeme.
pub fn parse_integer_literal(lexeme: &str) -> Option<i64> {
    if let Some(digits) = lexeme.strip_prefix("0x") {
        return i64::from_str_radix(digits, 16).ok();
    }
    if let Some(digits) = lexeme.strip_prefix("0b") {
        return i64::from_str_radix(digits, 2).ok();
    }

    lexeme.parse().ok()
}

/// A label used as a branch target, checked after the full pass.
struct BranchReference {
    name: String,
    line: u32,
    column: u32,
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    instructions: Vec<Instruction>,
    labels: LabelTable,
    errors: Vec<ParseError>,
    branch_references: Vec<BranchReference>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Parser {
        Parser {
            tokens,
            position: 0,
            instructions: Vec::new(),
            labels: LabelTable::new(),
            errors: Vec::new(),
            branch_references: Vec::new(),
        }
    }

    fn run(mut self) -> ParsedProgram {
        while self.peek_kind().is_some() {
            self.parse_statement();
        }

        // Branch targets resolve after the full pass so forward
        // references are fine.
        for reference in std::mem::take(&mut self.branch_references) {
            if !self.labels.contains(&reference.name) {
                self.errors.push(ParseError::new(
                    reference.line,
                    reference.column,
                    ParseErrorKind::UnknownLabel,
                    format!("label '{}' is never defined", reference.name),
                ));
            }
        }

        ParsedProgram {
            instructions: self.instructions,
            labels: self.labels,
            parse_errors: self.errors,
            tokens: self.tokens,
        }
    }

    // Comments never participate in the grammar.
    fn skip_comments(&mut self) {
        while self
            .tokens
            .get(self.position)
            .map(|token| token.kind == TokenKind::Comment)
            .unwrap_or(false)
        {
            self.position += 1;
        }
    }

    fn peek_kind(&mut self) -> Option<TokenKind> {
        self.skip_comments();
        self.tokens.get(self.position).map(|token| token.kind)
    }

    /// The kind of the token after the next one, skipping comments.
    fn peek_second_kind(&mut self) -> Option<TokenKind> {
        self.skip_comments();

        let mut index = self.position + 1;
        while let Some(token) = self.tokens.get(index) {
            if token.kind != TokenKind::Comment {
                return Some(token.kind);
            }
            index += 1;
        }

        None
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_comments();

        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn error(&mut self, token: &Token, kind: ParseErrorKind, message: impl Into<String>) {
        self.errors
            .push(ParseError::new(token.line, token.column, kind, message));
    }

    /// Skips to just past the next newline.
    fn resynchronize(&mut self) {
        while let Some(token) = self.next_token() {
            if token.kind == TokenKind::NewLine {
                return;
            }
        }
    }

    fn parse_statement(&mut self) {
        // Label definitions, possibly several, possibly on a line of
        // their own. They bind to the next instruction parsed.
        while self.peek_kind() == Some(TokenKind::LabelIdentifier)
            && self.peek_second_kind() == Some(TokenKind::Colon)
        {
            self.skip_comments();
            let index = self.position;
            let token = self.next_token().expect("peeked");
            self.next_token(); // the colon

            self.tokens[index].kind = TokenKind::LabelDefinition;

            if let Err(previous) = self.labels.define(&token.lexeme, self.instructions.len()) {
                self.error(
                    &token,
                    ParseErrorKind::DuplicateLabel,
                    format!(
                        "label '{}' is already defined at instruction {}",
                        token.lexeme, previous
                    ),
                );
            }
        }

        match self.peek_kind() {
            Option::None => return,
            Some(TokenKind::NewLine) => {
                self.next_token();
                return;
            }
            _ => {}
        }

        let opcode_token = self.next_token().expect("peeked");

        if opcode_token.kind != TokenKind::OpCode {
            self.error(
                &opcode_token,
                ParseErrorKind::UnexpectedToken,
                format!("expected an instruction, got '{}'", opcode_token.lexeme),
            );
            self.resynchronize();
            return;
        }

        let info = InstructionLibrary::global()
            .lookup_name(&opcode_token.lexeme)
            .expect("the lexer only classifies known mnemonics as opcodes");

        // Arguments.
        let mut args: Vec<(InstructionArg, Token)> = Vec::new();

        if !matches!(self.peek_kind(), Option::None | Some(TokenKind::NewLine)) {
            loop {
                match self.parse_argument() {
                    Some(arg) => args.push(arg),
                    Option::None => {
                        self.resynchronize();
                        return;
                    }
                }

                match self.peek_kind() {
                    Some(TokenKind::Comma) => {
                        self.next_token();
                    }
                    Option::None | Some(TokenKind::NewLine) => break,
                    _ => {
                        let token = self.next_token().expect("peeked");
                        self.error(
                            &token,
                            ParseErrorKind::UnexpectedToken,
                            format!("expected ',' or end of line, got '{}'", token.lexeme),
                        );
                        self.resynchronize();
                        return;
                    }
                }
            }
        }

        // Consume the statement terminator.
        if self.peek_kind() == Some(TokenKind::NewLine) {
            self.next_token();
        }

        if args.len() != info.required_arguments as usize {
            self.error(
                &opcode_token,
                ParseErrorKind::WrongArity,
                format!(
                    "{} expects {} arguments, got {}",
                    info.opcode,
                    info.required_arguments,
                    args.len()
                ),
            );
            return;
        }

        for (slot, (arg, token)) in args.iter().enumerate() {
            if !argument_matches_type(arg, info.argument_types[slot]) {
                self.errors.push(ParseError::new(
                    token.line,
                    token.column,
                    ParseErrorKind::WrongArgumentType,
                    format!(
                        "'{}' is not valid as argument {} of {}",
                        token.lexeme,
                        slot + 1,
                        info.opcode
                    ),
                ));
                return;
            }
        }

        let mut instruction = Instruction::new(info, opcode_token.line);

        for (slot, (arg, token)) in args.into_iter().enumerate() {
            if info.argument_types[slot] == ArgumentType::Label {
                if let InstructionArg::Label(name) = &arg {
                    self.branch_references.push(BranchReference {
                        name: name.clone(),
                        line: token.line,
                        column: token.column,
                    });
                }
            }

            match slot {
                0 => instruction.arg1 = arg,
                1 => instruction.arg2 = arg,
                _ => instruction.arg3 = arg,
            }
        }

        self.instructions.push(instruction);
    }

    /// Parses one argument, recording a diagnostic and returning `None`
    /// on failure.
    fn parse_argument(&mut self) -> Option<(InstructionArg, Token)> {
        let token = match self.next_token() {
            Some(token) => token,
            Option::None => {
                let (line, column) = self
                    .tokens
                    .last()
                    .map(|token| (token.line, token.column))
                    .unwrap_or((1, 1));
                self.errors.push(ParseError::new(
                    line,
                    column,
                    ParseErrorKind::UnexpectedToken,
                    "unexpected end of input",
                ));
                return Option::None;
            }
        };

        let arg = match token.kind {
            TokenKind::RegisterInt => {
                let id: IntRegisterId = token.lexeme.parse().expect("classified by the lexer");
                InstructionArg::IntRegister(id)
            }
            TokenKind::RegisterFloat => {
                let id: FloatRegisterId = token.lexeme.parse().expect("classified by the lexer");
                InstructionArg::FloatRegister(id)
            }
            TokenKind::ImmediateInteger => {
                let digits = &token.lexeme[1..];
                let value = match digits.parse::<i64>() {
                    Ok(value) => value,
                    Err(_) => {
                        self.error(
                            &token,
                            ParseErrorKind::BadImmediate,
                            format!("'{}' is not a valid immediate", token.lexeme),
                        );
                        return Option::None;
                    }
                };

                match i16::try_from(value) {
                    Ok(value) => InstructionArg::Immediate(value),
                    Err(_) => {
                        self.error(
                            &token,
                            ParseErrorKind::TooLarge,
                            format!("immediate '{}' does not fit 16 bits", token.lexeme),
                        );
                        return Option::None;
                    }
                }
            }
            TokenKind::IntegerLiteral => return self.parse_address_displacement(token),
            TokenKind::LabelIdentifier => InstructionArg::Label(token.lexeme.clone()),
            _ => {
                self.error(
                    &token,
                    ParseErrorKind::UnexpectedToken,
                    format!("'{}' is not a valid argument", token.lexeme),
                );
                return Option::None;
            }
        };

        Some((arg, token))
    }

    /// `disp(Rn)`. A bare integer literal anywhere else is an error.
    fn parse_address_displacement(&mut self, literal: Token) -> Option<(InstructionArg, Token)> {
        let displacement = match parse_integer_literal(&literal.lexeme) {
            Some(value) => value,
            Option::None => {
                self.error(
                    &literal,
                    ParseErrorKind::TooLarge,
                    format!("'{}' does not fit 64 bits", literal.lexeme),
                );
                return Option::None;
            }
        };

        if self.peek_kind() != Some(TokenKind::OpenParen) {
            self.error(
                &literal,
                ParseErrorKind::UnexpectedToken,
                "an integer literal is only valid as an address displacement",
            );
            return Option::None;
        }
        self.next_token();

        let register_token = match self.next_token() {
            Some(token) if token.kind == TokenKind::RegisterInt => token,
            Some(token) => {
                self.error(
                    &token,
                    ParseErrorKind::WrongArgumentType,
                    format!("expected an int register, got '{}'", token.lexeme),
                );
                return Option::None;
            }
            Option::None => {
                self.error(
                    &literal,
                    ParseErrorKind::UnexpectedToken,
                    "unterminated address displacement",
                );
                return Option::None;
            }
        };

        match self.next_token() {
            Some(token) if token.kind == TokenKind::CloseParen => {}
            Some(token) => {
                self.error(
                    &token,
                    ParseErrorKind::UnexpectedToken,
                    format!("expected ')', got '{}'", token.lexeme),
                );
                return Option::None;
            }
            Option::None => {
                self.error(
                    &literal,
                    ParseErrorKind::UnexpectedToken,
                    "unterminated address displacement",
                );
                return Option::None;
            }
        }

        let displacement = match i32::try_from(displacement) {
            Ok(value) => value,
            Err(_) => {
                self.error(
                    &literal,
                    ParseErrorKind::TooLarge,
                    format!("displacement '{}' does not fit 32 bits", literal.lexeme),
                );
                return Option::None;
            }
        };

        let register: IntRegisterId = register_token
            .lexeme
            .parse()
            .expect("classified by the lexer");

        Some((
            InstructionArg::AddressDisplacement {
                register,
                displacement,
            },
            literal,
        ))
    }
}

/// Every argument must match the shape its slot declares. Register
/// slots take exactly a register of the right file, immediate slots
/// exactly an immediate, and memory-operand slots the `disp(Rn)` form
/// or a label left for the executor to resolve lazily.
fn argument_matches_type(arg: &InstructionArg, expected: ArgumentType) -> bool {
    match expected {
        ArgumentType::None => matches!(arg, InstructionArg::None),
        ArgumentType::IntRegister => matches!(arg, InstructionArg::IntRegister(_)),
        ArgumentType::FloatRegister => matches!(arg, InstructionArg::FloatRegister(_)),
        ArgumentType::ImmediateInteger => matches!(arg, InstructionArg::Immediate(_)),
        ArgumentType::AddressDisplacement => matches!(
            arg,
            InstructionArg::AddressDisplacement { .. } | InstructionArg::Label(_)
        ),
        ArgumentType::Label => matches!(arg, InstructionArg::Label(_)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::OpCode;

    #[test]
    fn parses_a_small_program() {
        let program = parse("ADDI R1, R0, #5\nADDI R2, R0, #7\nADD R3, R1, R2\n");

        assert!(program.parse_errors.is_empty());
        assert_eq!(program.instructions.len(), 3);
        assert_eq!(program.instructions[0].opcode(), OpCode::Addi);
        assert_eq!(program.instructions[2].opcode(), OpCode::Add);
        assert_eq!(program.instructions[2].source_line, 3);
    }

    #[test]
    fn labels_bind_to_the_next_instruction() {
        let program = parse("start:\n  NOP\nloop: J loop\n");

        assert!(program.parse_errors.is_empty());
        assert_eq!(program.labels.get("start"), Some(0));
        assert_eq!(program.labels.get("loop"), Some(1));
    }

    #[test]
    fn label_definitions_are_retagged() {
        let program = parse("L: J L\n");

        let kinds: Vec<_> = program.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds[0], TokenKind::LabelDefinition);
        // The branch target stays an identifier.
        assert!(kinds.contains(&TokenKind::LabelIdentifier));
    }

    #[test]
    fn duplicate_labels_are_reported() {
        let program = parse("L: NOP\nL: NOP\n");

        assert_eq!(program.parse_errors.len(), 1);
        assert_eq!(program.parse_errors[0].kind, ParseErrorKind::DuplicateLabel);
        assert_eq!(program.parse_errors[0].line, 2);
        // The first definition wins.
        assert_eq!(program.labels.get("L"), Some(0));
    }

    #[test]
    fn wrong_arity_is_reported() {
        let program = parse("ADD R1, R2\n");

        assert_eq!(program.parse_errors.len(), 1);
        assert_eq!(program.parse_errors[0].kind, ParseErrorKind::WrongArity);
        assert!(program.instructions.is_empty());
    }

    #[test]
    fn wrong_argument_type_is_reported() {
        let program = parse("ADD R1, R2, F3\n");

        assert_eq!(program.parse_errors.len(), 1);
        assert_eq!(
            program.parse_errors[0].kind,
            ParseErrorKind::WrongArgumentType
        );
    }

    #[test]
    fn argument_shapes_do_not_cross_over() {
        // ADD wants a register where ADDI wants an immediate.
        let program = parse("ADD R1, R2, #5\n");
        assert_eq!(
            program.parse_errors[0].kind,
            ParseErrorKind::WrongArgumentType
        );

        // Memory operands are disp(Rn), never a bare register.
        let program = parse("LW R1, R2\n");
        assert_eq!(
            program.parse_errors[0].kind,
            ParseErrorKind::WrongArgumentType
        );
    }

    #[test]
    fn bare_integer_literals_are_rejected() {
        let program = parse("ADD R1, R2, 5\n");

        assert_eq!(program.parse_errors.len(), 1);
        assert_eq!(
            program.parse_errors[0].kind,
            ParseErrorKind::UnexpectedToken
        );
    }

    #[test]
    fn address_displacements_parse() {
        let program = parse("LW R1, 4(R2)\nSW -8(R3), R1\nLW R4, 0x10(R5)\n");

        assert!(program.parse_errors.is_empty());
        assert_eq!(
            program.instructions[1].arg1,
            InstructionArg::AddressDisplacement {
                register: IntRegisterId::new(3).unwrap(),
                displacement: -8,
            }
        );
        assert_eq!(
            program.instructions[2].arg2,
            InstructionArg::AddressDisplacement {
                register: IntRegisterId::new(5).unwrap(),
                displacement: 16,
            }
        );
    }

    #[test]
    fn oversized_immediates_are_reported() {
        let program = parse("ADDI R1, R0, #40000\n");

        assert_eq!(program.parse_errors.len(), 1);
        assert_eq!(program.parse_errors[0].kind, ParseErrorKind::TooLarge);
    }

    #[test]
    fn undefined_branch_targets_are_reported() {
        let program = parse("J nowhere\n");

        assert_eq!(program.parse_errors.len(), 1);
        assert_eq!(program.parse_errors[0].kind, ParseErrorKind::UnknownLabel);
        // The instruction itself is still well-formed.
        assert_eq!(program.instructions.len(), 1);
    }

    #[test]
    fn parser_recovers_at_the_next_line() {
        let program = parse("BOGUS R1\nNOP\n$\nNOP\n");

        assert!(!program.parse_errors.is_empty());
        // Both NOPs survive the surrounding garbage.
        assert_eq!(program.instructions.len(), 2);
        assert!(program
            .instructions
            .iter()
            .all(|instruction| instruction.opcode() == OpCode::Nop));
    }

    #[test]
    fn comments_are_transparent_to_the_grammar() {
        let program = parse("NOP ; trailing comment\n; full-line comment\nNOP\n");

        assert!(program.parse_errors.is_empty());
        assert_eq!(program.instructions.len(), 2);
    }

    #[test]
    fn integer_literal_forms() {
        assert_eq!(parse_integer_literal("42"), Some(42));
        assert_eq!(parse_integer_literal("-17"), Some(-17));
        assert_eq!(parse_integer_literal("0x2A"), Some(42));
        assert_eq!(parse_integer_literal("0b1010"), Some(10));
    }
}
