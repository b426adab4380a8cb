//! An emulator and code-editor core for the DLX instructional RISC
//! architecture.
//!
//! This crate provides the functionality to:
//! - Tokenize and parse DLX assembly into a [ParsedProgram](program::ParsedProgram).
//! - Execute parsed programs step-wise or to completion on a
//!   [Processor](processor::Processor) with a defined exception model.
//! - Drive a full source-code editor ([editor::CodeEditor]) whose
//!   colorization and error markers come straight from the DLX
//!   front-end.
//!
//! The GUI itself is not part of this crate; the editor consumes a
//! small host contract ([editor::host]) and produces plain drawing
//! commands.
//!
//! # Example
//! ```
//! use dlx::{processor::Processor, program::ParsedProgram, registers::IntRegisterId};
//!
//! // Add 5 and 7 together, leaving the sum in R3.
//! let source = "
//!     ADDI R1, R0, #5
//!     ADDI R2, R0, #7
//!     ADD  R3, R1, R2
//! ";
//!
//! let program = ParsedProgram::parse(source);
//! assert!(program.is_valid());
//!
//! let mut processor = Processor::new();
//! assert!(processor.load(program));
//! processor.run();
//!
//! let r3 = IntRegisterId::new(3).unwrap();
//! assert_eq!(processor.registers().int_register(r3).signed_value(), 12);
//! assert!(processor.is_halted());
//! assert_eq!(processor.last_exception(), None);
//! ```

pub mod editor;
pub mod error;
pub mod instruction;
pub mod lexer;
pub mod library;
pub mod memory;
pub mod parser;
pub mod processor;
pub mod program;
pub mod registers;

pub use error::{Exception, ParseError, ParseErrorKind};
pub use instruction::{
    ArgumentAccessType, ArgumentType, Instruction, InstructionArg, InstructionInfo, OpCode,
};
pub use lexer::{Token, TokenKind};
pub use library::InstructionLibrary;
pub use memory::MemoryBlock;
pub use processor::Processor;
pub use program::{LabelTable, ParsedProgram};
pub use registers::{FloatRegisterId, IntRegisterId, RegisterFile};
