//! Types for representing instructions and their parts.

use std::fmt;

use crate::error::Exception;
use crate::processor::Processor;
use crate::registers::{FloatRegisterId, IntRegisterId};

macro_rules! opcodes {
    ( $( $variant:ident => $name:literal ),+ $(,)? ) => {
        /// Operation codes of the DLX instruction set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpCode {
            $( $variant, )+
        }

        impl OpCode {
            /// The assembly mnemonic of this opcode.
            pub fn name(self) -> &'static str {
                match self {
                    $( OpCode::$variant => $name, )+
                }
            }

            /// Case-insensitive mnemonic lookup.
            pub fn from_name(name: &str) -> Option<OpCode> {
                match name.to_ascii_uppercase().as_str() {
                    $( $name => Some(OpCode::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    // Integer arithmetic, signed and unsigned, register and immediate.
    Add => "ADD",
    Addi => "ADDI",
    Addu => "ADDU",
    Addui => "ADDUI",
    Sub => "SUB",
    Subi => "SUBI",
    Subu => "SUBU",
    Subui => "SUBUI",
    Mult => "MULT",
    Multi => "MULTI",
    Multu => "MULTU",
    Multui => "MULTUI",
    Div => "DIV",
    Divi => "DIVI",
    Divu => "DIVU",
    Divui => "DIVUI",

    // Shifts.
    Sll => "SLL",
    Slli => "SLLI",
    Srl => "SRL",
    Srli => "SRLI",
    Sla => "SLA",
    Slai => "SLAI",
    Sra => "SRA",
    Srai => "SRAI",

    // Bitwise logic.
    And => "AND",
    Andi => "ANDI",
    Or => "OR",
    Ori => "ORI",
    Xor => "XOR",
    Xori => "XORI",

    // Set-on-comparison.
    Slt => "SLT",
    Slti => "SLTI",
    Sltu => "SLTU",
    Sltui => "SLTUI",
    Sgt => "SGT",
    Sgti => "SGTI",
    Sgtu => "SGTU",
    Sgtui => "SGTUI",
    Sle => "SLE",
    Slei => "SLEI",
    Sleu => "SLEU",
    Sleui => "SLEUI",
    Sge => "SGE",
    Sgei => "SGEI",
    Sgeu => "SGEU",
    Sgeui => "SGEUI",
    Seq => "SEQ",
    Seqi => "SEQI",
    Sequ => "SEQU",
    Sequi => "SEQUI",
    Sne => "SNE",
    Snei => "SNEI",
    Sneu => "SNEU",
    Sneui => "SNEUI",

    Lhi => "LHI",

    // Loads and stores.
    Lb => "LB",
    Lbu => "LBU",
    Lh => "LH",
    Lhu => "LHU",
    Lw => "LW",
    Lwu => "LWU",
    Lf => "LF",
    Ld => "LD",
    Sb => "SB",
    Sh => "SH",
    Sw => "SW",
    Sf => "SF",
    Sd => "SD",

    // Float arithmetic.
    Addf => "ADDF",
    Subf => "SUBF",
    Multf => "MULTF",
    Divf => "DIVF",
    Addd => "ADDD",
    Subd => "SUBD",
    Multd => "MULTD",
    Divd => "DIVD",

    // Float comparisons, setting the FPSR.
    Ltf => "LTF",
    Gtf => "GTF",
    Lef => "LEF",
    Gef => "GEF",
    Eqf => "EQF",
    Nef => "NEF",
    Ltd => "LTD",
    Gtd => "GTD",
    Led => "LED",
    Ged => "GED",
    Eqd => "EQD",
    Ned => "NED",

    // Conversions and moves between register files.
    Cvtf2d => "CVTF2D",
    Cvtd2f => "CVTD2F",
    Cvtf2i => "CVTF2I",
    Cvti2f => "CVTI2F",
    Cvtd2i => "CVTD2I",
    Cvti2d => "CVTI2D",
    Movf => "MOVF",
    Movd => "MOVD",
    Movfp2i => "MOVFP2I",
    Movi2fp => "MOVI2FP",

    // Control flow.
    J => "J",
    Jr => "JR",
    Jal => "JAL",
    Jalr => "JALR",
    Beqz => "BEQZ",
    Bnez => "BNEZ",
    Bfpt => "BFPT",
    Bfpf => "BFPF",

    Nop => "NOP",
    Trap => "TRAP",
    Halt => "HALT",
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The semantic view an instruction expects for each argument slot.
///
/// Register arguments must match their slot at parse time; `Ignored`
/// accepts any integer register. `Label` marks branch-target slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentAccessType {
    None,
    Ignored,
    Signed,
    Unsigned,
    Float,
    Double,
    MixedFloatDouble,
    Label,
}

impl ArgumentAccessType {
    /// Whether this slot describes an integer register view.
    pub fn is_int_view(self) -> bool {
        matches!(
            self,
            ArgumentAccessType::Ignored | ArgumentAccessType::Signed | ArgumentAccessType::Unsigned
        )
    }

    /// Whether this slot describes a float register view.
    pub fn is_float_view(self) -> bool {
        matches!(
            self,
            ArgumentAccessType::Float
                | ArgumentAccessType::Double
                | ArgumentAccessType::MixedFloatDouble
        )
    }
}

/// The syntactic shape an argument slot accepts.
///
/// Orthogonal to [ArgumentAccessType]: the access type describes the
/// numeric *view* of a register slot, the argument type describes what
/// may be written there at all. This is what keeps `ADD` and `ADDI`
/// distinct opcodes: both view their slots as signed, but only the
/// immediate variant accepts an immediate in its last slot.
/// `AddressDisplacement` slots accept the `disp(Rn)` form or a label
/// resolved lazily at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentType {
    None,
    IntRegister,
    FloatRegister,
    ImmediateInteger,
    AddressDisplacement,
    Label,
}

/// One parsed instruction argument.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstructionArg {
    #[default]
    None,
    IntRegister(IntRegisterId),
    FloatRegister(FloatRegisterId),
    Immediate(i16),
    AddressDisplacement {
        register: IntRegisterId,
        displacement: i32,
    },
    Label(String),
}

impl fmt::Display for InstructionArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstructionArg::None => write!(f, "None"),
            InstructionArg::IntRegister(id) => write!(f, "{}", id),
            InstructionArg::FloatRegister(id) => write!(f, "{}", id),
            InstructionArg::Immediate(value) => write!(f, "#{}", value),
            InstructionArg::AddressDisplacement {
                register,
                displacement,
            } => write!(f, "{}({})", displacement, register),
            InstructionArg::Label(name) => write!(f, "{}", name),
        }
    }
}

/// Executors are pure functions of the processor and the three
/// argument slots; they report exceptions through their result and
/// never unwind.
pub type Executor =
    fn(&mut Processor, &InstructionArg, &InstructionArg, &InstructionArg) -> Result<(), Exception>;

/// One row of the instruction library: mnemonic, arity, per-slot access
/// types, per-slot argument shapes and the executor.
pub struct InstructionInfo {
    pub opcode: OpCode,
    pub required_arguments: u8,
    pub access_types: [ArgumentAccessType; 3],
    pub argument_types: [ArgumentType; 3],
    pub execute: Executor,
}

impl InstructionInfo {
    /// The register view active while this instruction executes, used
    /// for access-mismatch warnings. The first slot that names a
    /// register view decides; argument-less instructions are `Ignored`.
    pub fn register_access(&self) -> ArgumentAccessType {
        self.access_types
            .iter()
            .copied()
            .find(|access| access.is_int_view() || access.is_float_view())
            .unwrap_or(ArgumentAccessType::Ignored)
    }
}

impl fmt::Debug for InstructionInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InstructionInfo")
            .field("opcode", &self.opcode)
            .field("required_arguments", &self.required_arguments)
            .field("access_types", &self.access_types)
            .field("argument_types", &self.argument_types)
            .finish()
    }
}

/// A single fully parsed DLX instruction.
#[derive(Clone)]
pub struct Instruction {
    pub info: &'static InstructionInfo,
    pub arg1: InstructionArg,
    pub arg2: InstructionArg,
    pub arg3: InstructionArg,
    /// 1-based source line the instruction was parsed from.
    pub source_line: u32,
}

impl Instruction {
    pub fn new(info: &'static InstructionInfo, source_line: u32) -> Instruction {
        Instruction {
            info,
            arg1: InstructionArg::None,
            arg2: InstructionArg::None,
            arg3: InstructionArg::None,
            source_line,
        }
    }

    pub fn opcode(&self) -> OpCode {
        self.info.opcode
    }

    pub fn args(&self) -> [&InstructionArg; 3] {
        [&self.arg1, &self.arg2, &self.arg3]
    }

    pub fn execute(&self, processor: &mut Processor) -> Result<(), Exception> {
        (self.info.execute)(processor, &self.arg1, &self.arg2, &self.arg3)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.opcode())?;

        let args = [&self.arg1, &self.arg2, &self.arg3];
        for (index, arg) in args
            .iter()
            .take(self.info.required_arguments as usize)
            .enumerate()
        {
            if index == 0 {
                write!(f, " {}", arg)?;
            } else {
                write!(f, ", {}", arg)?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (line {})", self, self.source_line)
    }
}
