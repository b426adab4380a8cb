//! The DLX processor: registers, memory, program counter and the
//! step/run loop.
//!
//! Executors raise exceptions cooperatively through their `Result`; the
//! step loop feeds them into [Processor::raise], which records the
//! exception and halts for the fatal subset. Access-type and
//! value-type mismatches are reported as `tracing` warnings and never
//! affect execution.

use tracing::{error, warn};

use crate::error::Exception;
use crate::instruction::{ArgumentAccessType, InstructionArg};
use crate::memory::MemoryBlock;
use crate::program::ParsedProgram;
use crate::registers::{
    FloatRegisterId, FloatValueType, IntRegisterId, IntValueType, RegisterFile,
};

/// Default bound on `step`s per `run`; `0` disables the bound.
pub const DEFAULT_MAX_STEPS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Processor {
    registers: RegisterFile,
    memory: MemoryBlock,
    program: Option<ParsedProgram>,
    program_counter: u32,
    next_program_counter: u32,
    halted: bool,
    last_exception: Option<Exception>,
    step_count: u64,
    max_steps: u64,
    current_access: ArgumentAccessType,
}

impl Processor {
    /// A fresh processor: all registers zero, FPSR clear, no program,
    /// halted.
    pub fn new() -> Processor {
        Processor {
            registers: RegisterFile::new(),
            memory: MemoryBlock::default(),
            program: None,
            program_counter: 0,
            next_program_counter: 0,
            halted: true,
            last_exception: None,
            step_count: 0,
            max_steps: DEFAULT_MAX_STEPS,
            current_access: ArgumentAccessType::Ignored,
        }
    }

    /// Loads `program` for execution. Returns `false` and leaves the
    /// processor untouched when the program carries parse errors.
    /// Registers and memory persist across loads.
    pub fn load(&mut self, program: ParsedProgram) -> bool {
        if !program.is_valid() {
            warn!("refusing to load a program with parse errors");
            return false;
        }

        self.program = Some(program);
        self.program_counter = 0;
        self.next_program_counter = 0;
        self.halted = false;
        self.last_exception = None;
        self.step_count = 0;
        self.current_access = ArgumentAccessType::Ignored;

        true
    }

    /// Executes a single instruction. A no-op when no program is
    /// loaded or the processor is halted.
    pub fn step(&mut self) {
        let instruction_count = match &self.program {
            Some(program) => program.instructions.len(),
            None => return,
        };

        // An empty program has nothing to run.
        if instruction_count == 0 {
            self.halted = true;
        }

        if self.halted {
            return;
        }

        if self.program_counter as usize >= instruction_count {
            self.halted = true;
            return;
        }

        // Branch executors overwrite this.
        self.next_program_counter = self.program_counter + 1;

        let instruction = self
            .program
            .as_ref()
            .expect("checked above")
            .instructions[self.program_counter as usize]
            .clone();

        self.current_access = instruction.info.register_access();

        if let Err(exception) = instruction.execute(self) {
            self.raise(exception);
        }

        self.program_counter = self.next_program_counter;
        self.step_count += 1;

        if (self.max_steps != 0 && self.step_count >= self.max_steps)
            || self.program_counter as usize >= instruction_count
        {
            self.halted = true;
        }
    }

    /// Restarts the loaded program and steps until the processor
    /// halts. A no-op when no program is loaded.
    pub fn run(&mut self) {
        if self.program.is_none() {
            return;
        }

        self.program_counter = 0;
        self.next_program_counter = 0;
        self.halted = false;
        self.last_exception = None;
        self.step_count = 0;
        self.current_access = ArgumentAccessType::Ignored;

        while !self.halted {
            self.step();
        }
    }

    /// Records `exception` and halts for the fatal subset.
    pub fn raise(&mut self, exception: Exception) {
        self.last_exception = Some(exception);

        if exception.halts() {
            self.halted = true;
        }

        match exception {
            Exception::Halt => {}
            Exception::Overflow | Exception::Underflow => warn!(%exception, "exception raised"),
            _ => error!(%exception, "exception raised"),
        }
    }

    pub fn clear_registers(&mut self) {
        self.registers.clear();
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    // State accessors.

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn memory(&self) -> &MemoryBlock {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryBlock {
        &mut self.memory
    }

    pub fn program(&self) -> Option<&ParsedProgram> {
        self.program.as_ref()
    }

    pub fn program_counter(&self) -> u32 {
        self.program_counter
    }

    pub fn set_program_counter(&mut self, pc: u32) {
        self.program_counter = pc;
    }

    pub fn next_program_counter(&self) -> u32 {
        self.next_program_counter
    }

    pub fn set_next_program_counter(&mut self, npc: u32) {
        self.next_program_counter = npc;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn last_exception(&self) -> Option<Exception> {
        self.last_exception
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// `0` disables the step bound.
    pub fn set_max_steps(&mut self, max_steps: u64) {
        self.max_steps = max_steps;
    }

    // Access-checked register views used by executors. Mismatches are
    // warnings by contract.

    fn access_matches(expected: ArgumentAccessType, performed: ArgumentAccessType) -> bool {
        match expected {
            ArgumentAccessType::Ignored => true,
            ArgumentAccessType::None => false,
            ArgumentAccessType::MixedFloatDouble => matches!(
                performed,
                ArgumentAccessType::Float | ArgumentAccessType::Double
            ),
            _ => expected == performed,
        }
    }

    fn check_access(&self, performed: ArgumentAccessType) {
        if !Self::access_matches(self.current_access, performed) {
            warn!(
                expected = ?self.current_access,
                ?performed,
                "instruction access type mismatch"
            );
        }
    }

    pub fn int_signed(&self, id: IntRegisterId) -> i32 {
        self.check_access(ArgumentAccessType::Signed);

        let value_type = self.registers.int_value_type(id);
        if value_type != IntValueType::NotSet && value_type != IntValueType::Signed {
            warn!(register = %id, "register value type mismatch");
        }

        self.registers.int_register(id).signed_value()
    }

    pub fn int_unsigned(&self, id: IntRegisterId) -> u32 {
        self.check_access(ArgumentAccessType::Unsigned);

        let value_type = self.registers.int_value_type(id);
        if value_type != IntValueType::NotSet && value_type != IntValueType::Unsigned {
            warn!(register = %id, "register value type mismatch");
        }

        self.registers.int_register(id).unsigned_value()
    }

    pub fn set_int_signed(&mut self, id: IntRegisterId, value: i32) {
        self.check_access(ArgumentAccessType::Signed);

        self.registers.int_register_mut(id).set_signed_value(value);
        self.registers.set_int_value_type(id, IntValueType::Signed);
    }

    pub fn set_int_unsigned(&mut self, id: IntRegisterId, value: u32) {
        self.check_access(ArgumentAccessType::Unsigned);

        self.registers.int_register_mut(id).set_unsigned_value(value);
        self.registers.set_int_value_type(id, IntValueType::Unsigned);
    }

    pub fn float_value(&self, id: FloatRegisterId) -> f32 {
        self.check_access(ArgumentAccessType::Float);

        let value_type = self.registers.float_value_type(id);
        if value_type != FloatValueType::NotSet && value_type != FloatValueType::Float {
            warn!(register = %id, "register value type mismatch");
        }

        self.registers.float_register(id).value()
    }

    pub fn set_float_value(&mut self, id: FloatRegisterId, value: f32) {
        self.check_access(ArgumentAccessType::Float);

        self.registers.float_register_mut(id).set_value(value);
        self.registers.set_float_value_type(id, FloatValueType::Float);
    }

    /// Double access requires an even register; odd registers raise
    /// [Exception::RegisterOutOfBounds].
    pub fn double_value(&self, id: FloatRegisterId) -> Result<f64, Exception> {
        self.check_access(ArgumentAccessType::Double);

        if !id.is_even() {
            return Err(Exception::RegisterOutOfBounds);
        }

        let value_type = self.registers.float_value_type(id);
        if value_type != FloatValueType::NotSet && value_type != FloatValueType::DoubleLow {
            warn!(register = %id, "register value type mismatch");
        }

        self.registers
            .double_value(id)
            .ok_or(Exception::RegisterOutOfBounds)
    }

    pub fn set_double_value(&mut self, id: FloatRegisterId, value: f64) -> Result<(), Exception> {
        self.check_access(ArgumentAccessType::Double);

        if !id.is_even() {
            return Err(Exception::RegisterOutOfBounds);
        }

        self.registers
            .set_double_value(id, value)
            .ok_or(Exception::RegisterOutOfBounds)
    }

    /// Raw bit moves between register files carry no numeric view, so
    /// they skip the access checks.
    pub fn int_bits(&self, id: IntRegisterId) -> u32 {
        self.registers.int_register(id).unsigned_value()
    }

    pub fn set_int_bits(&mut self, id: IntRegisterId, bits: u32) {
        self.registers.int_register_mut(id).set_unsigned_value(bits);
        self.registers.set_int_value_type(id, IntValueType::Unsigned);
    }

    pub fn float_bits(&self, id: FloatRegisterId) -> u32 {
        self.registers.float_register(id).bits()
    }

    pub fn set_float_bits(&mut self, id: FloatRegisterId, bits: u32) {
        self.registers.float_register_mut(id).set_bits(bits);
        self.registers.set_float_value_type(id, FloatValueType::Float);
    }

    pub fn fpsr(&self) -> bool {
        self.registers.fpsr()
    }

    pub fn set_fpsr(&mut self, value: bool) {
        self.registers.set_fpsr(value);
    }

    // Operand resolution used by executors.

    /// Resolves a label against the loaded program.
    pub fn resolve_label(&self, name: &str) -> Result<u32, Exception> {
        self.program
            .as_ref()
            .and_then(|program| program.labels.get(name))
            .map(|index| index as u32)
            .ok_or(Exception::UnknownLabel)
    }

    /// The value of a register-or-immediate operand through the signed
    /// view. The parser guarantees no other shape reaches a value slot.
    pub fn signed_operand(&self, arg: &InstructionArg) -> Result<i32, Exception> {
        match arg {
            InstructionArg::IntRegister(id) => Ok(self.int_signed(*id)),
            InstructionArg::Immediate(value) => Ok(*value as i32),
            _ => Err(Exception::RegisterOutOfBounds),
        }
    }

    /// The value of a register-or-immediate operand through the
    /// unsigned view.
    pub fn unsigned_operand(&self, arg: &InstructionArg) -> Result<u32, Exception> {
        match arg {
            InstructionArg::IntRegister(id) => Ok(self.int_unsigned(*id)),
            InstructionArg::Immediate(value) => Ok(*value as i32 as u32),
            _ => Err(Exception::RegisterOutOfBounds),
        }
    }

    pub fn float_operand(&self, arg: &InstructionArg) -> Result<f32, Exception> {
        match arg {
            InstructionArg::FloatRegister(id) => Ok(self.float_value(*id)),
            _ => Err(Exception::RegisterOutOfBounds),
        }
    }

    pub fn double_operand(&self, arg: &InstructionArg) -> Result<f64, Exception> {
        match arg {
            InstructionArg::FloatRegister(id) => self.double_value(*id),
            _ => Err(Exception::RegisterOutOfBounds),
        }
    }

    /// The absolute address a memory operand names. The only valid
    /// shapes are the `disp(Rn)` form and a lazily resolved label;
    /// anything else is an out-of-bounds access. Address bases are
    /// read raw, without view warnings.
    pub fn effective_address(&self, arg: &InstructionArg) -> Result<u32, Exception> {
        let address = match arg {
            InstructionArg::AddressDisplacement {
                register,
                displacement,
            } => {
                let base = self.registers.int_register(*register).unsigned_value();
                base as i64 + *displacement as i64
            }
            InstructionArg::Label(name) => self.resolve_label(name)? as i64,
            _ => return Err(Exception::AddressOutOfBounds),
        };

        u32::try_from(address).map_err(|_| Exception::AddressOutOfBounds)
    }

    /// The instruction index a branch argument targets: a label, or a
    /// register for the register-indirect jumps.
    pub fn branch_target(&self, arg: &InstructionArg) -> Result<u32, Exception> {
        match arg {
            InstructionArg::Label(name) => self.resolve_label(name),
            InstructionArg::IntRegister(id) => {
                Ok(self.registers.int_register(*id).unsigned_value())
            }
            _ => Err(Exception::UnknownLabel),
        }
    }

    // Debug projections for viewer layers.

    pub fn register_dump(&self) -> String {
        let mut text = String::from("Int registers:\n");

        for index in 0..32u8 {
            let id = IntRegisterId::new(index).expect("index in range");
            let register = self.registers.int_register(id);
            text.push_str(&format!(
                "R{0}: sdec: {1}, udec: {2}, hex: 0x{2:08X}\n",
                index,
                register.signed_value(),
                register.unsigned_value(),
            ));
        }

        text.push_str("\nFloat registers:\n");

        for index in 0..32u8 {
            let id = FloatRegisterId::new(index).expect("index in range");
            let register = self.registers.float_register(id);
            text.push_str(&format!(
                "F{}: flt: {}, hex: 0x{:08X}\n",
                index,
                register.value(),
                register.bits(),
            ));
        }

        text.push_str("\nStatus registers:\n");
        text.push_str(&format!(
            "FPSR: {}",
            if self.fpsr() { "Set" } else { "Not Set" }
        ));

        text
    }

    pub fn processor_dump(&self) -> String {
        let mut text = String::new();

        text.push_str(&format!("H: {}\n", self.halted));
        text.push_str(&format!(
            "PC: {}, NPC: {}\n",
            self.program_counter, self.next_program_counter
        ));

        match &self.program {
            Some(program) => {
                match program.instructions.get(self.program_counter as usize) {
                    Some(instruction) => {
                        text.push_str(&format!("INSTR: {}\n", instruction));
                    }
                    None => {
                        text.push_str(&format!(
                            "INSTR: PC >= instruction count ({})\n",
                            program.instructions.len()
                        ));
                    }
                }
            }
            None => text.push_str("INSTR: no program loaded\n"),
        }

        match self.last_exception {
            Some(exception) => text.push_str(&format!("EX: {}\n", exception)),
            None => text.push_str("EX: None\n"),
        }

        text
    }
}

impl Default for Processor {
    fn default() -> Processor {
        Processor::new()
    }
}
