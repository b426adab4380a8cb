//! The static instruction library: one table row per opcode, mapping
//! the mnemonic to its arity, per-slot access types and executor.
//!
//! Executors report failures through their `Result`; the processor's
//! step loop records the exception and halts for the fatal kinds.
//! Non-halting exceptions (overflow, underflow, bad shift) are
//! returned *after* the destination has (or deliberately has not)
//! been written, so execution continues with well-defined state.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::Exception;
use crate::instruction::{
    ArgumentAccessType as A, ArgumentType as T, InstructionArg, InstructionInfo, OpCode,
};
use crate::processor::Processor;
use crate::registers::{FloatRegisterId, IntRegisterId};

type Arg = InstructionArg;
type ExecResult = Result<(), Exception>;

// Destination helpers. The parser guarantees the slot kinds, so a
// mismatch here means the instruction was constructed by hand.

fn int_dest(arg: &Arg) -> Result<IntRegisterId, Exception> {
    match arg {
        Arg::IntRegister(id) => Ok(*id),
        _ => Err(Exception::RegisterOutOfBounds),
    }
}

fn float_dest(arg: &Arg) -> Result<FloatRegisterId, Exception> {
    match arg {
        Arg::FloatRegister(id) => Ok(*id),
        _ => Err(Exception::RegisterOutOfBounds),
    }
}

// Integer arithmetic.

fn signed_arithmetic(
    processor: &mut Processor,
    dest: &Arg,
    lhs: &Arg,
    rhs: &Arg,
    op: fn(i32, i32) -> (i32, bool),
) -> ExecResult {
    let dest = int_dest(dest)?;
    let lhs = processor.signed_operand(lhs)?;
    let rhs = processor.signed_operand(rhs)?;

    let (value, overflowed) = op(lhs, rhs);
    processor.set_int_signed(dest, value);

    if overflowed {
        return Err(Exception::Overflow);
    }
    Ok(())
}

fn unsigned_arithmetic(
    processor: &mut Processor,
    dest: &Arg,
    lhs: &Arg,
    rhs: &Arg,
    op: fn(u32, u32) -> u32,
) -> ExecResult {
    let dest = int_dest(dest)?;
    let lhs = processor.unsigned_operand(lhs)?;
    let rhs = processor.unsigned_operand(rhs)?;

    processor.set_int_unsigned(dest, op(lhs, rhs));
    Ok(())
}

fn add(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    signed_arithmetic(p, d, a, b, i32::overflowing_add)
}

fn addu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    unsigned_arithmetic(p, d, a, b, u32::wrapping_add)
}

fn sub(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    signed_arithmetic(p, d, a, b, i32::overflowing_sub)
}

fn subu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    unsigned_arithmetic(p, d, a, b, u32::wrapping_sub)
}

fn mult(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    signed_arithmetic(p, d, a, b, i32::overflowing_mul)
}

fn multu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    unsigned_arithmetic(p, d, a, b, u32::wrapping_mul)
}

fn div(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let lhs = p.signed_operand(a)?;
    let rhs = p.signed_operand(b)?;

    if rhs == 0 {
        return Err(Exception::DivideByZero);
    }

    // i32::MIN / -1 wraps and reports overflow.
    let (value, overflowed) = lhs.overflowing_div(rhs);
    p.set_int_signed(dest, value);

    if overflowed {
        return Err(Exception::Overflow);
    }
    Ok(())
}

fn divu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let lhs = p.unsigned_operand(a)?;
    let rhs = p.unsigned_operand(b)?;

    if rhs == 0 {
        return Err(Exception::DivideByZero);
    }

    p.set_int_unsigned(dest, lhs / rhs);
    Ok(())
}

// Shifts. The destination stays untouched on a bad shift count.

fn shift_count(p: &Processor, arg: &Arg) -> Result<u32, Exception> {
    let count = p.signed_operand(arg)?;
    if !(0..=31).contains(&count) {
        return Err(Exception::BadShift);
    }
    Ok(count as u32)
}

fn sll(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let count = shift_count(p, b)?;
    let value = p.unsigned_operand(a)?;
    p.set_int_unsigned(dest, value << count);
    Ok(())
}

fn srl(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let count = shift_count(p, b)?;
    let value = p.unsigned_operand(a)?;
    p.set_int_unsigned(dest, value >> count);
    Ok(())
}

fn sla(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let count = shift_count(p, b)?;
    let value = p.signed_operand(a)?;
    p.set_int_signed(dest, value.wrapping_shl(count));
    Ok(())
}

fn sra(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let count = shift_count(p, b)?;
    let value = p.signed_operand(a)?;
    p.set_int_signed(dest, value >> count);
    Ok(())
}

// Bitwise logic.

fn and(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    unsigned_arithmetic(p, d, a, b, |x, y| x & y)
}

fn or(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    unsigned_arithmetic(p, d, a, b, |x, y| x | y)
}

fn xor(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    unsigned_arithmetic(p, d, a, b, |x, y| x ^ y)
}

// Set-on-comparison writes 1 or 0 into the destination.

fn set_signed(
    p: &mut Processor,
    d: &Arg,
    a: &Arg,
    b: &Arg,
    cmp: fn(&i32, &i32) -> bool,
) -> ExecResult {
    let dest = int_dest(d)?;
    let lhs = p.signed_operand(a)?;
    let rhs = p.signed_operand(b)?;
    p.set_int_signed(dest, cmp(&lhs, &rhs) as i32);
    Ok(())
}

fn set_unsigned(
    p: &mut Processor,
    d: &Arg,
    a: &Arg,
    b: &Arg,
    cmp: fn(&u32, &u32) -> bool,
) -> ExecResult {
    let dest = int_dest(d)?;
    let lhs = p.unsigned_operand(a)?;
    let rhs = p.unsigned_operand(b)?;
    p.set_int_unsigned(dest, cmp(&lhs, &rhs) as u32);
    Ok(())
}

fn slt(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_signed(p, d, a, b, i32::lt)
}

fn sltu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_unsigned(p, d, a, b, u32::lt)
}

fn sgt(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_signed(p, d, a, b, i32::gt)
}

fn sgtu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_unsigned(p, d, a, b, u32::gt)
}

fn sle(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_signed(p, d, a, b, i32::le)
}

fn sleu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_unsigned(p, d, a, b, u32::le)
}

fn sge(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_signed(p, d, a, b, i32::ge)
}

fn sgeu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_unsigned(p, d, a, b, u32::ge)
}

fn seq(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_signed(p, d, a, b, i32::eq)
}

fn sequ(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_unsigned(p, d, a, b, u32::eq)
}

fn sne(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_signed(p, d, a, b, i32::ne)
}

fn sneu(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    set_unsigned(p, d, a, b, u32::ne)
}

fn lhi(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let value = p.unsigned_operand(a)?;
    p.set_int_unsigned(dest, value << 16);
    Ok(())
}

// Loads and stores. The memory operand is `disp(Rn)`, an immediate
// address or a label resolved lazily against the loaded program.

fn lb(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_byte(address)?;
    p.set_int_signed(dest, value as i32);
    Ok(())
}

fn lbu(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_unsigned_byte(address)?;
    p.set_int_unsigned(dest, value as u32);
    Ok(())
}

fn lh(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_half(address)?;
    p.set_int_signed(dest, value as i32);
    Ok(())
}

fn lhu(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_unsigned_half(address)?;
    p.set_int_unsigned(dest, value as u32);
    Ok(())
}

fn lw(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_word(address)?;
    p.set_int_signed(dest, value);
    Ok(())
}

fn lwu(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_unsigned_word(address)?;
    p.set_int_unsigned(dest, value);
    Ok(())
}

fn lf(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_float(address)?;
    p.set_float_value(dest, value);
    Ok(())
}

fn ld(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let address = p.effective_address(a)?;
    let value = p.memory().load_double(address)?;
    p.set_double_value(dest, value)?;
    Ok(())
}

fn sb(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let address = p.effective_address(d)?;
    let value = p.signed_operand(a)?;
    p.memory_mut().store_byte(address, value as i8)
}

fn sh(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let address = p.effective_address(d)?;
    let value = p.signed_operand(a)?;
    p.memory_mut().store_half(address, value as i16)
}

fn sw(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let address = p.effective_address(d)?;
    let value = p.signed_operand(a)?;
    p.memory_mut().store_word(address, value)
}

fn sf(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let address = p.effective_address(d)?;
    let value = p.float_operand(a)?;
    p.memory_mut().store_float(address, value)
}

fn sd(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let address = p.effective_address(d)?;
    let value = p.double_operand(a)?;
    p.memory_mut().store_double(address, value)
}

// Float arithmetic. Overflow to infinity from finite inputs and
// collapse to subnormal both flag, without disturbing the result.

fn float_flags(inputs_finite: bool, infinite: bool, subnormal: bool) -> ExecResult {
    if inputs_finite && infinite {
        return Err(Exception::Overflow);
    }
    if subnormal {
        return Err(Exception::Underflow);
    }
    Ok(())
}

fn float_arithmetic(
    p: &mut Processor,
    d: &Arg,
    a: &Arg,
    b: &Arg,
    op: fn(f32, f32) -> f32,
) -> ExecResult {
    let dest = float_dest(d)?;
    let lhs = p.float_operand(a)?;
    let rhs = p.float_operand(b)?;

    let value = op(lhs, rhs);
    p.set_float_value(dest, value);

    float_flags(
        lhs.is_finite() && rhs.is_finite(),
        value.is_infinite(),
        value.is_subnormal(),
    )
}

fn double_arithmetic(
    p: &mut Processor,
    d: &Arg,
    a: &Arg,
    b: &Arg,
    op: fn(f64, f64) -> f64,
) -> ExecResult {
    let dest = float_dest(d)?;
    let lhs = p.double_operand(a)?;
    let rhs = p.double_operand(b)?;

    let value = op(lhs, rhs);
    p.set_double_value(dest, value)?;

    float_flags(
        lhs.is_finite() && rhs.is_finite(),
        value.is_infinite(),
        value.is_subnormal(),
    )
}

fn addf(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    float_arithmetic(p, d, a, b, |x, y| x + y)
}

fn subf(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    float_arithmetic(p, d, a, b, |x, y| x - y)
}

fn multf(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    float_arithmetic(p, d, a, b, |x, y| x * y)
}

fn divf(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let rhs = p.float_operand(b)?;
    if rhs == 0.0 {
        return Err(Exception::DivideByZero);
    }
    float_arithmetic(p, d, a, b, |x, y| x / y)
}

fn addd(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    double_arithmetic(p, d, a, b, |x, y| x + y)
}

fn subd(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    double_arithmetic(p, d, a, b, |x, y| x - y)
}

fn multd(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    double_arithmetic(p, d, a, b, |x, y| x * y)
}

fn divd(p: &mut Processor, d: &Arg, a: &Arg, b: &Arg) -> ExecResult {
    let rhs = p.double_operand(b)?;
    if rhs == 0.0 {
        return Err(Exception::DivideByZero);
    }
    double_arithmetic(p, d, a, b, |x, y| x / y)
}

// Float comparisons set the FPSR bit, tested by BFPT/BFPF.

fn float_compare(
    p: &mut Processor,
    a: &Arg,
    b: &Arg,
    cmp: fn(&f32, &f32) -> bool,
) -> ExecResult {
    let lhs = p.float_operand(a)?;
    let rhs = p.float_operand(b)?;
    p.set_fpsr(cmp(&lhs, &rhs));
    Ok(())
}

fn double_compare(
    p: &mut Processor,
    a: &Arg,
    b: &Arg,
    cmp: fn(&f64, &f64) -> bool,
) -> ExecResult {
    let lhs = p.double_operand(a)?;
    let rhs = p.double_operand(b)?;
    p.set_fpsr(cmp(&lhs, &rhs));
    Ok(())
}

fn ltf(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    float_compare(p, a, b, f32::lt)
}

fn gtf(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    float_compare(p, a, b, f32::gt)
}

fn lef(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    float_compare(p, a, b, f32::le)
}

fn gef(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    float_compare(p, a, b, f32::ge)
}

fn eqf(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    float_compare(p, a, b, f32::eq)
}

fn nef(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    float_compare(p, a, b, f32::ne)
}

fn ltd(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    double_compare(p, a, b, f64::lt)
}

fn gtd(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    double_compare(p, a, b, f64::gt)
}

fn led(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    double_compare(p, a, b, f64::le)
}

fn ged(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    double_compare(p, a, b, f64::ge)
}

fn eqd(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    double_compare(p, a, b, f64::eq)
}

fn ned(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    double_compare(p, a, b, f64::ne)
}

// Conversions and register-file moves. Integer values travel through
// float registers as raw bit patterns.

fn cvtf2d(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let value = p.float_operand(a)? as f64;
    p.set_double_value(dest, value)
}

fn cvtd2f(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let value = p.double_operand(a)? as f32;
    p.set_float_value(dest, value);
    Ok(())
}

fn cvtf2i(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let value = p.float_operand(a)? as i32;
    p.set_float_bits(dest, value as u32);
    Ok(())
}

fn cvti2f(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let source = float_dest(a)?;
    let value = p.float_bits(source) as i32;
    p.set_float_value(dest, value as f32);
    Ok(())
}

fn cvtd2i(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let value = p.double_operand(a)? as i32;
    p.set_float_bits(dest, value as u32);
    Ok(())
}

fn cvti2d(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let source = float_dest(a)?;
    let value = p.float_bits(source) as i32;
    p.set_double_value(dest, value as f64)
}

fn movf(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let value = p.float_operand(a)?;
    p.set_float_value(dest, value);
    Ok(())
}

fn movd(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let value = p.double_operand(a)?;
    p.set_double_value(dest, value)
}

fn movfp2i(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = int_dest(d)?;
    let source = float_dest(a)?;
    let bits = p.float_bits(source);
    p.set_int_bits(dest, bits);
    Ok(())
}

fn movi2fp(p: &mut Processor, d: &Arg, a: &Arg, _b: &Arg) -> ExecResult {
    let dest = float_dest(d)?;
    let source = int_dest(a)?;
    let bits = p.int_bits(source);
    p.set_float_bits(dest, bits);
    Ok(())
}

// Control flow. Branches overwrite the next program counter.

fn jump(p: &mut Processor, a: &Arg, _b: &Arg, _c: &Arg) -> ExecResult {
    let target = p.branch_target(a)?;
    p.set_next_program_counter(target);
    Ok(())
}

fn jump_and_link(p: &mut Processor, a: &Arg, _b: &Arg, _c: &Arg) -> ExecResult {
    let target = p.branch_target(a)?;
    let return_address = p.next_program_counter();

    p.set_int_unsigned(IntRegisterId::R31, return_address);
    p.set_next_program_counter(target);
    Ok(())
}

fn beqz(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    let value = p.signed_operand(a)?;
    if value == 0 {
        let target = p.branch_target(b)?;
        p.set_next_program_counter(target);
    }
    Ok(())
}

fn bnez(p: &mut Processor, a: &Arg, b: &Arg, _c: &Arg) -> ExecResult {
    let value = p.signed_operand(a)?;
    if value != 0 {
        let target = p.branch_target(b)?;
        p.set_next_program_counter(target);
    }
    Ok(())
}

fn bfpt(p: &mut Processor, a: &Arg, _b: &Arg, _c: &Arg) -> ExecResult {
    if p.fpsr() {
        let target = p.branch_target(a)?;
        p.set_next_program_counter(target);
    }
    Ok(())
}

fn bfpf(p: &mut Processor, a: &Arg, _b: &Arg, _c: &Arg) -> ExecResult {
    if !p.fpsr() {
        let target = p.branch_target(a)?;
        p.set_next_program_counter(target);
    }
    Ok(())
}

fn nop(_p: &mut Processor, _a: &Arg, _b: &Arg, _c: &Arg) -> ExecResult {
    Ok(())
}

fn trap(_p: &mut Processor, _a: &Arg, _b: &Arg, _c: &Arg) -> ExecResult {
    Err(Exception::Trap)
}

fn halt(_p: &mut Processor, _a: &Arg, _b: &Arg, _c: &Arg) -> ExecResult {
    Err(Exception::Halt)
}

macro_rules! library {
    ( $( $opcode:ident / $arity:literal:
         [$a1:ident, $a2:ident, $a3:ident] / [$t1:ident, $t2:ident, $t3:ident] => $exec:path; )+ ) => {
        static INSTRUCTION_TABLE: &[InstructionInfo] = &[
            $(
                InstructionInfo {
                    opcode: OpCode::$opcode,
                    required_arguments: $arity,
                    access_types: [A::$a1, A::$a2, A::$a3],
                    argument_types: [T::$t1, T::$t2, T::$t3],
                    execute: $exec,
                },
            )+
        ];
    };
}

library! {
    Add / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => add;
    Addi / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => add;
    Addu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => addu;
    Addui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => addu;
    Sub / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => sub;
    Subi / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => sub;
    Subu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => subu;
    Subui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => subu;
    Mult / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => mult;
    Multi / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => mult;
    Multu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => multu;
    Multui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => multu;
    Div / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => div;
    Divi / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => div;
    Divu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => divu;
    Divui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => divu;

    Sll / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => sll;
    Slli / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => sll;
    Srl / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => srl;
    Srli / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => srl;
    Sla / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => sla;
    Slai / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => sla;
    Sra / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => sra;
    Srai / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => sra;

    And / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => and;
    Andi / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => and;
    Or / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => or;
    Ori / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => or;
    Xor / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => xor;
    Xori / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => xor;

    Slt / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => slt;
    Slti / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => slt;
    Sltu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => sltu;
    Sltui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => sltu;
    Sgt / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => sgt;
    Sgti / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => sgt;
    Sgtu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => sgtu;
    Sgtui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => sgtu;
    Sle / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => sle;
    Slei / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => sle;
    Sleu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => sleu;
    Sleui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => sleu;
    Sge / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => sge;
    Sgei / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => sge;
    Sgeu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => sgeu;
    Sgeui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => sgeu;
    Seq / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => seq;
    Seqi / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => seq;
    Sequ / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => sequ;
    Sequi / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => sequ;
    Sne / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, IntRegister] => sne;
    Snei / 3: [Signed, Signed, Signed] / [IntRegister, IntRegister, ImmediateInteger] => sne;
    Sneu / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, IntRegister] => sneu;
    Sneui / 3: [Unsigned, Unsigned, Unsigned] / [IntRegister, IntRegister, ImmediateInteger] => sneu;

    Lhi / 2: [Unsigned, Unsigned, None] / [IntRegister, ImmediateInteger, None] => lhi;

    Lb / 2: [Signed, Ignored, None] / [IntRegister, AddressDisplacement, None] => lb;
    Lbu / 2: [Unsigned, Ignored, None] / [IntRegister, AddressDisplacement, None] => lbu;
    Lh / 2: [Signed, Ignored, None] / [IntRegister, AddressDisplacement, None] => lh;
    Lhu / 2: [Unsigned, Ignored, None] / [IntRegister, AddressDisplacement, None] => lhu;
    Lw / 2: [Signed, Ignored, None] / [IntRegister, AddressDisplacement, None] => lw;
    Lwu / 2: [Unsigned, Ignored, None] / [IntRegister, AddressDisplacement, None] => lwu;
    Lf / 2: [Float, Ignored, None] / [FloatRegister, AddressDisplacement, None] => lf;
    Ld / 2: [Double, Ignored, None] / [FloatRegister, AddressDisplacement, None] => ld;
    Sb / 2: [Ignored, Signed, None] / [AddressDisplacement, IntRegister, None] => sb;
    Sh / 2: [Ignored, Signed, None] / [AddressDisplacement, IntRegister, None] => sh;
    Sw / 2: [Ignored, Signed, None] / [AddressDisplacement, IntRegister, None] => sw;
    Sf / 2: [Ignored, Float, None] / [AddressDisplacement, FloatRegister, None] => sf;
    Sd / 2: [Ignored, Double, None] / [AddressDisplacement, FloatRegister, None] => sd;

    Addf / 3: [Float, Float, Float] / [FloatRegister, FloatRegister, FloatRegister] => addf;
    Subf / 3: [Float, Float, Float] / [FloatRegister, FloatRegister, FloatRegister] => subf;
    Multf / 3: [Float, Float, Float] / [FloatRegister, FloatRegister, FloatRegister] => multf;
    Divf / 3: [Float, Float, Float] / [FloatRegister, FloatRegister, FloatRegister] => divf;
    Addd / 3: [Double, Double, Double] / [FloatRegister, FloatRegister, FloatRegister] => addd;
    Subd / 3: [Double, Double, Double] / [FloatRegister, FloatRegister, FloatRegister] => subd;
    Multd / 3: [Double, Double, Double] / [FloatRegister, FloatRegister, FloatRegister] => multd;
    Divd / 3: [Double, Double, Double] / [FloatRegister, FloatRegister, FloatRegister] => divd;

    Ltf / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => ltf;
    Gtf / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => gtf;
    Lef / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => lef;
    Gef / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => gef;
    Eqf / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => eqf;
    Nef / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => nef;
    Ltd / 2: [Double, Double, None] / [FloatRegister, FloatRegister, None] => ltd;
    Gtd / 2: [Double, Double, None] / [FloatRegister, FloatRegister, None] => gtd;
    Led / 2: [Double, Double, None] / [FloatRegister, FloatRegister, None] => led;
    Ged / 2: [Double, Double, None] / [FloatRegister, FloatRegister, None] => ged;
    Eqd / 2: [Double, Double, None] / [FloatRegister, FloatRegister, None] => eqd;
    Ned / 2: [Double, Double, None] / [FloatRegister, FloatRegister, None] => ned;

    Cvtf2d / 2: [MixedFloatDouble, MixedFloatDouble, None] / [FloatRegister, FloatRegister, None] => cvtf2d;
    Cvtd2f / 2: [MixedFloatDouble, MixedFloatDouble, None] / [FloatRegister, FloatRegister, None] => cvtd2f;
    Cvtf2i / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => cvtf2i;
    Cvti2f / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => cvti2f;
    Cvtd2i / 2: [MixedFloatDouble, MixedFloatDouble, None] / [FloatRegister, FloatRegister, None] => cvtd2i;
    Cvti2d / 2: [MixedFloatDouble, MixedFloatDouble, None] / [FloatRegister, FloatRegister, None] => cvti2d;
    Movf / 2: [Float, Float, None] / [FloatRegister, FloatRegister, None] => movf;
    Movd / 2: [Double, Double, None] / [FloatRegister, FloatRegister, None] => movd;
    Movfp2i / 2: [Unsigned, Float, None] / [IntRegister, FloatRegister, None] => movfp2i;
    Movi2fp / 2: [Float, Unsigned, None] / [FloatRegister, IntRegister, None] => movi2fp;

    J / 1: [Label, None, None] / [Label, None, None] => jump;
    Jr / 1: [Unsigned, None, None] / [IntRegister, None, None] => jump;
    Jal / 1: [Label, None, None] / [Label, None, None] => jump_and_link;
    Jalr / 1: [Unsigned, None, None] / [IntRegister, None, None] => jump_and_link;
    Beqz / 2: [Signed, Label, None] / [IntRegister, Label, None] => beqz;
    Bnez / 2: [Signed, Label, None] / [IntRegister, Label, None] => bnez;
    Bfpt / 1: [Label, None, None] / [Label, None, None] => bfpt;
    Bfpf / 1: [Label, None, None] / [Label, None, None] => bfpf;

    Nop / 0: [None, None, None] / [None, None, None] => nop;
    Trap / 1: [Ignored, None, None] / [ImmediateInteger, None, None] => trap;
    Halt / 0: [None, None, None] / [None, None, None] => halt;
}

/// The read-only table of every DLX instruction, shared by the parser
/// and the processor.
pub struct InstructionLibrary {
    by_opcode: HashMap<OpCode, &'static InstructionInfo>,
}

impl InstructionLibrary {
    fn new() -> InstructionLibrary {
        let by_opcode = INSTRUCTION_TABLE
            .iter()
            .map(|info| (info.opcode, info))
            .collect();

        InstructionLibrary { by_opcode }
    }

    /// The process-wide library instance. Built on first use, immutable
    /// afterwards.
    pub fn global() -> &'static InstructionLibrary {
        static LIBRARY: OnceLock<InstructionLibrary> = OnceLock::new();
        LIBRARY.get_or_init(InstructionLibrary::new)
    }

    pub fn get(&self, opcode: OpCode) -> &'static InstructionInfo {
        self.by_opcode[&opcode]
    }

    /// Case-insensitive mnemonic lookup.
    pub fn lookup_name(&self, name: &str) -> Option<&'static InstructionInfo> {
        OpCode::from_name(name).map(|opcode| self.get(opcode))
    }

    pub fn len(&self) -> usize {
        self.by_opcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_opcode.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static InstructionInfo> + '_ {
        self.by_opcode.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_row_has_a_unique_opcode() {
        assert_eq!(InstructionLibrary::global().len(), INSTRUCTION_TABLE.len());
        assert_eq!(INSTRUCTION_TABLE.len(), 109);
    }

    #[test]
    fn lookup_by_name() {
        let library = InstructionLibrary::global();

        let info = library.lookup_name("addi").unwrap();
        assert_eq!(info.opcode, OpCode::Addi);
        assert_eq!(info.required_arguments, 3);

        assert_eq!(library.lookup_name("HALT").unwrap().required_arguments, 0);
        assert!(library.lookup_name("loop").is_none());
    }

    #[test]
    fn register_access_follows_the_first_register_slot() {
        let library = InstructionLibrary::global();

        assert_eq!(library.get(OpCode::Add).register_access(), A::Signed);
        assert_eq!(library.get(OpCode::Addf).register_access(), A::Float);
        assert_eq!(library.get(OpCode::Sw).register_access(), A::Ignored);
        assert_eq!(library.get(OpCode::Halt).register_access(), A::Ignored);
    }

    #[test]
    fn register_and_immediate_variants_differ_in_shape() {
        let library = InstructionLibrary::global();

        // Same executor, same access views, different argument shapes.
        assert_eq!(library.get(OpCode::Add).argument_types[2], T::IntRegister);
        assert_eq!(
            library.get(OpCode::Addi).argument_types[2],
            T::ImmediateInteger
        );
        assert_eq!(
            library.get(OpCode::Lw).argument_types[1],
            T::AddressDisplacement
        );
        assert_eq!(
            library.get(OpCode::Sw).argument_types[0],
            T::AddressDisplacement
        );
    }
}
