//! Register identifiers and the register file.
//!
//! The DLX register file has 32 integer registers (`R0` is hard-wired
//! to zero), 32 single-precision float registers (adjacent even/odd
//! pairs form doubles) and the single-bit FPSR status register.
//!
//! Every integer cell remembers whether it was last written through the
//! signed or the unsigned view, and every float cell whether it holds a
//! single or half of a double. Mismatching views are *warnings*, never
//! errors; the checks live on the [Processor](crate::processor::Processor)
//! accessors.

use std::fmt;
use std::str::FromStr;

pub const REGISTER_COUNT: usize = 32;

/// Identifier of one of the 32 integer registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntRegisterId(u8);

impl IntRegisterId {
    pub const R0: IntRegisterId = IntRegisterId(0);
    pub const R31: IntRegisterId = IntRegisterId(31);

    /// Returns `None` for indexes outside `0..32`.
    pub fn new(index: u8) -> Option<IntRegisterId> {
        if (index as usize) < REGISTER_COUNT {
            Some(IntRegisterId(index))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for IntRegisterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl FromStr for IntRegisterId {
    type Err = ();

    /// Accepts `R0`..`R31`, case-insensitively. Leading zeros are not
    /// register names (`R01` is a label).
    fn from_str(name: &str) -> Result<IntRegisterId, ()> {
        parse_register_name(name, b'R').map(IntRegisterId).ok_or(())
    }
}

/// Identifier of one of the 32 float registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FloatRegisterId(u8);

impl FloatRegisterId {
    pub const F0: FloatRegisterId = FloatRegisterId(0);

    pub fn new(index: u8) -> Option<FloatRegisterId> {
        if (index as usize) < REGISTER_COUNT {
            Some(FloatRegisterId(index))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Doubles occupy the even/odd pair starting at an even register.
    pub fn is_even(self) -> bool {
        self.0 % 2 == 0
    }

    /// The odd partner register of a double pair, if it exists.
    pub fn pair(self) -> Option<FloatRegisterId> {
        FloatRegisterId::new(self.0 + 1)
    }
}

impl fmt::Display for FloatRegisterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

impl FromStr for FloatRegisterId {
    type Err = ();

    fn from_str(name: &str) -> Result<FloatRegisterId, ()> {
        parse_register_name(name, b'F').map(FloatRegisterId).ok_or(())
    }
}

fn parse_register_name(name: &str, prefix: u8) -> Option<u8> {
    let bytes = name.as_bytes();

    if bytes.len() < 2 || bytes.len() > 3 {
        return None;
    }
    if !bytes[0].eq_ignore_ascii_case(&prefix) {
        return None;
    }

    let digits = &name[1..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }

    let index: u8 = digits.parse().ok()?;
    if (index as usize) < REGISTER_COUNT {
        Some(index)
    } else {
        None
    }
}

/// Which view an integer register was last written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntValueType {
    #[default]
    NotSet,
    Signed,
    Unsigned,
}

/// Which view a float register was last written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatValueType {
    #[default]
    NotSet,
    Float,
    DoubleLow,
    DoubleHigh,
}

/// One integer register cell. The stored bits are shared between the
/// signed and the unsigned view.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntRegister {
    bits: u32,
    read_only: bool,
}

impl IntRegister {
    pub fn signed_value(&self) -> i32 {
        self.bits as i32
    }

    pub fn unsigned_value(&self) -> u32 {
        self.bits
    }

    pub fn set_signed_value(&mut self, value: i32) {
        if !self.read_only {
            self.bits = value as u32;
        }
    }

    pub fn set_unsigned_value(&mut self, value: u32) {
        if !self.read_only {
            self.bits = value;
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

/// One float register cell holding a single-precision value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatRegister {
    value: f32,
}

impl FloatRegister {
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn bits(&self) -> u32 {
        self.value.to_bits()
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    pub fn set_bits(&mut self, bits: u32) {
        self.value = f32::from_bits(bits);
    }
}

/// The complete register state of the processor.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    int: [IntRegister; REGISTER_COUNT],
    float: [FloatRegister; REGISTER_COUNT],
    fpsr: bool,
    int_types: [IntValueType; REGISTER_COUNT],
    float_types: [FloatValueType; REGISTER_COUNT],
}

impl RegisterFile {
    pub fn new() -> RegisterFile {
        let mut file = RegisterFile {
            int: [IntRegister::default(); REGISTER_COUNT],
            float: [FloatRegister::default(); REGISTER_COUNT],
            fpsr: false,
            int_types: [IntValueType::NotSet; REGISTER_COUNT],
            float_types: [FloatValueType::NotSet; REGISTER_COUNT],
        };

        // R0 is hard-wired to zero.
        file.int[0].set_read_only(true);

        file
    }

    pub fn int_register(&self, id: IntRegisterId) -> &IntRegister {
        &self.int[id.index()]
    }

    pub fn int_register_mut(&mut self, id: IntRegisterId) -> &mut IntRegister {
        &mut self.int[id.index()]
    }

    pub fn float_register(&self, id: FloatRegisterId) -> &FloatRegister {
        &self.float[id.index()]
    }

    pub fn float_register_mut(&mut self, id: FloatRegisterId) -> &mut FloatRegister {
        &mut self.float[id.index()]
    }

    pub fn fpsr(&self) -> bool {
        self.fpsr
    }

    pub fn set_fpsr(&mut self, value: bool) {
        self.fpsr = value;
    }

    pub fn int_value_type(&self, id: IntRegisterId) -> IntValueType {
        self.int_types[id.index()]
    }

    pub(crate) fn set_int_value_type(&mut self, id: IntRegisterId, value_type: IntValueType) {
        if !self.int[id.index()].is_read_only() {
            self.int_types[id.index()] = value_type;
        }
    }

    pub fn float_value_type(&self, id: FloatRegisterId) -> FloatValueType {
        self.float_types[id.index()]
    }

    pub(crate) fn set_float_value_type(&mut self, id: FloatRegisterId, value_type: FloatValueType) {
        self.float_types[id.index()] = value_type;
    }

    /// Reads the double stored in the even/odd pair starting at `id`.
    /// The low 32 bits live in `id`, the high 32 bits in its partner.
    ///
    /// The caller is responsible for checking that `id` is even; this
    /// only fails when the pair runs past the register file.
    pub fn double_value(&self, id: FloatRegisterId) -> Option<f64> {
        let high = id.pair()?;

        let low_bits = self.float[id.index()].bits() as u64;
        let high_bits = self.float[high.index()].bits() as u64;

        Some(f64::from_bits(high_bits << 32 | low_bits))
    }

    pub fn set_double_value(&mut self, id: FloatRegisterId, value: f64) -> Option<()> {
        let high = id.pair()?;

        let bits = value.to_bits();
        self.float[id.index()].set_bits(bits as u32);
        self.float[high.index()].set_bits((bits >> 32) as u32);

        self.float_types[id.index()] = FloatValueType::DoubleLow;
        self.float_types[high.index()] = FloatValueType::DoubleHigh;

        Some(())
    }

    /// Zeroes every register and clears the FPSR. Value-type tracking
    /// is reset as well.
    pub fn clear(&mut self) {
        for reg in self.int.iter_mut() {
            let read_only = reg.is_read_only();
            reg.set_read_only(false);
            reg.set_signed_value(0);
            reg.set_read_only(read_only);
        }

        for reg in self.float.iter_mut() {
            reg.set_value(0.0);
        }

        self.fpsr = false;
        self.int_types = [IntValueType::NotSet; REGISTER_COUNT];
        self.float_types = [FloatValueType::NotSet; REGISTER_COUNT];
    }
}

impl Default for RegisterFile {
    fn default() -> RegisterFile {
        RegisterFile::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names() {
        assert_eq!("R0".parse(), Ok(IntRegisterId::R0));
        assert_eq!("r17".parse::<IntRegisterId>().unwrap().index(), 17);
        assert_eq!("R31".parse(), Ok(IntRegisterId::R31));
        assert!("R32".parse::<IntRegisterId>().is_err());
        assert!("R01".parse::<IntRegisterId>().is_err());
        assert!("R".parse::<IntRegisterId>().is_err());

        assert_eq!("f4".parse::<FloatRegisterId>().unwrap().index(), 4);
        assert!("F99".parse::<FloatRegisterId>().is_err());
    }

    #[test]
    fn r0_writes_are_dropped() {
        let mut file = RegisterFile::new();

        file.int_register_mut(IntRegisterId::R0).set_signed_value(42);
        assert_eq!(file.int_register(IntRegisterId::R0).signed_value(), 0);

        file.int_register_mut(IntRegisterId::R0).set_unsigned_value(7);
        assert_eq!(file.int_register(IntRegisterId::R0).unsigned_value(), 0);
    }

    #[test]
    fn double_pair_round_trip() {
        let mut file = RegisterFile::new();
        let f2 = FloatRegisterId::new(2).unwrap();

        file.set_double_value(f2, 1234.5678).unwrap();
        assert_eq!(file.double_value(f2), Some(1234.5678));

        assert_eq!(file.float_value_type(f2), FloatValueType::DoubleLow);
        assert_eq!(
            file.float_value_type(FloatRegisterId::new(3).unwrap()),
            FloatValueType::DoubleHigh
        );

        // The pair of F31 runs past the file.
        let f31 = FloatRegisterId::new(31).unwrap();
        assert_eq!(file.double_value(f31), None);
    }

    #[test]
    fn clear_resets_everything() {
        let mut file = RegisterFile::new();
        let r5 = IntRegisterId::new(5).unwrap();

        file.int_register_mut(r5).set_signed_value(-3);
        file.set_int_value_type(r5, IntValueType::Signed);
        file.set_fpsr(true);

        file.clear();

        assert_eq!(file.int_register(r5).signed_value(), 0);
        assert_eq!(file.int_value_type(r5), IntValueType::NotSet);
        assert!(!file.fpsr());
        // R0 stays read-only after a clear.
        file.int_register_mut(IntRegisterId::R0).set_signed_value(1);
        assert_eq!(file.int_register(IntRegisterId::R0).signed_value(), 0);
    }
}
