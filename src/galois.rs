//! Galois Field GF(2^8) arithmetic for stripe parity
//!
//! Every stored byte is one field symbol. The log/antilog tables are built by
//! walking the multiplicative group generated by `2` under the field modulus,
//! which defaults to 0x11D (x⁸ + x⁴ + x³ + x² + 1).
//!
//! Addition and subtraction are XOR. Multiplication and division go through
//! the log tables, so nothing in the encode or decode path touches floating
//! point.

use std::fmt;
use thiserror::Error;

/// Symbol width in bits
pub const SYMBOL_BITS: u32 = 8;

/// Number of field elements, `2^SYMBOL_BITS`
pub const FIELD_SIZE: usize = 1 << SYMBOL_BITS;

/// Order of the multiplicative group (number of non-zero elements)
const GROUP_ORDER: usize = FIELD_SIZE - 1;

/// Default primitive polynomial: 0x11D (x⁸ + x⁴ + x³ + x² + 1)
pub const DEFAULT_MODULUS: u32 = 0x11D;

/// Errors raised by field arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    /// Division by the zero element
    #[error("Division by zero in Galois field")]
    UndefinedDivision,

    /// The modulus does not generate the whole field from `2`
    #[error("Modulus {modulus:#x} is not a primitive polynomial for GF(2^8)")]
    NotPrimitive { modulus: u32 },
}

/// Type alias for Result with FieldError
pub type Result<T> = std::result::Result<T, FieldError>;

/// Precomputed logarithm and antilogarithm tables for GF(2^8)
#[derive(Clone)]
pub struct GaloisField {
    modulus: u32,
    log_table: [u8; FIELD_SIZE],
    exp_table: [u8; FIELD_SIZE],
}

impl GaloisField {
    /// Build the field for `modulus`, rejecting polynomials that are not primitive
    pub fn new(modulus: u32) -> Result<Self> {
        let (field, primitive) = Self::build_tables(modulus);
        if primitive {
            Ok(field)
        } else {
            Err(FieldError::NotPrimitive { modulus })
        }
    }

    /// Walk the powers of 2, recording `log[b] = l` and `exp[l] = b`.
    ///
    /// Returns the tables together with whether the walk visited every
    /// non-zero element exactly once.
    fn build_tables(modulus: u32) -> (Self, bool) {
        let mut field = GaloisField {
            modulus,
            log_table: [0; FIELD_SIZE],
            exp_table: [0; FIELD_SIZE],
        };

        // Degree must be exactly SYMBOL_BITS
        if modulus >> SYMBOL_BITS != 1 {
            return (field, false);
        }

        let mut primitive = true;
        let mut b = 1u32;

        for log in 0..GROUP_ORDER {
            if b == 0 || (log > 0 && b == 1) {
                primitive = false;
                break;
            }
            field.log_table[b as usize] = log as u8;
            field.exp_table[log] = b as u8;

            b <<= 1;
            if b & FIELD_SIZE as u32 != 0 {
                b ^= modulus;
            }
        }

        // The cycle has to close back on 1 after exactly GROUP_ORDER steps
        primitive &= b == 1;
        field.exp_table[GROUP_ORDER] = field.exp_table[0];

        (field, primitive)
    }

    /// The reduction polynomial this field was built with
    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    /// Discrete logarithm of a non-zero element (`None` for zero)
    #[inline]
    pub fn log(&self, a: u8) -> Option<u8> {
        (a != 0).then(|| self.log_table[a as usize])
    }

    /// `2^n` in the field
    #[inline]
    pub fn exp(&self, n: usize) -> u8 {
        self.exp_table[n % GROUP_ORDER]
    }

    /// Add two elements - this is just XOR
    #[inline]
    pub fn add(&self, a: u8, b: u8) -> u8 {
        a ^ b
    }

    /// Subtract two elements - same as addition
    #[inline]
    pub fn sub(&self, a: u8, b: u8) -> u8 {
        a ^ b
    }

    /// Multiply two elements
    #[inline]
    pub fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }

        let log_a = self.log_table[a as usize] as usize;
        let log_b = self.log_table[b as usize] as usize;
        self.exp_table[(log_a + log_b) % GROUP_ORDER]
    }

    /// Divide `a` by `b`
    ///
    /// A zero dividend yields zero before the divisor is looked at.
    #[inline]
    pub fn div(&self, a: u8, b: u8) -> Result<u8> {
        if a == 0 {
            return Ok(0);
        }
        if b == 0 {
            return Err(FieldError::UndefinedDivision);
        }

        let log_a = self.log_table[a as usize] as usize;
        let log_b = self.log_table[b as usize] as usize;

        // Subtraction in log space, kept non-negative
        let log_result = (log_a + GROUP_ORDER - log_b) % GROUP_ORDER;
        Ok(self.exp_table[log_result])
    }

    /// Raise `a` to the power `n`
    ///
    /// The exponent is reduced modulo the group order first, so `pow(a, 0)`
    /// and `pow(a, 255)` are both 1, including for `a == 0`.
    pub fn pow(&self, a: u8, n: u32) -> u8 {
        let n = n as usize % GROUP_ORDER;
        (0..n).fold(1, |acc, _| self.mul(a, acc))
    }

    /// Multiplicative inverse of a non-zero element
    #[inline]
    pub fn inverse(&self, a: u8) -> Result<u8> {
        if a == 0 {
            return Err(FieldError::UndefinedDivision);
        }
        self.div(1, a)
    }

    /// Inner product of two symbol vectors
    pub fn dot(&self, a: &[u8], b: &[u8]) -> u8 {
        a.iter()
            .zip(b)
            .fold(0, |acc, (&x, &y)| self.add(acc, self.mul(x, y)))
    }

    /// Multiplication table for a fixed coefficient: `table[x] = coef * x`
    pub fn mul_table(&self, coef: u8) -> [u8; FIELD_SIZE] {
        let mut table = [0u8; FIELD_SIZE];
        for (x, entry) in table.iter_mut().enumerate() {
            *entry = self.mul(coef, x as u8);
        }
        table
    }

    /// Multiply-accumulate a whole row: `output[i] ^= coef * input[i]`
    pub fn mul_slice_xor(&self, coef: u8, input: &[u8], output: &mut [u8]) {
        match coef {
            0 => {}
            1 => {
                for (out, &inp) in output.iter_mut().zip(input) {
                    *out ^= inp;
                }
            }
            _ => {
                let table = self.mul_table(coef);
                for (out, &inp) in output.iter_mut().zip(input) {
                    *out ^= table[inp as usize];
                }
            }
        }
    }
}

impl Default for GaloisField {
    fn default() -> Self {
        let (field, primitive) = Self::build_tables(DEFAULT_MODULUS);
        debug_assert!(primitive);
        field
    }
}

impl fmt::Debug for GaloisField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaloisField")
            .field("modulus", &format_args!("{:#x}", self.modulus))
            .finish()
    }
}
