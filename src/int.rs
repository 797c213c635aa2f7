//! Small-integer primitives.
//!
//! Integers live entirely in the value tag; every arithmetic op below is
//! non-allocating. Results past the small range latch `Unimplemented`,
//! the reserved big-integer path.

use core::cmp::Ordering;

use crate::consts::*;
use crate::error::ErrorCode;
use crate::value::Value;
use crate::Context;

impl Context {
    /// Push a 32-bit integer. Always fits the small range. `[alloc]`
    pub fn intro_i32(&mut self, n: i32) {
        if self.has_error() {
            return;
        }
        self.intro_r(Value::from_int(n as i64));
    }

    /// Push a 64-bit integer; values past the small range latch
    /// `Unimplemented`. `[alloc]`
    pub fn intro_i64(&mut self, n: i64) {
        if self.has_error() {
            return;
        }
        if !(SMALLINT_MIN..=SMALLINT_MAX).contains(&n) {
            self.latch(ErrorCode::Unimplemented);
            return;
        }
        self.intro_r(Value::from_int(n));
    }

    /// Read the top integer without consuming it. Peeks go by shape
    /// alone, so they stay usable after an error latches.
    pub fn peek_i64(&self) -> Result<i64, ErrorCode> {
        if !self.val.is_pair() {
            return Err(ErrorCode::TypeMismatch);
        }
        let v = self.head(self.val);
        if !v.is_int() {
            return Err(ErrorCode::TypeMismatch);
        }
        Ok(v.to_int())
    }

    /// Read the top integer as an `i32`; values that do not fit report
    /// the big-integer reservation.
    pub fn peek_i32(&self) -> Result<i32, ErrorCode> {
        let i = self.peek_i64()?;
        i32::try_from(i).map_err(|_| ErrorCode::Unimplemented)
    }

    /// Read the top integer as its decimal string.
    pub fn peek_istr(&self) -> Result<String, ErrorCode> {
        Ok(self.peek_i64()?.to_string())
    }

    /// Push an integer given as decimal text, `0 | (-)?[1-9][0-9]*`.
    /// Malformed text latches `InvalidArgument`; more than 18 digits is
    /// reserved for big integers. `[alloc]`
    pub fn intro_istr(&mut self, s: &str) {
        if self.has_error() {
            return;
        }
        let Some(digits) = valid_istr(s) else {
            self.latch(ErrorCode::InvalidArgument);
            return;
        };
        if digits > 18 {
            self.latch(ErrorCode::Unimplemented);
            return;
        }
        // 18 digits always fit an i64
        let n: i64 = s.parse().expect("validated decimal literal");
        self.intro_i64(n);
    }

    /* ARITHMETIC */

    /// `(b, (a, e)) → (a + b, e)`
    pub fn int_add(&mut self) {
        if self.has_error() {
            return;
        }
        let Some((outer, inner)) = self.two_ints() else {
            return;
        };
        let sum = self.head(outer).to_int() + self.head(inner).to_int();
        if !(SMALLINT_MIN..=SMALLINT_MAX).contains(&sum) {
            self.latch(ErrorCode::Unimplemented);
            return;
        }
        self.set_head(inner, Value::from_int(sum));
        self.val = inner;
    }

    /// `(b, (a, e)) → (a × b, e)`
    pub fn int_mul(&mut self) {
        if self.has_error() {
            return;
        }
        let Some((outer, inner)) = self.two_ints() else {
            return;
        };
        let a = self.head(outer).to_int();
        let b = self.head(inner).to_int();
        let ok = a
            .checked_mul(b)
            .filter(|p| (SMALLINT_MIN..=SMALLINT_MAX).contains(p));
        let Some(prod) = ok else {
            self.latch(ErrorCode::Unimplemented);
            return;
        };
        self.set_head(inner, Value::from_int(prod));
        self.val = inner;
    }

    /// `(a, e) → (−a, e)`. Negation is closed over the small range.
    pub fn int_neg(&mut self) {
        if self.has_error() {
            return;
        }
        if self.val.is_pair() {
            let v = self.head(self.val);
            if v.is_int() {
                self.set_head(self.val, Value::from_int(-v.to_int()));
                return;
            }
        }
        self.latch(ErrorCode::TypeMismatch);
    }

    /// `(divisor, (dividend, e)) → (quotient, (remainder, e))`.
    ///
    /// Floored division: the remainder is zero or takes the divisor's
    /// sign. Division by zero latches `DivideByZero`.
    pub fn int_div(&mut self) {
        if self.has_error() {
            return;
        }
        let Some((outer, inner)) = self.two_ints() else {
            return;
        };
        let divisor = self.head(outer).to_int();
        let dividend = self.head(inner).to_int();
        if divisor == 0 {
            self.latch(ErrorCode::DivideByZero);
            return;
        }
        let (q, r) = divmod_floor(dividend, divisor);
        self.set_head(outer, Value::from_int(q));
        self.set_head(inner, Value::from_int(r));
    }

    /// Order the deeper integer against the top: on `(a, (b, e))` this
    /// reports `b.cmp(&a)`, matching introduction order. Non-destructive.
    pub fn int_cmp(&mut self) -> Result<Ordering, ErrorCode> {
        self.status()?;
        let Some((outer, inner)) = self.two_ints() else {
            return Err(ErrorCode::TypeMismatch);
        };
        let a = self.head(outer).to_int();
        let b = self.head(inner).to_int();
        Ok(b.cmp(&a))
    }

    /// Locate `(int, (int, e))`, returning the two spine cells, or latch
    /// `TypeMismatch`.
    fn two_ints(&mut self) -> Option<(Value, Value)> {
        if self.val.is_pair() {
            let outer = self.val;
            let inner = self.tail(outer);
            if inner.is_pair() && self.head(outer).is_int() && self.head(inner).is_int() {
                return Some((outer, inner));
            }
        }
        self.latch(ErrorCode::TypeMismatch);
        None
    }
}

/// Quotient and remainder of floored division; `d` is nonzero.
fn divmod_floor(n: i64, d: i64) -> (i64, i64) {
    let mut q = n / d;
    let mut r = n % d;
    if r != 0 && (r < 0) != (d < 0) {
        r += d;
        q -= 1;
    }
    (q, r)
}

/// Validate a decimal integer literal and count its digits.
fn valid_istr(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let digits = match bytes {
        [b'0'] => 1,
        [b'-', rest @ ..] | rest => match rest {
            [b'1'..=b'9', ..] if rest.iter().all(u8::is_ascii_digit) => rest.len(),
            _ => return None,
        },
    };
    Some(digits)
}
