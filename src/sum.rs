//! Sum primitives.
//!
//! Sums over pairs and units fold into the value tag; anything else
//! chains through deep-sum wrappers, two path bits per step. Unwrapping
//! a list chunk (`ARRAY`, `BINARY`, `UTF8`) expands one element into a
//! fresh cons cell and retries.

use crate::consts::*;
use crate::error::ErrorCode;
use crate::value::{SumSide, Value, Word, UNIT_INR};
use crate::Context;

impl Context {
    /// Wrap the top value in a sum. Pure tag arithmetic on pairs and
    /// units, a path-bit append on a deep sum with room, and otherwise
    /// `[alloc]` of one wrapper cell.
    pub fn wrap_sum(&mut self, side: SumSide) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        self.wrap_sum_p(side);
    }

    /// Strip one sum wrapper from the top value and report which side it
    /// was in. List chunks expand an element first and retry.
    pub fn unwrap_sum(&mut self) -> Option<SumSide> {
        if self.has_error() {
            return None;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return None;
        }
        self.unwrap_sum_p()
    }

    pub(crate) fn wrap_sum_p(&mut self, side: SumSide) {
        let v = self.head(self.val);
        let step = match side {
            SumSide::Left => 1,
            SumSide::Right => 2,
        };
        match v.tag() {
            TAG_PAIR | TAG_UNIT => {
                self.set_head(self.val, Value(v.0 + step));
            }
            _ => {
                let path_step = match side {
                    SumSide::Left => DEEPSUM_L,
                    SumSide::Right => DEEPSUM_R,
                };
                if self.deepsum_with_room(v) {
                    let otag = self.obj_word(v);
                    let path = (otag >> 8 << 2) | path_step;
                    self.arena.set_word(v.addr(), (path << 8) | OTAG_DEEPSUM);
                } else {
                    self.wrap_otag((path_step << 8) | OTAG_DEEPSUM);
                }
            }
        }
    }

    pub(crate) fn unwrap_sum_p(&mut self) -> Option<SumSide> {
        loop {
            if self.has_error() {
                return None;
            }
            let v = self.head(self.val);
            match v.tag() {
                TAG_PAIR_L | TAG_UNIT_L => {
                    self.set_head(self.val, Value(v.0 - 1));
                    return Some(SumSide::Left);
                }
                TAG_PAIR_R | TAG_UNIT_R => {
                    self.set_head(self.val, Value(v.0 - 2));
                    return Some(SumSide::Right);
                }
                TAG_OBJ => {
                    let otag = self.obj_word(v);
                    if otag & OTAG_MASK == OTAG_DEEPSUM {
                        let path = otag >> 8;
                        let side = if path & 0b11 == DEEPSUM_L {
                            SumSide::Left
                        } else {
                            SumSide::Right
                        };
                        let rest = path >> 2;
                        if rest == 0 {
                            // wrapper exhausted; the cell is garbage now
                            let inner = self.obj_inner(v);
                            self.set_head(self.val, inner);
                        } else {
                            self.arena.set_word(v.addr(), (rest << 8) | OTAG_DEEPSUM);
                        }
                        return Some(side);
                    }
                    // a list chunk, perhaps; pull one element and retry
                    self.expand_sum_p();
                }
                _ => {
                    self.latch(ErrorCode::TypeMismatch);
                    return None;
                }
            }
        }
    }

    fn deepsum_with_room(&self, v: Value) -> bool {
        if !v.is_obj() {
            return false;
        }
        let otag = self.obj_word(v);
        otag & OTAG_MASK == OTAG_DEEPSUM && otag < (Word::MAX >> 2)
    }

    /// Expand one element of a compact list chunk into a cons cell.
    fn expand_sum_p(&mut self) {
        if !self.reserve(CELL_SIZE) {
            return;
        }

        // the reservation may have compacted; re-read everything
        let v = self.head(self.val);
        if !v.is_obj() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        let addr = v.addr();
        let otag = self.obj_word(v);
        match otag & OTAG_MASK {
            OTAG_ARRAY => {
                let next = self.arena.word(addr + WORD_SIZE);
                let elemct = self.arena.word(addr + 2 * WORD_SIZE);
                let buf = self.arena.word(addr + 3 * WORD_SIZE) as u32;
                let hd = self.arena.word(buf);
                self.arena.set_word(addr + 2 * WORD_SIZE, elemct - 1);
                self.arena.set_word(addr + 3 * WORD_SIZE, (buf + WORD_SIZE) as Word);
                let tl = if elemct == 1 { next } else { v.0 };
                let cell = self.alloc_cell(hd, tl);
                self.set_head(self.val, Value::tag_addr(TAG_PAIR_L, cell));
            }
            OTAG_BINARY => {
                let next = self.arena.word(addr + WORD_SIZE);
                let bytect = self.arena.word(addr + 2 * WORD_SIZE);
                let buf = self.arena.word(addr + 3 * WORD_SIZE) as u32;
                let byte = self.arena.bytes(buf, 1)[0];
                self.arena.set_word(addr + 2 * WORD_SIZE, bytect - 1);
                self.arena.set_word(addr + 3 * WORD_SIZE, (buf + 1) as Word);
                let hd = Value::from_int(byte as i64);
                let tl = if bytect == 1 { next } else { v.0 };
                let cell = self.alloc_cell(hd.0, tl);
                self.set_head(self.val, Value::tag_addr(TAG_PAIR_L, cell));
            }
            OTAG_UTF8 => {
                // Strip the text tag, pull one codepoint off the binary,
                // then rebuild `(cp : text-of-rest)`.
                let inner = self.obj_inner(v);
                self.set_head(self.val, inner);

                let mut buf = [0u8; UTF8_MAX_CP_SIZE];
                if self.read_binary(&mut buf[..1]) == 0 {
                    return;
                }
                let need = utf8_seq_len(buf[0]);
                if need > 1 {
                    let got = self.read_binary(&mut buf[1..need]);
                    if got != need - 1 && !self.has_error() {
                        self.latch(ErrorCode::TypeMismatch);
                    }
                }
                if self.has_error() {
                    return;
                }
                let cp = match core::str::from_utf8(&buf[..need]) {
                    Ok(s) => s.chars().next().expect("nonempty utf-8 run"),
                    Err(_) => {
                        self.latch(ErrorCode::TypeMismatch);
                        return;
                    }
                };

                self.wrap_otag(OTAG_UTF8);
                self.intro_i32(cp as i32);
                self.cons();
            }
            _ => self.latch(ErrorCode::TypeMismatch),
        }
    }

    /* SUM REWRITES */

    /// `(a + (b + c)) → (b + (a + c))`
    pub fn sum_wswap(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        self.sum_wswap_p();
    }

    fn sum_wswap_p(&mut self) {
        match self.unwrap_sum_p() {
            Some(SumSide::Left) => {
                self.wrap_sum_p(SumSide::Left);
                self.wrap_sum_p(SumSide::Right);
            }
            Some(SumSide::Right) => match self.unwrap_sum_p() {
                Some(SumSide::Left) => self.wrap_sum_p(SumSide::Left),
                Some(SumSide::Right) => {
                    self.wrap_sum_p(SumSide::Right);
                    self.wrap_sum_p(SumSide::Right);
                }
                None => {}
            },
            None => {}
        }
    }

    /// `(a + (b + (c + d))) → (a + (c + (b + d)))`
    pub fn sum_zswap(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        let Some(side) = self.unwrap_sum_p() else {
            return;
        };
        if side == SumSide::Right {
            self.sum_wswap_p();
        }
        self.wrap_sum_p(side);
    }

    /// `(a + (b + c)) → ((a + b) + c)`
    pub fn sum_assocl(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        match self.unwrap_sum_p() {
            Some(SumSide::Left) => {
                self.wrap_sum_p(SumSide::Left);
                self.wrap_sum_p(SumSide::Left);
            }
            Some(SumSide::Right) => {
                let b_c = self.unwrap_sum_p();
                self.wrap_sum_p(SumSide::Right);
                if b_c == Some(SumSide::Left) {
                    self.wrap_sum_p(SumSide::Left);
                }
            }
            None => {}
        }
    }

    /// `((a + b) + c) → (a + (b + c))`
    pub fn sum_assocr(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        match self.unwrap_sum_p() {
            Some(SumSide::Right) => {
                self.wrap_sum_p(SumSide::Right);
                self.wrap_sum_p(SumSide::Right);
            }
            Some(SumSide::Left) => {
                let a_b = self.unwrap_sum_p();
                self.wrap_sum_p(SumSide::Left);
                if a_b == Some(SumSide::Right) {
                    self.wrap_sum_p(SumSide::Right);
                }
            }
            None => {}
        }
    }

    /// `(a + b) → (b + a)`
    pub fn sum_swap(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        match self.unwrap_sum_p() {
            Some(SumSide::Left) => self.wrap_sum_p(SumSide::Right),
            Some(SumSide::Right) => self.wrap_sum_p(SumSide::Left),
            None => {}
        }
    }

    /// `(a, (b + c, e)) → ((a, b) + (a, c), e)`
    pub fn distrib(&mut self) {
        if self.has_error() {
            return;
        }
        self.wswap();
        let Some(side) = self.unwrap_sum() else {
            return;
        };
        self.wswap();
        self.assocl();
        self.wrap_sum(side);
    }

    /// `((a, b) + (c, d), e) → (a + c, (b + d, e))`
    pub fn factor(&mut self) {
        if self.has_error() {
            return;
        }
        let Some(side) = self.unwrap_sum() else {
            return;
        };
        self.assocr();
        self.wswap();
        self.wrap_sum(side);
        self.wswap();
        self.wrap_sum(side);
    }

    /// Whether the top of the stack is the end-of-list marker, without
    /// disturbing anything.
    pub(crate) fn top_is_list_end(&self) -> bool {
        self.val.is_pair() && self.head(self.val) == UNIT_INR
    }
}

/// Bytes in the UTF-8 sequence starting with `b0`.
pub(crate) fn utf8_seq_len(b0: u8) -> usize {
    match b0 {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}
