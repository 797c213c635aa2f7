//! Product primitives over the value stack.
//!
//! The associators re-thread the head/tail slots of the two spine cells
//! involved; no product primitive allocates except `intro_unit`.

use crate::consts::*;
use crate::error::ErrorCode;
use crate::value::{Value, UNIT, UNIT_INR};
use crate::Context;

impl Context {
    /// `e → (unit, e)` `[alloc]`
    pub fn intro_unit(&mut self) {
        if self.has_error() {
            return;
        }
        self.intro_r(UNIT);
    }

    /// `(unit, e) → e`
    pub fn elim_unit(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() || self.head(self.val) != UNIT {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        self.val = self.tail(self.val);
    }

    /// `(a, (b, c)) → (b, (a, c))`
    pub fn wswap(&mut self) {
        if self.has_error() {
            return;
        }
        self.wswap_v(self.val);
    }

    /// `(a, (b, (c, d))) → (a, (c, (b, d)))`
    pub fn zswap(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        self.wswap_v(self.tail(self.val));
    }

    /// `(a, (b, c)) → ((a, b), c)`
    pub fn assocl(&mut self) {
        if self.has_error() {
            return;
        }
        self.assocl_v(self.val);
    }

    /// `((a, b), c) → (a, (b, c))`
    pub fn assocr(&mut self) {
        if self.has_error() {
            return;
        }
        self.assocr_v(self.val);
    }

    /// `(a, b) → (b, a)`
    pub fn swap(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        let addr = self.val.addr();
        self.arena.swap_words(addr, addr + WORD_SIZE);
    }

    fn wswap_v(&mut self, abc: Value) {
        if abc.is_pair() {
            let bc = self.tail(abc);
            if bc.is_pair() {
                self.arena.swap_words(abc.addr(), bc.addr());
                return;
            }
        }
        self.latch(ErrorCode::TypeMismatch);
    }

    fn assocl_v(&mut self, a_bc: Value) {
        if a_bc.is_pair() {
            let bc = self.tail(a_bc);
            if bc.is_pair() {
                // (a, (b, c)): the outer cell becomes ((a, b), c) by
                // rotating the four slots through the inner cell.
                let a = self.head(a_bc);
                let b = self.head(bc);
                let c = self.tail(bc);
                self.set_head(a_bc, bc);
                self.set_tail(a_bc, c);
                self.set_head(bc, a);
                self.set_tail(bc, b);
                return;
            }
        }
        self.latch(ErrorCode::TypeMismatch);
    }

    fn assocr_v(&mut self, ab_c: Value) {
        if ab_c.is_pair() {
            let ab = self.head(ab_c);
            if ab.is_pair() {
                let a = self.head(ab);
                let b = self.tail(ab);
                let c = self.tail(ab_c);
                self.set_head(ab_c, a);
                self.set_tail(ab_c, ab);
                self.set_head(ab, b);
                self.set_tail(ab, c);
                return;
            }
        }
        self.latch(ErrorCode::TypeMismatch);
    }

    /* LIST HELPERS */

    /// `(elem, (list, e)) → (elem:list, e)`. The fresh pair takes the
    /// shallow sum tag, so cons never allocates.
    pub(crate) fn cons(&mut self) {
        if self.has_error() {
            return;
        }
        self.assocl();
        self.wrap_sum(crate::value::SumSide::Left);
    }

    /// Push an empty list. `[alloc]`
    pub(crate) fn intro_empty_list(&mut self) {
        if self.has_error() {
            return;
        }
        self.intro_r(UNIT_INR);
    }

    /// `(end-of-list, e) → e`. Goes through sum unwrapping so exhausted
    /// chunk lists (an emptied text, say) count as the terminator.
    pub(crate) fn elim_list_end(&mut self) {
        match self.unwrap_sum() {
            Some(crate::value::SumSide::Right) => self.elim_unit(),
            Some(crate::value::SumSide::Left) => self.latch(ErrorCode::TypeMismatch),
            None => {}
        }
    }
}
