//! Blocks: quotation, attributes, and composition.

use crate::consts::*;
use crate::error::ErrorCode;
use crate::flags::BlockAttrs;
use crate::op::Op;
use crate::value::{Addr, Value, Word, UNIT_INR};
use crate::Context;

impl Context {
    /// Quote the top value: `(a, e) → ([a'], e)` where the block holds a
    /// single quoted-value op. One fused three-cell allocation; the
    /// quoted value's substructure stays hidden until the evaluator
    /// observes it. `[alloc]`
    pub fn quote(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.reserve(3 * CELL_SIZE) {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }

        let v = self.head(self.val);
        // (block, ((opval, v) : end))
        let a = self.arena.alloc_r(3 * CELL_SIZE);
        self.arena.set_word(a, OTAG_BLOCK);
        self.arena
            .set_word(a + WORD_SIZE, Value::tag_addr(TAG_PAIR_L, a + CELL_SIZE).0);
        self.arena
            .set_word(a + CELL_SIZE, Value::tag_addr(TAG_OBJ, a + 2 * CELL_SIZE).0);
        self.arena.set_word(a + CELL_SIZE + WORD_SIZE, UNIT_INR.0);
        self.arena.set_word(a + 2 * CELL_SIZE, OTAG_OPVAL | OPVAL_LAZYKF);
        self.arena.set_word(a + 2 * CELL_SIZE + WORD_SIZE, v.0);
        self.set_head(self.val, Value::tag_addr(TAG_OBJ, a));
    }

    /// Push the identity block (no ops). `[alloc]`
    pub fn intro_id_block(&mut self) {
        if self.has_error() {
            return;
        }
        self.intro_empty_list();
        self.wrap_otag(OTAG_BLOCK);
    }

    /// Push one op. `[alloc]`
    pub(crate) fn intro_op(&mut self, op: Op) {
        self.intro_r(op.to_value());
    }

    /// Mark the top block relevant: it may no longer be dropped.
    pub fn block_relevant(&mut self) {
        self.block_attrib(BLOCK_RELEVANT);
    }

    /// Mark the top block affine: it may no longer be copied.
    pub fn block_affine(&mut self) {
        self.block_attrib(BLOCK_AFFINE);
    }

    /// Defer the top block's evaluation until forced.
    pub fn block_lazy(&mut self) {
        self.block_attrib(BLOCK_LAZY);
    }

    /// Mark the top block for parallel evaluation.
    pub fn block_fork(&mut self) {
        self.block_attrib(BLOCK_FORK);
    }

    /// Attributes currently on the top block.
    pub fn peek_block_attrs(&self) -> Result<BlockAttrs, ErrorCode> {
        match self.try_peek_block() {
            Some(hdr) => Ok(BlockAttrs::from_bits_truncate(self.arena.word(hdr))),
            None => Err(ErrorCode::TypeMismatch),
        }
    }

    /// Header address of the block on top, if there is one.
    fn try_peek_block(&self) -> Option<Addr> {
        if self.val.is_pair() {
            let v = self.head(self.val);
            if v.is_obj() && self.obj_word(v) & OTAG_MASK == OTAG_BLOCK {
                return Some(v.addr());
            }
        }
        None
    }

    /// As [`Self::try_peek_block`], latching `TypeMismatch` on failure.
    fn peek_block(&mut self) -> Option<Addr> {
        let hdr = self.try_peek_block();
        if hdr.is_none() {
            self.latch(ErrorCode::TypeMismatch);
        }
        hdr
    }

    fn block_attrib(&mut self, attrib: Word) {
        if self.has_error() {
            return;
        }
        debug_assert_eq!(attrib & OTAG_MASK, 0);
        let Some(hdr) = self.peek_block() else {
            return;
        };

        // Safe attributes are commutative and idempotent, so they OR in.
        // A block carries at most one unsafe attribute directly; a
        // second one hides the first behind a quoted inline call.
        let unsafe_attrs = !(BLOCK_SAFE_ATTRS | OTAG_MASK);
        let word = self.arena.word(hdr);
        if attrib & unsafe_attrs == 0 || word & unsafe_attrs == 0 {
            self.arena.set_word(hdr, word | attrib);
        } else {
            self.block_quote_inline_attrib(attrib);
        }
    }

    /// Rewrite the top block as `[[block] inline]`, the inner quote
    /// carrying `attrib`. `[alloc]`
    pub(crate) fn block_quote_inline_attrib(&mut self, attrib: Word) {
        self.intro_empty_list();
        self.intro_op(Op::Inline);
        self.cons();
        self.wswap();
        self.wrap_otag(OTAG_OPVAL | OPVAL_LAZYKF);
        self.cons();
        self.wrap_otag(OTAG_BLOCK | attrib);
    }

    /// Rewrite the top block as a quoted inline call if it carries any
    /// unsafe attribute, so concatenation stays sound.
    fn hide_block_decorators(&mut self) {
        let unsafe_attrs = !(BLOCK_SAFE_ATTRS | OTAG_MASK);
        let Some(hdr) = self.peek_block() else {
            return;
        };
        if self.arena.word(hdr) & unsafe_attrs != 0 {
            self.block_quote_inline_attrib(0);
        }
    }

    /// Find the slot holding the ops-list terminator of the top block,
    /// walking at most `effort` cons cells.
    fn scan_to_block_end(&mut self, effort: u32) -> Option<Addr> {
        let hdr = self.peek_block()?;
        let mut slot = hdr + WORD_SIZE;
        let mut remaining = effort;
        loop {
            let v = Value(self.arena.word(slot));
            if v.is_pair_l() {
                slot = v.addr() + WORD_SIZE;
            } else if v == UNIT_INR {
                return Some(slot);
            } else {
                panic!("malformed ops list in block (tag {:#x})", v.tag());
            }
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
        }
    }

    /// Compose the two blocks on top: `([a→b], ([b→c], e)) → ([a→c], e)`.
    ///
    /// Small ops lists splice in place; a left operand too large to
    /// probe, or either operand with unsafe attributes, is first
    /// rewritten as a quoted inline call. Substructure unions onto the
    /// result. `[alloc]` only through those rewrites.
    pub fn compose(&mut self) {
        if self.has_error() {
            return;
        }
        self.wswap();
        self.hide_block_decorators();
        self.wswap();
        self.hide_block_decorators();

        let mut end = self.scan_to_block_end(SMALL_FN_LIMIT);
        if end.is_none() && !self.has_error() {
            self.block_quote_inline_attrib(0);
            end = self.scan_to_block_end(u32::MAX);
        }
        if self.has_error() {
            return;
        }
        let end = end.expect("rewritten left operand is two ops long");

        // Splice: the right operand's ops land at the left's terminator,
        // then the merged list moves into the right block's header (the
        // one that survives).
        let outer = self.val;
        let inner = self.tail(outer);
        let fn_ab = self.head(outer).addr();
        let fn_bc = self.head(inner).addr();
        self.arena.swap_words(end, fn_bc + WORD_SIZE);
        self.arena.swap_words(fn_ab + WORD_SIZE, fn_bc + WORD_SIZE);
        let merged = self.arena.word(fn_ab) | self.arena.word(fn_bc);
        self.arena.set_word(fn_bc, merged);
        self.val = inner;
    }

    /// Print the ops of the top block as program text. Only primitive
    /// ops print here; quoted values, tokens, and nested blocks are the
    /// evaluator's concern and report `Unimplemented`. Non-destructive.
    pub fn peek_block_ops(&self) -> Result<String, ErrorCode> {
        let hdr = self.try_peek_block().ok_or(ErrorCode::TypeMismatch)?;
        let mut out = String::new();
        let mut ops = Value(self.arena.word(hdr + WORD_SIZE));
        while ops != UNIT_INR {
            if !ops.is_pair_l() {
                return Err(ErrorCode::TypeMismatch);
            }
            let op = Op::from_value(self.head(ops))
                .and_then(Op::to_char)
                .ok_or(ErrorCode::Unimplemented)?;
            out.push(op);
            ops = self.tail(ops);
        }
        Ok(out)
    }
}
