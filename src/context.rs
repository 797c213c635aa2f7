//! Single-threaded evaluation contexts.
//!
//! A context owns one arena plus the root registers: `val` (the public
//! value stack, a right-nested product spine), `pc` and `cc` (reserved
//! for the evaluator), and `txn` (an opaque root for the transaction
//! subsystem). A sticky error register latches the first failure;
//! after that, public mutators are no-ops until [`Context::reset`].

use std::sync::Arc;

use crate::consts::*;
use crate::env::EnvShared;
use crate::error::ErrorCode;
use crate::flags::Ss;
use crate::gc::MemStats;
use crate::memory::Arena;
use crate::value::{Addr, Value, ValueType, Word, NORMAL_TRASH, UNIT, UNIT_INR};

/// A single-threaded value-engine context.
#[derive(Debug)]
pub struct Context {
    pub(crate) arena: Arena,
    /// The public value stack.
    pub(crate) val: Value,
    /// Current program; reserved for the evaluator.
    pub(crate) pc: Value,
    /// Continuation stack; reserved for the evaluator.
    pub(crate) cc: Value,
    /// Transaction state; opaque root.
    pub(crate) txn: Value,
    pub(crate) ecode: Option<ErrorCode>,
    pub(crate) compaction_count: u64,
    pub(crate) compaction_size: u32,
    pub(crate) bytes_compacted: u64,
    pub(crate) bytes_collected: u64,
    pub(crate) largest_size: u32,
    pub(crate) env: Arc<EnvShared>,
    pub(crate) id: u64,
}

impl Context {
    pub(crate) fn build(env: Arc<EnvShared>, id: u64, size_mb: u32) -> Result<Context, ErrorCode> {
        let total = (size_mb as u64) << 20;
        if total > u32::MAX as u64 {
            return Err(ErrorCode::InvalidArgument);
        }
        let arena = Arena::new(total as u32).ok_or(ErrorCode::OutOfMemory)?;
        tracing::debug!(id, size_mb, "created context");
        Ok(Context {
            arena,
            val: UNIT,
            pc: UNIT_INR,
            cc: UNIT_INR,
            txn: UNIT,
            ecode: None,
            compaction_count: 0,
            compaction_size: 0,
            bytes_compacted: 0,
            bytes_collected: 0,
            largest_size: 0,
            env,
            id,
        })
    }

    /* ERROR REGISTER */

    /// The latched error code, if any.
    pub fn error(&self) -> Option<ErrorCode> {
        self.ecode
    }

    /// Whether an error is latched.
    pub fn has_error(&self) -> bool {
        self.ecode.is_some()
    }

    /// `Ok` while no error is latched.
    pub fn status(&self) -> Result<(), ErrorCode> {
        match self.ecode {
            None => Ok(()),
            Some(code) => Err(code),
        }
    }

    /// Latch an error. Only the first code sticks.
    pub(crate) fn latch(&mut self, code: ErrorCode) {
        if self.ecode.is_none() {
            tracing::trace!(id = self.id, ?code, "latched context error");
            self.ecode = Some(code);
        }
    }

    /// Drop all roots and clear the error register.
    pub fn reset(&mut self) {
        for reg in [self.txn, self.val, self.cc, self.pc] {
            let mut ss = Ss::empty();
            self.drop_val(reg, false, &mut ss);
        }
        self.txn = UNIT;
        self.val = UNIT;
        self.pc = UNIT_INR;
        self.cc = UNIT_INR;
        self.ecode = None;
    }

    /* ARENA PLUMBING */

    /// Ensure `sz` bytes are allocatable, collecting if needed. On
    /// failure the context is latched `ContextFull`.
    pub(crate) fn reserve(&mut self, sz: u32) -> bool {
        if self.has_error() {
            return false;
        }
        if self.arena.available(sz) {
            return true;
        }
        self.gc_reserve(sz)
    }

    /// Allocate one cell holding two words.
    pub(crate) fn alloc_cell(&mut self, w0: Word, w1: Word) -> Addr {
        let addr = self.arena.alloc_r(CELL_SIZE);
        self.arena.set_word(addr, w0);
        self.arena.set_word(addr + WORD_SIZE, w1);
        addr
    }

    /// Head slot of the cell behind a pair value.
    pub(crate) fn head(&self, v: Value) -> Value {
        Value(self.arena.word(v.addr()))
    }

    /// Tail slot of the cell behind a pair value.
    pub(crate) fn tail(&self, v: Value) -> Value {
        Value(self.arena.word(v.addr() + WORD_SIZE))
    }

    pub(crate) fn set_head(&mut self, v: Value, w: Value) {
        self.arena.set_word(v.addr(), w.0);
    }

    pub(crate) fn set_tail(&mut self, v: Value, w: Value) {
        self.arena.set_word(v.addr() + WORD_SIZE, w.0);
    }

    /// Header word of a boxed object.
    pub(crate) fn obj_word(&self, v: Value) -> Word {
        debug_assert!(v.is_obj());
        self.arena.word(v.addr())
    }

    /// Inner value of a `[tag, inner]` shaped object.
    pub(crate) fn obj_inner(&self, v: Value) -> Value {
        Value(self.arena.word(v.addr() + WORD_SIZE))
    }

    /// Push a value onto the stack: `e → (v, e)`. `[alloc]`
    pub(crate) fn intro_r(&mut self, v: Value) {
        if !self.reserve(CELL_SIZE) {
            return;
        }
        let addr = self.alloc_cell(v.0, self.val.0);
        self.val = Value::tag_addr(TAG_PAIR, addr);
    }

    /// Wrap the top of the stack in a `[otag, inner]` object. `[alloc]`
    pub(crate) fn wrap_otag(&mut self, otag: Word) {
        if !self.reserve(CELL_SIZE) {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        let inner = self.head(self.val);
        let addr = self.alloc_cell(otag, inner.0);
        self.set_head(self.val, Value::tag_addr(TAG_OBJ, addr));
    }

    /* COPY, DROP, TRASH */

    /// Structural copy of the top value: `(a, e) → (a, (a, e))`.
    ///
    /// Copying a value that reaches an affine block performs the copy
    /// and *then* latches `TypeMismatch`; the scan and the copy are one
    /// pass. `[alloc]`
    pub fn copy(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }

        // Worst case, the whole live volume plus the cell intro_r needs.
        let max_alloc = CELL_SIZE + self.arena.volume();
        let bypass = ALLOW_SIZE_BYPASS && self.arena.available(max_alloc);
        let est = if bypass {
            0
        } else {
            CELL_SIZE + self.vsize(self.head(self.val))
        };
        if !self.reserve(est) {
            return;
        }

        // The reservation may have compacted; re-read the source now.
        let vol0 = self.arena.volume();
        let src = self.head(self.val);
        let mut ss = Ss::empty();
        let dst = self.copy_val(src, true, &mut ss);
        self.intro_r(dst);
        let actual = self.arena.volume() - vol0;

        if !bypass && est != actual {
            panic!("copy size estimate mismatch: estimated {est}, allocated {actual}");
        }
        if !ss.copyable() {
            self.latch(ErrorCode::TypeMismatch);
        }
    }

    /// Drop the top value: `(a, e) → e`.
    ///
    /// Dropping a value that reaches a relevant block performs the drop
    /// and then latches `TypeMismatch`.
    pub fn drop_top(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        let dropped = self.head(self.val);
        self.val = self.tail(self.val);
        let mut ss = Ss::empty();
        self.drop_val(dropped, true, &mut ss);
        if !ss.droppable() {
            self.latch(ErrorCode::TypeMismatch);
        }
    }

    /// Drop the top value without substructure tracking and without
    /// consulting the error latch. Cleanup paths (parser failure, reset)
    /// use this to restore the caller's stack shape.
    pub(crate) fn drop_top_raw(&mut self) {
        if !self.val.is_pair() {
            return;
        }
        let dropped = self.head(self.val);
        self.val = self.tail(self.val);
        let mut ss = Ss::empty();
        self.drop_val(dropped, false, &mut ss);
    }

    /// Erase the top value, keeping only its substructure: affine or
    /// relevant contents leave a flagged trash object, anything else the
    /// plain trash sentinel. `[alloc]`
    pub fn trash(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        let erased = self.head(self.val);
        let mut ss = Ss::empty();
        self.drop_val(erased, true, &mut ss);
        if ss.is_empty() {
            self.set_head(self.val, NORMAL_TRASH);
        } else {
            self.set_head(self.val, UNIT_INR);
            self.wrap_otag(OTAG_TRASH | ss.to_block_attrs());
        }
    }

    /* PEEKS */

    /// Classify the top of the stack without consuming it.
    pub fn peek_type(&self) -> ValueType {
        if self.has_error() || !self.val.is_pair() {
            return ValueType::Undefined;
        }
        let v = self.head(self.val);
        match v.tag() {
            TAG_UNIT => match v {
                UNIT => ValueType::Unit,
                NORMAL_TRASH => ValueType::Trash,
                other => panic!("unrecognized unit-tagged constant {:#x}", other.0),
            },
            TAG_PAIR => ValueType::Product,
            TAG_PAIR_L | TAG_PAIR_R | TAG_UNIT_L | TAG_UNIT_R => ValueType::Sum,
            TAG_INT => ValueType::Int,
            TAG_OBJ => match self.obj_word(v) & OTAG_MASK {
                OTAG_ARRAY | OTAG_BINARY | OTAG_UTF8 | OTAG_DEEPSUM => ValueType::Sum,
                OTAG_BLOCK => ValueType::Block,
                OTAG_SEAL | OTAG_SEAL_SM => ValueType::Seal,
                OTAG_TRASH => ValueType::Trash,
                OTAG_PEND => ValueType::Future,
                otag => panic!("unrecognized object tag {otag:#x}"),
            },
            _ => unreachable!(),
        }
    }

    /// Exact bytes a copy of the top value would allocate, including the
    /// stack cell. Zero when the stack is empty.
    pub fn peek_size(&mut self) -> u32 {
        if !self.val.is_pair() {
            return 0;
        }
        CELL_SIZE + self.vsize(self.head(self.val))
    }

    /// Force one compaction.
    pub fn gc(&mut self) {
        if self.has_error() {
            return;
        }
        self.gc_reserve(0);
    }

    /// Memory and collection statistics.
    pub fn mem_stats(&self) -> MemStats {
        MemStats {
            gc_cycle_count: self.compaction_count,
            gc_bytes_collected: self.bytes_collected,
            gc_bytes_processed: self.bytes_compacted + self.bytes_collected,
            memory_last_gc: self.compaction_size as u64,
            memory_current: self.arena.volume() as u64,
            memory_next_gc: (self.arena.cap - self.arena.mem) as u64,
            memory_maximum: self.arena.half() as u64,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.env.forget(self.id);
        tracing::debug!(id = self.id, "destroyed context");
    }
}
