//! Semi-space compaction and the shared shape walkers.
//!
//! Compaction swaps the semi-spaces and copies the live roots into the
//! fresh half. The copier is iterative: its work stack grows downward
//! from the top of the free region while allocation grows upward, and
//! every pushed entry is one already-allocated slot waiting for its
//! final word, so the two can never collide. The same walkers back the
//! user-level copy, drop, and size primitives.

use crate::consts::*;
use crate::context::Context;
use crate::error::ErrorCode;
use crate::flags::Ss;
use crate::value::{Addr, Value, Word};

/// Memory and collection statistics for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemStats {
    /// Collections performed so far.
    pub gc_cycle_count: u64,
    /// Bytes discarded across all collections.
    pub gc_bytes_collected: u64,
    /// Bytes examined across all collections (kept + discarded).
    pub gc_bytes_processed: u64,
    /// Live volume at the end of the most recent collection.
    pub memory_last_gc: u64,
    /// Live volume right now.
    pub memory_current: u64,
    /// Volume at which the next collection triggers (the active cap).
    pub memory_next_gc: u64,
    /// Size of one semi-space.
    pub memory_maximum: u64,
}

impl Context {
    /// Collect, then check the pending reservation. On success, damp
    /// memory pressure by keeping the cap a bounded multiple of the
    /// largest observed working set, rounded up to a page; the cap is
    /// monotone between collections.
    pub(crate) fn gc_reserve(&mut self, sz: u32) -> bool {
        self.compact();
        if !self.arena.available(sz) {
            self.latch(ErrorCode::ContextFull);
            return false;
        }

        let avail = (self.arena.cap - self.arena.alloc) as u64;
        let inuse = self.largest_size as u64 + sz as u64;
        let oversized = avail / MEM_FACTOR as u64 > inuse;
        let target = self.arena.alloc as u64 + inuse * MEM_FACTOR as u64;
        let page = MEM_PAGE_SIZE as u64;
        let desired = target.div_ceil(page) * page;
        if oversized && desired < self.arena.cap as u64 {
            self.arena.cap = desired as u32;
        }
        true
    }

    fn compact(&mut self) {
        let vol0 = self.arena.volume();
        self.arena.flip();

        let mut ss = Ss::empty();
        self.txn = self.copy_val(self.txn, false, &mut ss);
        self.cc = self.copy_val(self.cc, false, &mut ss);
        self.pc = self.copy_val(self.pc, false, &mut ss);
        self.val = self.copy_val(self.val, false, &mut ss);

        let vol = self.arena.volume();
        debug_assert!(vol <= vol0, "compaction must not grow the live set");

        self.compaction_count += 1;
        self.compaction_size = vol;
        self.bytes_compacted += vol as u64;
        self.bytes_collected += (vol0 - vol) as u64;
        if self.largest_size < vol {
            self.largest_size = vol;
        }
        tracing::debug!(
            id = self.id,
            before = vol0,
            after = vol,
            cycles = self.compaction_count,
            "compacted context arena"
        );
    }

    /* COPY */

    /// Copy a value graph into freshly allocated space and return the
    /// new root. The caller has already reserved at least `vsize` bytes
    /// (or, during compaction, a whole empty semi-space). When `track`
    /// is set, block attributes and pending markers accumulate in `ss`.
    pub(crate) fn copy_val(&mut self, src: Value, track: bool, ss: &mut Ss) -> Value {
        if src.is_shallow() {
            return src;
        }
        let s0 = self.arena.cap;
        let mut sp = s0;
        let root = self.copy_node(src, track, ss, &mut sp);
        self.copy_run(s0, &mut sp, track, ss);
        root
    }

    /// Drain the copy stack down to `s0`, fixing one slot per entry.
    fn copy_run(&mut self, s0: Addr, sp: &mut Addr, track: bool, ss: &mut Ss) {
        while *sp != s0 {
            let slot = self.arena.word(*sp) as Addr;
            *sp += WORD_SIZE;
            let v = Value(self.arena.word(slot));
            let nv = self.copy_node(v, track, ss, sp);
            self.arena.set_word(slot, nv.0);
        }
    }

    /// Copy one node, leaving its children as old-space references in
    /// the fresh slots and pushing those slots for `copy_run`.
    fn copy_node(&mut self, v: Value, track: bool, ss: &mut Ss, sp: &mut Addr) -> Value {
        debug_assert!(!v.is_shallow());

        let push_slot = |arena: &mut crate::memory::Arena, sp: &mut Addr, slot: Addr| {
            if !Value(arena.word(slot)).is_shallow() {
                *sp -= WORD_SIZE;
                arena.set_word(*sp, slot as Word);
            }
        };

        if !v.is_obj() {
            // Pair, in or out of a sum. Spines copy before elements.
            let h = self.head(v);
            let t = self.tail(v);
            let addr = self.alloc_cell(h.0, t.0);
            push_slot(&mut self.arena, sp, addr);
            push_slot(&mut self.arena, sp, addr + WORD_SIZE);
            return Value::tag_addr(v.tag(), addr);
        }

        let otag = self.obj_word(v);
        let inner = self.obj_inner(v);
        match otag & OTAG_MASK {
            OTAG_UTF8 | OTAG_SEAL_SM | OTAG_DEEPSUM => {
                let addr = self.alloc_cell(otag, inner.0);
                push_slot(&mut self.arena, sp, addr + WORD_SIZE);
                Value::tag_addr(TAG_OBJ, addr)
            }
            OTAG_PEND => {
                if track {
                    *ss |= Ss::PEND;
                }
                let addr = self.alloc_cell(otag, inner.0);
                push_slot(&mut self.arena, sp, addr + WORD_SIZE);
                Value::tag_addr(TAG_OBJ, addr)
            }
            OTAG_TRASH | OTAG_BLOCK => {
                if track {
                    ss.capture_block(otag);
                }
                let addr = self.alloc_cell(otag, inner.0);
                push_slot(&mut self.arena, sp, addr + WORD_SIZE);
                Value::tag_addr(TAG_OBJ, addr)
            }
            OTAG_OPVAL => {
                let addr = self.alloc_cell(otag, inner.0);
                if track && otag & OPVAL_LAZYKF != 0 {
                    // Quoted by partial evaluation: the inner value's
                    // substructure stays hidden from this scan.
                    if !inner.is_shallow() {
                        let s1 = *sp;
                        let nv = self.copy_node(inner, false, ss, sp);
                        self.arena.set_word(addr + WORD_SIZE, nv.0);
                        self.copy_run(s1, sp, false, ss);
                    }
                } else {
                    push_slot(&mut self.arena, sp, addr + WORD_SIZE);
                }
                Value::tag_addr(TAG_OBJ, addr)
            }
            OTAG_SEAL => {
                let len = (otag >> 8) as u32;
                let sz = cell_buff(CELL_SIZE + len);
                let addr = self.arena.alloc_r(sz);
                self.arena.copy_bytes(v.addr(), addr, sz as usize);
                push_slot(&mut self.arena, sp, addr + WORD_SIZE);
                Value::tag_addr(TAG_OBJ, addr)
            }
            OTAG_OPTOK => {
                let len = (otag >> 8) as u32;
                let sz = cell_buff(WORD_SIZE + len);
                let addr = self.arena.alloc_r(sz);
                self.arena.copy_bytes(v.addr(), addr, sz as usize);
                Value::tag_addr(TAG_OBJ, addr)
            }
            OTAG_BINARY => {
                let bytect = self.arena.word(v.addr() + 2 * WORD_SIZE) as u32;
                let obuf = self.arena.word(v.addr() + 3 * WORD_SIZE) as Addr;
                let nbuf = self.arena.alloc_r(cell_buff(bytect));
                self.arena.copy_bytes(obuf, nbuf, bytect as usize);

                let hdr = self.arena.alloc_r(2 * CELL_SIZE);
                self.arena.set_word(hdr, otag);
                self.arena.set_word(hdr + WORD_SIZE, inner.0);
                self.arena.set_word(hdr + 2 * WORD_SIZE, bytect as Word);
                self.arena.set_word(hdr + 3 * WORD_SIZE, nbuf as Word);
                push_slot(&mut self.arena, sp, hdr + WORD_SIZE);
                Value::tag_addr(TAG_OBJ, hdr)
            }
            OTAG_ARRAY => {
                let elemct = self.arena.word(v.addr() + 2 * WORD_SIZE) as u32;
                let obuf = self.arena.word(v.addr() + 3 * WORD_SIZE) as Addr;
                let nbuf = self.arena.alloc_r(cell_buff(elemct * WORD_SIZE));
                for i in 0..elemct {
                    let elem = self.arena.word(obuf + i * WORD_SIZE);
                    self.arena.set_word(nbuf + i * WORD_SIZE, elem);
                    push_slot(&mut self.arena, sp, nbuf + i * WORD_SIZE);
                }

                let hdr = self.arena.alloc_r(2 * CELL_SIZE);
                self.arena.set_word(hdr, otag);
                self.arena.set_word(hdr + WORD_SIZE, inner.0);
                self.arena.set_word(hdr + 2 * WORD_SIZE, elemct as Word);
                self.arena.set_word(hdr + 3 * WORD_SIZE, nbuf as Word);
                push_slot(&mut self.arena, sp, hdr + WORD_SIZE);
                Value::tag_addr(TAG_OBJ, hdr)
            }
            otag => panic!("unrecognized object tag {otag:#x} during copy"),
        }
    }

    /* SIZE */

    /// Exact bytes a copy of `v0` would allocate. Walks the same shapes
    /// as the copier; a disagreement between the two is an engine fault
    /// caught by the copy path.
    pub(crate) fn vsize(&mut self, v0: Value) -> u32 {
        if v0.is_shallow() {
            return 0;
        }
        let s0 = self.arena.ssp;
        let mut sp = s0;
        self.arena.set_word(sp, v0.0);
        sp += WORD_SIZE;

        let mut total = 0u32;
        while sp != s0 {
            sp -= WORD_SIZE;
            let v = Value(self.arena.word(sp));

            let mut todo = [None, None];
            if !v.is_obj() {
                total += CELL_SIZE;
                todo = [Some(self.head(v)), Some(self.tail(v))];
            } else {
                let otag = self.obj_word(v);
                let inner = self.obj_inner(v);
                match otag & OTAG_MASK {
                    OTAG_TRASH | OTAG_BLOCK | OTAG_OPVAL | OTAG_UTF8 | OTAG_PEND
                    | OTAG_SEAL_SM | OTAG_DEEPSUM => {
                        total += CELL_SIZE;
                        todo[0] = Some(inner);
                    }
                    OTAG_SEAL => {
                        let len = (otag >> 8) as u32;
                        total += cell_buff(CELL_SIZE + len);
                        todo[0] = Some(inner);
                    }
                    OTAG_OPTOK => {
                        let len = (otag >> 8) as u32;
                        total += cell_buff(WORD_SIZE + len);
                    }
                    OTAG_BINARY => {
                        let bytect = self.arena.word(v.addr() + 2 * WORD_SIZE) as u32;
                        total += 2 * CELL_SIZE + cell_buff(bytect);
                        todo[0] = Some(inner);
                    }
                    OTAG_ARRAY => {
                        let elemct = self.arena.word(v.addr() + 2 * WORD_SIZE) as u32;
                        let buf = self.arena.word(v.addr() + 3 * WORD_SIZE) as Addr;
                        total += 2 * CELL_SIZE + cell_buff(elemct * WORD_SIZE);
                        for i in 0..elemct {
                            let elem = Value(self.arena.word(buf + i * WORD_SIZE));
                            if !elem.is_shallow() {
                                self.arena.set_word(sp, elem.0);
                                sp += WORD_SIZE;
                            }
                        }
                        todo[0] = Some(inner);
                    }
                    otag => panic!("unrecognized object tag {otag:#x} during size walk"),
                }
            }

            for child in todo.into_iter().flatten() {
                if !child.is_shallow() {
                    self.arena.set_word(sp, child.0);
                    sp += WORD_SIZE;
                }
            }
        }
        total
    }

    /* DROP */

    /// Release a value graph. Dropped cells are reclaimed by the next
    /// compaction; this walk only gathers substructure when `track` is
    /// set.
    pub(crate) fn drop_val(&mut self, v0: Value, track: bool, ss: &mut Ss) {
        if v0.is_shallow() {
            return;
        }
        let s0 = self.arena.ssp;
        let mut sp = s0;
        self.arena.set_word(sp, v0.0);
        sp += WORD_SIZE;
        self.drop_run(s0, &mut sp, track, ss);
    }

    fn drop_run(&mut self, s0: Addr, sp: &mut Addr, track: bool, ss: &mut Ss) {
        while *sp != s0 {
            *sp -= WORD_SIZE;
            let v = Value(self.arena.word(*sp));

            let push = |arena: &mut crate::memory::Arena, sp: &mut Addr, c: Value| {
                if !c.is_shallow() {
                    arena.set_word(*sp, c.0);
                    *sp += WORD_SIZE;
                }
            };

            if !v.is_obj() {
                let h = self.head(v);
                let t = self.tail(v);
                push(&mut self.arena, sp, h);
                push(&mut self.arena, sp, t);
                continue;
            }

            let otag = self.obj_word(v);
            let inner = self.obj_inner(v);
            match otag & OTAG_MASK {
                OTAG_SEAL | OTAG_SEAL_SM | OTAG_UTF8 | OTAG_BINARY | OTAG_DEEPSUM => {
                    push(&mut self.arena, sp, inner);
                }
                OTAG_PEND => {
                    if track {
                        *ss |= Ss::PEND;
                    }
                    push(&mut self.arena, sp, inner);
                }
                OTAG_TRASH | OTAG_BLOCK => {
                    if track {
                        ss.capture_block(otag);
                    }
                    push(&mut self.arena, sp, inner);
                }
                OTAG_OPVAL => {
                    if track && otag & OPVAL_LAZYKF != 0 {
                        if !inner.is_shallow() {
                            let s1 = *sp;
                            push(&mut self.arena, sp, inner);
                            self.drop_run(s1, sp, false, ss);
                        }
                    } else {
                        push(&mut self.arena, sp, inner);
                    }
                }
                OTAG_OPTOK => {}
                OTAG_ARRAY => {
                    let elemct = self.arena.word(v.addr() + 2 * WORD_SIZE) as u32;
                    let buf = self.arena.word(v.addr() + 3 * WORD_SIZE) as Addr;
                    for i in 0..elemct {
                        let elem = Value(self.arena.word(buf + i * WORD_SIZE));
                        push(&mut self.arena, sp, elem);
                    }
                    push(&mut self.arena, sp, inner);
                }
                otag => panic!("unrecognized object tag {otag:#x} during drop"),
            }
        }
    }
}
