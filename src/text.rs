//! Binaries and texts: chunked byte lists and streaming readers.
//!
//! A binary is a singly-linked list of `BINARY` chunks ending in the
//! list terminator; a text is a binary wrapped in a `UTF8` marker.
//! Readers stream bytes out destructively, bulk-copying from compact
//! chunk runs and falling back to sum expansion for anything mixed.

use crate::consts::*;
use crate::error::ErrorCode;
use crate::sum::utf8_seq_len;
use crate::value::{SumSide, Value, Word, UNIT_INR};
use crate::Context;

/// Whether `c` may appear in a text value: linefeed, or anything that is
/// not a C0/C1 control character or DEL.
pub fn is_text_char(c: char) -> bool {
    let cp = c as u32;
    c == '\n' || !(cp < 0x20 || cp == 0x7F || (0x80..=0x9F).contains(&cp))
}

impl Context {
    /// Push a binary as a single chunk. `[alloc]`
    pub fn intro_binary(&mut self, data: &[u8]) {
        if self.has_error() {
            return;
        }
        if data.len() as u64 >= self.arena.half() as u64 {
            self.latch(ErrorCode::ContextFull);
            return;
        }
        let sz_buff = cell_buff(data.len() as u32);
        if !self.reserve(3 * CELL_SIZE + sz_buff) {
            return;
        }
        if data.is_empty() {
            self.intro_r(UNIT_INR);
            return;
        }

        let buf = self.arena.alloc_r(sz_buff);
        self.arena.set_bytes(buf, data);
        let hdr = self.arena.alloc_r(2 * CELL_SIZE);
        self.arena.set_word(hdr, OTAG_BINARY);
        self.arena.set_word(hdr + WORD_SIZE, UNIT_INR.0);
        self.arena.set_word(hdr + 2 * WORD_SIZE, data.len() as Word);
        self.arena.set_word(hdr + 3 * WORD_SIZE, buf as Word);
        self.intro_r(Value::tag_addr(TAG_OBJ, hdr));
    }

    /// Push a text after validating its characters. `[alloc]`
    pub fn intro_text(&mut self, s: &str) {
        if self.has_error() {
            return;
        }
        if !s.chars().all(is_text_char) {
            self.latch(ErrorCode::InvalidArgument);
            return;
        }
        self.intro_binary(s.as_bytes());
        self.wrap_otag(OTAG_UTF8);
    }

    /// Prepend one chunk to the binary-chunk list on top. `[alloc]`
    pub(crate) fn cons_binary_chunk(&mut self, bytes: &[u8]) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        if bytes.is_empty() {
            return;
        }

        let sz_buff = cell_buff(bytes.len() as u32);
        if !self.reserve(sz_buff + 2 * CELL_SIZE) {
            return;
        }
        let buf = self.arena.alloc_r(sz_buff);
        self.arena.set_bytes(buf, bytes);
        let hdr = self.arena.alloc_r(2 * CELL_SIZE);
        let next = self.head(self.val);
        self.arena.set_word(hdr, OTAG_BINARY);
        self.arena.set_word(hdr + WORD_SIZE, next.0);
        self.arena.set_word(hdr + 2 * WORD_SIZE, bytes.len() as Word);
        self.arena.set_word(hdr + 3 * WORD_SIZE, buf as Word);
        self.set_head(self.val, Value::tag_addr(TAG_OBJ, hdr));
    }

    /// Reverse the chunk list on top in place. Non-allocating.
    pub(crate) fn reverse_binary_chunks(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        let mut hd = self.head(self.val);
        let mut rev = UNIT_INR;
        while hd != UNIT_INR {
            debug_assert!(self.is_compact_binary(hd));
            let next = self.obj_inner(hd);
            self.arena.set_word(hd.addr() + WORD_SIZE, rev.0);
            rev = hd;
            hd = next;
        }
        self.set_head(self.val, rev);
    }

    /// Every node a `BINARY` chunk, terminated by the list end.
    pub(crate) fn is_compact_binary(&self, mut v: Value) -> bool {
        while v.is_obj() {
            if self.obj_word(v) & OTAG_MASK != OTAG_BINARY {
                return false;
            }
            v = self.obj_inner(v);
        }
        v == UNIT_INR
    }

    /// A `UTF8` wrapper around anything.
    pub(crate) fn is_utf8(&self, v: Value) -> bool {
        v.is_obj() && self.obj_word(v) & OTAG_MASK == OTAG_UTF8
    }

    /// Stream bytes out of the binary on top of the stack into `buf`,
    /// consuming them. Returns how many bytes were written; fewer than
    /// `buf.len()` means the binary ended. Mixed list nodes are forced
    /// through sum expansion; non-byte content latches `TypeMismatch`.
    pub fn read_binary(&mut self, buf: &mut [u8]) -> usize {
        if self.has_error() {
            return 0;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return 0;
        }

        let mut n = 0;
        loop {
            let v = self.head(self.val);
            if v.is_pair_l() {
                let hd = self.head(v);
                let ok = hd.is_int() && (0..=255).contains(&hd.to_int());
                if !ok {
                    self.latch(ErrorCode::TypeMismatch);
                    return n;
                }
                if n == buf.len() {
                    return n;
                }
                buf[n] = hd.to_int() as u8;
                n += 1;
                let tl = self.tail(v);
                self.set_head(self.val, tl);
            } else if self.is_compact_binary(v) {
                let addr = v.addr();
                let size = self.arena.word(addr + 2 * WORD_SIZE) as usize;
                let src = self.arena.word(addr + 3 * WORD_SIZE) as u32;
                let room = buf.len() - n;
                let take = size.min(room);
                buf[n..n + take].copy_from_slice(self.arena.bytes(src, take));
                n += take;
                if take < size {
                    // buffer full; shrink the chunk in place
                    self.arena.set_word(addr + 2 * WORD_SIZE, (size - take) as Word);
                    self.arena.set_word(addr + 3 * WORD_SIZE, (src + take as u32) as Word);
                    return n;
                }
                let next = self.obj_inner(v);
                self.set_head(self.val, next);
            } else {
                let Some(side) = self.unwrap_sum_p() else {
                    return n;
                };
                self.wrap_sum_p(side);
                if side == SumSide::Right {
                    return n;
                }
                if !self.head(self.val).is_pair_l() {
                    self.latch(ErrorCode::TypeMismatch);
                    return n;
                }
            }
        }
    }

    /// Stream UTF-8 bytes out of the text on top into `buf`, consuming
    /// whole codepoints only; an incomplete trailing sequence is pushed
    /// back onto the remaining text.
    pub fn read_text(&mut self, buf: &mut [u8]) -> usize {
        if self.has_error() {
            return 0;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return 0;
        }

        let mut n = 0;
        loop {
            let v = self.head(self.val);
            if v.is_pair_l() {
                let hd = self.head(v);
                let cp_ok = hd.is_int()
                    && u32::try_from(hd.to_int()).ok().and_then(char::from_u32).is_some_and(is_text_char);
                if !cp_ok {
                    self.latch(ErrorCode::TypeMismatch);
                    return n;
                }
                let c = char::from_u32(hd.to_int() as u32).expect("checked codepoint");
                if n + c.len_utf8() > buf.len() {
                    return n;
                }
                c.encode_utf8(&mut buf[n..]);
                n += c.len_utf8();
                let tl = self.tail(v);
                self.set_head(self.val, tl);
            } else if self.is_utf8(v) {
                // drop the text marker, bulk-read the binary underneath
                let inner = self.obj_inner(v);
                self.set_head(self.val, inner);
                let got = self.read_binary(&mut buf[n..]);
                n += got;
                n -= self.putback_incomplete_utf8(&buf[..n]);
                self.wrap_otag(OTAG_UTF8);
                return n;
            } else {
                let Some(side) = self.unwrap_sum_p() else {
                    return n;
                };
                self.wrap_sum_p(side);
                if side == SumSide::Right {
                    return n;
                }
                if !self.head(self.val).is_pair_l() {
                    self.latch(ErrorCode::TypeMismatch);
                    return n;
                }
            }
        }
    }

    /// If `out` ends mid-codepoint, push the partial bytes back onto the
    /// list on top (deepest byte last) and return how many were removed.
    fn putback_incomplete_utf8(&mut self, out: &[u8]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let mut start = out.len() - 1;
        while start > 0 && out[start] & 0xC0 == 0x80 {
            start -= 1;
        }
        if start + utf8_seq_len(out[start]) == out.len() {
            return 0;
        }

        for &b in out[start..].iter().rev() {
            self.intro_i32(b as i32);
            self.cons();
        }
        out.len() - start
    }

    /// Rebuild the binary on top as a compact chunk list. `[alloc]`
    pub fn compact_binary(&mut self) {
        if self.has_error() {
            return;
        }
        let mut buf = vec![0u8; COMPACT_READ_SIZE];
        self.intro_empty_list();
        self.wswap();
        loop {
            let n = self.read_binary(&mut buf);
            if n == 0 {
                break;
            }
            self.wswap();
            self.cons_binary_chunk(&buf[..n]);
            self.wswap();
        }
        self.elim_list_end();
        self.reverse_binary_chunks();
    }

    /// Rebuild the text on top as a compact chunk list under one `UTF8`
    /// marker. `[alloc]`
    pub fn compact_text(&mut self) {
        if self.has_error() {
            return;
        }
        let mut buf = vec![0u8; COMPACT_READ_SIZE];
        self.intro_empty_list();
        self.wswap();
        loop {
            let n = self.read_text(&mut buf);
            if n == 0 {
                break;
            }
            self.wswap();
            self.cons_binary_chunk(&buf[..n]);
            self.wswap();
        }
        self.elim_list_end();
        self.reverse_binary_chunks();
        self.wrap_otag(OTAG_UTF8);
    }

    /// Compact the binary on top unless it already is.
    pub fn anno_binary(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        if !self.is_compact_binary(self.head(self.val)) {
            self.compact_binary();
        }
    }

    /// Compact the text on top unless it already carries the marker.
    pub fn anno_text(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        if !self.is_utf8(self.head(self.val)) {
            self.compact_text();
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Context {
    /// Push a list of small integers stored as one `ARRAY` chunk.
    pub fn intro_int_array(&mut self, elems: &[i64]) {
        if self.has_error() {
            return;
        }
        if elems.iter().any(|i| !(SMALLINT_MIN..=SMALLINT_MAX).contains(i)) {
            self.latch(ErrorCode::InvalidArgument);
            return;
        }
        let sz_buff = cell_buff(elems.len() as u32 * WORD_SIZE);
        if !self.reserve(3 * CELL_SIZE + sz_buff) {
            return;
        }
        if elems.is_empty() {
            self.intro_r(UNIT_INR);
            return;
        }

        let buf = self.arena.alloc_r(sz_buff);
        for (i, &e) in elems.iter().enumerate() {
            self.arena.set_word(buf + i as u32 * WORD_SIZE, Value::from_int(e).0);
        }
        let hdr = self.arena.alloc_r(2 * CELL_SIZE);
        self.arena.set_word(hdr, OTAG_ARRAY);
        self.arena.set_word(hdr + WORD_SIZE, UNIT_INR.0);
        self.arena.set_word(hdr + 2 * WORD_SIZE, elems.len() as Word);
        self.arena.set_word(hdr + 3 * WORD_SIZE, buf as Word);
        self.intro_r(Value::tag_addr(TAG_OBJ, hdr));
    }

    /// Mark the top value pending, as the evaluator would.
    pub fn wrap_pending(&mut self) {
        if self.has_error() {
            return;
        }
        self.wrap_otag(OTAG_PEND);
    }
}
