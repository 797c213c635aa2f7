//! Program text → block values.
//!
//! The parser runs on top of the engine's own primitives: its working
//! state is the register shape `(object, (stack, (text, e)))`, where
//! `object` is the reverse-ordered ops list (or text-chunk accumulator)
//! being built, `stack` is a list of suspended ops lists — one entry per
//! open `[` or unterminated text literal — and `text` is the unread
//! input. Between chunks the text swizzles to the top so the streaming
//! reader can consume it.
//!
//! On any failure, the parser's contract is that only the text argument
//! has been consumed; everything it pushed is dropped again.

use crate::consts::*;
use crate::error::ErrorCode;
use crate::op::Op;
use crate::seal::is_token_char;
use crate::text::is_text_char;
use crate::value::{SumSide, Value, Word, UNIT_INR};
use crate::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between ops.
    Op,
    /// Inside a `"…` text literal.
    Text,
    /// Just after a linefeed inside a text literal.
    TextLf,
    /// Inside a `{token}`.
    Token,
}

#[derive(Debug)]
struct Parser {
    state: State,
    /// Open `[` count.
    depth: u32,
    /// Token or text accumulator, flushed to arena chunks for texts.
    buf: Vec<u8>,
}

impl Parser {
    fn new() -> Parser {
        Parser {
            state: State::Op,
            depth: 0,
            buf: Vec::with_capacity(PARSE_BUFFER_SIZE),
        }
    }
}

impl Context {
    /// Parse the text on top of the stack into a block:
    /// `(text, e) → (block, e)`. On failure only the text is consumed.
    /// `[alloc]`
    pub fn text_to_block(&mut self) {
        if self.has_error() {
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        if !self.reserve(2 * CELL_SIZE) {
            self.drop_top_raw();
            return;
        }
        self.intro_r(UNIT_INR); // suspended-list stack
        self.intro_r(UNIT_INR); // top-level reverse ops list

        let mut p = Parser::new();
        let mut chunk = vec![0u8; PARSE_READ_SIZE];
        loop {
            // (object, (stack, (text, e))) → (text, ((object, stack), e))
            self.assocl();
            self.wswap();
            let n = self.read_text(&mut chunk);
            if self.has_error() {
                // still swizzled; the frame pair drops as one value
                self.drop_top_raw();
                self.drop_top_raw();
                return;
            }
            self.wswap();
            self.assocr();
            if n == 0 {
                return self.fini_parse(&p);
            }
            let Ok(s) = core::str::from_utf8(&chunk[..n]) else {
                self.latch(ErrorCode::TypeMismatch);
                return self.parse_abort();
            };
            for c in s.chars() {
                self.step_parse_char(&mut p, c);
                if self.has_error() {
                    return self.parse_abort();
                }
            }
        }
    }

    fn step_parse_char(&mut self, p: &mut Parser, c: char) {
        match p.state {
            State::Op => {
                // worst case per op: a wrapper cell plus a list cell
                if !self.reserve(2 * CELL_SIZE) {
                    return;
                }
                match c {
                    '[' => {
                        self.push_parse_frame();
                        p.depth += 1;
                    }
                    ']' => {
                        if p.depth < 1 {
                            self.latch(ErrorCode::TypeMismatch);
                            return;
                        }
                        p.depth -= 1;
                        self.reverse_ops_list();
                        self.wrap_otag(OTAG_BLOCK);
                        self.wrap_otag(OTAG_OPVAL | OPVAL_LAZYKF);
                        self.pop_parse_frame();
                    }
                    '{' => {
                        p.buf.clear();
                        p.state = State::Token;
                    }
                    '"' => {
                        self.push_parse_frame();
                        p.buf.clear();
                        p.state = State::Text;
                    }
                    c if (c as u32) < 128 => match Op::from_ascii(c as u8) {
                        Some(op) => {
                            self.intro_op(op);
                            self.cons();
                        }
                        None => self.latch(ErrorCode::TypeMismatch),
                    },
                    _ => self.latch(ErrorCode::TypeMismatch),
                }
            }
            State::Token => {
                if c == '}' {
                    self.fini_parse_token(p);
                } else if is_token_char(c) {
                    let mut utf8 = [0u8; UTF8_MAX_CP_SIZE];
                    p.buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                    if p.buf.len() >= TOKEN_MAX {
                        self.latch(ErrorCode::TypeMismatch);
                    }
                } else {
                    self.latch(ErrorCode::TypeMismatch);
                }
            }
            State::Text => {
                if c == '\n' {
                    p.state = State::TextLf;
                } else if is_text_char(c) {
                    self.parser_write_char(p, c);
                } else {
                    self.latch(ErrorCode::TypeMismatch);
                }
            }
            State::TextLf => {
                // a linefeed must be followed by SP (escape) or ~ (end)
                if c == ' ' {
                    self.parser_write_char(p, '\n');
                    p.state = State::Text;
                } else if c == '~' {
                    self.fini_parse_text(p);
                    p.state = State::Op;
                } else {
                    self.latch(ErrorCode::TypeMismatch);
                }
            }
        }
    }

    /// Suspend the current ops list onto the stack and start a fresh
    /// object: `(ops, (stack, T)) → (empty, (ops:stack, T))`.
    fn push_parse_frame(&mut self) {
        self.assocl();
        self.wrap_sum(SumSide::Left);
        self.intro_r(UNIT_INR);
    }

    /// Cons the finished object onto the suspended ops list:
    /// `(opval, (parent:stack, T)) → (opval:parent, (stack, T))`.
    fn pop_parse_frame(&mut self) {
        self.wswap();
        match self.unwrap_sum() {
            Some(SumSide::Left) => {}
            Some(SumSide::Right) => {
                self.latch(ErrorCode::TypeMismatch);
                return;
            }
            None => return,
        }
        self.assocr();
        self.zswap();
        self.wswap();
        self.cons();
    }

    fn fini_parse_token(&mut self, p: &mut Parser) {
        if p.buf.is_empty() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        debug_assert!(p.buf.len() < TOKEN_MAX);
        let len = p.buf.len() as u32;
        let sz = cell_buff(WORD_SIZE + len);
        if !self.reserve(sz + CELL_SIZE) {
            return;
        }
        let addr = self.arena.alloc_r(sz);
        self.arena.set_word(addr, ((len as Word) << 8) | OTAG_OPTOK);
        self.arena.set_bytes(addr + WORD_SIZE, &p.buf);
        self.intro_r(Value::tag_addr(TAG_OBJ, addr));
        self.cons();
        p.state = State::Op;
    }

    fn parser_write_char(&mut self, p: &mut Parser, c: char) {
        let mut utf8 = [0u8; UTF8_MAX_CP_SIZE];
        p.buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
        if p.buf.len() >= PARSE_BUFFER_SIZE - UTF8_MAX_CP_SIZE {
            self.flush_parse_text(p);
        }
    }

    /// Move the accumulator into an arena chunk on the front of the
    /// text being built. `[alloc]`
    fn flush_parse_text(&mut self, p: &mut Parser) {
        if p.buf.is_empty() {
            return;
        }
        self.cons_binary_chunk(&p.buf);
        p.buf.clear();
    }

    fn fini_parse_text(&mut self, p: &mut Parser) {
        self.flush_parse_text(p);
        self.reverse_binary_chunks();
        self.wrap_otag(OTAG_UTF8);
        self.wrap_otag(OTAG_OPVAL | OPVAL_LAZYKF);
        self.pop_parse_frame();
    }

    /// Ops accumulate in reverse; flip the list in place. Non-allocating.
    fn reverse_ops_list(&mut self) {
        let mut hd = self.head(self.val);
        let mut rev = UNIT_INR;
        while hd != UNIT_INR {
            assert!(hd.is_pair_l(), "malformed ops list under construction");
            let next = self.tail(hd);
            self.set_tail(hd, rev);
            rev = hd;
            hd = next;
        }
        self.set_head(self.val, rev);
    }

    /// Input exhausted: either accept, or reject leaving only the text
    /// consumed.
    fn fini_parse(&mut self, p: &Parser) {
        if p.depth != 0 || p.state != State::Op {
            self.parse_abort();
            self.latch(ErrorCode::TypeMismatch);
            return;
        }
        self.reverse_ops_list();
        self.assocl(); // ((ops, stack), (text, e))

        // Reuse the (ops, stack) cell as the block header, so acceptance
        // allocates nothing and cannot fail on a full arena.
        let cell = self.head(self.val);
        let addr = cell.addr();
        let ops = self.arena.word(addr);
        let stack_empty = Value(self.arena.word(addr + WORD_SIZE)) == UNIT_INR;
        self.arena.set_word(addr, OTAG_BLOCK);
        self.arena.set_word(addr + WORD_SIZE, ops);
        self.set_head(self.val, Value::tag_addr(TAG_OBJ, addr));

        self.wswap(); // (text, (block, e))
        let text_empty = self.top_is_list_end();
        self.drop_top_raw();

        if !(stack_empty && text_empty) {
            self.drop_top_raw();
            self.latch(ErrorCode::TypeMismatch);
        }
    }

    /// Failure cleanup: drop the object under construction, the
    /// suspended stack, and the remaining text. The latch stays as the
    /// failing step left it.
    fn parse_abort(&mut self) {
        self.drop_top_raw();
        self.drop_top_raw();
        self.drop_top_raw();
    }
}
