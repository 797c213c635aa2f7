//! Sealers: token-named opaque wrappers.
//!
//! A discretionary sealer token that starts with `:` and fits one word
//! folds into the header itself (the `:` byte doubling as the object
//! tag under little-endian folding); anything longer carries its bytes
//! after the header cell.

use crate::consts::*;
use crate::error::ErrorCode;
use crate::value::{Value, Word};
use crate::Context;

/// Whether `c` may appear in a `{token}` or sealer name: no curly
/// braces, no linefeed, and otherwise the text character class.
pub fn is_token_char(c: char) -> bool {
    c != '{' && c != '}' && c != '\n' && crate::text::is_text_char(c)
}

/// Whether `s` is a well-formed token: nonempty, under `TOKEN_MAX`
/// bytes, all token characters.
pub fn valid_token(s: &str) -> bool {
    !s.is_empty() && s.len() < TOKEN_MAX && s.chars().all(is_token_char)
}

impl Context {
    /// Seal the top value under `name`. Small discretionary sealers are
    /// non-allocating beyond the wrapper cell. `[alloc]`
    pub fn wrap_seal(&mut self, name: &str) {
        if self.has_error() {
            return;
        }
        if !valid_token(name) {
            self.latch(ErrorCode::InvalidArgument);
            return;
        }
        if !self.val.is_pair() {
            self.latch(ErrorCode::TypeMismatch);
            return;
        }

        let bytes = name.as_bytes();
        if bytes[0] == b':' && bytes.len() <= WORD_SIZE as usize {
            let mut otag: Word = 0;
            for &b in bytes.iter().rev() {
                otag = (otag << 8) | b as Word;
            }
            self.wrap_otag(otag);
        } else {
            let len = bytes.len() as u32;
            let sz = cell_buff(CELL_SIZE + len);
            if !self.reserve(sz) {
                return;
            }
            let inner = self.head(self.val);
            let addr = self.arena.alloc_r(sz);
            self.arena.set_word(addr, ((len as Word) << 8) | OTAG_SEAL);
            self.arena.set_word(addr + WORD_SIZE, inner.0);
            self.arena.set_bytes(addr + CELL_SIZE, bytes);
            self.set_head(self.val, Value::tag_addr(TAG_OBJ, addr));
        }
    }

    /// Remove the sealer on the top value and return its token.
    pub fn unwrap_seal(&mut self) -> Result<String, ErrorCode> {
        if let Some(code) = self.error() {
            return Err(code);
        }
        if self.val.is_pair() {
            let v = self.head(self.val);
            if v.is_obj() {
                let otag = self.obj_word(v);
                if otag & OTAG_MASK == OTAG_SEAL_SM {
                    let mut name = Vec::with_capacity(WORD_SIZE as usize);
                    let mut rest = otag;
                    while rest != 0 {
                        name.push((rest & 0xFF) as u8);
                        rest >>= 8;
                    }
                    let inner = self.obj_inner(v);
                    self.set_head(self.val, inner);
                    return Ok(String::from_utf8(name).expect("token bytes are utf-8"));
                }
                if otag & OTAG_MASK == OTAG_SEAL {
                    let len = (otag >> 8) as usize;
                    let name = self.arena.bytes(v.addr() + CELL_SIZE, len).to_vec();
                    let inner = self.obj_inner(v);
                    self.set_head(self.val, inner);
                    return Ok(String::from_utf8(name).expect("token bytes are utf-8"));
                }
            }
        }
        self.latch(ErrorCode::TypeMismatch);
        Err(ErrorCode::TypeMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_class_excludes_braces_and_controls() {
        assert!(valid_token(":seal"));
        assert!(valid_token("&anno"));
        assert!(!valid_token(""));
        assert!(!valid_token("a{b"));
        assert!(!valid_token("a}b"));
        assert!(!valid_token("a\nb"));
        assert!(!valid_token(&"x".repeat(TOKEN_MAX)));
        assert!(valid_token(&"x".repeat(TOKEN_MAX - 1)));
    }
}
