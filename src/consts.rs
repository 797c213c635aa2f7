//! Engine parameters and the in-arena encoding tables.
//!
//! The tag adjacencies (`PL = P + 1`, `PR = P + 2`, same for unit) are a
//! wire contract of the data model, so every constant is spelled out here
//! rather than derived from layout.

use crate::value::Word;

/* WORDS AND CELLS */

/// Length of a machine word, in bytes.
pub const WORD_SIZE: u32 = 8;

/// Length of an allocation cell (two words), in bytes.
pub const CELL_SIZE: u32 = 16;

/// Round a byte size up to a whole number of cells.
pub const fn cell_buff(n: u32) -> u32 {
    (n + (CELL_SIZE - 1)) & !(CELL_SIZE - 1)
}

/* VALUE TAGS (low three bits of a value word) */

/// Mask selecting the tag bits of a value word.
pub const TAG_MASK: Word = 0x7;

/// Boxed object; the payload is the address of a header cell.
pub const TAG_OBJ: Word = 0;

/// Pair; the payload is the address of a `[head, tail]` cell.
pub const TAG_PAIR: Word = 1;

/// Pair in the left of a sum.
pub const TAG_PAIR_L: Word = TAG_PAIR + 1;

/// Pair in the right of a sum.
pub const TAG_PAIR_R: Word = TAG_PAIR + 2;

/// Unit constant.
pub const TAG_UNIT: Word = 4;

/// Unit in the left of a sum.
pub const TAG_UNIT_L: Word = TAG_UNIT + 1;

/// Unit in the right of a sum. Terminates every list.
pub const TAG_UNIT_R: Word = TAG_UNIT + 2;

/// Small integer; the payload is the value in the remaining bits.
pub const TAG_INT: Word = 7;

/* OBJECT TAGS (low byte of a boxed object's header word) */

/// Chain of sum wrappers, two path bits per step.
pub const OTAG_DEEPSUM: Word = 0x01;

/// Block of ops; flags live above the low byte.
pub const OTAG_BLOCK: Word = 0x02;

/// Quoted value occupying one op position.
pub const OTAG_OPVAL: Word = 0x03;

/// Literal `{token}` op; length above the low byte, bytes follow the header word.
pub const OTAG_OPTOK: Word = 0x04;

/// Chunk of a binary list: `[tag, next, size, buffer]`.
pub const OTAG_BINARY: Word = 0x05;

/// Chunk of a general list: `[tag, next, elemct, buffer]`.
pub const OTAG_ARRAY: Word = 0x06;

/// Marks its inner binary as UTF-8 text.
pub const OTAG_UTF8: Word = 0x07;

/// Erased value preserving substructure; flags as for blocks.
pub const OTAG_TRASH: Word = 0x08;

/// Pending (unfinished) value.
pub const OTAG_PEND: Word = 0x09;

/// General sealer; token length above the low byte, bytes follow the cell.
pub const OTAG_SEAL: Word = 0x0A;

/// Sealer whose token fits the header word. The low byte doubles as the
/// leading `:` of the token under little-endian folding.
pub const OTAG_SEAL_SM: Word = b':' as Word;

/// Mask selecting the otag byte of a header word.
pub const OTAG_MASK: Word = 0xFF;

/* BLOCK AND OPVAL FLAG BITS (above the otag byte) */

/// Block may not be dropped.
pub const BLOCK_RELEVANT: Word = 1 << 8;

/// Block may not be copied.
pub const BLOCK_AFFINE: Word = 1 << 9;

/// Block evaluation is deferred until forced.
pub const BLOCK_LAZY: Word = 1 << 10;

/// Block is a candidate for parallel evaluation.
pub const BLOCK_FORK: Word = 1 << 11;

/// Attributes that are commutative and idempotent; anything else is
/// unsafe and at most one may sit directly on a block.
pub const BLOCK_SAFE_ATTRS: Word = BLOCK_RELEVANT | BLOCK_AFFINE;

/// All attribute bits a block header may carry.
pub const BLOCK_ATTRS: Word = BLOCK_RELEVANT | BLOCK_AFFINE | BLOCK_LAZY | BLOCK_FORK;

/// Opval flag hiding the quoted value's substructure from copy/drop scans.
pub const OPVAL_LAZYKF: Word = 1 << 8;

/* DEEP SUM PATH ENCODING */

/// Path step for "in the left", two bits.
pub const DEEPSUM_L: Word = 0b01;

/// Path step for "in the right", two bits.
pub const DEEPSUM_R: Word = 0b10;

/* INTEGERS */

/// Largest small integer: 18 decimal nines, so any 18-digit literal fits.
pub const SMALLINT_MAX: i64 = 999_999_999_999_999_999;

/// Smallest small integer; negation is closed over the range.
pub const SMALLINT_MIN: i64 = -SMALLINT_MAX;

/* TOKENS AND TEXTS */

/// Maximum token length in bytes, exclusive. One token always fits a
/// small stack buffer.
pub const TOKEN_MAX: usize = 64;

/// Parser text accumulator size; flushed to an arena chunk when nearly full.
pub const PARSE_BUFFER_SIZE: usize = (CELL_SIZE as usize) * 1024;

/// How many text bytes the parser pulls from the arena per swizzle.
pub const PARSE_READ_SIZE: usize = 30 * 1000;

/// Chunk size used when compacting binaries and texts.
pub const COMPACT_READ_SIZE: usize = 60 * 1000;

/// Longest UTF-8 encoding of a codepoint, in bytes.
pub const UTF8_MAX_CP_SIZE: usize = 4;

/* MEMORY HEURISTICS */

/// Working-set multiplier for the post-collection cap heuristic.
pub const MEM_FACTOR: u32 = 2;

/// Quantum the cap target is rounded up to, in bytes.
pub const MEM_PAGE_SIZE: u32 = 1 << 20;

/// Probe limit when composing blocks: ops lists longer than this are
/// rewritten as a quoted inline call instead of being walked.
pub const SMALL_FN_LIMIT: u32 = 15;

/// Skip the exact size pre-walk for copies when the worst case already fits.
pub const ALLOW_SIZE_BYPASS: bool = true;
