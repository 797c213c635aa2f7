//! Substructural attributes and their aggregation.

use bitflags::bitflags;

use crate::consts::*;
use crate::value::Word;

bitflags! {
    /// Attribute bits carried in a block header word, above the otag byte.
    /// The bit values are the in-arena encoding.
    pub struct BlockAttrs: u64 {
        /// May not be dropped.
        const RELEVANT = BLOCK_RELEVANT;
        /// May not be copied.
        const AFFINE = BLOCK_AFFINE;
        /// Evaluation deferred until forced.
        const LAZY = BLOCK_LAZY;
        /// Candidate for parallel evaluation.
        const FORK = BLOCK_FORK;
    }
}

bitflags! {
    /// Substructural summary accumulated while a copy or drop scan walks
    /// a value. Blocks contribute their attribute bits; pending values
    /// contribute [`Ss::PEND`].
    pub struct Ss: u8 {
        /// Some reachable block is affine.
        const AFFINE = 1;
        /// Some reachable block is relevant.
        const RELEVANT = 2;
        /// Some reachable value is pending.
        const PEND = 4;
    }
}

impl Ss {
    /// A value with this summary may be copied.
    pub fn copyable(self) -> bool {
        !self.intersects(Ss::AFFINE | Ss::PEND)
    }

    /// A value with this summary may be dropped.
    pub fn droppable(self) -> bool {
        !self.intersects(Ss::RELEVANT | Ss::PEND)
    }

    /// Fold a block (or trash) header word into the summary.
    pub(crate) fn capture_block(&mut self, otag_word: Word) {
        if otag_word & BLOCK_AFFINE != 0 {
            *self |= Ss::AFFINE;
        }
        if otag_word & BLOCK_RELEVANT != 0 {
            *self |= Ss::RELEVANT;
        }
    }

    /// Attribute bits for a trash header preserving this summary.
    /// Pending state is not an attribute; it is not preserved here.
    pub(crate) fn to_block_attrs(self) -> Word {
        let mut attrs = 0;
        if self.contains(Ss::AFFINE) {
            attrs |= BLOCK_AFFINE;
        }
        if self.contains(Ss::RELEVANT) {
            attrs |= BLOCK_RELEVANT;
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_blocks_both_copy_and_drop() {
        assert!(Ss::empty().copyable() && Ss::empty().droppable());
        assert!(!Ss::PEND.copyable() && !Ss::PEND.droppable());
        assert!(!Ss::AFFINE.copyable() && Ss::AFFINE.droppable());
        assert!(Ss::RELEVANT.copyable() && !Ss::RELEVANT.droppable());
    }

    #[test]
    fn capture_round_trips_through_attrs() {
        let mut ss = Ss::empty();
        ss.capture_block(OTAG_BLOCK | BLOCK_AFFINE | BLOCK_RELEVANT | BLOCK_LAZY);
        assert_eq!(ss, Ss::AFFINE | Ss::RELEVANT);
        assert_eq!(ss.to_block_attrs(), BLOCK_AFFINE | BLOCK_RELEVANT);
    }
}
