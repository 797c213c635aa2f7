//! Substructural enforcement: affine, relevant, hidden, pending.

use tacit_vm::prelude::*;

fn cx() -> Context {
    Environment::new().create_context(4).expect("context")
}

#[test]
fn copying_an_affine_block_latches_after_the_copy() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.block_affine();
    cx.copy();
    assert_eq!(cx.error(), Some(ErrorCode::TypeMismatch));
    // the copy itself happened; the scan reports afterwards
    assert_eq!(cx.peek_block_attrs().unwrap(), BlockAttrs::AFFINE);
}

#[test]
fn dropping_a_relevant_block_latches() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.block_relevant();
    cx.drop_top();
    assert_eq!(cx.error(), Some(ErrorCode::TypeMismatch));
}

#[test]
fn plain_blocks_copy_and_drop_freely() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.copy();
    cx.drop_top();
    cx.drop_top();
    assert_eq!(cx.error(), None);
}

#[test]
fn affine_blocks_may_still_be_dropped() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.block_affine();
    cx.drop_top();
    assert_eq!(cx.error(), None);
}

#[test]
fn substructure_reaches_through_products() {
    let mut cx = cx();
    cx.intro_unit();
    cx.intro_id_block();
    cx.block_affine();
    cx.assocl(); // (block, unit) as one value
    cx.copy();
    assert_eq!(cx.error(), Some(ErrorCode::TypeMismatch));
}

#[test]
fn quotation_hides_substructure_from_both_scans() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.block_affine();
    cx.block_relevant();
    cx.quote();
    cx.copy();
    assert_eq!(cx.error(), None, "quoted affine content must copy");
    cx.drop_top();
    assert_eq!(cx.error(), None, "quoted relevant content must drop");
}

#[test]
fn pending_values_neither_copy_nor_drop() {
    let mut cx = cx();
    cx.intro_i32(5);
    cx.wrap_pending();
    assert_eq!(cx.peek_type(), ValueType::Future);
    cx.copy();
    assert_eq!(cx.error(), Some(ErrorCode::TypeMismatch));

    let mut cx = self::cx();
    cx.intro_i32(5);
    cx.wrap_pending();
    cx.drop_top();
    assert_eq!(cx.error(), Some(ErrorCode::TypeMismatch));
}

#[test]
fn trash_preserves_substructure_but_not_contents() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.block_relevant();
    cx.trash();
    assert_eq!(cx.error(), None, "erasure is not a drop");
    assert_eq!(cx.peek_type(), ValueType::Trash);
    // the erased value still refuses to be dropped
    cx.drop_top();
    assert_eq!(cx.error(), Some(ErrorCode::TypeMismatch));
}

#[test]
fn unmarked_trash_is_the_plain_sentinel() {
    let mut cx = cx();
    cx.intro_i32(7);
    cx.trash();
    assert_eq!(cx.peek_type(), ValueType::Trash);
    cx.drop_top();
    assert_eq!(cx.error(), None);
}

#[test]
fn safe_attributes_commute_and_idempote() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.block_affine();
    cx.block_affine();
    cx.block_relevant();
    let attrs = cx.peek_block_attrs().unwrap();
    assert_eq!(attrs, BlockAttrs::AFFINE | BlockAttrs::RELEVANT);
    assert_eq!(cx.error(), None);
}

#[test]
fn a_second_unsafe_attribute_wraps_the_block() {
    let mut cx = cx();
    cx.intro_id_block();
    cx.block_lazy();
    cx.block_fork();
    assert_eq!(cx.error(), None);
    assert_eq!(cx.peek_type(), ValueType::Block);
    let attrs = cx.peek_block_attrs().unwrap();
    assert!(attrs.contains(BlockAttrs::FORK));
    assert!(!attrs.contains(BlockAttrs::LAZY), "lazy hides in the wrapper");
}

#[test]
fn composition_unions_substructure() {
    let mut cx = cx();
    cx.intro_text("wl");
    cx.text_to_block();
    cx.block_relevant();
    cx.intro_text("vr");
    cx.text_to_block();
    cx.block_affine();
    cx.compose();
    assert_eq!(cx.error(), None);
    assert_eq!(cx.peek_block_ops().unwrap(), "vrwl");
    let attrs = cx.peek_block_attrs().unwrap();
    assert_eq!(attrs, BlockAttrs::AFFINE | BlockAttrs::RELEVANT);
}

#[test]
fn composing_lazy_operands_stays_sound() {
    let mut cx = cx();
    cx.intro_text("wl");
    cx.text_to_block();
    cx.block_lazy();
    cx.intro_text("vr");
    cx.text_to_block();
    cx.compose();
    assert_eq!(cx.error(), None);
    assert_eq!(cx.peek_type(), ValueType::Block);
    // the lazy operand was rewritten behind a quoted inline call
    assert_eq!(cx.peek_block_ops(), Err(ErrorCode::Unimplemented));
}

#[test]
fn composing_a_long_left_operand_rewrites_it() {
    let mut cx = cx();
    cx.intro_text("wl");
    cx.text_to_block();
    cx.intro_text(&"vr".repeat(20));
    cx.text_to_block();
    cx.compose();
    assert_eq!(cx.error(), None);
    assert_eq!(cx.peek_type(), ValueType::Block);
    cx.drop_top();
    assert_eq!(cx.error(), None);
}

#[test]
fn sealed_values_round_trip_their_token() {
    let mut cx = cx();
    cx.intro_i32(11);
    cx.wrap_seal(":s");
    assert_eq!(cx.peek_type(), ValueType::Seal);
    assert_eq!(cx.unwrap_seal().unwrap(), ":s");
    assert_eq!(cx.peek_i32().unwrap(), 11);

    cx.wrap_seal("a-much-longer-sealer-token");
    assert_eq!(cx.peek_type(), ValueType::Seal);
    assert_eq!(cx.unwrap_seal().unwrap(), "a-much-longer-sealer-token");
    assert_eq!(cx.peek_i32().unwrap(), 11);
    assert_eq!(cx.error(), None);
}

#[test]
fn sealed_values_survive_copy_and_collection() {
    let mut cx = cx();
    cx.intro_i32(11);
    cx.wrap_seal(":big-seal"); // nine bytes: the general shape
    cx.copy();
    cx.gc();
    assert_eq!(cx.unwrap_seal().unwrap(), ":big-seal");
    assert_eq!(cx.peek_i32().unwrap(), 11);
    cx.drop_top();
    assert_eq!(cx.unwrap_seal().unwrap(), ":big-seal");
    assert_eq!(cx.peek_i32().unwrap(), 11);
    assert_eq!(cx.error(), None);
}

#[test]
fn invalid_seal_tokens_are_malformed_arguments() {
    let mut cx = cx();
    cx.intro_i32(1);
    cx.wrap_seal("bad{token");
    assert_eq!(cx.error(), Some(ErrorCode::InvalidArgument));
}

#[test]
fn unsealing_an_unsealed_value_latches() {
    let mut cx = cx();
    cx.intro_i32(1);
    assert_eq!(cx.unwrap_seal(), Err(ErrorCode::TypeMismatch));
    assert_eq!(cx.error(), Some(ErrorCode::TypeMismatch));
}
