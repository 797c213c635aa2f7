//! Collection behavior: idempotence, size preservation, exhaustion.

use tacit_vm::prelude::*;

fn cx() -> Context {
    Environment::new().create_context(4).expect("context")
}

/// A value with a bit of everything: products, sums, a block, a sealed
/// text, and integers.
fn build_mixed_value(cx: &mut Context) {
    cx.intro_text("chunky text payload");
    cx.wrap_seal(":s");
    cx.intro_text("[vrwlc]");
    cx.text_to_block();
    cx.intro_i32(12345);
    cx.wrap_sum(SumSide::Left);
    cx.assocl();
    cx.assocl();
}

#[test]
fn quiescent_collections_are_idempotent() {
    let mut cx = cx();
    build_mixed_value(&mut cx);
    cx.gc();
    let first = cx.mem_stats();
    cx.gc();
    let second = cx.mem_stats();
    assert_eq!(first.memory_last_gc, second.memory_last_gc);
    assert_eq!(first.memory_current, second.memory_current);
    assert_eq!(second.gc_cycle_count, first.gc_cycle_count + 1);
    assert_eq!(cx.error(), None);
}

#[test]
fn copies_preserve_exact_size() {
    let mut cx = cx();
    build_mixed_value(&mut cx);
    let size = cx.peek_size();
    assert!(size > 0);

    cx.copy();
    assert_eq!(cx.peek_size(), size, "copy changed the measured size");

    cx.gc();
    assert_eq!(cx.peek_size(), size, "collection changed the measured size");

    cx.drop_top();
    assert_eq!(cx.peek_size(), size);
    assert_eq!(cx.error(), None);
}

#[test]
fn collection_reclaims_dropped_values() {
    let mut cx = cx();
    build_mixed_value(&mut cx);
    cx.gc();
    let live = cx.mem_stats().memory_last_gc;

    build_mixed_value(&mut cx);
    cx.drop_top();
    cx.gc();
    let stats = cx.mem_stats();
    assert_eq!(stats.memory_last_gc, live);
    assert!(stats.gc_bytes_collected > 0);
    assert_eq!(cx.error(), None);
}

#[test]
fn exhaustion_latches_context_full() {
    let mut cx = Environment::new().create_context(1).expect("context");
    // one semi-space is half a MiB; two 300 KiB binaries cannot both live
    let chunk = vec![0xA5u8; 300 * 1024];
    cx.intro_binary(&chunk);
    assert_eq!(cx.error(), None);
    cx.copy();
    assert_eq!(cx.error(), Some(ErrorCode::ContextFull));

    cx.reset();
    assert_eq!(cx.error(), None);
    cx.intro_binary(&chunk);
    assert_eq!(cx.error(), None);
}

#[test]
fn copies_validate_their_size_estimate_under_pressure() {
    // keep enough live data that the worst-case bypass cannot apply,
    // forcing the exact pre-walk and its post-copy validation
    let mut cx = Environment::new().create_context(1).expect("context");
    let ballast = vec![0x5Au8; 300 * 1024];
    cx.intro_binary(&ballast);
    cx.intro_text("tiny");
    cx.copy();
    assert_eq!(cx.error(), None);
    let mut buf = [0u8; 8];
    let n = cx.read_text(&mut buf);
    assert_eq!(&buf[..n], b"tiny");
}

#[test]
fn oversized_binaries_are_rejected_up_front() {
    let mut cx = Environment::new().create_context(1).expect("context");
    let chunk = vec![0u8; 600 * 1024];
    cx.intro_binary(&chunk);
    assert_eq!(cx.error(), Some(ErrorCode::ContextFull));
}

#[test]
fn stats_stay_ordered() {
    let mut cx = cx();
    build_mixed_value(&mut cx);
    cx.gc();
    let s = cx.mem_stats();
    assert!(s.memory_last_gc <= s.memory_current);
    assert!(s.memory_current <= s.memory_next_gc);
    assert!(s.memory_next_gc <= s.memory_maximum);
    assert!(s.gc_bytes_processed >= s.gc_bytes_collected);
}

#[test]
fn the_cap_grows_with_the_working_set() {
    let mut cx = cx();
    cx.intro_unit();
    cx.gc();
    let small = cx.mem_stats().memory_next_gc;

    // hold a few hundred KiB live and collect again
    let payload = "x".repeat(200 * 1024);
    cx.intro_text(&payload);
    cx.gc();
    let grown = cx.mem_stats().memory_next_gc;
    assert!(grown >= small);
    assert!(grown >= cx.mem_stats().memory_current);
    assert_eq!(cx.error(), None);
}

#[test]
fn reset_discards_everything() {
    let mut cx = cx();
    build_mixed_value(&mut cx);
    cx.reset();
    assert_eq!(cx.peek_type(), ValueType::Undefined);
    cx.gc();
    assert_eq!(cx.mem_stats().memory_last_gc, 0);
}

#[test]
fn texts_survive_collection() {
    let mut cx = cx();
    cx.intro_text("still here after the flip");
    cx.gc();
    let mut buf = [0u8; 64];
    let n = cx.read_text(&mut buf);
    assert_eq!(&buf[..n], b"still here after the flip");
    assert_eq!(cx.error(), None);
}
