//! Algebraic laws of the product and sum primitives.

use quickcheck_macros::quickcheck;
use tacit_vm::prelude::*;

fn cx() -> Context {
    Environment::new().create_context(4).expect("context")
}

const CLAMP: i64 = 999_999_999_999_999_999;

fn clamp(i: i64) -> i64 {
    i.clamp(-CLAMP, CLAMP)
}

/// Push three integers so the stack reads `(a, (b, (c, e)))`.
fn push3(cx: &mut Context, a: i64, b: i64, c: i64) {
    cx.intro_i64(c);
    cx.intro_i64(b);
    cx.intro_i64(a);
}

/// Pop and return the top three integers.
fn pop3(cx: &mut Context) -> (i64, i64, i64) {
    let a = cx.peek_i64().unwrap();
    cx.drop_top();
    let b = cx.peek_i64().unwrap();
    cx.drop_top();
    let c = cx.peek_i64().unwrap();
    cx.drop_top();
    (a, b, c)
}

#[quickcheck]
fn wswap_is_an_involution(a: i64, b: i64, c: i64) -> bool {
    let (a, b, c) = (clamp(a), clamp(b), clamp(c));
    let mut cx = cx();
    push3(&mut cx, a, b, c);
    cx.wswap();
    cx.wswap();
    cx.error().is_none() && pop3(&mut cx) == (a, b, c)
}

#[quickcheck]
fn zswap_is_an_involution(a: i64, b: i64, c: i64, d: i64) -> bool {
    let (a, b, c, d) = (clamp(a), clamp(b), clamp(c), clamp(d));
    let mut cx = cx();
    cx.intro_i64(d);
    push3(&mut cx, a, b, c);
    cx.zswap();
    cx.zswap();
    if cx.error().is_some() {
        return false;
    }
    let top3 = pop3(&mut cx);
    top3 == (a, b, c) && cx.peek_i64().unwrap() == d
}

#[quickcheck]
fn assocr_inverts_assocl(a: i64, b: i64, c: i64) -> bool {
    let (a, b, c) = (clamp(a), clamp(b), clamp(c));
    let mut cx = cx();
    push3(&mut cx, a, b, c);
    cx.assocl();
    cx.assocr();
    cx.error().is_none() && pop3(&mut cx) == (a, b, c)
}

#[quickcheck]
fn swap_is_an_involution(a: i64, b: i64) -> bool {
    // swap exchanges the top value with the rest of the spine, so after
    // one swap the top is a product and the integers are only readable
    // again once the second swap restores the register
    let (a, b) = (clamp(a), clamp(b));
    let mut cx = cx();
    cx.intro_i64(b);
    cx.intro_i64(a);
    cx.swap();
    let shape = cx.peek_type() == ValueType::Product && cx.peek_i64().is_err();
    cx.swap();
    shape && cx.error().is_none() && pop_is(&mut cx, a, b)
}

fn pop_is(cx: &mut Context, a: i64, b: i64) -> bool {
    let got_a = cx.peek_i64() == Ok(a);
    cx.drop_top();
    got_a && cx.peek_i64() == Ok(b)
}

#[quickcheck]
fn sum_wrap_unwrap_round_trips(n: i64, sides: Vec<bool>) -> bool {
    let n = clamp(n);
    let mut cx = cx();
    cx.intro_i64(n);
    let sides: Vec<SumSide> = sides
        .iter()
        .map(|&l| if l { SumSide::Left } else { SumSide::Right })
        .collect();
    for &s in &sides {
        cx.wrap_sum(s);
    }
    for &s in sides.iter().rev() {
        if cx.unwrap_sum() != Some(s) {
            return false;
        }
    }
    cx.error().is_none() && cx.peek_i64().unwrap() == n
}

#[test]
fn deep_sum_chains_past_one_path_word() {
    // more than 28 steps forces a second wrapper cell
    let mut cx = cx();
    cx.intro_i32(9);
    let sides: Vec<SumSide> = (0..75)
        .map(|i| if i % 3 == 0 { SumSide::Left } else { SumSide::Right })
        .collect();
    for &s in &sides {
        cx.wrap_sum(s);
    }
    assert_eq!(cx.peek_type(), ValueType::Sum);
    for &s in sides.iter().rev() {
        assert_eq!(cx.unwrap_sum(), Some(s));
    }
    assert_eq!(cx.peek_i32().unwrap(), 9);
    assert_eq!(cx.error(), None);
}

#[test]
fn shallow_sums_stay_unboxed() {
    // wrapping a pair or unit is tag arithmetic; no allocation happens,
    // so it works even at the cap
    let mut cx = cx();
    cx.intro_unit();
    let before = cx.mem_stats().memory_current;
    cx.wrap_sum(SumSide::Right);
    cx.wrap_sum(SumSide::Left);
    assert_eq!(cx.unwrap_sum(), Some(SumSide::Left));
    assert_eq!(cx.unwrap_sum(), Some(SumSide::Right));
    assert_eq!(cx.mem_stats().memory_current, before);
    assert_eq!(cx.error(), None);
}

#[test]
fn distrib_pushes_context_into_the_sum() {
    // (2, (7 in left, e)) → ((2, 7) in left, e)
    let mut cx = cx();
    cx.intro_i32(7);
    cx.wrap_sum(SumSide::Left);
    cx.intro_i32(2);
    cx.distrib();
    assert_eq!(cx.unwrap_sum(), Some(SumSide::Left));
    cx.assocr();
    assert_eq!(cx.peek_i32().unwrap(), 2);
    cx.drop_top();
    assert_eq!(cx.peek_i32().unwrap(), 7);
    assert_eq!(cx.error(), None);
}

#[test]
fn factor_inverts_distrib() {
    let mut cx = cx();
    cx.intro_i32(7);
    cx.wrap_sum(SumSide::Right);
    cx.intro_i32(2);
    cx.distrib();
    cx.factor();
    assert_eq!(cx.unwrap_sum(), Some(SumSide::Right));
    assert_eq!(cx.peek_i32().unwrap(), 2);
    cx.drop_top();
    assert_eq!(cx.unwrap_sum(), Some(SumSide::Right));
    assert_eq!(cx.peek_i32().unwrap(), 7);
    assert_eq!(cx.error(), None);
}

#[quickcheck]
fn sum_wswap_swaps_middle_branches(tag: u8) -> bool {
    // (a + (b + c)) → (b + (a + c)): encode which branch holds 1
    let branch = tag % 3;
    let mut cx = cx();
    cx.intro_i32(1);
    match branch {
        0 => cx.wrap_sum(SumSide::Left),
        1 => {
            cx.wrap_sum(SumSide::Left);
            cx.wrap_sum(SumSide::Right);
        }
        _ => {
            cx.wrap_sum(SumSide::Right);
            cx.wrap_sum(SumSide::Right);
        }
    }
    cx.sum_wswap();
    let expect = match branch {
        0 => vec![SumSide::Right, SumSide::Left], // a moved under one right
        1 => vec![SumSide::Left],                 // b moved to the outside
        _ => vec![SumSide::Right, SumSide::Right],
    };
    for side in expect {
        if cx.unwrap_sum() != Some(side) {
            return false;
        }
    }
    cx.error().is_none() && cx.peek_i32().unwrap() == 1
}

#[test]
fn array_chunks_expand_one_element_at_a_time() {
    let elems = [3, 1, 4, 1, 5, 9, 2, 6];
    let mut cx = cx();
    cx.intro_int_array(&elems);
    assert_eq!(cx.peek_type(), ValueType::Sum);

    // expansion round trip: unwrap then re-wrap is observationally id
    assert_eq!(cx.unwrap_sum(), Some(SumSide::Left));
    cx.wrap_sum(SumSide::Left);

    for &e in &elems {
        assert_eq!(cx.unwrap_sum(), Some(SumSide::Left), "element {e}");
        cx.assocr();
        assert_eq!(cx.peek_i64().unwrap(), e);
        cx.drop_top();
        // the tail takes the pair slot; re-frame for the next element
    }
    assert_eq!(cx.unwrap_sum(), Some(SumSide::Right));
    assert_eq!(cx.error(), None);
}
