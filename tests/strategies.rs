use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strided_expr::{
    arange, assign, assign_with, broadcast, dynamic_view, dynamic_view_mut, generate, range,
    select_strategy, transpose, Array, AssignCast, AssignTarget, ColumnMajor, Element,
    Expression, MaybeSend, MaybeSync, Strategy, StridedError, PARALLEL_THRESHOLD,
};

fn random_array(shape: &[usize], seed: u64) -> Array<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array::from_fn(shape, |_| rng.gen_range(-1.0..1.0))
}

const ALL: [Strategy; 4] = [
    Strategy::SimdLinear,
    Strategy::Linear,
    Strategy::StridedBlocked,
    Strategy::Generic,
];

/// Runs every strategy that is legal for `src` into a fresh destination and
/// checks all of them agree with the generic loop. Returns how many ran.
fn check_agreement<D, S>(make_dest: impl Fn() -> D, src: &S) -> usize
where
    D: AssignTarget + Clone + PartialEq + std::fmt::Debug,
    D::Elem: Element + MaybeSend,
    S: Expression + MaybeSync,
    S::Elem: AssignCast<D::Elem>,
{
    let mut reference = make_dest();
    assign_with(&mut reference, src, Strategy::Generic).unwrap();
    let mut ran = 0;
    for strategy in ALL {
        let mut dest = make_dest();
        match assign_with(&mut dest, src, strategy) {
            Ok(()) => {
                assert_eq!(dest, reference, "{strategy:?} disagrees with the generic loop");
                ran += 1;
            }
            Err(StridedError::StrategyUnavailable(s)) => assert_eq!(s, strategy),
            Err(e) => panic!("{strategy:?} failed: {e}"),
        }
    }
    ran
}

#[test]
fn test_same_layout_arrays_use_simd_linear() {
    let a = random_array(&[17, 33], 1);
    let b = random_array(&[17, 33], 2);
    let e = &a * &b + 1.0;
    let dest = Array::<f64>::zeros(&[17, 33]);
    assert_eq!(select_strategy(&dest, &e, true), Strategy::SimdLinear);
    assert_eq!(check_agreement(|| Array::<f64>::new(), &e), 4);
}

#[test]
fn test_cast_falls_back_to_linear() {
    let a = random_array(&[8, 9], 3);
    let e = &a * 100.0;
    let dest = Array::<i32>::zeros(&[8, 9]);
    assert_eq!(select_strategy(&dest, &e, true), Strategy::Linear);
    assert_eq!(check_agreement(|| Array::<i32>::new(), &e), 3);
}

#[test]
fn test_transposed_source_uses_strided_blocked() {
    let a = random_array(&[12, 7], 4);
    let t = transpose(&a, &[]).unwrap();
    let dest = Array::<f64>::zeros(&[7, 12]);
    assert_eq!(select_strategy(&dest, &t, true), Strategy::StridedBlocked);
    check_agreement(|| Array::<f64>::new(), &t);
    check_agreement(|| Array::<f64, ColumnMajor>::new(), &t);
}

#[test]
fn test_partial_broadcast_agrees() {
    let a = random_array(&[6, 5, 4], 5);
    let row = random_array(&[4], 6);
    let col = random_array(&[5, 1], 7);
    let e = &a - &row + &col;
    assert_eq!(check_agreement(|| Array::<f64>::new(), &e), 2);
    let b = broadcast(&row, &[6, 5, 4]).unwrap();
    check_agreement(|| Array::<f64, ColumnMajor>::new(), &(&b * 2.0));
}

#[test]
fn test_generators_take_the_generic_loop() {
    let g = generate(&[5, 6], |i: &[usize]| (i[0] * 6 + i[1]) as f64);
    let dest = Array::<f64>::zeros(&[5, 6]);
    assert_eq!(select_strategy(&dest, &g, true), Strategy::Generic);
    let mut out = Array::<f64>::new();
    assert_eq!(
        assign_with(&mut out, &g, Strategy::StridedBlocked).unwrap_err(),
        StridedError::StrategyUnavailable(Strategy::StridedBlocked)
    );
    assign(&mut out, &g).unwrap();
    assert_relative_eq!(out[[4, 5]], 29.0);
    check_agreement(|| Array::<f64>::new(), &(&g + &arange(0.0, 6.0, 1.0)));
}

/// Forces each strategy into a view of a fresh zeroed parent. Returns the
/// strategies that ran and the parent each one left behind.
fn assign_into_views(
    src: &Array<f64>,
    specs: &[strided_expr::SliceSpec],
) -> Vec<(Strategy, Array<f64>)> {
    let window = dynamic_view(src, specs).unwrap();
    let mut ran = Vec::new();
    for strategy in ALL {
        let mut parent = Array::<f64>::zeros(src.shape());
        let mut dest = dynamic_view_mut(&mut parent, specs).unwrap();
        match assign_with(&mut dest, &window, strategy) {
            Ok(()) => ran.push((strategy, parent)),
            Err(StridedError::StrategyUnavailable(s)) => assert_eq!(s, strategy),
            Err(e) => panic!("{strategy:?} failed: {e}"),
        }
    }
    ran
}

#[test]
fn test_views_as_sources_and_destinations() {
    let src = random_array(&[9, 10], 8);
    let window = dynamic_view(&src, &[range(2, 7), range(1, 9)]).unwrap();
    check_agreement(|| Array::<f64>::new(), &window);

    // A window cut from both axes has a contiguous inner run but no flat range.
    let ran = assign_into_views(&src, &[range(2, 7), range(1, 9)]);
    let names: Vec<Strategy> = ran.iter().map(|(s, _)| *s).collect();
    assert_eq!(names, vec![Strategy::StridedBlocked, Strategy::Generic]);
    let (_, generic) = &ran[1];
    assert_relative_eq!(generic[[2, 1]], src[[2, 1]]);
    assert_relative_eq!(generic[[6, 8]], src[[6, 8]]);
    assert_relative_eq!(generic[[0, 0]], 0.0);
    assert_relative_eq!(generic[[2, 9]], 0.0);
    for (strategy, parent) in &ran {
        assert_eq!(parent, generic, "{strategy:?} disagrees with the generic loop");
    }

    // Whole rows are one packed block, so every strategy is legal.
    let ran = assign_into_views(&src, &[range(2, 7)]);
    assert_eq!(ran.len(), 4);
    let (_, generic) = &ran[3];
    assert_relative_eq!(generic[[4, 5]], src[[4, 5]]);
    assert_relative_eq!(generic[[7, 0]], 0.0);
    for (strategy, parent) in &ran {
        assert_eq!(parent, generic, "{strategy:?} disagrees with the generic loop");
    }
}

#[test]
fn test_large_contiguous_assignment() {
    let n = PARALLEL_THRESHOLD + 37;
    let a = Array::from(
        (0..n).map(|i| i as f32).collect::<Vec<_>>(),
    );
    let mut out = Array::<f32>::new();
    assign(&mut out, &(&a * 2.0f32)).unwrap();
    assert_eq!(out.len(), n);
    assert!(out
        .as_slice()
        .iter()
        .enumerate()
        .all(|(i, &x)| x == 2.0 * i as f32));
}

#[test]
fn test_forced_linear_rejects_broadcast() {
    let a = random_array(&[3, 4], 9);
    let row = random_array(&[4], 10);
    let mut out = Array::<f64>::new();
    assert_eq!(
        assign_with(&mut out, &(&a + &row), Strategy::Linear).unwrap_err(),
        StridedError::StrategyUnavailable(Strategy::Linear)
    );
}
