use approx::assert_relative_eq;
use num_complex::Complex64;
use strided_expr::{
    accumulate, arange, assign, broadcast, cumsum, dynamic_view_mut, eye, generate, idx,
    imag_mut, linspace, map, real, sum, sum_axes, transpose, zip_with, Array, ColumnMajor,
    Expression, OptionalArray, Scalar, StridedError,
};

fn make_array(rows: usize, cols: usize) -> Array<f64> {
    Array::from_fn(&[rows, cols], |i| (i[0] * cols + i[1]) as f64)
}

#[test]
fn test_broadcast_add_is_lazy_until_assigned() {
    let a = Array::<_>::from_shape_vec(&[3, 4], (1..=12).map(f64::from).collect()).unwrap();
    let b = Array::<_>::from_shape_vec(&[4], vec![10.0, 20.0, 30.0, 40.0]).unwrap();
    let e = &a + &b;
    assert_eq!(e.shape(), &[3, 4]);
    assert_relative_eq!(e.get(&[1, 2]), 37.0);

    let c = Array::<f64>::from_expr(&e).unwrap();
    assert_eq!(c.shape(), &[3, 4]);
    for i in 0..3 {
        for j in 0..4 {
            assert_relative_eq!(c[[i, j]], a[[i, j]] + b[[j]]);
        }
    }
}

#[test]
fn test_column_vector_broadcasts_along_rows() {
    let a = Array::<_>::from_shape_vec(&[3, 4], (1..=12).map(f64::from).collect()).unwrap();
    let col = Array::<_>::from_shape_vec(&[3, 1], vec![100.0, 200.0, 300.0]).unwrap();
    let e = &a + &col;
    assert_eq!(e.shape(), &[3, 4]);

    let mut c = Array::<f64>::new();
    assign(&mut c, &e).unwrap();
    assert_eq!(c.shape(), &[3, 4]);
    for i in 0..3 {
        for j in 0..4 {
            assert_relative_eq!(c[[i, j]], a[[i, j]] + col[[i, 0]]);
        }
    }
    assert_relative_eq!(c[[0, 3]], 104.0);
    assert_relative_eq!(c[[2, 0]], 309.0);
}

#[test]
fn test_accumulate_running_sum() {
    let a = Array::<_>::from_shape_vec(&[4], vec![1, 2, 3, 4]).unwrap();
    let r = accumulate(|x, y| x + y, &a, None).unwrap();
    assert_eq!(r.as_slice(), &[1, 3, 6, 10]);
    assert_eq!(cumsum(&a, Some(0)).unwrap(), r);
}

#[test]
fn test_accumulate_over_lazy_expression() {
    let a = make_array(2, 3);
    let r = cumsum(&(&a * 2.0), Some(0)).unwrap();
    assert_eq!(r.as_slice(), &[0.0, 2.0, 4.0, 6.0, 10.0, 14.0]);
}

#[test]
fn test_failed_broadcast_leaves_destination_untouched() {
    let mut dst = make_array(2, 3);
    let before = dst.clone();
    let src = Array::<f64>::zeros(&[4]);
    let mut view = dynamic_view_mut(&mut dst, &[]).unwrap();
    let err = assign(&mut view, &src).unwrap_err();
    assert_eq!(
        err,
        StridedError::BroadcastMismatch {
            input: vec![4],
            output: vec![2, 3]
        }
    );
    assert_eq!(dst, before);
}

#[test]
fn test_resizable_destination_takes_source_shape() {
    let mut dst = Array::<f64>::zeros(&[7]);
    let src = make_array(2, 5);
    assign(&mut dst, &(&src + 1.0)).unwrap();
    assert_eq!(dst.shape(), &[2, 5]);
    assert_relative_eq!(dst[[1, 4]], 10.0);
}

#[test]
fn test_assignment_is_idempotent() {
    let a = make_array(3, 4);
    let t = transpose(&a, &[]).unwrap();
    let e = zip_with(&t, 0.5, |x: f64, y: f64| x * y + 1.0);
    let mut once = Array::<f64, ColumnMajor>::new();
    assign(&mut once, &e).unwrap();
    let mut twice = once.clone();
    assign(&mut twice, &e).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_odometer_ranks_zero_through_four() {
    let dims = [2usize, 3, 1, 2];
    for rank in 0..=4 {
        let shape = &dims[..rank];
        let a = Array::<i64>::from_fn(shape, |i| {
            i.iter().fold(0i64, |acc, &x| acc * 10 + x as i64 + 1)
        });
        let e = &a * 3i64;
        let mut row = Array::<i64>::new();
        let mut col = Array::<i64, ColumnMajor>::new();
        assign(&mut row, &e).unwrap();
        assign(&mut col, &e).unwrap();
        assert_eq!(row.shape(), shape);
        assert_eq!(col.shape(), shape);
        let seen: Vec<i64> = row.iter().collect();
        assert_eq!(seen.len(), shape.iter().product::<usize>());
        assert_eq!(seen, col.iter().collect::<Vec<_>>());
        assert_eq!(seen, a.iter().map(|x| x * 3).collect::<Vec<_>>());
    }
}

#[test]
fn test_rank_zero_scalar_source() {
    let mut dst = Array::<f32>::zeros(&[2, 2]);
    let mut view = dynamic_view_mut(&mut dst, &[]).unwrap();
    assign(&mut view, &Scalar(1.5f32)).unwrap();
    assert_eq!(dst.as_slice(), &[1.5; 4]);
}

#[test]
fn test_narrowing_conversion_on_assign() {
    let src = Array::<_>::from_shape_vec(&[3], vec![1.9, -2.5, 300.0]).unwrap();
    let mut dst = Array::<i32>::new();
    assign(&mut dst, &src).unwrap();
    assert_eq!(dst.as_slice(), &[1, -2, 300]);
}

#[test]
fn test_generators() {
    let g = generate(&[2, 3], |i: &[usize]| (i[0] * 3 + i[1]) as f64);
    assert_eq!(Array::from_expr(&g).unwrap(), make_array(2, 3));

    let id = Array::<i32>::from_expr(&eye::<i32>(3, 0)).unwrap();
    assert_eq!(id.as_slice(), &[1, 0, 0, 0, 1, 0, 0, 0, 1]);

    let ls = Array::<f64>::from_expr(&linspace(0.0, 1.0, 5, true)).unwrap();
    assert_relative_eq!(ls[[4]], 1.0);
    assert_relative_eq!(ls[[1]], 0.25);

    assert_eq!(arange(0, 10, 3).iter().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
}

#[test]
fn test_broadcast_node_and_reductions() {
    let col = Array::<_>::from_shape_vec(&[3, 1], vec![1.0, 2.0, 3.0]).unwrap();
    let b = broadcast(&col, &[3, 4]).unwrap();
    assert_relative_eq!(sum(&b).unwrap(), 24.0);

    let totals = sum_axes(&b, &[1]).unwrap();
    assert_eq!(totals.shape(), &[3]);
    assert_eq!(
        Array::<f64>::from_expr(&totals).unwrap().as_slice(),
        &[4.0, 8.0, 12.0]
    );
}

#[test]
fn test_complex_projections() {
    let mut z = Array::<_>::from_shape_vec(
        &[2],
        vec![Complex64::new(1.0, 2.0), Complex64::new(3.0, 4.0)],
    )
    .unwrap();
    let re = Array::<f64>::from_expr(&real(&z)).unwrap();
    assert_eq!(re.as_slice(), &[1.0, 3.0]);

    let mut im = imag_mut(&mut z);
    assign(&mut im, &arange(10.0, 12.0, 1.0)).unwrap();
    assert_eq!(z[[1]], Complex64::new(3.0, 11.0));
}

#[test]
fn test_optional_assignment() {
    let src = OptionalArray::<_>::from_options(&[3], vec![Some(1i32), None, Some(3)]).unwrap();
    let mut dst = OptionalArray::<i32>::empty();
    assign(&mut dst, &src).unwrap();
    assert_eq!(dst.iter().collect::<Vec<_>>(), vec![Some(1), None, Some(3)]);
}

#[test]
fn test_map_over_view() {
    let mut a = make_array(3, 3);
    let mut row = dynamic_view_mut(&mut a, &[idx(2)]).unwrap();
    row.fill(-1.0);
    let abs = Array::<f64>::from_expr(&map(&a, f64::abs)).unwrap();
    assert_relative_eq!(abs[[2, 0]], 1.0);
    assert_relative_eq!(abs[[1, 2]], 5.0);
}

#[test]
fn test_mismatched_vector_length_fails_before_evaluation() {
    let a = make_array(3, 4);
    let v = Array::<_>::from_shape_vec(&[5], vec![1.0; 5]).unwrap();
    let e = &a + &v;
    let mut dst = Array::<f64>::zeros(&[2]);
    assert!(matches!(
        assign(&mut dst, &e),
        Err(StridedError::BroadcastMismatch { .. })
    ));
    assert_eq!(dst.shape(), &[2]);
    assert_eq!(dst.as_slice(), &[0.0, 0.0]);

    let mut fixed = make_array(3, 4);
    let before = fixed.clone();
    {
        let mut whole = dynamic_view_mut(&mut fixed, &[]).unwrap();
        assert_eq!(
            assign(&mut whole, &e).unwrap_err(),
            StridedError::BroadcastMismatch {
                input: vec![5],
                output: vec![3, 4]
            }
        );
    }
    assert_eq!(fixed, before);
}
