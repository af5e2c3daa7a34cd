use linfa::Float;
use ndarray::{Array2, ArrayBase, Axis, Data, Ix1, Ix2};

/// Computes differences between each row of `x` and each row of `y`
/// resulting in a 2d array of shape (nrows(x) * nrows(y), ncols(x)),
/// rows ordered as `x`-major (all differences against `y` for the first
/// row of `x` first);
/// *Panics* if x and y have not the same column numbers
pub fn pairwise_differences<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.ncols() == y.ncols());

    let nx = x.nrows();
    let ny = y.nrows();
    let ncols = x.ncols();
    let mut result = Array2::zeros((nx * ny, ncols));

    for (i, x_row) in x.rows().into_iter().enumerate() {
        for (j, y_row) in y.rows().into_iter().enumerate() {
            let idx = i * ny + j;
            for k in 0..ncols {
                result[[idx, k]] = x_row[k] - y_row[k];
            }
        }
    }

    result
}

/// Lays out a sequence of scalar locations as an (n, 1) coordinate set
/// suitable for a 1-dimensional kernel.
pub fn into_column<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F> {
    x.to_owned().insert_axis(Axis(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_pairwise_differences() {
        let x = array![[-0.9486833], [-0.82219219]];
        let y = array![
            [-1.26491106],
            [-0.63245553],
            [0.],
            [0.63245553],
            [1.26491106]
        ];
        assert_abs_diff_eq!(
            &array![
                [0.31622777],
                [-0.31622777],
                [-0.9486833],
                [-1.58113883],
                [-2.21359436],
                [0.44271887],
                [-0.18973666],
                [-0.82219219],
                [-1.45464772],
                [-2.08710326]
            ],
            &pairwise_differences(&x, &y),
            epsilon = 1e-6
        )
    }

    #[test]
    fn test_pairwise_differences_2d() {
        let x = array![[0., 1.], [2., 3.]];
        let y = array![[1., 1.]];
        assert_abs_diff_eq!(
            &array![[-1., 0.], [1., 2.]],
            &pairwise_differences(&x, &y),
            epsilon = 1e-12
        )
    }

    #[test]
    fn test_into_column() {
        let x = array![0.5, 1.5, 2.5];
        assert_eq!(into_column(&x), array![[0.5], [1.5], [2.5]]);
    }
}
