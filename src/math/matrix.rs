use rand::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::AddAssign;

/// Dense row-major matrix of `f64`.
///
/// Layer weights are stored as `(input_size, size)` so a forward pass is the
/// row vector product `x · W`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn zeros_like(other: &Matrix) -> Matrix {
        Matrix::zeros(other.rows, other.cols)
    }

    /// Builds a matrix from equally sized rows.
    ///
    /// # Panics
    /// Panics if the rows differ in length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Matrix {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "Rows must all have the same length");
            data.extend_from_slice(row);
        }
        Matrix { rows: rows.len(), cols, data }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng>(rng: &mut R) -> f64 {
        // (0, 1] avoids log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal(rows: usize, cols: usize, std_dev: f64) -> Matrix {
        let mut rng = rand::thread_rng();
        let data = (0..rows * cols)
            .map(|_| Matrix::sample_standard_normal(&mut rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    /// He initialization: N(0, sqrt(2 / fan_in)) with `rows` as the fan-in.
    ///
    /// Used in front of ReLU-family activations.
    pub fn he(rows: usize, cols: usize) -> Matrix {
        Matrix::normal(rows, cols, (2.0 / rows.max(1) as f64).sqrt())
    }

    /// Xavier (Glorot) initialization: N(0, sqrt(1 / fan_in)) with `rows` as the fan-in.
    pub fn xavier(rows: usize, cols: usize) -> Matrix {
        Matrix::normal(rows, cols, (1.0 / rows.max(1) as f64).sqrt())
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    /// Row vector times matrix: `x · self`, returning a vector of length `cols`.
    ///
    /// # Panics
    /// Panics if `x.len() != rows`.
    pub fn vec_mul(&self, x: &[f64]) -> Vec<f64> {
        if x.len() != self.rows {
            panic!("Matrices are of incorrect sizes")
        }
        let mut out = vec![0.0; self.cols];
        for (i, &xi) in x.iter().enumerate() {
            if xi == 0.0 {
                continue;
            }
            for (o, w) in out.iter_mut().zip(self.row(i)) {
                *o += xi * w;
            }
        }
        out
    }

    /// Matrix times column vector: `self · v`, returning a vector of length `rows`.
    ///
    /// # Panics
    /// Panics if `v.len() != cols`.
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        if v.len() != self.cols {
            panic!("Matrices are of incorrect sizes")
        }
        (0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(w, d)| w * d).sum())
            .collect()
    }

    /// Outer product `aᵀ · b` as a `(a.len(), b.len())` matrix.
    pub fn outer(a: &[f64], b: &[f64]) -> Matrix {
        let mut data = Vec::with_capacity(a.len() * b.len());
        for &x in a {
            data.extend(b.iter().map(|&y| x * y));
        }
        Matrix { rows: a.len(), cols: b.len(), data }
    }

    /// `self += other * scale`, element-wise.
    pub fn add_scaled(&mut self, other: &Matrix, scale: f64) {
        if self.rows != other.rows || self.cols != other.cols {
            panic!("Matrices are of incorrect sizes")
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b * scale;
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl AddAssign<&Matrix> for Matrix {
    fn add_assign(&mut self, rhs: &Matrix) {
        self.add_scaled(rhs, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_mul_matches_manual_product() {
        // x = [1, 2], W = [[1, 2, 3], [4, 5, 6]]
        let w = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(w.vec_mul(&[1.0, 2.0]), vec![9.0, 12.0, 15.0]);
    }

    #[test]
    fn test_mul_vec_is_transpose_of_vec_mul() {
        let w = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let d = [1.0, 0.0, -1.0];
        assert_eq!(w.mul_vec(&d), w.transpose().vec_mul(&d));
    }

    #[test]
    fn test_outer_shape_and_values() {
        let m = Matrix::from_rows(&[vec![1.0], vec![2.0]]);
        let o = Matrix::outer(&m.data, &[3.0, 4.0]);
        assert_eq!((o.rows, o.cols), (2, 2));
        assert_eq!(o.data, vec![3.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    #[should_panic(expected = "incorrect sizes")]
    fn test_add_scaled_rejects_mismatched_shapes() {
        let mut a = Matrix::zeros(2, 2);
        a.add_scaled(&Matrix::zeros(2, 3), 1.0);
    }
}
