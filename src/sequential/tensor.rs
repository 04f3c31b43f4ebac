use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

/// Dense row-major 2D tensor of shape `[rows, cols]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: [usize; 2],
}

impl Tensor {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            shape: [rows, cols],
        }
    }

    /// Normal(0, std) entries drawn from the caller's RNG.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, std: f32, rng: &mut R) -> Self {
        // a negative or NaN std degenerates to all-zero weights
        let data = match Normal::new(0.0, std) {
            Ok(normal) => (0..rows * cols).map(|_| normal.sample(rng)).collect(),
            Err(_) => vec![0.0; rows * cols],
        };
        Self { data, shape: [rows, cols] }
    }

    pub fn from_vec(data: Vec<f32>, shape: [usize; 2]) -> Self {
        assert_eq!(data.len(), shape[0] * shape[1], "data length must match shape");
        Self { data, shape }
    }

    /// Stack equally sized rows. Returns `None` on ragged input.
    pub fn from_rows(rows: &[Vec<f32>]) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        let data = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Some(Self {
            data,
            shape: [rows.len(), cols],
        })
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let cols = self.cols();
        &self.data[index * cols..(index + 1) * cols]
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        if self.cols() == 0 {
            return vec![Vec::new(); self.rows()];
        }
        self.data.chunks(self.cols()).map(<[f32]>::to_vec).collect()
    }

    pub fn transpose(&self) -> Self {
        let [m, n] = self.shape;
        let mut data = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                data[j * m + i] = self.data[i * n + j];
            }
        }
        Self { data, shape: [n, m] }
    }

    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.cols(), other.rows(), "self columns must equal other rows");

        let k = self.cols();
        let n = other.cols();
        let mut c = Tensor::zeros(self.rows(), n);
        if n == 0 {
            return c;
        }

        // one output row per rayon task
        c.data.par_chunks_mut(n).enumerate().for_each(|(m_idx, c_row)| {
            let a_row = &self.data[m_idx * k..(m_idx + 1) * k];
            for (k_idx, &a_val) in a_row.iter().enumerate() {
                let b_row = &other.data[k_idx * n..(k_idx + 1) * n];
                for (c_val, &b_val) in c_row.iter_mut().zip(b_row) {
                    *c_val += a_val * b_val;
                }
            }
        });

        c
    }

    /// Column sums, shape `[1, cols]`.
    pub fn sum_rows(&self) -> Tensor {
        let n = self.cols();
        let mut sums = vec![0.0; n];
        if n > 0 {
            for row in self.data.chunks(n) {
                for (acc, &value) in sums.iter_mut().zip(row) {
                    *acc += value;
                }
            }
        }
        Tensor::from_vec(sums, [1, n])
    }

    /// Add a `[1, cols]` row to every row.
    pub fn add_row(&mut self, row: &Tensor) {
        assert_eq!(row.shape, [1, self.cols()], "row must be [1, cols]");
        let n = self.cols();
        if n == 0 {
            return;
        }
        self.data.par_chunks_mut(n).for_each(|chunk| {
            for (value, &bias) in chunk.iter_mut().zip(&row.data) {
                *value += bias;
            }
        });
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f32) -> f32 + Sync + Send,
    {
        let data = self.data.par_iter().map(|&x| f(x)).collect();
        Tensor { data, shape: self.shape }
    }

    pub fn map2<F>(&self, other: &Tensor, f: F) -> Tensor
    where
        F: Fn(f32, f32) -> f32 + Sync + Send,
    {
        assert_eq!(self.shape, other.shape, "tensors must have the same shape");
        let data = self
            .data
            .par_iter()
            .zip(other.data.par_iter())
            .map(|(&x1, &x2)| f(x1, x2))
            .collect();
        Tensor { data, shape: self.shape }
    }
}
