//! Zero-padded 2D correlation of a square matrix with a square mask.
//!
//! `C[i][j] = sum(A[i + k - r][j + l - r] * M[k][l])` over `k, l < m` with
//! `r = (m - 1) / 2`; entries of `A` outside the matrix count as zero. Every
//! output element is computed by its own work-item.

use tracing::debug;

use crate::array::SquareMatrix;
use crate::dispatch::KernelCall;
use crate::error::{Error, Result};
use crate::executor::{DeviceExecutor, Grid, Kernel, CONVOLUTION_TILE};

pub fn convolve<E: DeviceExecutor>(
    executor: &E,
    a: &SquareMatrix,
    mask: &SquareMatrix,
) -> Result<SquareMatrix> {
    let (n, m) = (a.size(), mask.size());
    if m % 2 == 0 {
        return Err(Error::InvalidConfig(format!("mask size must be odd, got {m}")));
    }
    let mut c = SquareMatrix::zeros(n);
    if n == 0 {
        return Ok(c);
    }
    debug!(n, m, "convolution");

    KernelCall::new(executor, Kernel::Convolution)
        .input(a.as_slice())?
        .input(mask.as_slice())?
        .output(n * n)?
        .scalar(n)?
        .scalar(m)?
        .launch(Grid::square(n, CONVOLUTION_TILE))?
        .read_output(c.as_mut_slice())?;
    Ok(c)
}

/// Sequential reference of [`convolve`].
pub fn convolve_cpu(a: &SquareMatrix, mask: &SquareMatrix) -> SquareMatrix {
    let (n, m) = (a.size(), mask.size());
    let radius = (m as isize - 1) / 2;
    let mut c = SquareMatrix::zeros(n);
    for i in 0..n {
        for j in 0..n {
            let mut acc = 0.0;
            for k in 0..m {
                for l in 0..m {
                    let r = i as isize + k as isize - radius;
                    let s = j as isize + l as isize - radius;
                    if (0..n as isize).contains(&r) && (0..n as isize).contains(&s) {
                        acc += a[(r as usize, s as usize)] * mask[(k, l)];
                    }
                }
            }
            c[(i, j)] = acc;
        }
    }
    c
}
