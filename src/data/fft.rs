//! In-place radix-2 FFT over split real/imaginary arrays.
//!
//! Iterative Cooley-Tukey decimation in time: a bit-reversal permutation
//! followed by `log2(N)` butterfly stages. Twiddle factors and the
//! permutation are computed once per engine so repeated transforms of the
//! same window size allocate nothing.
//!
//! Sign convention: forward transform uses `exp(-2πi·jk/N)` and is unscaled,
//! so a constant input `c` yields `N·c` in bin 0.
//!
//! # Example
//!
//! ```
//! use motion_spectrum::data::fft::FftEngine;
//!
//! let engine = FftEngine::new(8)?;
//! let mut real = vec![10.0; 8];
//! let mut imag = vec![0.0; 8];
//! engine.transform(&mut real, &mut imag);
//! assert!((real[0] - 80.0).abs() < 1e-9);
//! assert!(real[1..].iter().all(|v| v.abs() < 1e-9));
//! # Ok::<(), motion_spectrum::error::SamplerError>(())
//! ```

use crate::error::{SamplerError, SamplerResult};
use std::f64::consts::PI;

/// Reusable FFT plan for one power-of-two length.
#[derive(Debug, Clone)]
pub struct FftEngine {
    len: usize,
    /// `cos(-2πk/N)` and `sin(-2πk/N)` for `k in 0..N/2`.
    twiddle_re: Vec<f64>,
    twiddle_im: Vec<f64>,
    /// Swap pairs `(i, j)` with `i < j` for the bit-reversal permutation.
    swaps: Vec<(usize, usize)>,
}

impl FftEngine {
    /// Plan a transform of length `len`.
    ///
    /// # Errors
    /// `InvalidWindowSize` unless `len` is a power of two.
    pub fn new(len: usize) -> SamplerResult<Self> {
        if !len.is_power_of_two() {
            return Err(SamplerError::InvalidWindowSize { size: len });
        }

        let half = len / 2;
        let (twiddle_re, twiddle_im) = (0..half)
            .map(|k| {
                let angle = -2.0 * PI * k as f64 / len as f64;
                (angle.cos(), angle.sin())
            })
            .unzip();

        let bits = len.trailing_zeros();
        let swaps = (0..len)
            .filter_map(|i| {
                let j = reverse_bits(i, bits);
                (i < j).then_some((i, j))
            })
            .collect();

        Ok(Self {
            len,
            twiddle_re,
            twiddle_im,
            swaps,
        })
    }

    /// Transform length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a plan has at least one point.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Forward DFT of `real + i·imag`, in place.
    ///
    /// # Panics
    /// If either slice length differs from [`FftEngine::len`].
    pub fn transform(&self, real: &mut [f64], imag: &mut [f64]) {
        assert_eq!(real.len(), self.len, "real length must equal FFT length");
        assert_eq!(imag.len(), self.len, "imaginary length must equal FFT length");

        for &(i, j) in &self.swaps {
            real.swap(i, j);
            imag.swap(i, j);
        }

        let n = self.len;
        let mut size = 2;
        while size <= n {
            let half = size / 2;
            let stride = n / size;
            for start in (0..n).step_by(size) {
                for k in 0..half {
                    let wr = self.twiddle_re[k * stride];
                    let wi = self.twiddle_im[k * stride];
                    let i = start + k;
                    let j = i + half;

                    let tr = wr * real[j] - wi * imag[j];
                    let ti = wr * imag[j] + wi * real[j];

                    real[j] = real[i] - tr;
                    imag[j] = imag[i] - ti;
                    real[i] += tr;
                    imag[i] += ti;
                }
            }
            size *= 2;
        }
    }

    /// Inverse DFT, scaled by `1/N`, in place.
    ///
    /// `inverse(transform(x)) == x` up to rounding.
    pub fn inverse(&self, real: &mut [f64], imag: &mut [f64]) {
        imag.iter_mut().for_each(|v| *v = -*v);
        self.transform(real, imag);
        let scale = 1.0 / self.len as f64;
        real.iter_mut().for_each(|v| *v *= scale);
        imag.iter_mut().for_each(|v| *v = -*v * scale);
    }
}

/// Reverse the lower `bits` bits of `value`.
fn reverse_bits(value: usize, bits: u32) -> usize {
    if bits == 0 {
        return 0;
    }
    value.reverse_bits() >> (usize::BITS - bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rustfft::{num_complex::Complex, FftPlanner};

    const SIZES: [usize; 7] = [1, 2, 4, 8, 32, 128, 512];

    #[test]
    fn rejects_non_power_of_two() {
        for len in [0, 3, 12, 1000] {
            assert!(matches!(
                FftEngine::new(len),
                Err(SamplerError::InvalidWindowSize { size }) if size == len
            ));
        }
    }

    #[test]
    fn test_bit_reverse() {
        assert_eq!(reverse_bits(0b000, 3), 0b000);
        assert_eq!(reverse_bits(0b001, 3), 0b100);
        assert_eq!(reverse_bits(0b110, 3), 0b011);
        assert_eq!(reverse_bits(0, 0), 0);
    }

    #[test]
    fn zeros_stay_zero() {
        for n in SIZES {
            let engine = FftEngine::new(n).unwrap();
            let mut real = vec![0.0; n];
            let mut imag = vec![0.0; n];
            engine.transform(&mut real, &mut imag);
            assert!(real.iter().chain(imag.iter()).all(|&v| v == 0.0), "n {n}");
        }
    }

    #[test]
    fn impulse_is_flat() {
        let engine = FftEngine::new(16).unwrap();
        let mut real = vec![0.0; 16];
        let mut imag = vec![0.0; 16];
        real[0] = 1.0;
        engine.transform(&mut real, &mut imag);
        for k in 0..16 {
            assert!((real[k] - 1.0).abs() < 1e-12);
            assert!(imag[k].abs() < 1e-12);
        }
    }

    #[test]
    fn one_period_sine_lands_in_bins_one_and_n_minus_one() {
        for n in [8usize, 64, 256] {
            let engine = FftEngine::new(n).unwrap();
            let mut real: Vec<f64> = (0..n)
                .map(|i| (2.0 * PI * i as f64 / n as f64).sin())
                .collect();
            let mut imag = vec![0.0; n];
            engine.transform(&mut real, &mut imag);

            let mag = |k: usize| real[k].hypot(imag[k]);
            let half = n as f64 / 2.0;
            assert!(mag(0) < 1e-9, "DC not near zero for n {n}");
            assert!((mag(1) - half).abs() < 1e-9);
            assert!((mag(n - 1) - half).abs() < 1e-9);
            // Conjugate symmetry for real input
            assert!((real[1] - real[n - 1]).abs() < 1e-9);
            assert!((imag[1] + imag[n - 1]).abs() < 1e-9);
            for k in 2..n - 1 {
                assert!(mag(k) < 1e-9, "leakage in bin {k} for n {n}");
            }
        }
    }

    #[test]
    fn inverse_reconstructs_input() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for n in SIZES {
            let engine = FftEngine::new(n).unwrap();
            let original: Vec<f64> = (0..n).map(|_| rng.gen_range(-20.0..20.0)).collect();
            let mut real = original.clone();
            let mut imag = vec![0.0; n];

            engine.transform(&mut real, &mut imag);
            engine.inverse(&mut real, &mut imag);

            for (got, want) in real.iter().zip(&original) {
                let tolerance = 1e-9 * want.abs().max(1.0);
                assert!((got - want).abs() < tolerance, "n {n}: {got} vs {want}");
            }
            assert!(imag.iter().all(|v| v.abs() < 1e-9));
        }
    }

    #[test]
    fn matches_reference_fft() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let n = 128;
        let engine = FftEngine::new(n).unwrap();

        let input: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..15.0)).collect();
        let mut real = input.clone();
        let mut imag = vec![0.0; n];
        engine.transform(&mut real, &mut imag);

        let mut reference: Vec<Complex<f64>> =
            input.iter().map(|&v| Complex::new(v, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(n).process(&mut reference);

        for k in 0..n {
            assert!((real[k] - reference[k].re).abs() < 1e-9, "bin {k} re");
            assert!((imag[k] - reference[k].im).abs() < 1e-9, "bin {k} im");
        }
    }

    #[test]
    fn engine_is_reusable() {
        let engine = FftEngine::new(8).unwrap();
        for value in [1.0, 2.5, -3.0] {
            let mut real = vec![value; 8];
            let mut imag = vec![0.0; 8];
            engine.transform(&mut real, &mut imag);
            assert!((real[0] - 8.0 * value).abs() < 1e-12);
        }
    }

    #[test]
    #[should_panic(expected = "real length must equal FFT length")]
    fn length_mismatch_panics() {
        let engine = FftEngine::new(8).unwrap();
        let mut real = vec![0.0; 4];
        let mut imag = vec![0.0; 8];
        engine.transform(&mut real, &mut imag);
    }
}
