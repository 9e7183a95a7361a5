//! Normalized 8×8 Hadamard feedback mixing for the FDN.
//!
//! Entry `(i, j)` of the matrix is `(-1)^popcount(i & j) / √8`. The matrix
//! is symmetric and orthogonal, so the mix preserves the energy of the
//! eight line outputs exactly (up to rounding).

/// Number of delay lines in the network.
pub const LINES: usize = 8;

/// `1 / √8`
const NORM: f64 = 0.353_553_390_593_273_8;

/// Sign of Hadamard entry `(i, j)`.
#[inline]
pub fn sign(i: usize, j: usize) -> f64 {
    if (i & j).count_ones() % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Dense normalized Hadamard matrix, row-major.
pub fn matrix() -> [[f64; LINES]; LINES] {
    let mut m = [[0.0; LINES]; LINES];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = sign(i, j) * NORM;
        }
    }
    m
}

/// Apply the normalized Hadamard transform with in-place butterflies
/// (fast Walsh-Hadamard, natural ordering).
#[inline]
pub fn mix(input: &[f64; LINES]) -> [f64; LINES] {
    let mut out = *input;
    let mut h = 1;
    while h < LINES {
        let mut i = 0;
        while i < LINES {
            for j in i..i + h {
                let a = out[j];
                let b = out[j + h];
                out[j] = a + b;
                out[j + h] = a - b;
            }
            i += h * 2;
        }
        h *= 2;
    }
    for v in out.iter_mut() {
        *v *= NORM;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_mix(input: &[f64; LINES]) -> [f64; LINES] {
        let m = matrix();
        let mut out = [0.0; LINES];
        for i in 0..LINES {
            out[i] = (0..LINES).map(|j| m[i][j] * input[j]).sum();
        }
        out
    }

    #[test]
    fn butterflies_match_popcount_definition() {
        let input = [0.3, -1.2, 0.7, 0.05, -0.4, 0.9, -0.65, 0.2];
        let fast = mix(&input);
        let dense = dense_mix(&input);
        for (a, b) in fast.iter().zip(dense.iter()) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
    }

    #[test]
    fn energy_preserved() {
        let input = [1.0, -0.5, 0.25, 0.8, -0.9, 0.1, 0.33, -0.77];
        let out = mix(&input);
        let e_in: f64 = input.iter().map(|x| x * x).sum();
        let e_out: f64 = out.iter().map(|x| x * x).sum();
        assert!((e_in - e_out).abs() < 1e-12);
    }

    #[test]
    fn involution() {
        // Symmetric + orthogonal: applying the mix twice is the identity.
        let input = [0.1, 0.2, 0.3, 0.4, -0.5, -0.6, -0.7, -0.8];
        let twice = mix(&mix(&input));
        for (a, b) in input.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn unit_impulse_spreads_evenly() {
        let mut input = [0.0; LINES];
        input[3] = 1.0;
        let out = mix(&input);
        for (i, v) in out.iter().enumerate() {
            assert!((v.abs() - NORM).abs() < 1e-12);
            assert_eq!(v.signum(), sign(i, 3));
        }
    }
}
