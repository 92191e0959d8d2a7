//! Uniform B-spline basis and interpolation prefilter
//!
//! Coefficients are computed with the recursive filter of Unser (1999),
//! using whole-sample mirror boundaries so that the spline passes through
//! every input sample.
//!
//! Reference:
//! Unser, M. (1999). Splines: A perfect fit for signal and image processing.
//! *IEEE Signal Processing Magazine*, 16(6), 22–38.

/// Highest supported spline degree
pub const MAX_ORDER: usize = 5;

const HORIZON_TOLERANCE: f64 = 1e-15;

/// Centered uniform B-spline of degree `order` evaluated at `t`.
///
/// Uses the truncated-power form
/// `(1 / n!) * sum_k (-1)^k C(n+1, k) max(0, t + (n+1)/2 - k)^n`.
pub fn bspline(order: usize, t: f64) -> f64 {
    let half = (order + 1) as f64 / 2.0;
    if t.abs() >= half {
        return 0.0;
    }
    if order == 0 {
        return 1.0;
    }

    let mut sum = 0.0;
    let mut binomial = 1.0;
    for k in 0..=order + 1 {
        let x = t + half - k as f64;
        if x > 0.0 {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            sum += sign * binomial * x.powi(order as i32);
        }
        binomial = binomial * (order + 1 - k) as f64 / (k + 1) as f64;
    }

    sum / factorial(order)
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Poles of the interpolating prefilter for degree `order`
pub fn poles(order: usize) -> &'static [f64] {
    match order {
        2 => &[-0.171_572_875_253_809_9],
        3 => &[-0.267_949_192_431_122_7],
        4 => &[-0.361_341_225_900_220_2, -0.013_725_429_297_339_12],
        5 => &[-0.430_575_347_099_973_8, -0.043_096_288_203_264_65],
        _ => &[],
    }
}

/// Index into a length-`n` line with whole-sample mirror extension
pub fn mirror_index(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let i = i.rem_euclid(period);
    if i >= n as isize {
        (period - i) as usize
    } else {
        i as usize
    }
}

/// Replace samples in `line` by B-spline coefficients, in place.
pub fn prefilter_line(line: &mut [f64], poles: &[f64]) {
    let n = line.len();
    if n < 2 || poles.is_empty() {
        return;
    }

    let gain: f64 = poles.iter().map(|&z| (1.0 - z) * (1.0 - 1.0 / z)).product();
    for v in line.iter_mut() {
        *v *= gain;
    }

    for &z in poles {
        line[0] = causal_init(line, z);
        for k in 1..n {
            line[k] += z * line[k - 1];
        }

        line[n - 1] = (z / (z * z - 1.0)) * (line[n - 1] + z * line[n - 2]);
        for k in (0..n - 1).rev() {
            line[k] = z * (line[k + 1] - line[k]);
        }
    }
}

fn causal_init(line: &[f64], z: f64) -> f64 {
    let n = line.len();
    let horizon = (HORIZON_TOLERANCE.ln() / z.abs().ln()).ceil() as usize;

    if horizon < n {
        // Truncated sum: the mirrored tail is below tolerance
        let mut zk = 1.0;
        let mut sum = 0.0;
        for &v in &line[..horizon] {
            sum += zk * v;
            zk *= z;
        }
        return sum;
    }

    // Exact mirror-symmetric initialization
    let iz = 1.0 / z;
    let mut zn = z;
    let mut z2n = z.powi(n as i32 - 1);
    let mut sum = line[0] + z2n * line[n - 1];
    z2n *= z2n * iz;
    for &v in &line[1..n - 1] {
        sum += (zn + z2n) * v;
        zn *= z;
        z2n *= iz;
    }
    sum / (1.0 - zn * zn)
}

/// Non-zero interpolation taps `(source index, weight)` at position `x`
/// on a line of `n` samples.
///
/// Order 0 picks the nearest sample, order 1 the two bracketing samples;
/// higher orders return spline weights over mirrored coefficient indices.
pub fn taps(x: f64, n: usize, order: usize) -> Vec<(usize, f64)> {
    let last = n.saturating_sub(1);
    match order {
        0 => {
            let i = ((x + 0.5).floor().max(0.0) as usize).min(last);
            vec![(i, 1.0)]
        }
        1 => {
            let i0 = (x.floor().max(0.0) as usize).min(last);
            let f = x - i0 as f64;
            let mut out = Vec::with_capacity(2);
            if f < 1.0 {
                out.push((i0, 1.0 - f));
            }
            if f > 0.0 && i0 < last {
                out.push((i0 + 1, f));
            }
            out
        }
        _ => {
            let half = (order + 1) as f64 / 2.0;
            let start = (x - half).floor() as isize + 1;
            let end = (x + half).ceil() as isize - 1;
            (start..=end)
                .filter_map(|j| {
                    let w = bspline(order, x - j as f64);
                    (w != 0.0).then(|| (mirror_index(j, n), w))
                })
                .collect()
        }
    }
}
