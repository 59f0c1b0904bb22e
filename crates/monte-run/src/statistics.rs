use serde::{Deserialize, Serialize};

/// Mean and confidence-interval half-width of one observable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicStatistics {
    /// Sample mean.
    pub mean: f64,
    /// Half-width of the confidence interval on the mean.
    pub half_width: f64,
}

/// Two-sided critical value `z` such that `P(|Z| <= z) = confidence` for a
/// standard normal `Z`. Returns NaN outside `(0, 1)`.
pub fn z_score(confidence: f64) -> f64 {
    if !(confidence > 0.0 && confidence < 1.0) {
        return f64::NAN;
    }
    normal_quantile(0.5 + confidence / 2.0)
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Mean and `z · s / sqrt(n)` half-width assuming independent observations.
///
/// `s` is the sample standard deviation (`n - 1` denominator). Fewer than two
/// observations give an infinite half-width.
pub fn iid_statistics(observations: &[f64], confidence: f64) -> BasicStatistics {
    let n = observations.len();
    if n == 0 {
        return BasicStatistics {
            mean: f64::NAN,
            half_width: f64::INFINITY,
        };
    }
    let mean = observations.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return BasicStatistics {
            mean,
            half_width: f64::INFINITY,
        };
    }
    let sum_sq = observations
        .iter()
        .map(|x| {
            let dx = x - mean;
            dx * dx
        })
        .sum::<f64>();
    let stddev = (sum_sq / (n - 1) as f64).sqrt();
    BasicStatistics {
        mean,
        half_width: z_score(confidence) * stddev / (n as f64).sqrt(),
    }
}

/// Population covariance of two equally long series; NaN when empty.
pub fn covariance(xs: &[f64], ys: &[f64]) -> f64 {
    let len = xs.len().min(ys.len());
    if len == 0 {
        return f64::NAN;
    }
    let mean_x = xs[..len].iter().sum::<f64>() / len as f64;
    let mean_y = ys[..len].iter().sum::<f64>() / len as f64;
    xs[..len]
        .iter()
        .zip(&ys[..len])
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>()
        / len as f64
}
