use glam::DVec2;
use nalgebra as na;

/// Consistency constant relating MAD to standard deviation under normality.
pub const MAD_SCALE: f64 = 1.4826;

/// Samples further than this many scaled MADs from the median are dropped.
const HAMPEL_SIGMAS: f64 = 3.0;

/// Frame timestamps assume this rate unless configured otherwise.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Moving-average window for the heading series, in samples.
pub const HEADING_WINDOW: usize = 30;

/// Projects 3D camera centers onto their two principal axes.
///
/// The projection is fitted on the full set and applied to the full set, so
/// the output is the input expressed in the plane of maximum variance. Axis
/// orientation and sign are arbitrary (eigenvector convention); consumers
/// must only rely on pairwise distances and relative headings.
pub fn project_principal_plane(centers: &[na::Vector3<f64>]) -> Vec<DVec2> {
    let n = centers.len();
    if n == 0 {
        return Vec::new();
    }

    let mean = centers
        .iter()
        .fold(na::Vector3::zeros(), |acc, c| acc + c)
        / n as f64;

    let mut cov = na::Matrix3::<f64>::zeros();
    for c in centers {
        let d = c - mean;
        cov += d * d.transpose();
    }
    cov /= (n as f64 - 1.0).max(1.0);

    let eig = na::SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let e1 = eig.eigenvectors.column(order[0]).into_owned();
    let e2 = eig.eigenvectors.column(order[1]).into_owned();

    centers
        .iter()
        .map(|c| {
            let d = c - mean;
            DVec2::new(e1.dot(&d), e2.dot(&d))
        })
        .collect()
}

/// Per-step speed along a projected track.
///
/// Sample `i` is `(i / frame_rate, ‖track[i+1] − track[i]‖)`; the series has
/// `N − 1` entries and is empty for tracks shorter than two points. Feed the
/// result through [`hampel_filter`] before plotting.
pub fn velocity_series(track: &[DVec2], frame_rate: f64) -> Vec<(f64, f64)> {
    if track.len() < 2 {
        return Vec::new();
    }
    (0..track.len() - 1)
        .map(|i| (i as f64 / frame_rate, track[i + 1].distance(track[i])))
        .collect()
}

/// Per-step heading change along a projected track.
///
/// Raw headings `atan2(Δy, Δx)` are smoothed with a centered moving average
/// ([`moving_average_same`], window `window`), then differenced backward so
/// sample `i` holds `smoothed[i] − smoothed[i−1]`, with sample 0 forced to
/// exactly 0. The first and last `window/2` samples average over a partial
/// window and are numerically less reliable; they are kept, not truncated.
pub fn curvature_series(track: &[DVec2], frame_rate: f64, window: usize) -> Vec<(f64, f64)> {
    if track.len() < 2 {
        return Vec::new();
    }
    let headings: Vec<f64> = (0..track.len() - 1)
        .map(|i| {
            let d = track[i + 1] - track[i];
            d.y.atan2(d.x)
        })
        .collect();

    let mut values = moving_average_same(&headings, window);
    for i in (0..values.len() - 1).rev() {
        values[i + 1] -= values[i];
    }
    values[0] = 0.0;

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i as f64 / frame_rate, v))
        .collect()
}

/// Single-pass Hampel filter over the value column of a timed series.
///
/// Retains samples within `3 × 1.4826 × MAD` of the median. A zero MAD
/// (over half the samples identical) degenerates the threshold to zero; in
/// that case only samples equal to the median survive.
pub fn hampel_filter(series: &[(f64, f64)]) -> Vec<(f64, f64)> {
    if series.is_empty() {
        return Vec::new();
    }
    let med = median(series.iter().map(|s| s.1));
    let mad = MAD_SCALE * median(series.iter().map(|s| (s.1 - med).abs()));

    series
        .iter()
        .filter(|s| {
            if mad == 0.0 {
                s.1 == med
            } else {
                (s.1 - med).abs() < HAMPEL_SIGMAS * mad
            }
        })
        .copied()
        .collect()
}

/// Uniform moving average with "same"-mode convolution semantics.
///
/// Every output is a sum over the window divided by the full window length,
/// including at the boundaries where fewer input samples are available, so
/// edge outputs are biased toward zero rather than renormalized. The output
/// has the same length as the input. A window of 0 or 1 is the identity.
pub fn moving_average_same(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.is_empty() {
        return values.to_vec();
    }
    let offset = ((window - 1) / 2) as isize;
    (0..values.len())
        .map(|i| {
            let mut acc = 0.0;
            for k in 0..window as isize {
                let j = i as isize + offset - k;
                if j >= 0 && (j as usize) < values.len() {
                    acc += values[j as usize];
                }
            }
            acc / window as f64
        })
        .collect()
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(|a, b| a.total_cmp(b));
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}
