use std::fmt::Write;

pub const DEFAULT_BINS: usize = 20;

const BAR_WIDTH: usize = 50;

/// Equal-width histogram over the range of the input values.
///
/// Every bin is half-open except the last, which also holds the maximum.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let finite = values.iter().copied().filter(|v| v.is_finite());

        let (lo, hi) = finite
            .clone()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo > hi {
            return Self { min: 0.0, max: 1.0, counts: vec![0; bins] };
        }
        let (min, max) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };

        let width = (max - min) / bins as f64;
        let mut counts = vec![0; bins];
        for v in finite {
            let idx = (((v - min) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self { min, max, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn bin_edges(&self, idx: usize) -> (f64, f64) {
        let width = (self.max - self.min) / self.counts.len() as f64;
        (self.min + width * idx as f64, self.min + width * (idx + 1) as f64)
    }

    pub fn render(&self, label: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{label} (n = {})", self.total());

        let peak = self.counts.iter().copied().max().unwrap_or(0).max(1);
        for (idx, &count) in self.counts.iter().enumerate() {
            let (lo, hi) = self.bin_edges(idx);
            let bar = "#".repeat(count * BAR_WIDTH / peak);
            let _ = writeln!(out, "{lo:>6.2} - {hi:>6.2} | {bar} {count}");
        }
        out
    }
}
