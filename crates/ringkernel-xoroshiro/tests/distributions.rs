//! Statistical checks of the device draw functions.
//!
//! 640 threads (10 blocks of 64) each take 4096 draws from their own slot.
//! Per-thread partial sums are accumulated in f64 and combined on the host.

use std::sync::atomic::{AtomicU64, Ordering};

use ringkernel_xoroshiro::prelude::*;

const BLOCKS: usize = 10;
const THREADS_PER_BLOCK: usize = 64;
const DRAWS_PER_THREAD: usize = 4096;

#[derive(Debug)]
struct Moments {
    mean: f64,
    std: f64,
    min: f64,
    max: f64,
}

/// Per-thread accumulators, stored as f64 bit patterns.
struct Partials {
    sum: Vec<AtomicU64>,
    sum_sq: Vec<AtomicU64>,
    min: Vec<AtomicU64>,
    max: Vec<AtomicU64>,
}

impl Partials {
    fn new(threads: usize) -> Self {
        let filled = |v: f64| -> Vec<AtomicU64> {
            (0..threads).map(|_| AtomicU64::new(v.to_bits())).collect()
        };
        Self {
            sum: filled(0.0),
            sum_sq: filled(0.0),
            min: filled(f64::INFINITY),
            max: filled(f64::NEG_INFINITY),
        }
    }

    fn record(&self, i: usize, sum: f64, sum_sq: f64, min: f64, max: f64) {
        self.sum[i].store(sum.to_bits(), Ordering::Relaxed);
        self.sum_sq[i].store(sum_sq.to_bits(), Ordering::Relaxed);
        self.min[i].store(min.to_bits(), Ordering::Relaxed);
        self.max[i].store(max.to_bits(), Ordering::Relaxed);
    }

    fn combine(&self) -> Moments {
        let load = |v: &[AtomicU64]| -> Vec<f64> {
            v.iter()
                .map(|a| f64::from_bits(a.load(Ordering::Relaxed)))
                .collect()
        };
        let n = (self.sum.len() * DRAWS_PER_THREAD) as f64;
        let sum: f64 = load(&self.sum).iter().sum();
        let sum_sq: f64 = load(&self.sum_sq).iter().sum();
        let mean = sum / n;
        let variance = sum_sq / n - mean * mean;

        Moments {
            mean,
            std: variance.sqrt(),
            min: load(&self.min).into_iter().fold(f64::INFINITY, f64::min),
            max: load(&self.max).into_iter().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

fn sample<D>(draw: D) -> Moments
where
    D: Fn(&DeviceStates, usize) -> f64 + Send + Sync,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let device = CpuDevice::new(DeviceConfig::small()).expect("Failed to create device");
    let grid = GridDim::new(BLOCKS, THREADS_PER_BLOCK);
    let states = create_states(&device, grid.total_threads(), 1, 0, None).unwrap();
    let partials = Partials::new(grid.total_threads());

    device
        .launch(grid, |tid| {
            let i = tid.global();
            let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
            let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
            for _ in 0..DRAWS_PER_THREAD {
                let x = draw(&states, i);
                sum += x;
                sum_sq += x * x;
                min = min.min(x);
                max = max.max(x);
            }
            partials.record(i, sum, sum_sq, min, max);
        })
        .expect("Launch failed");

    partials.combine()
}

fn check_uniform(m: &Moments) {
    let expected_std = 1.0 / 12f64.sqrt();
    assert!((m.mean - 0.5).abs() < 0.001, "uniform mean {:?}", m);
    assert!((m.std - expected_std).abs() < 0.001, "uniform std {:?}", m);
    assert!(m.min >= 0.0 && m.min < 1e-4, "uniform min {:?}", m);
    assert!(m.max < 1.0 && m.max > 1.0 - 1e-4, "uniform max {:?}", m);
}

fn check_normal(m: &Moments) {
    assert!(m.mean.abs() < 0.01, "normal mean {:?}", m);
    assert!((m.std - 1.0).abs() < 0.01, "normal std {:?}", m);
    assert!(m.min.is_finite() && m.max.is_finite(), "normal range {:?}", m);
}

#[test]
fn test_uniform_f32_moments() {
    check_uniform(&sample(|s, i| uniform_f32(s, i) as f64));
}

#[test]
fn test_uniform_f64_moments() {
    check_uniform(&sample(uniform_f64));
}

#[test]
fn test_normal_f32_moments() {
    check_normal(&sample(|s, i| normal_f32(s, i) as f64));
}

#[test]
fn test_normal_f64_moments() {
    check_normal(&sample(normal_f64));
}

/// Streams of neighbouring threads are uncorrelated.
#[test]
fn test_neighbour_streams_uncorrelated() {
    let device = CpuDevice::new(DeviceConfig::small()).unwrap();
    let states = create_states(&device, 2, 1, 0, None).unwrap();

    let n = 1usize << 18;
    let (mut sxy, mut sx, mut sy, mut sxx, mut syy) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for _ in 0..n {
        let x = uniform_f64(&states, 0);
        let y = uniform_f64(&states, 1);
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
        syy += y * y;
    }
    let n = n as f64;
    let cov = sxy / n - (sx / n) * (sy / n);
    let corr = cov / ((sxx / n - (sx / n).powi(2)) * (syy / n - (sy / n).powi(2))).sqrt();

    // |corr| has standard error 1/sqrt(n) ~ 0.002
    assert!(corr.abs() < 0.01, "correlation {}", corr);
}
