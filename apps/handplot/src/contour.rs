//! Contour Extractor: turns a rendered canvas into simplified outer outlines.
//!
//! # Stages
//! 1. luma conversion
//! 2. inverted adaptive Gaussian threshold (ink -> 255, paper -> 0)
//! 3. border following (`imageproc::contours`), outermost borders only
//! 4. chain compression: straight pixel runs collapse to their end points
//! 5. Douglas–Peucker reduction with epsilon proportional to the perimeter
//!
//! Contours keep the border follower's raster-scan order. Nothing here
//! reorders them to shorten pen travel.

use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point;
use tracing::debug;

/// A simplified closed outline in canvas pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourSettings {
    /// Gaussian sigma of the local-mean window. 2.0 matches an 11px block.
    pub threshold_sigma: f32,
    /// A pixel is ink when it is at least this much darker than its local mean.
    pub threshold_offset: i16,
    /// Simplification tolerance as a fraction of the closed perimeter.
    pub epsilon_factor: f64,
}

impl Default for ContourSettings {
    fn default() -> Self {
        ContourSettings {
            threshold_sigma: 2.0,
            threshold_offset: 2,
            epsilon_factor: 0.0005,
        }
    }
}

/// Contours with this many points or fewer are dropped as degenerate.
const MIN_POINTS_EXCLUSIVE: usize = 2;

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs every stage over `canvas` and returns the outlines in extraction order.
pub fn extract(canvas: &RgbImage, settings: &ContourSettings) -> Vec<Contour> {
    let gray = imageops::grayscale(canvas);
    let binary = adaptive_threshold_inv(&gray, settings.threshold_sigma, settings.threshold_offset);

    let mut raw_count = 0usize;
    let contours: Vec<Contour> = find_contours::<i32>(&binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            raw_count += 1;
            let chain = compress_chain(&c.points);
            if chain.len() <= MIN_POINTS_EXCLUSIVE {
                return None;
            }
            let epsilon = settings.epsilon_factor * closed_perimeter(&chain);
            let points = simplify_closed(&chain, epsilon);
            (points.len() > MIN_POINTS_EXCLUSIVE).then_some(Contour { points })
        })
        .collect();

    debug!(
        outer = raw_count,
        kept = contours.len(),
        "Extracted contours"
    );
    contours
}

/// Inverted adaptive threshold against a Gaussian-weighted local mean.
///
/// Output is 255 where `src - mean <= -offset`, 0 elsewhere. Uniform regions
/// (paper, and the interior of strokes wider than the window) come out 0.
pub fn adaptive_threshold_inv(gray: &GrayImage, sigma: f32, offset: i16) -> GrayImage {
    let mean = gaussian_blur_f32(gray, sigma);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let src = i16::from(gray.get_pixel(x, y).0[0]);
        let local = i16::from(mean.get_pixel(x, y).0[0]);
        *pixel = if src - local <= -offset {
            Luma([255])
        } else {
            Luma([0])
        };
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Chain compression
// ────────────────────────────────────────────────────────────────────────────

/// Drops every point whose incoming and outgoing steps point the same way,
/// treating the chain as closed. Repeated points are removed first.
pub fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut ring: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &p in points {
        if ring.last() != Some(&p) {
            ring.push(p);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() <= 2 {
        return ring;
    }

    let n = ring.len();
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            let current = ring[i];
            step(prev, current) != step(current, next)
        })
        .map(|i| ring[i])
        .collect()
}

fn step(from: Point<i32>, to: Point<i32>) -> (i32, i32) {
    ((to.x - from.x).signum(), (to.y - from.y).signum())
}

// ────────────────────────────────────────────────────────────────────────────
// Douglas–Peucker
// ────────────────────────────────────────────────────────────────────────────

/// Length of the closed polygon through `points`.
pub fn closed_perimeter(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&a, &b)| distance(a, b))
        .sum()
}

/// Closed-curve Douglas–Peucker.
///
/// The ring is split at the first point and the point farthest from it; each
/// half is reduced as an open chain. The result is an order-preserving subset
/// of the input starting at the same point, so it never grows.
pub fn simplify_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }

    let origin = points[0];
    let far = (1..n)
        .max_by(|&a, &b| {
            distance(origin, points[a])
                .partial_cmp(&distance(origin, points[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    if distance(origin, points[far]) == 0.0 {
        return vec![origin];
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[far] = true;

    let first_half: Vec<usize> = (0..=far).collect();
    let second_half: Vec<usize> = (far..n).chain(std::iter::once(0)).collect();
    mark_chain(points, &first_half, epsilon, &mut keep);
    mark_chain(points, &second_half, epsilon, &mut keep);

    points
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Open-chain reduction over `chain` (indices into `points`), iterative so
/// long outlines cannot exhaust the stack.
fn mark_chain(points: &[Point<i32>], chain: &[usize], epsilon: f64, keep: &mut [bool]) {
    if chain.len() < 3 {
        return;
    }
    let mut pending = vec![(0usize, chain.len() - 1)];
    while let Some((first, last)) = pending.pop() {
        if last <= first + 1 {
            continue;
        }
        let a = points[chain[first]];
        let b = points[chain[last]];

        let mut worst = first;
        let mut worst_distance = -1.0_f64;
        for i in first + 1..last {
            let d = distance_to_line(points[chain[i]], a, b);
            if d > worst_distance {
                worst = i;
                worst_distance = d;
            }
        }

        if worst_distance > epsilon {
            keep[chain[worst]] = true;
            pending.push((first, worst));
            pending.push((worst, last));
        }
    }
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = f64::from(b.x - a.x);
    let dy = f64::from(b.y - a.y);
    dx.hypot(dy)
}

/// Perpendicular distance from `p` to the line through `a` and `b`
/// (plain distance to `a` when the two coincide).
fn distance_to_line(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let length = distance(a, b);
    if length == 0.0 {
        return distance(a, p);
    }
    let cross = f64::from(b.x - a.x) * f64::from(a.y - p.y)
        - f64::from(a.x - p.x) * f64::from(b.y - a.y);
    cross.abs() / length
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
