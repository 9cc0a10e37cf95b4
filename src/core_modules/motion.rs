// THEORY:
// The `MotionEstimator` turns a stream of live frames into a single scalar per
// frame: the fraction of pixels whose foreground/background classification
// flipped since the last observation. That scalar ("intensity") drives how hard
// the active effect distorts the picture.
//
// Per frame:
// 1. The live frame is reduced to BT.601 luma and binarized with Otsu's
//    method, which picks the global threshold that maximizes between-class
//    variance. No tuning is needed and flat frames still produce a valid mask.
// 2. In one fork-join phase the background and live frames are alpha-blended
//    into the merged buffer and the new mask is compared with the previous one.
//    Each flipped pixel bumps an atomic counter and is written back into the
//    previous mask, so the stored mask always holds the latest value per pixel.
// 3. intensity = flipped / (width * height).

use crate::core_modules::frame::frame::{CHANNELS, Dimensions, FrameBuffer, MaskBuffer, Rgb};
use crate::core_modules::partition::WorkerPool;
use crate::error::GlitchError;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

const HISTOGRAM_BINS: usize = 256;

/// The outcome of one motion estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReport {
    /// Fraction of pixels whose mask value flipped, in `[0, 1]`.
    pub intensity: f32,
    pub changed_pixels: usize,
    /// The Otsu threshold chosen for the live frame.
    pub threshold: u8,
}

/// Blends one channel, truncating toward zero like an unsigned byte store.
///
/// Written as `bg + (live - bg) * alpha` so equal inputs come back unchanged and
/// the result never leaves `[min, max]` of the two inputs.
#[inline]
pub fn blend_channel(background: u8, live: u8, alpha: f32) -> u8 {
    let background = background as f32;
    (background + (live as f32 - background) * alpha) as u8
}

/// BT.601 luma of every pixel, truncated to a byte.
pub fn luma(frame: &FrameBuffer) -> Vec<u8> {
    frame.pixels().map(luminance).collect()
}

/// `0.299 R + 0.587 G + 0.114 B` in integer thousandths, so white stays 255.
#[inline]
pub fn luminance([red, green, blue]: Rgb) -> u8 {
    ((299 * red as u32 + 587 * green as u32 + 114 * blue as u32) / 1000) as u8
}

/// Otsu's global threshold: the level that maximizes between-class variance.
pub fn otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0usize; HISTOGRAM_BINS];
    for &value in gray {
        histogram[value as usize] += 1;
    }

    let total = gray.len() as f64;
    if total == 0.0 {
        return 0;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut best_level = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_weight = 0.0f64;
    let mut background_sum = 0.0f64;

    for (level, &count) in histogram.iter().enumerate() {
        background_weight += count as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }

        background_sum += level as f64 * count as f64;
        let background_mean = background_sum / background_weight;
        let foreground_mean = (weighted_total - background_sum) / foreground_weight;
        let variance = background_weight * foreground_weight * (background_mean - foreground_mean).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}

/// Luma + Otsu binarization of a live frame. Pixels above the threshold are 255.
pub fn binarize(frame: &FrameBuffer) -> Result<(MaskBuffer, u8), GlitchError> {
    let gray = luma(frame);
    let threshold = otsu_threshold(&gray);
    let bits = gray.into_iter().map(|v| if v > threshold { 255 } else { 0 }).collect();
    let dims = frame.dimensions();
    Ok((MaskBuffer::from_raw(dims.width, dims.height, bits)?, threshold))
}

/// Owns the previous frame's mask and produces a merged buffer plus intensity.
pub struct MotionEstimator {
    dims: Dimensions,
    previous_mask: Option<MaskBuffer>,
    last_report: Option<MotionReport>,
}

impl MotionEstimator {
    pub fn new(dims: Dimensions) -> Self {
        Self {
            dims,
            previous_mask: None,
            last_report: None,
        }
    }

    /// Blends `background` and `live` into `merged` and measures how much of the
    /// live frame's mask changed since the previous call.
    ///
    /// The first call only records the mask and reports an intensity of 0.
    pub fn estimate(
        &mut self,
        pool: &WorkerPool,
        background: &FrameBuffer,
        live: &FrameBuffer,
        alpha: f32,
        merged: &mut FrameBuffer,
    ) -> Result<MotionReport, GlitchError> {
        for frame in [background, live, &*merged] {
            if frame.dimensions() != self.dims {
                return Err(GlitchError::DimensionMismatch {
                    expected: self.dims,
                    found: frame.dimensions(),
                });
            }
        }

        let (mask, threshold) = binarize(live)?;
        let previous = self.previous_mask.get_or_insert_with(|| mask.clone());

        let total = self.dims.pixel_count();
        let changed = AtomicUsize::new(0);
        let background = background.view();
        let live = live.view();
        let mask = mask.as_bytes();

        pool.scatter2(
            total,
            merged.as_bytes_mut(),
            CHANNELS,
            previous.as_bytes_mut(),
            1,
            |part, merged, previous| {
                for (offset, (out, prev)) in merged.chunks_exact_mut(CHANNELS).zip(previous.iter_mut()).enumerate() {
                    let index = part.start + offset;
                    let bg = background.pixel_at(index);
                    let cam = live.pixel_at(index);
                    for channel in 0..CHANNELS {
                        out[channel] = blend_channel(bg[channel], cam[channel], alpha);
                    }

                    if mask[index] != *prev {
                        changed.fetch_add(1, Ordering::Relaxed);
                        *prev = mask[index];
                    }
                }
            },
        );

        let changed_pixels = changed.into_inner();
        let intensity = if total == 0 {
            0.0
        } else {
            changed_pixels as f32 / total as f32
        };

        let report = MotionReport {
            intensity,
            changed_pixels,
            threshold,
        };
        trace!(?report, "motion estimated");
        self.last_report = Some(report);
        Ok(report)
    }

    /// Forgets the stored mask; the next frame is treated as the first.
    pub fn reset(&mut self) {
        self.previous_mask = None;
        self.last_report = None;
    }

    pub fn previous_mask(&self) -> Option<&MaskBuffer> {
        self.previous_mask.as_ref()
    }

    pub fn last_report(&self) -> Option<&MotionReport> {
        self.last_report.as_ref()
    }
}
