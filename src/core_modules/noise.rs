// THEORY:
// Two of the effects (and the two block effects) need a small random texture
// before any pixel is written. These textures are always synthesized on the
// calling thread, finished, and only then shared read-only with the workers.
//
// Randomness is never shared between threads. Every frame has one seed; each
// consumer derives its own ChaCha stream from it:
// - stream `SEQUENTIAL_STREAM` for draws made before the fork (shift amounts,
//   block grids, noise strips),
// - stream `partition.index` for draws made inside a worker range.
// A given `(seed, thread count)` therefore always renders the same frame.

use crate::core_modules::frame::frame::{Dimensions, RGBA_CHANNELS, Rgba};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Stream id reserved for draws made on the calling thread before a fork.
pub const SEQUENTIAL_STREAM: u64 = u64::MAX;
/// The block effects always use a `BLOCK_COUNT x BLOCK_COUNT` grid.
pub const BLOCK_COUNT: usize = 10;

/// An independent generator for one consumer of a frame's randomness.
pub fn frame_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// A uniform draw in `[0, 1)`.
#[inline]
pub fn unit<R: Rng>(rng: &mut R) -> f32 {
    rng.gen_range(0.0f32..1.0)
}

/// A run-length encoded strip of RGBA texels, one texel row per cluster of
/// `cluster_rows` frame rows.
#[derive(Debug, Clone)]
pub struct NoiseStrip {
    width: usize,
    rows: usize,
    cluster_rows: usize,
    texels: Vec<u8>,
}

impl NoiseStrip {
    /// Builds a strip for a frame of `dims`, grouping `height / clusters` frame
    /// rows per texel row.
    ///
    /// Texels are filled in runs. Each run draws a length in
    /// `[0, width * (1 - intensity)]`, a random colour and an alpha flag that is
    /// on with probability `intensity`. A run covers at least one texel and may
    /// carry over into the next texel row.
    pub fn synthesize<R: Rng>(rng: &mut R, dims: Dimensions, clusters: u32, intensity: f32) -> Self {
        let width = dims.width as usize;
        let height = dims.height as usize;
        let cluster_rows = (height / clusters.max(1) as usize).max(1);
        let rows = height.div_ceil(cluster_rows);

        let mut texels = vec![0u8; rows * width * RGBA_CHANNELS];
        let mut remaining = 0usize;
        let mut current: Rgba = [0; 4];

        for texel in texels.chunks_exact_mut(RGBA_CHANNELS) {
            if remaining == 0 {
                let run = (unit(rng) * width as f32 * (1.0 - intensity)).round() as usize;
                remaining = run.max(1);
                current = [
                    (unit(rng) * 255.0) as u8,
                    (unit(rng) * 255.0) as u8,
                    (unit(rng) * 255.0) as u8,
                    if unit(rng) > intensity { 0 } else { 255 },
                ];
            }
            texel.copy_from_slice(&current);
            remaining -= 1;
        }

        Self {
            width,
            rows,
            cluster_rows,
            texels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of texel rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Frame rows covered by one texel row.
    pub fn cluster_rows(&self) -> usize {
        self.cluster_rows
    }

    pub fn texel(&self, row: usize, col: usize) -> Rgba {
        let start = (row * self.width + col) * RGBA_CHANNELS;
        [
            self.texels[start],
            self.texels[start + 1],
            self.texels[start + 2],
            self.texels[start + 3],
        ]
    }

    /// The texel covering frame pixel `(row, col)`.
    #[inline]
    pub fn texel_for_pixel(&self, row: usize, col: usize) -> Rgba {
        self.texel(row / self.cluster_rows, col)
    }
}

/// One noise byte per block of a fixed `BLOCK_COUNT x BLOCK_COUNT` grid.
#[derive(Debug, Clone)]
pub struct BlockNoiseGrid {
    cells: [u8; BLOCK_COUNT * BLOCK_COUNT],
    block_width: usize,
    block_height: usize,
}

impl BlockNoiseGrid {
    /// Draws a value in `[0, 255)` per block. With `gated` set, each block is
    /// then zeroed unless a second draw falls at or below `intensity`.
    pub fn synthesize<R: Rng>(rng: &mut R, dims: Dimensions, intensity: f32, gated: bool) -> Self {
        let mut cells = [0u8; BLOCK_COUNT * BLOCK_COUNT];
        for cell in cells.iter_mut() {
            *cell = (unit(rng) * 255.0) as u8;
            if gated && unit(rng) > intensity {
                *cell = 0;
            }
        }

        Self {
            cells,
            block_width: (dims.width as usize / BLOCK_COUNT).max(1),
            block_height: (dims.height as usize / BLOCK_COUNT).max(1),
        }
    }

    pub fn cell(&self, block_row: usize, block_col: usize) -> u8 {
        self.cells[block_row * BLOCK_COUNT + block_col]
    }

    /// The noise value of the block containing `(row, col)`. Pixels past the
    /// last full block belong to the last block.
    #[inline]
    pub fn for_pixel(&self, row: usize, col: usize) -> u8 {
        let block_row = (row / self.block_height).min(BLOCK_COUNT - 1);
        let block_col = (col / self.block_width).min(BLOCK_COUNT - 1);
        self.cell(block_row, block_col)
    }
}
