// THEORY:
// The effect library is a set of stateless, pure pixel transforms. Each one
// reads an input frame, writes every pixel of a distinct output frame exactly
// once, and is driven by a single scalar: the motion intensity.
//
// Two families:
// - Remaps (split RGB, scan line, sand, blocks) compute a source coordinate per
//   pixel (or per channel) and copy from there. Shifts are always folded back
//   with toroidal wraparound, so any magnitude is safe.
// - Noise composites (digital stripes) first synthesize a NoiseStrip on the
//   calling thread and then combine it with the input in parallel.
//
// All randomness comes from the frame seed carried by `EffectRun`. Draws made
// inside a worker range use that range's own stream.

use crate::core_modules::frame::frame::{CHANNELS, Dimensions, FrameBuffer, FrameView, Rgb};
use crate::core_modules::noise::{BlockNoiseGrid, NoiseStrip, SEQUENTIAL_STREAM, frame_rng, unit};
use crate::core_modules::partition::{Partition, WorkerPool};

/// Largest shift, in pixels, of the split/scan/sand effects at full intensity.
pub const SHIFT_SCALE: f32 = 250.0;
/// Shift per unit of block noise at full intensity.
pub const BLOCK_SHIFT_SCALE: f32 = 5.0;
/// The digital stripe effect groups `height / 25` rows per noise row.
pub const DIGITAL_STRIPE_CLUSTERS: u32 = 25;
pub const INT_DIGITAL_STRIPE_CLUSTERS: u32 = 30;

/// Everything an effect needs besides its buffers.
#[derive(Clone, Copy)]
pub struct EffectRun<'a> {
    pub pool: &'a WorkerPool,
    /// Seed for every random draw of this invocation.
    pub seed: u64,
}

impl<'a> EffectRun<'a> {
    pub fn new(pool: &'a WorkerPool, seed: u64) -> Self {
        Self { pool, seed }
    }
}

#[inline]
fn scaled_shift(scale: f32, intensity: f32, draw: f32) -> i64 {
    (scale * intensity * draw).round() as i64
}

fn prepare(out: &FrameBuffer, input: &FrameBuffer, intensity: f32) -> (Dimensions, f32) {
    assert_eq!(
        out.dimensions(),
        input.dimensions(),
        "effect output and input must share dimensions"
    );
    (input.dimensions(), intensity.clamp(0.0, 1.0))
}

/// Runs `pixel` for every index of `out`, in parallel, storing what it returns.
fn remap<F>(run: &EffectRun<'_>, out: &mut FrameBuffer, dims: Dimensions, pixel: F)
where
    F: Fn(&mut PixelCursor, usize, usize) -> Rgb + Sync,
{
    run.pool.scatter(dims.pixel_count(), out.as_bytes_mut(), CHANNELS, |part, chunk| {
        let mut cursor = PixelCursor::new(run.seed, part);
        for (offset, px) in chunk.chunks_exact_mut(CHANNELS).enumerate() {
            let (row, col) = dims.row_col(part.start + offset);
            px.copy_from_slice(&pixel(&mut cursor, row, col));
        }
    });
}

/// Per-range state handed to a remap closure: its own generator plus the row
/// it saw last, for effects that redraw once per row.
struct PixelCursor {
    rng: rand_chacha::ChaCha8Rng,
    row: Option<usize>,
    row_draw: f32,
}

impl PixelCursor {
    fn new(seed: u64, part: Partition) -> Self {
        Self {
            rng: frame_rng(seed, part.index as u64),
            row: None,
            row_draw: 0.0,
        }
    }

    fn draw(&mut self) -> f32 {
        unit(&mut self.rng)
    }

    /// The draw for `row`, refreshed whenever the scan enters a new row.
    fn draw_for_row(&mut self, row: usize) -> f32 {
        if self.row != Some(row) {
            self.row = Some(row);
            self.row_draw = unit(&mut self.rng);
        }
        self.row_draw
    }
}

/// Red read from `+shift` columns and blue from `-shift`, with the red/blue
/// row moved by `row_shift`. Green stays put.
fn split_channels(src: FrameView<'_>, dims: Dimensions, row: usize, col: usize, shift: i64, row_shift: i64) -> Rgb {
    let src_row = dims.wrap_row(row, row_shift);
    [
        src.pixel(src_row, dims.wrap_col(col, shift))[0],
        src.pixel(row, col)[1],
        src.pixel(src_row, dims.wrap_col(col, -shift))[2],
    ]
}

/// Split RGB with an explicit shift. `shift_rows` also moves red/blue rows.
pub fn split_rgb_with_shift(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, shift: i64, shift_rows: bool) {
    let (dims, _) = prepare(out, input, 0.0);
    let src = input.view();
    let row_shift = if shift_rows { shift } else { 0 };
    remap(run, out, dims, |_, row, col| split_channels(src, dims, row, col, shift, row_shift));
}

fn split_rgb(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32, shift_rows: bool) {
    let (_, intensity) = prepare(out, input, intensity);
    let mut rng = frame_rng(run.seed, SEQUENTIAL_STREAM);
    let shift = scaled_shift(SHIFT_SCALE, intensity, unit(&mut rng));
    split_rgb_with_shift(run, out, input, shift, shift_rows);
}

/// Separates red and blue horizontally by one shared random shift.
pub fn split_rgb1(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    split_rgb(run, out, input, intensity, false);
}

/// Like `split_rgb1`, but red and blue are also moved down by the same shift.
pub fn split_rgb2(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    split_rgb(run, out, input, intensity, true);
}

/// Every row slides horizontally by its own random amount.
pub fn scan_line(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    let (dims, intensity) = prepare(out, input, intensity);
    let src = input.view();
    remap(run, out, dims, |cursor, row, col| {
        let jitter = cursor.draw_for_row(row);
        let shift = scaled_shift(SHIFT_SCALE, intensity, jitter * 2.0 - 1.0);
        src.pixel(row, dims.wrap_col(col, shift))
    });
}

/// Every pixel is fetched from its own random two-dimensional offset.
pub fn sand(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    let (dims, intensity) = prepare(out, input, intensity);
    let src = input.view();
    remap(run, out, dims, |cursor, row, col| {
        let shift_x = scaled_shift(SHIFT_SCALE, intensity, cursor.draw() * 2.0 - 1.0);
        let shift_y = scaled_shift(SHIFT_SCALE, intensity, cursor.draw() * 2.0 - 1.0);
        src.pixel(dims.wrap_row(row, shift_y), dims.wrap_col(col, shift_x))
    });
}

/// Red/blue split whose shift comes from a block grid instead of one draw.
pub fn block_split_with_grid(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32, grid: &BlockNoiseGrid) {
    let (dims, intensity) = prepare(out, input, intensity);
    let src = input.view();
    remap(run, out, dims, |_, row, col| {
        let shift = scaled_shift(BLOCK_SHIFT_SCALE, intensity, grid.for_pixel(row, col) as f32);
        split_channels(src, dims, row, col, shift, 0)
    });
}

fn block(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32, gated: bool) {
    let (dims, intensity) = prepare(out, input, intensity);
    let mut rng = frame_rng(run.seed, SEQUENTIAL_STREAM);
    let grid = BlockNoiseGrid::synthesize(&mut rng, dims, intensity, gated);
    block_split_with_grid(run, out, input, intensity, &grid);
}

/// Each block of a 10x10 grid gets its own red/blue split.
pub fn block1(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    block(run, out, input, intensity, false);
}

/// `block1` where only about `intensity` of the blocks are displaced.
pub fn block2(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    block(run, out, input, intensity, true);
}

/// Composites `strip` over `input`: where a texel's alpha is set the pixel is
/// half input, half noise, inverted. Elsewhere the input passes through.
pub fn digital_stripe_with_strip(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, strip: &NoiseStrip) {
    let (dims, _) = prepare(out, input, 0.0);
    let src = input.view();
    remap(run, out, dims, |_, row, col| {
        let pixel = src.pixel(row, col);
        let texel = strip.texel_for_pixel(row, col);
        if texel[3] == 0 {
            return pixel;
        }
        let mut blended = [0u8; CHANNELS];
        for channel in 0..CHANNELS {
            let mix = 0.5 * pixel[channel] as f32 + 0.5 * texel[channel] as f32;
            blended[channel] = (255.0 - mix) as u8;
        }
        blended
    });
}

/// Replaces each pixel with its noise colour where the alpha flag is set and
/// with black elsewhere.
pub fn int_digital_stripe_with_strip(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, strip: &NoiseStrip) {
    let (dims, _) = prepare(out, input, 0.0);
    remap(run, out, dims, |_, row, col| {
        let texel = strip.texel_for_pixel(row, col);
        if texel[3] == 0 {
            [0; CHANNELS]
        } else {
            [texel[0], texel[1], texel[2]]
        }
    });
}

fn stripe_strip(run: &EffectRun<'_>, dims: Dimensions, clusters: u32, intensity: f32) -> NoiseStrip {
    let mut rng = frame_rng(run.seed, SEQUENTIAL_STREAM);
    NoiseStrip::synthesize(&mut rng, dims, clusters, intensity)
}

pub fn digital_stripe(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    let (dims, intensity) = prepare(out, input, intensity);
    let strip = stripe_strip(run, dims, DIGITAL_STRIPE_CLUSTERS, intensity);
    digital_stripe_with_strip(run, out, input, &strip);
}

pub fn int_digital_stripe(run: &EffectRun<'_>, out: &mut FrameBuffer, input: &FrameBuffer, intensity: f32) {
    let (dims, intensity) = prepare(out, input, intensity);
    let strip = stripe_strip(run, dims, INT_DIGITAL_STRIPE_CLUSTERS, intensity);
    int_digital_stripe_with_strip(run, out, input, &strip);
}
