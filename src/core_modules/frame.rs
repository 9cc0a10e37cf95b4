// THEORY:
// The `frame` module is the most fundamental unit of the engine. It owns the
// binary contract shared with every collaborator: interleaved 8-bit RGB,
// row-major, no row padding. Everything above this layer talks in terms of
// `(row, col)` coordinates and `[u8; 3]` pixels instead of raw byte offsets.
//
// Key principles:
// 1) Dumb containers: `FrameBuffer` and `MaskBuffer` only know their size and
//    how to hand out pixels. They never decide what a pixel should become.
// 2) Toroidal addressing lives here: `Dimensions::wrap_col` / `wrap_row` are the
//    only place a shifted coordinate is folded back into range, so no effect can
//    read outside a buffer regardless of how large its shift is.
// 3) Worker ranges write through plain `&mut [u8]` chunks; `FrameView` is the
//    shared, read-only side of the same layout.

pub mod frame {
    use crate::error::GlitchError;
    use std::fmt;

    pub type Channel = u8;
    pub type Rgb = [Channel; 3];
    pub type Rgba = [Channel; 4];

    /// Bytes per pixel in a `FrameBuffer`.
    pub const CHANNELS: usize = 3;
    /// Bytes per texel in an RGBA noise texture.
    pub const RGBA_CHANNELS: usize = 4;

    /// The size of a frame in pixels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dimensions {
        pub width: u32,
        pub height: u32,
    }

    impl Dimensions {
        pub fn new(width: u32, height: u32) -> Self {
            Self { width, height }
        }

        pub fn pixel_count(&self) -> usize {
            self.width as usize * self.height as usize
        }

        pub fn byte_len(&self) -> usize {
            self.pixel_count() * CHANNELS
        }

        /// Splits a linear pixel index into `(row, col)`.
        #[inline]
        pub fn row_col(&self, index: usize) -> (usize, usize) {
            let width = self.width as usize;
            (index / width, index % width)
        }

        #[inline]
        pub fn index(&self, row: usize, col: usize) -> usize {
            row * self.width as usize + col
        }

        /// Moves `col` by `shift` columns, wrapping around the frame's width.
        #[inline]
        pub fn wrap_col(&self, col: usize, shift: i64) -> usize {
            (col as i64 + shift).rem_euclid(self.width as i64) as usize
        }

        /// Moves `row` by `shift` rows, wrapping around the frame's height.
        #[inline]
        pub fn wrap_row(&self, row: usize, shift: i64) -> usize {
            (row as i64 + shift).rem_euclid(self.height as i64) as usize
        }
    }

    impl fmt::Display for Dimensions {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}x{}", self.width, self.height)
        }
    }

    /// A dense, row-major grid of RGB byte triples.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FrameBuffer {
        dims: Dimensions,
        data: Vec<u8>,
    }

    impl FrameBuffer {
        /// Creates an all-black frame.
        pub fn new(width: u32, height: u32) -> Self {
            let dims = Dimensions::new(width, height);
            Self {
                dims,
                data: vec![0; dims.byte_len()],
            }
        }

        /// Creates a frame where every pixel is `color`.
        pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
            let dims = Dimensions::new(width, height);
            Self {
                dims,
                data: color.repeat(dims.pixel_count()),
            }
        }

        pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, GlitchError> {
            let dims = Dimensions::new(width, height);
            if data.len() != dims.byte_len() {
                return Err(GlitchError::BufferLength {
                    width,
                    height,
                    expected: dims.byte_len(),
                    found: data.len(),
                });
            }
            Ok(Self { dims, data })
        }

        pub fn from_rgb_image(image: image::RgbImage) -> Self {
            let (width, height) = image.dimensions();
            Self {
                dims: Dimensions::new(width, height),
                data: image.into_raw(),
            }
        }

        pub fn to_rgb_image(&self) -> Result<image::RgbImage, GlitchError> {
            image::RgbImage::from_raw(self.dims.width, self.dims.height, self.data.clone()).ok_or(
                GlitchError::BufferLength {
                    width: self.dims.width,
                    height: self.dims.height,
                    expected: self.dims.byte_len(),
                    found: self.data.len(),
                },
            )
        }

        pub fn dimensions(&self) -> Dimensions {
            self.dims
        }

        pub fn width(&self) -> u32 {
            self.dims.width
        }

        pub fn height(&self) -> u32 {
            self.dims.height
        }

        pub fn as_bytes(&self) -> &[u8] {
            &self.data
        }

        pub fn as_bytes_mut(&mut self) -> &mut [u8] {
            &mut self.data
        }

        pub fn view(&self) -> FrameView<'_> {
            FrameView {
                dims: self.dims,
                data: &self.data,
            }
        }

        pub fn pixel(&self, row: usize, col: usize) -> Rgb {
            self.view().pixel(row, col)
        }

        pub fn set_pixel(&mut self, row: usize, col: usize, color: Rgb) {
            let start = self.dims.index(row, col) * CHANNELS;
            self.data[start..start + CHANNELS].copy_from_slice(&color);
        }

        pub fn pixels(&self) -> impl Iterator<Item = Rgb> + '_ {
            self.data
                .chunks_exact(CHANNELS)
                .map(|px| [px[0], px[1], px[2]])
        }
    }

    /// A borrowed, read-only view of a frame shared by every worker range.
    #[derive(Debug, Clone, Copy)]
    pub struct FrameView<'a> {
        dims: Dimensions,
        data: &'a [u8],
    }

    impl FrameView<'_> {
        #[inline]
        pub fn pixel_at(&self, index: usize) -> Rgb {
            let start = index * CHANNELS;
            [self.data[start], self.data[start + 1], self.data[start + 2]]
        }

        #[inline]
        pub fn pixel(&self, row: usize, col: usize) -> Rgb {
            self.pixel_at(self.dims.index(row, col))
        }
    }

    /// Single-channel binary buffer, 0 or 255 per pixel.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct MaskBuffer {
        dims: Dimensions,
        data: Vec<u8>,
    }

    impl MaskBuffer {
        pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, GlitchError> {
            let dims = Dimensions::new(width, height);
            if data.len() != dims.pixel_count() {
                return Err(GlitchError::BufferLength {
                    width,
                    height,
                    expected: dims.pixel_count(),
                    found: data.len(),
                });
            }
            Ok(Self { dims, data })
        }

        pub fn dimensions(&self) -> Dimensions {
            self.dims
        }

        pub fn get(&self, row: usize, col: usize) -> u8 {
            self.data[self.dims.index(row, col)]
        }

        pub fn as_bytes(&self) -> &[u8] {
            &self.data
        }

        pub fn as_bytes_mut(&mut self) -> &mut [u8] {
            &mut self.data
        }
    }
}
