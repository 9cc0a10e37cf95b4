pub mod image_helper {
    use crate::core_modules::frame::frame::FrameBuffer;
    use crate::error::GlitchError;
    use image::ImageEncoder;
    use std::path::Path;

    /// Writes `frame` as an 8-bit RGB PNG.
    pub fn save(path: &Path, frame: &FrameBuffer) -> Result<(), GlitchError> {
        let output = std::fs::File::create(path).map_err(image::ImageError::IoError)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            frame.as_bytes(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        Ok(())
    }

    /// Decodes any format the `image` crate understands into an RGB frame.
    pub fn load(path: &Path) -> Result<FrameBuffer, GlitchError> {
        let image = image::open(path)?.into_rgb8();
        Ok(FrameBuffer::from_rgb_image(image))
    }

    /// Nearest-neighbour resize, used to match a live source to the background.
    pub fn fit(frame: &FrameBuffer, width: u32, height: u32) -> Result<FrameBuffer, GlitchError> {
        if frame.width() == width && frame.height() == height {
            return Ok(frame.clone());
        }
        let resized = image::imageops::resize(
            &frame.to_rgb_image()?,
            width,
            height,
            image::imageops::FilterType::Nearest,
        );
        Ok(FrameBuffer::from_rgb_image(resized))
    }
}

#[cfg(test)]
mod tests {

    use super::image_helper::*;
    use crate::core_modules::frame::frame::FrameBuffer;

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("glitch_engine_{}_{name}", std::process::id()))
    }

    #[test]
    fn save_and_load_white_file() {
        let frame = FrameBuffer::filled(50, 20, [255, 255, 255]);
        let path = scratch("white_file.png");

        save(&path, &frame).expect("Error Saving File.");
        let loaded = load(&path).expect("Error Loading File.");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, frame);
    }

    #[test]
    fn save_gradient_file() {
        let width = 64u32;
        let height = 16u32;
        let mut frame = FrameBuffer::new(width, height);
        let mut intensity = 0u8;

        for row in 0..height as usize {
            for col in 0..width as usize {
                frame.set_pixel(row, col, [intensity; 3]);
                intensity = intensity.wrapping_add(1);
            }
        }
        let path = scratch("gradient_file.png");

        save(&path, &frame).expect("Error Saving File.");
        let loaded = load(&path).expect("Error Loading File.");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.dimensions(), frame.dimensions());
        assert_eq!(loaded.pixel(3, 5), frame.pixel(3, 5));
    }

    #[test]
    fn fit_matches_requested_dimensions() {
        let frame = FrameBuffer::filled(8, 4, [9, 8, 7]);

        let same = fit(&frame, 8, 4).expect("fit");
        let resized = fit(&frame, 3, 5).expect("fit");

        assert_eq!(same, frame);
        assert_eq!((resized.width(), resized.height()), (3, 5));
        assert!(resized.pixels().all(|px| px == [9, 8, 7]));
    }
}
