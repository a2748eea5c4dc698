use anyhow::Result;
use image::RgbImage;

/// JPEG quality for outbound frames; matches what the perception backend
/// was tuned against.
const JPEG_QUALITY: u8 = 80;

/// A camera (or camera stand-in) the orchestrator owns for the session.
///
/// `next_frame` returns the latest available frame or `None` when the
/// device has nothing new; the streaming loop simply skips that tick.
/// `release` must free the underlying device and is called on every session
/// exit path.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
    fn release(&mut self);
}

/// Encode one frame as a compressed still image for the wire.
pub(crate) fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder.encode_image(frame)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_jpeg_bytes() {
        let frame = RgbImage::from_pixel(8, 8, image::Rgb([120, 80, 40]));
        let bytes = encode_jpeg(&frame).unwrap();
        // JPEG start-of-image marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert!(bytes.len() > 2);
    }
}
