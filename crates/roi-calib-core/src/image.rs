use crate::Rect;

/// Errors raised when image buffers and their declared shapes disagree.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },

    #[error("unsupported channel count {0}")]
    InvalidChannels(usize),

    #[error("mask is {mask_w}x{mask_h} but image is {image_w}x{image_h}")]
    MaskSizeMismatch {
        mask_w: usize,
        mask_h: usize,
        image_w: usize,
        image_h: usize,
    },

    #[error("mask must be single channel (got {0} channels)")]
    MaskChannels(usize),
}

/// Borrowed interleaved 8-bit image.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: &'a [u8], // row-major, len = w*h*c
}

/// Owned interleaved 8-bit image. Masks are single channel images.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

fn check_shape(width: usize, height: usize, channels: usize, len: usize) -> Result<(), ImageError> {
    if channels == 0 || channels > 4 {
        return Err(ImageError::InvalidChannels(channels));
    }
    let expected = width * height * channels;
    if len != expected {
        return Err(ImageError::InvalidBuffer { expected, got: len });
    }
    Ok(())
}

impl<'a> ImageView<'a> {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        check_shape(width, height, channels, data.len())?;
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &'a [u8] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copy out the `rect` sub-region. `None` if it is empty or leaves the image.
    pub fn crop(&self, rect: &Rect) -> Option<Image> {
        if rect.is_empty() || !rect.fits_within(self.width, self.height) {
            return None;
        }
        let (x0, y0, x1, y1) = rect.expand();
        let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);
        let row_bytes = (x1 - x0) * self.channels;
        let mut data = Vec::with_capacity(row_bytes * (y1 - y0));
        for y in y0..y1 {
            let start = (y * self.width + x0) * self.channels;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Some(Image {
            width: x1 - x0,
            height: y1 - y0,
            channels: self.channels,
            data,
        })
    }

    pub fn to_image(&self) -> Image {
        Image {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data.to_vec(),
        }
    }
}

impl Image {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        check_shape(width, height, channels, data.len())?;
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// All-zero image.
    pub fn zeros(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0u8; width * height * channels],
        }
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Number of pixels whose first channel is non-zero.
    pub fn count_nonzero(&self) -> usize {
        self.data
            .chunks_exact(self.channels.max(1))
            .filter(|px| px[0] != 0)
            .count()
    }
}

#[inline]
fn get_channel(src: &ImageView<'_>, x: i32, y: i32, c: usize) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[(y as usize * src.width + x as usize) * src.channels + c]
}

/// Bilinear sample of channel `c`; samples outside the image read as 0.
#[inline]
pub fn sample_bilinear(src: &ImageView<'_>, x: f32, y: f32, c: usize) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_channel(src, x0, y0, c) as f32;
    let p10 = get_channel(src, x0 + 1, y0, c) as f32;
    let p01 = get_channel(src, x0, y0 + 1, c) as f32;
    let p11 = get_channel(src, x0 + 1, y0 + 1, c) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &ImageView<'_>, x: f32, y: f32, c: usize) -> u8 {
    sample_bilinear(src, x, y, c).round().clamp(0.0, 255.0) as u8
}

/// Copy `src` into a blank image wherever `mask` is non-zero.
pub fn copy_with_mask(src: &ImageView<'_>, mask: &ImageView<'_>) -> Result<Image, ImageError> {
    if mask.channels != 1 {
        return Err(ImageError::MaskChannels(mask.channels));
    }
    if mask.width != src.width || mask.height != src.height {
        return Err(ImageError::MaskSizeMismatch {
            mask_w: mask.width,
            mask_h: mask.height,
            image_w: src.width,
            image_h: src.height,
        });
    }

    let mut out = Image::zeros(src.width, src.height, src.channels);
    for (i, &m) in mask.data.iter().enumerate() {
        if m != 0 {
            let start = i * src.channels;
            out.data[start..start + src.channels]
                .copy_from_slice(&src.data[start..start + src.channels]);
        }
    }
    Ok(out)
}
