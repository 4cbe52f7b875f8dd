//! Software back buffer

/// 32-bit pixels laid out in memory as BB GG RR XX
///
/// As a `u32` on a little-endian machine that is `0xXXRRGGBB`. Rows are
/// tightly packed, so the pitch is always `width * 4`.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

/// Bytes per pixel
pub const BYTES_PER_PIXEL: u32 = 4;

/// Pack an opaque color into the back buffer's layout
#[inline]
pub fn pack_bgrx(red: u8, green: u8, blue: u8) -> u32 {
    u32::from_le_bytes([blue, green, red, 0xFF])
}

impl FrameBuffer {
    /// Allocate a cleared buffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    /// Change dimensions, clearing the contents
    ///
    /// Returns `false` when the size did not change.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        tracing::debug!("Back buffer resized to {}x{}", width, height);
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize, 0);
        true
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn pitch(&self) -> u32 {
        self.width * BYTES_PER_PIXEL
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Raw bytes in BGRX order
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.pixels)
    }

    /// Convert to tightly packed RGBA8, e.g. for image encoders
    pub fn to_rgba(&self) -> Vec<u8> {
        self.as_bytes()
            .chunks_exact(4)
            .flat_map(|bgrx| [bgrx[2], bgrx[1], bgrx[0], 0xFF])
            .collect()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
