// THEORY:
// A `Frame` is the unit of work handed from a frame source to a detector. It is a
// "dumb" data container: a flat RGBA buffer plus its dimensions. The only analysis it
// knows how to do on itself is the single-pixel projection to grayscale, which every
// downstream heuristic starts from.
//
// Luminance follows Rec. 601 weights on the raw byte channels. Alpha is ignored.

use image::RgbaImage;

pub const CHANNELS: usize = 4;

/// One decoded video frame in RGBA8 layout, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// Builds a frame from a raw RGBA buffer. Returns `None` if the buffer length does
    /// not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * CHANNELS {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with a single gray level.
    pub fn filled(width: u32, height: u32, level: u8) -> Self {
        let mut data = vec![level; width as usize * height as usize * CHANNELS];
        for px in data.chunks_mut(CHANNELS) {
            px[3] = 255;
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Projects the frame to one luminance byte per pixel.
    pub fn to_grayscale(&self) -> Vec<u8> {
        self.data
            .chunks_exact(CHANNELS)
            .map(|px| luminance(px[0], px[1], px[2]))
            .collect()
    }

    /// Sets every pixel inside `[x0, x1) x [y0, y1)` to one gray level. Coordinates
    /// outside the frame are clipped.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, level: u8) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
                self.data[i] = level;
                self.data[i + 1] = level;
                self.data[i + 2] = level;
            }
        }
    }
}

impl From<RgbaImage> for Frame {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

fn luminance(red: u8, green: u8, blue: u8) -> u8 {
    let y = 0.299 * red as f64 + 0.587 * green as f64 + 0.114 * blue as f64;
    y.round().clamp(0.0, 255.0) as u8
}
