// src/device/buffer.rs

use crate::device::types::{BufferId, Mode, Rect};
use log::warn;

/// Largest number of dirty rectangles the library reports per grab.
/// See <https://displaylink.github.io/evdi/details/#grabbing-pixels>
pub const MAX_DIRTY_RECTS: usize = 16;

/// A frame buffer the library copies pixels into.
///
/// The pixel and rectangle storage are heap allocations owned here; the
/// library receives raw pointers into them while the buffer is registered,
/// so neither vector is ever resized after construction.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    width: i32,
    height: i32,
    stride: i32,
    pixels: Vec<u8>,
    rects: Vec<Rect>,
    rect_count: usize,
}

impl Buffer {
    pub fn new(id: BufferId, width: i32, height: i32, stride: i32) -> Self {
        let len = (height.max(0) as usize) * (stride.max(0) as usize);
        Self {
            id,
            width,
            height,
            stride,
            pixels: vec![0u8; len],
            rects: vec![Rect::default(); MAX_DIRTY_RECTS],
            rect_count: 0,
        }
    }

    /// Sizes a buffer for `mode`: stride is bytes-per-pixel times width.
    pub fn for_mode(id: BufferId, mode: &Mode) -> Self {
        Self::new(id, mode.width, mode.height, mode.stride())
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn stride(&self) -> i32 {
        self.stride
    }

    pub fn bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Rectangles reported by the last grab.
    pub fn rects(&self) -> &[Rect] {
        &self.rects[..self.rect_count]
    }

    pub fn rect_capacity(&self) -> usize {
        self.rects.len()
    }

    /// Whole rectangle storage, for backends to fill before calling
    /// [`Buffer::set_rect_count`].
    pub fn rect_storage_mut(&mut self) -> &mut [Rect] {
        &mut self.rects
    }

    #[cfg_attr(not(feature = "evdi"), allow(dead_code))]
    pub(crate) fn raw_parts(&mut self) -> (*mut u8, *mut Rect) {
        (self.pixels.as_mut_ptr(), self.rects.as_mut_ptr())
    }

    /// Records how many rectangles the last grab produced.
    ///
    /// A count above the storage capacity is clamped, so a misbehaving
    /// producer can never make `rects()` reach past the allocation.
    pub fn set_rect_count(&mut self, reported: i32) -> usize {
        let capacity = self.rects.len();
        let reported = reported.max(0) as usize;
        if reported > capacity {
            warn!(
                "Buffer {}: grab reported {} rects but capacity is {}; clamping",
                self.id, reported, capacity
            );
        }
        self.rect_count = reported.min(capacity);
        self.rect_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn it_should_size_a_buffer_for_a_mode() {
        let mode = Mode {
            width: 1280,
            height: 800,
            refresh_rate: 60,
            bits_per_pixel: 32,
            pixel_format: 0,
        };
        let buf = Buffer::for_mode(3, &mode);

        assert_eq!(buf.id(), 3);
        assert_eq!(buf.stride(), 1280 * 4);
        assert_eq!(buf.bytes().len(), 1280 * 4 * 800);
        assert_eq!(buf.rect_capacity(), MAX_DIRTY_RECTS);
        assert!(buf.rects().is_empty());
    }

    #[test_log::test]
    fn it_should_clamp_an_over_reported_rect_count() {
        let mut buf = Buffer::new(0, 4, 4, 16);

        assert_eq!(buf.set_rect_count(40), MAX_DIRTY_RECTS);
        assert_eq!(buf.rects().len(), MAX_DIRTY_RECTS);
    }

    #[test_log::test]
    fn it_should_treat_a_negative_rect_count_as_zero() {
        let mut buf = Buffer::new(0, 4, 4, 16);
        buf.set_rect_count(3);

        assert_eq!(buf.set_rect_count(-1), 0);
        assert!(buf.rects().is_empty());
    }
}
