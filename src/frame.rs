/*
 *  frame.rs
 *
 *  PixMux - one display, many voices
 *  (c) 2024-26 Stuart Hunter
 *
 *  Runtime-sized monochrome framebuffer for embedded-graphics
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// A runtime-sized 1-bpp frame. Producers compose into one of these and
/// hand it to the display sink; the sink decides what the bytes mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    buf: Vec<BinaryColor>,
    w: usize,
    h: usize,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![BinaryColor::Off; w * h], w, h }
    }

    pub fn width(&self) -> u32 { self.w as u32 }
    pub fn height(&self) -> u32 { self.h as u32 }

    pub fn as_slice(&self) -> &[BinaryColor] { &self.buf }

    /// Blank the frame
    pub fn clear_all(&mut self) {
        self.buf.fill(BinaryColor::Off);
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    /// Pack pixels into bytes, 8 pixels per byte, LSB first.
    ///
    /// This is the wire format handed to display sinks and across the
    /// plugin ABI boundary.
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        let num_bytes = (self.buf.len() + 7) / 8;
        let mut bytes = vec![0u8; num_bytes];

        for (i, &pixel) in self.buf.iter().enumerate() {
            if pixel.is_on() {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }

        bytes
    }

    /// Rebuild pixel state from packed bytes (the inverse of
    /// `to_packed_bytes`). Extra trailing bits are ignored; a short buffer
    /// leaves the remaining pixels off.
    pub fn load_packed_bytes(&mut self, bytes: &[u8]) {
        for (i, pixel) in self.buf.iter_mut().enumerate() {
            let on = bytes
                .get(i / 8)
                .map(|b| b & (1 << (i % 8)) != 0)
                .unwrap_or(false);
            *pixel = if on { BinaryColor::On } else { BinaryColor::Off };
        }
    }

    /// Count of lit pixels; handy in tests and for blank-frame detection.
    pub fn lit_pixels(&self) -> usize {
        self.buf.iter().filter(|p| p.is_on()).count()
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        // fast path for the rectangular fills the primitives use
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let (x0, y0) = (area.top_left.x.max(0) as usize, area.top_left.y.max(0) as usize);

        let mut it = colors.into_iter();
        for row in 0..height as usize {
            let base = (y0 + row) * self.w + x0;
            for col in 0..width as usize {
                if let Some(c) = it.next() {
                    let i = base + col;
                    if i < self.buf.len() {
                        self.buf[i] = c;
                    }
                } else {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
