// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectangles and RGBA rasters placed in a shared coordinate space. Two page
// proofs rarely have identical extents, so every raster carries an origin and
// can be read through a white-padded view that extends it to any rectangle.

use std::path::Path;

use image::{Rgba, RgbaImage};
use proofdiff_core::error::{ProofdiffError, Result};
use tracing::{debug, instrument};

/// Opaque white, the colour of paper outside a raster's bounds.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Half-open rectangle `[min_x, max_x) × [min_y, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Rect {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Rectangle of the given size anchored at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> usize {
        (self.max_x - self.min_x).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.max_y - self.min_y).max(0) as usize
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Smallest rectangle covering both. An empty side is ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Overlap of both; empty (at the default origin) when they are disjoint.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let r = Rect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if r.is_empty() { Rect::default() } else { r }
    }

    /// Linear index of `(x, y)`, which must lie inside.
    pub(crate) fn offset(&self, x: i32, y: i32) -> usize {
        (y - self.min_y) as usize * self.width() + (x - self.min_x) as usize
    }

    /// Row-major iteration over every point inside.
    pub fn points(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (self.min_y..self.max_y).flat_map(move |y| (self.min_x..self.max_x).map(move |x| (x, y)))
    }
}

/// An RGBA8 page proof positioned at `origin`.
#[derive(Debug, Clone)]
pub struct Raster {
    pixels: RgbaImage,
    origin: (i32, i32),
}

impl Raster {
    /// Wrap a decoded image at the origin.
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            origin: (0, 0),
        }
    }

    /// Wrap a decoded image whose top-left corner sits at `origin`.
    pub fn with_origin(pixels: RgbaImage, origin: (i32, i32)) -> Self {
        Self { pixels, origin }
    }

    /// Decode a raster from disk; any colour type is converted to RGBA8.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|err| {
            ProofdiffError::Image(format!("failed to open {}: {}", path.display(), err))
        })?;
        debug!(width = img.width(), height = img.height(), "Raster decoded");
        Ok(Self::new(img.to_rgba8()))
    }

    /// Write the pixels to `path` as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        save_png(&self.pixels, path)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.origin.0,
            self.origin.1,
            self.origin.0 + self.pixels.width() as i32,
            self.origin.1 + self.pixels.height() as i32,
        )
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Pixel at absolute coordinates, `None` outside the bounds.
    pub fn get(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if !self.bounds().contains(x, y) {
            return None;
        }
        let px = (x - self.origin.0) as u32;
        let py = (y - self.origin.1) as u32;
        Some(*self.pixels.get_pixel(px, py))
    }

    /// View that reads opaque white outside the bounds.
    pub fn white_padded(&self) -> WhitePadded<'_> {
        WhitePadded { raster: self }
    }
}

/// A raster extended to the whole plane with blank paper.
#[derive(Debug, Clone, Copy)]
pub struct WhitePadded<'a> {
    raster: &'a Raster,
}

impl WhitePadded<'_> {
    pub fn get(&self, x: i32, y: i32) -> Rgba<u8> {
        self.raster.get(x, y).unwrap_or(WHITE)
    }

    /// Sum of the colour channels, alpha excluded.
    pub fn rgb_sum(&self, x: i32, y: i32) -> u32 {
        let Rgba([r, g, b, _]) = self.get(x, y);
        r as u32 + g as u32 + b as u32
    }
}

/// Encode an RGBA buffer as PNG at `path`.
pub fn save_png(pixels: &RgbaImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    pixels
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|err| {
            ProofdiffError::Image(format!(
                "failed to save image to {}: {}",
                path.display(),
                err
            ))
        })
}

// -- Tests --------------------------------------------------------------------
