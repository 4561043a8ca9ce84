// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for detection models

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Letterbox padding value (YOLO / mmdet convention)
pub const PAD_VALUE: u8 = 114;

/// Per-channel normalisation applied after letterboxing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// Feed channels as BGR instead of RGB
    pub bgr: bool,
}

impl Normalization {
    /// Pixels scaled to [0, 1], RGB order (Ultralytics exports)
    pub const YOLO: Normalization = Normalization {
        mean: [0.0, 0.0, 0.0],
        std: [255.0, 255.0, 255.0],
        bgr: false,
    };

    /// mmdet RTMDet statistics, BGR order
    pub const RTMDET: Normalization = Normalization {
        mean: [103.53, 116.28, 123.675],
        std: [57.375, 57.12, 58.395],
        bgr: true,
    };

    fn apply(&self, pixel: &Rgb<u8>, channel: usize) -> f32 {
        let source = if self.bgr { 2 - channel } else { channel };
        (pixel[source] as f32 - self.mean[channel]) / self.std[channel]
    }
}

/// Geometry of a letterbox transform, used to map boxes back to the source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, target_size: u32) -> Self {
        if width == 0 || height == 0 {
            return Self {
                scale: 1.0,
                pad_x: 0,
                pad_y: 0,
                original_width: width,
                original_height: height,
            };
        }

        let scale = (target_size as f32 / width as f32).min(target_size as f32 / height as f32);
        let (new_w, new_h) = Self::scaled_dims(width, height, scale, target_size);

        Self {
            scale,
            pad_x: (target_size - new_w) / 2,
            pad_y: (target_size - new_h) / 2,
            original_width: width,
            original_height: height,
        }
    }

    fn scaled_dims(width: u32, height: u32, scale: f32, target_size: u32) -> (u32, u32) {
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, target_size);
        (new_w, new_h)
    }

    /// Map a point from model input space back to original image space
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.pad_x as f32) / self.scale;
        let orig_y = (y - self.pad_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width as f32),
            orig_y.clamp(0.0, self.original_height as f32),
        )
    }
}

/// Letterbox `image` into a `target_size` square and build an NCHW tensor
pub fn preprocess(
    image: &DynamicImage,
    target_size: u32,
    norm: &Normalization,
) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::new(width, height, target_size);
    let padded = letterbox_image(image, &letterbox, target_size);

    let size = target_size as usize;
    let tensor = Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
        norm.apply(padded.get_pixel(x as u32, y as u32), c)
    });

    (tensor, letterbox)
}

fn letterbox_image(image: &DynamicImage, letterbox: &Letterbox, target_size: u32) -> RgbImage {
    let mut output = RgbImage::from_pixel(
        target_size,
        target_size,
        Rgb([PAD_VALUE, PAD_VALUE, PAD_VALUE]),
    );
    if letterbox.original_width == 0 || letterbox.original_height == 0 {
        return output;
    }

    let (new_w, new_h) = Letterbox::scaled_dims(
        letterbox.original_width,
        letterbox.original_height,
        letterbox.scale,
        target_size,
    );
    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();
    image::imageops::replace(
        &mut output,
        &resized,
        letterbox.pad_x as i64,
        letterbox.pad_y as i64,
    );
    output
}
