// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the Florence-2 vision encoder

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

/// Square input size of the Florence-2 vision encoder
pub const CAPTION_INPUT_SIZE: u32 = 768;

/// ImageNet normalization mean values
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet normalization std values
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize to `CAPTION_INPUT_SIZE` square (no crop, aspect not kept) and
/// normalise into an NCHW tensor
pub fn preprocess(image: &DynamicImage) -> Array4<f32> {
    preprocess_with_size(image, CAPTION_INPUT_SIZE)
}

pub fn preprocess_with_size(image: &DynamicImage, size: u32) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let side = size as usize;
    if width == 0 || height == 0 {
        return Array4::from_shape_fn((1, 3, side, side), |(_, c, _, _)| -MEAN[c] / STD[c]);
    }

    let rgb = image
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let value = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (value - MEAN[c]) / STD[c]
    })
}
