use ndarray::{Array4, ArrayView4, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::common_structs::{Image, ParsedRecord};
use crate::error::{PipelineError, Result};

/// Height and width of every preprocessed image
pub const TARGET_SIZE: usize = 224;

/// Where output pixels sample the input grid.
///
/// With both flags off, output pixel `i` reads input coordinate
/// `i * in_size / out_size`, which is what the pretrained models fed by this
/// pipeline were trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Map the corner pixels of input and output onto each other
    pub align_corners: bool,
    /// Sample at pixel centers: `(i + 0.5) * scale - 0.5`
    pub half_pixel_centers: bool,
}

#[derive(Debug, Clone, Copy)]
struct Interpolation {
    lower: usize,
    upper: usize,
    lerp: f32,
}

fn interpolation_weights(
    in_size: usize,
    out_size: usize,
    config: &ResizeConfig,
) -> Vec<Interpolation> {
    let scale = if config.align_corners && out_size > 1 {
        (in_size - 1) as f32 / (out_size - 1) as f32
    } else {
        in_size as f32 / out_size as f32
    };
    (0..out_size)
        .map(|i| {
            let src = if config.half_pixel_centers {
                (i as f32 + 0.5) * scale - 0.5
            } else {
                i as f32 * scale
            };
            let floor = src.floor();
            Interpolation {
                // negative coordinates saturate to 0 in the casts
                lower: (floor.max(0.) as usize).min(in_size - 1),
                upper: (src.ceil() as usize).min(in_size - 1),
                lerp: src - floor,
            }
        })
        .collect()
}

/// Bilinear resize of a (batch, height, width, channels) array.
///
/// Rows of the output are computed in parallel; the result does not depend
/// on how the work is split.
pub fn resize_bilinear(
    images: ArrayView4<f32>,
    out_height: usize,
    out_width: usize,
    config: &ResizeConfig,
) -> Result<Array4<f32>> {
    let (batch, in_height, in_width, channels) = images.dim();
    if in_height == 0 || in_width == 0 || out_height == 0 || out_width == 0 {
        return Err(PipelineError::InvalidArgument(format!(
            "cannot resize {}x{} image to {}x{}",
            in_height, in_width, out_height, out_width
        )));
    }
    let ys = interpolation_weights(in_height, out_height, config);
    let xs = interpolation_weights(in_width, out_width, config);
    let input = images.as_standard_layout();

    let mut output = vec![0f32; batch * out_height * out_width * channels];
    if channels > 0 {
        output
            .par_chunks_mut(out_width * channels)
            .enumerate()
            .for_each(|(row, out_row)| {
                let (b, y) = (row / out_height, row % out_height);
                let wy = ys[y];
                for (x, wx) in xs.iter().enumerate() {
                    for c in 0..channels {
                        let top_left = input[[b, wy.lower, wx.lower, c]];
                        let top_right = input[[b, wy.lower, wx.upper, c]];
                        let bottom_left = input[[b, wy.upper, wx.lower, c]];
                        let bottom_right = input[[b, wy.upper, wx.upper, c]];
                        let top = top_left + (top_right - top_left) * wx.lerp;
                        let bottom = bottom_left + (bottom_right - bottom_left) * wx.lerp;
                        out_row[x * channels + c] = top + (bottom - top) * wy.lerp;
                    }
                }
            });
    }
    Ok(Array4::from_shape_vec((batch, out_height, out_width, channels), output)?)
}

/// Resizes to 224x224 and maps [0, 255] pixel values to [-1, 1]
pub fn preprocess_image(image: &Image, config: &ResizeConfig) -> Result<ndarray::Array3<f32>> {
    let batched = image.to_f32().insert_axis(Axis(0));
    let resized = resize_bilinear(batched.view(), TARGET_SIZE, TARGET_SIZE, config)?;
    let mut pixels = resized.index_axis_move(Axis(0), 0);
    pixels.mapv_inplace(|p| p * (1. / 255.));
    pixels.mapv_inplace(|p| p - 0.5);
    pixels.mapv_inplace(|p| p * 2.0);
    Ok(pixels)
}

/// Preprocesses the image of a record, location and label pass through
pub fn preprocess(record: ParsedRecord, config: &ResizeConfig) -> Result<ParsedRecord> {
    Ok(ParsedRecord {
        image: Image::F32(preprocess_image(&record.image, config)?),
        location: record.location,
        label: record.label,
    })
}
