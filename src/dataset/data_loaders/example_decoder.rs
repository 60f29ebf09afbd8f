use ndarray::Array3;
use prost::Message;
use serde::{Deserialize, Serialize};

use super::example_proto::{feature::Kind, Example};
use crate::dataset::common_structs::{DType, Image, ParsedRecord};
use crate::error::{PipelineError, Result};

/// Turns the bytes of one record into an image, a location and a one-hot label
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<ParsedRecord>;

    /// Pixel type of every image this decoder returns
    fn image_dtype(&self) -> DType;
}

/// Names of the `tf.train.Example` features holding each field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureKeys {
    pub image: String,
    pub height: String,
    pub width: String,
    pub depth: String,
    pub location: String,
    pub label: String,
}

impl Default for FeatureKeys {
    fn default() -> Self {
        FeatureKeys {
            image: "image".to_string(),
            height: "height".to_string(),
            width: "width".to_string(),
            depth: "depth".to_string(),
            location: "location".to_string(),
            label: "label".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleDecoderConfig {
    pub keys: FeatureKeys,
    /// When set, a label stored as a single class index is expanded to a
    /// one-hot vector of this length
    pub num_classes: Option<usize>,
    pub image_dtype: DType,
}

impl Default for ExampleDecoderConfig {
    fn default() -> Self {
        ExampleDecoderConfig {
            keys: FeatureKeys::default(),
            num_classes: None,
            image_dtype: DType::U8,
        }
    }
}

/// Decodes records holding a serialized `tf.train.Example`.
///
/// The image feature may be
/// * raw pixel bytes, when height/width/depth are stored and match the byte count
/// * an encoded PNG/JPEG, decoded to RGB
/// * a float list with height/width/depth
#[derive(Debug, Clone, Default)]
pub struct ExampleDecoder {
    config: ExampleDecoderConfig,
}

impl ExampleDecoder {
    pub fn new(config: ExampleDecoderConfig) -> ExampleDecoder {
        ExampleDecoder { config }
    }

    fn dim(&self, example: &Example, key: &str) -> Option<usize> {
        match example.feature(key)?.kind.as_ref()? {
            Kind::Int64List(list) if list.value.len() == 1 && list.value[0] > 0 => {
                Some(list.value[0] as usize)
            }
            _ => None,
        }
    }

    fn decode_image(&self, example: &Example) -> Result<Image> {
        let keys = &self.config.keys;
        let height = self.dim(example, &keys.height);
        let width = self.dim(example, &keys.width);
        let depth = self.dim(example, &keys.depth).unwrap_or(3);
        let kind = example
            .feature(&keys.image)
            .and_then(|feature| feature.kind.as_ref());

        let image = match (kind, height, width) {
            (Some(Kind::BytesList(list)), Some(h), Some(w))
                if list.value.len() == 1 && pixel_count(h, w, depth) == Some(list.value[0].len()) =>
            {
                Image::U8(Array3::from_shape_vec((h, w, depth), list.value[0].clone())?)
            }
            (Some(Kind::BytesList(list)), _, _) if list.value.len() == 1 => {
                let rgb = image::load_from_memory(&list.value[0])?.to_rgb8();
                let (w, h) = rgb.dimensions();
                Image::U8(Array3::from_shape_vec((h as usize, w as usize, 3), rgb.into_raw())?)
            }
            (Some(Kind::FloatList(list)), Some(h), Some(w)) => {
                Image::F32(Array3::from_shape_vec((h, w, depth), list.value.clone())?)
            }
            _ => return Err(missing(&keys.image)),
        };

        match (image, self.config.image_dtype) {
            (Image::U8(pixels), DType::F32) => Ok(Image::F32(pixels.mapv(f32::from))),
            (Image::F32(_), DType::U8) => Err(PipelineError::InvalidArgument(format!(
                "feature `{}` holds float pixels but the decoder is configured for u8 images",
                keys.image
            ))),
            (image, _) => Ok(image),
        }
    }

    fn decode_floats(&self, example: &Example, key: &str) -> Result<Vec<f32>> {
        match example.feature(key).and_then(|feature| feature.kind.as_ref()) {
            Some(Kind::FloatList(list)) => Ok(list.value.clone()),
            Some(Kind::Int64List(list)) => Ok(list.value.iter().map(|v| *v as f32).collect()),
            _ => Err(missing(key)),
        }
    }

    fn decode_label(&self, example: &Example) -> Result<Vec<f32>> {
        let key = &self.config.keys.label;
        match (example.feature(key).and_then(|f| f.kind.as_ref()), self.config.num_classes) {
            (Some(Kind::Int64List(list)), Some(num_classes)) if list.value.len() == 1 => {
                let class = list.value[0];
                if class < 0 || class as usize >= num_classes {
                    return Err(PipelineError::InvalidArgument(format!(
                        "class index {} out of range for {} classes",
                        class, num_classes
                    )));
                }
                let mut one_hot = vec![0.; num_classes];
                one_hot[class as usize] = 1.;
                Ok(one_hot)
            }
            _ => self.decode_floats(example, key),
        }
    }
}

impl RecordDecoder for ExampleDecoder {
    fn decode(&self, raw: &[u8]) -> Result<ParsedRecord> {
        let example = Example::decode(raw)?;
        Ok(ParsedRecord {
            image: self.decode_image(&example)?,
            location: self.decode_floats(&example, &self.config.keys.location)?,
            label: self.decode_label(&example)?,
        })
    }

    fn image_dtype(&self) -> DType {
        self.config.image_dtype
    }
}

/// `None` when the stored dimensions overflow
fn pixel_count(height: usize, width: usize, depth: usize) -> Option<usize> {
    height.checked_mul(width)?.checked_mul(depth)
}

fn missing(key: &str) -> PipelineError {
    PipelineError::MissingFeature {
        key: key.to_string(),
    }
}
