use std::fmt;

use ndarray::{Array2, Array3, Array4, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::Result;
/// Frequently used structs in the provided data loaders/streams/iterators

/// Which of the three directories a stream was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        };
        f.write_str(name)
    }
}

/// Pixel type of an image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    U8,
    F32,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::U8 => f.write_str("u8"),
            DType::F32 => f.write_str("f32"),
        }
    }
}

/// A height x width x channels image
#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    U8(Array3<u8>),
    F32(Array3<f32>),
}

impl Image {
    pub fn dtype(&self) -> DType {
        match self {
            Image::U8(_) => DType::U8,
            Image::F32(_) => DType::F32,
        }
    }

    /// (height, width, channels)
    pub fn shape(&self) -> [usize; 3] {
        let (h, w, c) = match self {
            Image::U8(pixels) => pixels.dim(),
            Image::F32(pixels) => pixels.dim(),
        };
        [h, w, c]
    }

    pub fn to_f32(&self) -> Array3<f32> {
        match self {
            Image::U8(pixels) => pixels.mapv(f32::from),
            Image::F32(pixels) => pixels.clone(),
        }
    }

    pub fn as_f32(&self) -> Option<&Array3<f32>> {
        match self {
            Image::F32(pixels) => Some(pixels),
            Image::U8(_) => None,
        }
    }

    pub fn as_u8(&self) -> Option<&Array3<u8>> {
        match self {
            Image::U8(pixels) => Some(pixels),
            Image::F32(_) => None,
        }
    }
}

/// Type and (partially) known shape of the image element of a stream.
///
/// Two streams can be bound to the same iterator only if their specs are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementSpec {
    pub image_dtype: DType,
    /// `None` means the dimension may vary between elements
    pub image_shape: [Option<usize>; 3],
}

impl ElementSpec {
    pub fn raw(image_dtype: DType) -> ElementSpec {
        ElementSpec {
            image_dtype,
            image_shape: [None, None, None],
        }
    }

    pub fn preprocessed(height: usize, width: usize) -> ElementSpec {
        ElementSpec {
            image_dtype: DType::F32,
            image_shape: [Some(height), Some(width), None],
        }
    }

    /// Fully known spec of a single image
    pub fn of_image(image: &Image) -> ElementSpec {
        let [h, w, c] = image.shape();
        ElementSpec {
            image_dtype: image.dtype(),
            image_shape: [Some(h), Some(w), Some(c)],
        }
    }

    pub fn accepts(&self, image: &Image) -> bool {
        image.dtype() == self.image_dtype
            && self
                .image_shape
                .iter()
                .zip(image.shape().iter())
                .all(|(expected, actual)| expected.map_or(true, |dim| dim == *actual))
    }
}

impl fmt::Display for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .image_shape
            .iter()
            .map(|dim| match dim {
                Some(dim) => dim.to_string(),
                None => "?".to_string(),
            })
            .collect();
        write!(f, "{}[{}]", self.image_dtype, dims.join(", "))
    }
}

/// One decoded record: image, location label and one-hot class label
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub image: Image,
    pub location: Vec<f32>,
    pub label: Vec<f32>,
}

/// Up to `batch_size` consecutive records of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    images: Vec<Image>,
    locations: Vec<Vec<f32>>,
    labels: Vec<Vec<f32>>,
}

impl Batch {
    pub fn from_records(records: Vec<ParsedRecord>) -> Batch {
        let mut batch = Batch {
            images: Vec::with_capacity(records.len()),
            locations: Vec::with_capacity(records.len()),
            labels: Vec::with_capacity(records.len()),
        };
        for record in records {
            batch.images.push(record.image);
            batch.locations.push(record.location);
            batch.labels.push(record.label);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn locations(&self) -> &[Vec<f32>] {
        &self.locations
    }

    pub fn labels(&self) -> &[Vec<f32>] {
        &self.labels
    }

    /// Stacks the images into a (batch, height, width, channels) array.
    /// Fails if the images do not all have the same shape.
    pub fn stacked_images(&self) -> Result<Array4<f32>> {
        let images: Vec<Array3<f32>> = self.images.iter().map(Image::to_f32).collect();
        let views: Vec<_> = images.iter().map(|image| image.view()).collect();
        Ok(ndarray::stack(Axis(0), &views)?)
    }

    pub fn stacked_locations(&self) -> Result<Array2<f32>> {
        stack_rows(&self.locations)
    }

    pub fn stacked_labels(&self) -> Result<Array2<f32>> {
        stack_rows(&self.labels)
    }
}

fn stack_rows(rows: &[Vec<f32>]) -> Result<Array2<f32>> {
    let views: Vec<ArrayView1<f32>> = rows
        .iter()
        .map(|row| ArrayView1::from(row.as_slice()))
        .collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}
