//! `tf.train.Example` protobuf messages, declared with prost derives so no
//! protoc step is needed.
use std::collections::HashMap;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Features {
    #[prost(map = "string, message", tag = "1")]
    pub feature: HashMap<String, Feature>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FloatList {
    #[prost(float, repeated, packed = "true", tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Int64List {
    #[prost(int64, repeated, packed = "true", tag = "1")]
    pub value: Vec<i64>,
}

impl Feature {
    pub fn bytes(value: Vec<u8>) -> Feature {
        Feature {
            kind: Some(feature::Kind::BytesList(BytesList { value: vec![value] })),
        }
    }

    pub fn floats(value: Vec<f32>) -> Feature {
        Feature {
            kind: Some(feature::Kind::FloatList(FloatList { value })),
        }
    }

    pub fn int64s(value: Vec<i64>) -> Feature {
        Feature {
            kind: Some(feature::Kind::Int64List(Int64List { value })),
        }
    }
}

impl Example {
    pub fn from_features<I, K>(features: I) -> Example
    where
        I: IntoIterator<Item = (K, Feature)>,
        K: Into<String>,
    {
        Example {
            features: Some(Features {
                feature: features.into_iter().map(|(key, value)| (key.into(), value)).collect(),
            }),
        }
    }

    pub fn feature(&self, key: &str) -> Option<&Feature> {
        self.features.as_ref()?.feature.get(key)
    }
}
