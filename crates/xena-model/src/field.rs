// SPDX-License-Identifier: Apache-2.0

//! Field descriptors and the MatrixSource contract. Parsers hand the
//! loader a deferred factory; the factory is realized only after the
//! loader decides the source set actually changed, and each field's row
//! producer streams and can be taken exactly once.

use serde::{Deserialize, Serialize};

use xena_core::{Error, Result};

/// Storage value type of a field, tagged the way parsers tag them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Float,
    Category,
    Position,
    Genes,
}

impl ValueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Category => "category",
            Self::Position => "position",
            Self::Genes => "genes",
        }
    }

    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "float" => Some(Self::Float),
            "category" => Some(Self::Category),
            "position" => Some(Self::Position),
            "genes" => Some(Self::Genes),
            _ => None,
        }
    }
}

/// One row of a position-valued field, half-open [chrom_start, chrom_end).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRow {
    pub chrom: String,
    #[serde(rename = "chromStart")]
    pub chrom_start: u32,
    #[serde(rename = "chromEnd")]
    pub chrom_end: u32,
    pub strand: Option<String>,
}

/// Feature metadata attached to a non-score field. `order`, when given,
/// is the caller-precomputed code dictionary: index = ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureMeta {
    #[serde(rename = "shortTitle")]
    pub short_title: Option<String>,
    #[serde(rename = "longTitle")]
    pub long_title: Option<String>,
    pub priority: Option<f64>,
    #[serde(rename = "valueType")]
    pub value_type: Option<ValueType>,
    pub visibility: Option<String>,
    pub order: Option<Vec<String>>,
}

/// One-shot streaming row producer. The producer is invalidated on first
/// take; a second take is an input error, which keeps parsers honest
/// about the single-consumption contract.
pub struct RowSource<T> {
    producer: Option<Box<dyn FnOnce() -> Box<dyn Iterator<Item = T> + Send> + Send>>,
}

impl<T: Send + 'static> RowSource<T> {
    pub fn new<F, I>(producer: F) -> Self
    where
        F: FnOnce() -> I + Send + 'static,
        I: Iterator<Item = T> + Send + 'static,
    {
        Self {
            producer: Some(Box::new(move || Box::new(producer()))),
        }
    }

    #[must_use]
    pub fn from_vec(rows: Vec<T>) -> Self {
        Self::new(move || rows.into_iter())
    }

    pub fn take(&mut self) -> Result<Box<dyn Iterator<Item = T> + Send>> {
        let producer = self
            .producer
            .take()
            .ok_or_else(|| Error::input("row producer already consumed"))?;
        Ok(producer())
    }
}

impl<T> std::fmt::Debug for RowSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSource")
            .field("consumed", &self.producer.is_none())
            .finish()
    }
}

/// Typed row payload of a field. `Unknown` carries the unrecognized tag
/// so the loader can record a warning and move on.
pub enum FieldData {
    Float(RowSource<f32>),
    Category(RowSource<Option<String>>),
    Position(RowSource<PositionRow>),
    Genes(RowSource<Vec<String>>),
    Unknown { value_type: String },
}

impl FieldData {
    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Float(_) => Some(ValueType::Float),
            Self::Category(_) => Some(ValueType::Category),
            Self::Position(_) => Some(ValueType::Position),
            Self::Genes(_) => Some(ValueType::Genes),
            Self::Unknown { .. } => None,
        }
    }
}

type LazyFeature = Box<dyn FnOnce() -> FeatureMeta + Send>;

/// One column of a dataset as the parser describes it.
pub struct FieldSource {
    pub name: String,
    pub data: FieldData,
    feature: Option<LazyFeature>,
}

impl FieldSource {
    #[must_use]
    pub fn new(name: impl Into<String>, data: FieldData) -> Self {
        Self {
            name: name.into(),
            data,
            feature: None,
        }
    }

    #[must_use]
    pub fn with_feature(mut self, feature: FeatureMeta) -> Self {
        self.feature = Some(Box::new(move || feature));
        self
    }

    #[must_use]
    pub fn with_lazy_feature<F>(mut self, feature: F) -> Self
    where
        F: FnOnce() -> FeatureMeta + Send + 'static,
    {
        self.feature = Some(Box::new(feature));
        self
    }

    /// Realize the deferred feature metadata, if any.
    #[must_use]
    pub fn take_feature(&mut self) -> Option<FeatureMeta> {
        self.feature.take().map(|f| f())
    }
}

type FieldIter = Box<dyn Iterator<Item = FieldSource> + Send>;

/// Deferred factory yielding a finite lazy sequence of field
/// descriptors. The loader realizes it only once the source-hash check
/// says a reload is actually needed.
pub struct MatrixSource {
    factory: Option<Box<dyn FnOnce() -> FieldIter + Send>>,
}

impl MatrixSource {
    pub fn new<F, I>(factory: F) -> Self
    where
        F: FnOnce() -> I + Send + 'static,
        I: Iterator<Item = FieldSource> + Send + 'static,
    {
        Self {
            factory: Some(Box::new(move || Box::new(factory()))),
        }
    }

    #[must_use]
    pub fn from_fields(fields: Vec<FieldSource>) -> Self {
        Self::new(move || fields.into_iter())
    }

    pub fn realize(mut self) -> Result<FieldIter> {
        let factory = self
            .factory
            .take()
            .ok_or_else(|| Error::input("matrix source already realized"))?;
        Ok(factory())
    }
}
