use linfa::Float;
use ndarray::Array1;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of training labels
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum LabelType {
    /// Real valued targets
    Regression,
    /// Targets in {-1, +1}
    Binary,
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LabelType::Regression => write!(f, "Regression"),
            LabelType::Binary => write!(f, "Binary"),
        }
    }
}

/// Training labels, only regression labels are accepted by FITC inference
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Labels<F: Float> {
    /// Real valued targets
    Regression(Array1<F>),
    /// Binary classification targets
    Binary(Array1<F>),
}

impl<F: Float> Labels<F> {
    /// Kind of labels
    pub fn label_type(&self) -> LabelType {
        match self {
            Labels::Regression(_) => LabelType::Regression,
            Labels::Binary(_) => LabelType::Binary,
        }
    }

    /// Label values
    pub fn values(&self) -> &Array1<F> {
        match self {
            Labels::Regression(y) | Labels::Binary(y) => y,
        }
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// Whether there is no label
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

impl<F: Float> From<Array1<F>> for Labels<F> {
    fn from(y: Array1<F>) -> Self {
        Labels::Regression(y)
    }
}
