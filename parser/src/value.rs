//! Declaration and implementation of a parameter value.
//!
//! See [`ParameterValue`](./enum.ParameterValue.html).

use itertools::Itertools;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;

/// The declared shape of an array parameter,
/// as found in the `( d1, d2, ... )` header of its value.
pub type Shape = SmallVec<[usize; 2]>;

/// A numeric array parameter,
/// holding the flat sequence of values next to its declared shape.
///
/// Values are laid out with the last dimension varying fastest,
/// in the same order as they appear in the parameter file.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    shape: Shape,
    values: Vec<f64>,
}

impl NumericArray {
    /// Create a numeric array,
    /// returning `None` if the number of values
    /// does not match the product of the shape.
    pub fn new(shape: impl Into<Shape>, values: Vec<f64>) -> Option<Self> {
        let shape = shape.into();
        let count = shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d));
        if count != Some(values.len()) {
            return None;
        }
        Some(NumericArray { shape, values })
    }

    /// Create a one-dimensional numeric array.
    pub fn from_vec(values: Vec<f64>) -> Self {
        NumericArray {
            shape: smallvec::smallvec![values.len()],
            values,
        }
    }

    /// The declared shape of the array.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The values of the array in file order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The total number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the array holds no values at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the rows of the array,
    /// a row being a run of values along the last dimension.
    ///
    /// A one-dimensional array has a single row.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        let row_len = self.shape.last().copied().unwrap_or(0).max(1);
        self.values.chunks(row_len)
    }
}

/// A value of a single field in a parameter set.
///
/// Consumers are expected to match on the variant
/// they require for each field,
/// so that fields the reader could not interpret
/// ([`Opaque`](ParameterValue::Opaque))
/// never pass as well-typed data.
///
/// # Example
///
/// ```
/// # use bruker2nifti_parser::{NumericArray, ParameterValue};
/// let value = ParameterValue::Sequence(NumericArray::from_vec(vec![64., 64.]));
/// assert_eq!(value.to_multi_f64().as_deref(), Some(&[64., 64.][..]));
/// assert_eq!(value.to_string(), "( 2 ) 64 64");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// A single number.
    Scalar(f64),
    /// A single string,
    /// either a bracketed string or a bare enumeration word.
    Text(String),
    /// A numeric array of declared shape.
    Sequence(NumericArray),
    /// Text kept verbatim (whitespace-normalized),
    /// used for core JCAMP labels, structures,
    /// and lists of strings or enumeration words.
    Opaque(String),
}

impl ParameterValue {
    /// A short name of the value's variant, for error reporting.
    pub fn value_type(&self) -> &'static str {
        match self {
            ParameterValue::Scalar(_) => "scalar",
            ParameterValue::Text(_) => "text",
            ParameterValue::Sequence(_) => "sequence",
            ParameterValue::Opaque(_) => "opaque",
        }
    }

    /// Whether the value was kept verbatim by the reader.
    pub fn is_opaque(&self) -> bool {
        matches!(self, ParameterValue::Opaque(_))
    }

    /// Retrieve a single number.
    ///
    /// Succeeds for scalars and for numeric arrays of exactly one element.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Scalar(v) => Some(*v),
            ParameterValue::Sequence(array) if array.len() == 1 => Some(array.values()[0]),
            _ => None,
        }
    }

    /// Retrieve all numbers of the value.
    ///
    /// A scalar is seen as a sequence of one element.
    pub fn to_multi_f64(&self) -> Option<Cow<'_, [f64]>> {
        match self {
            ParameterValue::Scalar(v) => Some(Cow::Owned(vec![*v])),
            ParameterValue::Sequence(array) => Some(Cow::Borrowed(array.values())),
            _ => None,
        }
    }

    /// Retrieve the numeric array, if the value is one.
    pub fn as_sequence(&self) -> Option<&NumericArray> {
        match self {
            ParameterValue::Sequence(array) => Some(array),
            _ => None,
        }
    }

    /// Retrieve the string of a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

impl From<NumericArray> for ParameterValue {
    fn from(value: NumericArray) -> Self {
        ParameterValue::Sequence(value)
    }
}

/// Renders the value in the single-line form of the human readable dump,
/// which the value reader accepts back.
impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Scalar(v) => write!(f, "{}", v),
            ParameterValue::Text(s) => write!(f, "<{}>", s),
            ParameterValue::Sequence(array) => {
                write!(f, "( {} )", array.shape().iter().join(", "))?;
                if !array.is_empty() {
                    write!(f, " {}", array.values().iter().join(" "))?;
                }
                Ok(())
            }
            ParameterValue::Opaque(s) => f.write_str(s),
        }
    }
}
