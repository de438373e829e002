use std::collections::BTreeMap;
use anyhow::Result;
use ndarray::{Array, ArrayViewD, ArrayViewMutD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Host-side tensor, wrapper over [`Array<f32, IxDyn>`].
///
/// Device dtypes other than `f32` are converted at the session boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tensor(pub Array<f32, IxDyn>);

impl From<Array<f32, IxDyn>> for Tensor {
    fn from(x: Array<f32, IxDyn>) -> Self {
        Self(x)
    }
}

impl From<Vec<f32>> for Tensor {
    fn from(x: Vec<f32>) -> Self {
        Self(Array::from_vec(x).into_dyn())
    }
}

impl std::ops::Deref for Tensor {
    type Target = Array<f32, IxDyn>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Tensor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        Self(Array::zeros(IxDyn(shape)))
    }

    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(IxDyn(shape), xs)?))
    }

    /// View of the `i`-th batch slot.
    pub fn slot(&self, i: usize) -> ArrayViewD<'_, f32> {
        self.0.index_axis(Axis(0), i)
    }

    pub fn slot_mut(&mut self, i: usize) -> ArrayViewMutD<'_, f32> {
        self.0.index_axis_mut(Axis(0), i)
    }
}

/// Element type a model declares for one of its tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DType {
    #[default]
    F32,
    F16,
    U8,
    I8,
    I32,
    I64,
}

/// Name, dimensions and dtype of one model input or output.
///
/// A `0` dimension is dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TensorInfo {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl TensorInfo {
    pub fn new(name: &str, shape: &[usize], dtype: DType) -> Self {
        Self {
            name: name.to_string(),
            shape: shape.to_vec(),
            dtype,
        }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_dynamic(&self) -> bool {
        self.shape.iter().any(|&d| d == 0)
    }
}

/// Borrowed input tensors keyed by model input name; valid for one run.
pub type TensorRefs<'a> = BTreeMap<&'a str, &'a Tensor>;

/// Borrowed output tensors the session fills in place; valid for one run.
pub type TensorMuts<'a> = BTreeMap<&'a str, &'a mut Tensor>;
