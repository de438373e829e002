use anyhow::Result;
use crate::data::{TensorInfo, TensorMuts, TensorRefs};

/// A loaded, compiled model bound to one device.
///
/// The accelerator SDK sits behind this trait; tests substitute an in-memory
/// implementation. `run` is synchronous and blocks until the device is done.
pub trait InferenceSession {
    /// Names of the graphs contained in the model file.
    fn graph_names(&self) -> Vec<String>;

    fn input_infos(&self) -> &[TensorInfo];

    fn output_infos(&self) -> &[TensorInfo];

    /// Executes the network.
    ///
    /// `inputs` holds one tensor per input name; `outputs` holds one
    /// preallocated tensor per output name, which the session overwrites.
    fn run(&mut self, inputs: &TensorRefs<'_>, outputs: &mut TensorMuts<'_>) -> Result<()>;

    /// Custom model metadata, e.g. the `names` entry of exported detectors.
    fn metadata(&self, _key: &str) -> Option<String> {
        None
    }

    fn input_names(&self) -> Vec<String> {
        self.input_infos().iter().map(|x| x.name.clone()).collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.output_infos().iter().map(|x| x.name.clone()).collect()
    }
}

impl<S: InferenceSession + ?Sized> InferenceSession for Box<S> {
    fn graph_names(&self) -> Vec<String> {
        (**self).graph_names()
    }

    fn input_infos(&self) -> &[TensorInfo] {
        (**self).input_infos()
    }

    fn output_infos(&self) -> &[TensorInfo] {
        (**self).output_infos()
    }

    fn run(&mut self, inputs: &TensorRefs<'_>, outputs: &mut TensorMuts<'_>) -> Result<()> {
        (**self).run(inputs, outputs)
    }

    fn metadata(&self, key: &str) -> Option<String> {
        (**self).metadata(key)
    }
}
