use serde::{Deserialize, Serialize};

/// Device an inference session is bound to. The id selects the card when the
/// host has several accelerators.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceDevice {
    #[default] CPU,
    CUDA(usize),
    TensorRT(usize),
    CoreML(usize),
}

impl InferenceDevice {
    pub fn from_str(device: &str, device_id: usize) -> Option<Self> {
        match device.to_lowercase().as_str() {
            "cpu" => Some(InferenceDevice::CPU),
            "cuda" => Some(InferenceDevice::CUDA(device_id)),
            "tensorrt" => Some(InferenceDevice::TensorRT(device_id)),
            "coreml" => Some(InferenceDevice::CoreML(device_id)),
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => "CPU",
            InferenceDevice::CUDA(_) => "CUDA",
            InferenceDevice::TensorRT(_) => "TensorRT",
            InferenceDevice::CoreML(_) => "CoreML",
        }
    }

    pub fn device_id(&self) -> usize {
        match self {
            InferenceDevice::CPU => 0,
            InferenceDevice::CUDA(id) | InferenceDevice::TensorRT(id) | InferenceDevice::CoreML(id) => *id,
        }
    }
}

impl std::fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceDevice::CPU => write!(f, "CPU"),
            _ => write!(f, "{}:{}", self.str(), self.device_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(InferenceDevice::from_str("CUDA", 1), Some(InferenceDevice::CUDA(1)));
        assert_eq!(InferenceDevice::from_str("tensorrt", 0), Some(InferenceDevice::TensorRT(0)));
        assert_eq!(InferenceDevice::from_str("tpu", 0), None);
    }

    #[test]
    fn display_carries_device_id() {
        assert_eq!(InferenceDevice::CUDA(2).to_string(), "CUDA:2");
        assert_eq!(InferenceDevice::CPU.to_string(), "CPU");
        assert_eq!(InferenceDevice::CoreML(3).device_id(), 3);
    }
}
