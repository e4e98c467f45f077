use serde::{Deserialize, Serialize};

/// Where the ONNX session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTarget {
    /// The platform accelerator when available, CPU otherwise.
    #[default]
    Auto,
    Cpu,
}

impl ExecutionTarget {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "cpu" => Some(Self::Cpu),
            _ => None,
        }
    }

    /// Execution providers to register, in priority order.
    ///
    /// ONNX Runtime falls back to CPU for any provider that fails to load.
    pub fn providers(self) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
        match self {
            Self::Cpu => vec![],
            Self::Auto => platform_providers(),
        }
    }
}

fn platform_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
