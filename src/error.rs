use thiserror::Error;

/// Fatal conditions hit while bringing up the GPU. None of these are
/// recoverable; the host reports them and stops initializing.
#[derive(Debug, Error)]
pub enum GpuInitError {
    /// The host could not provide a GPU-capable drawing context at all.
    #[error("GPU canvas context unavailable: {0}")]
    ContextUnavailable(#[from] wgpu::CreateSurfaceError),
    /// An adapter exists but lacks something the simulation depends on.
    #[error("adapter does not support {0}")]
    MissingCapability(&'static str),
    #[error("no usable GPU adapter found: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to acquire GPU device: {0}")]
    NoDevice(#[from] wgpu::RequestDeviceError),
}

impl GpuInitError {
    /// Whether this is the "capability absent" class of failure, as opposed
    /// to "no adapter".
    pub fn is_capability_absent(&self) -> bool {
        matches!(
            self,
            GpuInitError::ContextUnavailable(_) | GpuInitError::MissingCapability(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid size must be between 1 and {max}, got {got}")]
    InvalidGridSize { got: u64, max: u32 },
    #[error("workgroup size must be between 1 and {max}, got {got}")]
    InvalidWorkgroupSize { got: u32, max: u32 },
    #[error("seed probability must be within 0..=1, got {0}")]
    InvalidProbability(f32),
    #[error("tick interval must be non-zero")]
    ZeroInterval,
    #[error("invalid tick interval `{value}`: {source}")]
    InvalidInterval {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}
