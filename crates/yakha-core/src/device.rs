//! Compute-device selection.
//!
//! Blocks are placed on a device exactly once, at construction; this module
//! picks that device and the dtype the loaded submodules should use.

use candle_core::{DType, Device};
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cuda,
    Metal,
    Cpu,
}

impl DeviceKind {
    pub fn is_cpu(&self) -> bool {
        matches!(self, DeviceKind::Cpu)
    }

    pub fn is_metal(&self) -> bool {
        matches!(self, DeviceKind::Metal)
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, DeviceKind::Cuda)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Metal on Apple Silicon performs better in F32 than in half dtypes.
    pub prefers_f32: bool,
    pub supports_bf16: bool,
    pub has_unified_memory: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device: Device,
    pub kind: DeviceKind,
    pub capabilities: DeviceCapabilities,
}

impl DeviceProfile {
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            kind: DeviceKind::Cpu,
            capabilities: DeviceCapabilities::default(),
        }
    }

    /// Select the dtype submodules should be loaded in.
    ///
    /// CPU always gets F32; Metal gets F32 regardless of the request (no
    /// tensor cores, unified memory); CUDA honours half-precision requests,
    /// falling back to F32 when BF16 is unsupported.
    pub fn select_dtype(&self, requested: Option<&str>) -> DType {
        let dtype = match requested.unwrap_or("") {
            "bfloat16" | "bf16" => match self.kind {
                DeviceKind::Cpu | DeviceKind::Metal => DType::F32,
                DeviceKind::Cuda => {
                    if self.capabilities.supports_bf16 {
                        DType::BF16
                    } else {
                        DType::F32
                    }
                }
            },
            "float16" | "f16" => match self.kind {
                DeviceKind::Cpu | DeviceKind::Metal => DType::F32,
                DeviceKind::Cuda => DType::F16,
            },
            "float32" | "f32" => DType::F32,
            _ => match self.kind {
                DeviceKind::Cpu | DeviceKind::Metal => DType::F32,
                DeviceKind::Cuda => {
                    if self.capabilities.supports_bf16 {
                        DType::BF16
                    } else {
                        DType::F32
                    }
                }
            },
        };

        debug!(
            "Selected dtype {:?} for device {:?} (requested: {:?})",
            dtype, self.kind, requested
        );

        dtype
    }

    pub fn optimal_dtype(&self) -> DType {
        self.select_dtype(None)
    }
}

pub struct DeviceSelector;

impl DeviceSelector {
    fn try_metal() -> Option<DeviceProfile> {
        let device = std::panic::catch_unwind(|| Device::metal_if_available(0))
            .ok()?
            .ok()?;
        if device.is_metal() {
            Some(DeviceProfile {
                device,
                kind: DeviceKind::Metal,
                capabilities: DeviceCapabilities {
                    prefers_f32: true,
                    supports_bf16: false,
                    has_unified_memory: true,
                },
            })
        } else {
            None
        }
    }

    fn try_cuda() -> Option<DeviceProfile> {
        let device = std::panic::catch_unwind(|| Device::cuda_if_available(0))
            .ok()?
            .ok()?;
        if device.is_cuda() {
            Some(DeviceProfile {
                device,
                kind: DeviceKind::Cuda,
                capabilities: DeviceCapabilities {
                    prefers_f32: false,
                    // BF16 needs Ampere or newer; assume modern hardware.
                    supports_bf16: true,
                    has_unified_memory: false,
                },
            })
        } else {
            None
        }
    }

    pub fn detect() -> Result<DeviceProfile> {
        if cfg!(target_os = "macos") {
            if let Some(profile) = Self::try_metal() {
                info!("Using Metal device");
                return Ok(profile);
            }
        } else if let Some(profile) = Self::try_cuda() {
            info!("Using CUDA device");
            return Ok(profile);
        }

        info!("Falling back to CPU");
        Ok(DeviceProfile::cpu())
    }

    pub fn detect_with_preference(preference: Option<&str>) -> Result<DeviceProfile> {
        match preference.unwrap_or("") {
            "cuda" => {
                if let Some(profile) = Self::try_cuda() {
                    Ok(profile)
                } else {
                    Self::detect()
                }
            }
            "metal" | "mps" => {
                if let Some(profile) = Self::try_metal() {
                    Ok(profile)
                } else {
                    Self::detect()
                }
            }
            "cpu" => Ok(DeviceProfile::cpu()),
            _ => Self::detect(),
        }
    }
}
