use core::fmt;

use serde::{Deserialize, Serialize};

/// Kind of memory a tensor lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    /// Host memory.
    #[default]
    Cpu,
    /// CUDA accelerator memory.
    Cuda,
    /// ROCm/HIP accelerator memory.
    Hip,
}

impl DeviceType {
    /// Stable integer tag of the device type.
    pub const fn tag(&self) -> i32 {
        match self {
            DeviceType::Cpu => 0,
            DeviceType::Cuda => 1,
            DeviceType::Hip => 6,
        }
    }

    /// Device type matching a stable integer tag.
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(DeviceType::Cpu),
            1 => Some(DeviceType::Cuda),
            6 => Some(DeviceType::Hip),
            _ => None,
        }
    }

    /// Upper-case name, used to build device specific registry keys.
    pub const fn name(&self) -> &'static str {
        match self {
            DeviceType::Cpu => "CPU",
            DeviceType::Cuda => "CUDA",
            DeviceType::Hip => "HIP",
        }
    }
}

/// A device locator: the memory kind and the ordinal of the device of that kind.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Device {
    /// Kind of device.
    pub device_type: DeviceType,
    /// Ordinal of the device.
    pub index: u32,
}

impl Device {
    /// The host device.
    pub const fn cpu() -> Self {
        Self {
            device_type: DeviceType::Cpu,
            index: 0,
        }
    }

    /// Returns true for host memory.
    pub fn is_cpu(&self) -> bool {
        self.device_type == DeviceType::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_type.name(), self.index)
    }
}
