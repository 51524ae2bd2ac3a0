//! Utilization snapshots

use serde::{Deserialize, Serialize};

/// GPU and memory utilization over the last sample period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationInfo {
    /// Percent of time one or more kernels was executing
    pub gpu_util: u32,
    /// Percent of time device memory was being read or written
    pub mem_util: u32,
}

impl UtilizationInfo {
    /// Create a new utilization value
    pub fn new(gpu_util: u32, mem_util: u32) -> Self {
        Self { gpu_util, mem_util }
    }
}

/// Encoder or decoder utilization reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineUtilization {
    /// Utilization (0-100%)
    pub utilization: u32,
    /// Sampling period in microseconds
    pub sampling_period_us: u32,
}

impl EngineUtilization {
    /// Create a new reading
    pub fn new(utilization: u32, sampling_period_us: u32) -> Self {
        Self {
            utilization,
            sampling_period_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization_field_names() {
        let json = serde_json::to_value(UtilizationInfo::new(80, 40)).unwrap();
        assert_eq!(json["gpuUtil"], 80);
        assert_eq!(json["memUtil"], 40);
    }

    #[test]
    fn test_engine_utilization_new() {
        let util = EngineUtilization::new(25, 167_000);
        assert_eq!(util.utilization, 25);
        assert_eq!(util.sampling_period_us, 167_000);
    }
}
