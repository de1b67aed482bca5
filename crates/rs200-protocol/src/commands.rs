//! RS200 function index definitions

/// Function indices understood by the RS200
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionIndex {
    /// Firmware version (the connection probe)
    FirmwareVersion = 0,
    /// Accumulated rainfall status
    RainfallStatus = 1,
    /// System/sensor status
    SensorStatus = 2,
    /// Optics status, also used to start calibration
    OpticsStatus = 3,
    /// Realtime rain rate
    RealtimeRain = 4,
    /// Rainfall reporting cadence in multiples of 50 ms (write only)
    ReportingCadence = 5,
}

impl FunctionIndex {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FunctionIndex::FirmwareVersion),
            1 => Some(FunctionIndex::RainfallStatus),
            2 => Some(FunctionIndex::SensorStatus),
            3 => Some(FunctionIndex::OpticsStatus),
            4 => Some(FunctionIndex::RealtimeRain),
            5 => Some(FunctionIndex::ReportingCadence),
            _ => None,
        }
    }
}
