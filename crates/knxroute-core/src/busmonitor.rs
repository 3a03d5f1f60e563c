use std::sync::Arc;
use std::time::SystemTime;

use crate::frame::LData;

/// What a busmonitor record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MonitorPdu {
    /// Bytes exactly as a driver observed them on the medium.
    Raw(Vec<u8>),
    /// A data frame the router forwarded, reported to verbose monitors.
    Data(Arc<LData>),
}

/// An L_Busmonitor record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LBusmonitor {
    pub pdu: MonitorPdu,
    /// Driver-specific status octet (frame errors, bit errors, ...).
    pub status: u8,
    /// Bus timestamp from the interface, if it provides one.
    pub timestamp: Option<u32>,
    pub received: SystemTime,
}

impl LBusmonitor {
    pub fn raw(data: impl Into<Vec<u8>>) -> Self {
        Self {
            pdu: MonitorPdu::Raw(data.into()),
            status: 0,
            timestamp: None,
            received: SystemTime::now(),
        }
    }

    pub fn from_data(frame: Arc<LData>) -> Self {
        Self {
            pdu: MonitorPdu::Data(frame),
            status: 0,
            timestamp: None,
            received: SystemTime::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    /// True for records the router generated rather than observed.
    pub fn is_synthesized(&self) -> bool {
        matches!(self.pdu, MonitorPdu::Data(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{LBusmonitor, MonitorPdu};
    use crate::{GroupAddress, IndividualAddress, LData};
    use std::sync::Arc;

    #[test]
    fn raw_records_are_observed() {
        let rec = LBusmonitor::raw([0xBC, 0x11, 0x05]).with_timestamp(42);
        assert!(!rec.is_synthesized());
        assert_eq!(rec.timestamp, Some(42));
        assert_eq!(rec.pdu, MonitorPdu::Raw(vec![0xBC, 0x11, 0x05]));
    }

    #[test]
    fn data_records_are_synthesized() {
        let frame = Arc::new(LData::group(
            IndividualAddress::new(1, 1, 1),
            GroupAddress::new(0, 0, 1),
            [0x00, 0x80],
        ));
        let rec = LBusmonitor::from_data(frame.clone());
        assert!(rec.is_synthesized());
        assert_eq!(rec.pdu, MonitorPdu::Data(frame));
    }
}
