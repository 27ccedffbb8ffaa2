// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Port mapping
//!
//! RTPS v2.5 formula (Sec.9.6.1.1) with one unicast lane per transport, so
//! udp and shared memory participants of one host never contend for the
//! same ports.

use crate::backend::DdsTransportType;
use crate::config::{
    DOMAIN_ID_GAIN, MAX_DOMAIN_ID, MAX_PARTICIPANT_INDEX, PARTICIPANT_ID_GAIN, PORT_BASE,
    SHM_UNICAST_OFFSET, UDP_UNICAST_OFFSET,
};
use crate::error::{Error, Result};

/// Ports of one domain and transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Announce multicast port, shared by every participant of the domain
    pub multicast: u16,
    /// Unicast port of participant index 0
    unicast_base: u16,
}

impl PortMapping {
    /// Calculate ports for `domain_id` on `transport`.
    pub fn calculate(domain_id: u32, transport: DdsTransportType) -> Result<Self> {
        let domain = u16::try_from(domain_id)
            .ok()
            .filter(|_| domain_id <= MAX_DOMAIN_ID)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "domain_id {} out of range (0-{})",
                    domain_id, MAX_DOMAIN_ID
                ))
            })?;
        let offset = match transport {
            DdsTransportType::UdpV4 | DdsTransportType::UdpV6 => UDP_UNICAST_OFFSET,
            DdsTransportType::Shm => SHM_UNICAST_OFFSET,
            DdsTransportType::TcpV4 | DdsTransportType::TcpV6 => {
                return Err(Error::BackendError(format!(
                    "no wire port mapping for {}",
                    transport
                )))
            }
        };

        // 7400 + 250 x 232 + 11 still fits a u16
        let multicast = PORT_BASE + DOMAIN_ID_GAIN * domain;
        Ok(Self {
            multicast,
            unicast_base: multicast + offset,
        })
    }

    /// Unicast port of participant `index`, if the index is in range and
    /// the port fits.
    pub fn unicast(&self, index: u16) -> Option<u16> {
        if index >= MAX_PARTICIPANT_INDEX {
            return None;
        }
        let port = u32::from(self.unicast_base) + u32::from(PARTICIPANT_ID_GAIN) * u32::from(index);
        u16::try_from(port).ok()
    }

    /// Unicast ports in the order they are tried.
    pub fn unicast_ports(&self) -> impl Iterator<Item = u16> + '_ {
        (0..MAX_PARTICIPANT_INDEX).map_while(|index| self.unicast(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_0_udp() {
        let p = PortMapping::calculate(0, DdsTransportType::UdpV4).expect("mapping");
        assert_eq!(p.multicast, 7400);
        assert_eq!(p.unicast(0), Some(7410));
        assert_eq!(p.unicast(1), Some(7412));
        assert_eq!(
            PortMapping::calculate(0, DdsTransportType::UdpV6).expect("mapping"),
            p
        );
    }

    #[test]
    fn test_shm_lane_interleaves_udp() {
        let p = PortMapping::calculate(1, DdsTransportType::Shm).expect("mapping");
        assert_eq!(p.multicast, 7650);
        assert_eq!(p.unicast(0), Some(7661));
        assert_eq!(p.unicast(2), Some(7665));
    }

    #[test]
    fn test_high_domain_stops_at_u16() {
        let p = PortMapping::calculate(MAX_DOMAIN_ID, DdsTransportType::UdpV4).expect("mapping");
        assert_eq!(p.multicast, 65400);
        assert_eq!(p.unicast(0), Some(65410));
        assert_eq!(p.unicast(62), Some(65534));
        assert_eq!(p.unicast(63), None);
        assert_eq!(p.unicast_ports().count(), 63);
    }

    #[test]
    fn test_rejected_inputs() {
        assert!(matches!(
            PortMapping::calculate(MAX_DOMAIN_ID + 1, DdsTransportType::UdpV4),
            Err(Error::InvalidConfig(_))
        ));
        assert!(PortMapping::calculate(0, DdsTransportType::TcpV4).is_err());
        let p = PortMapping::calculate(0, DdsTransportType::UdpV4).expect("mapping");
        assert_eq!(p.unicast(MAX_PARTICIPANT_INDEX), None);
    }
}
