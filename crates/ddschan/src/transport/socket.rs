// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket setup per transport.
//!
//! | Transport | Unicast bind | Multicast |
//! |-----------|--------------|-----------|
//! | UDPv4 | `0.0.0.0:7410+2i` | `239.255.0.1:7400` |
//! | UDPv6 | `[::]:7410+2i` (v6 only) | `ff02::ffff:239.255.0.1:7400` |
//! | SHM | `127.0.0.1:7411+2i` | none |
//!
//! Unicast ports are tried in order without SO_REUSEADDR so each participant
//! owns its index; once every index is taken the kernel picks a port.

use super::ports::PortMapping;
use crate::backend::DdsTransportType;
use crate::config::{LOOPBACK_ANNOUNCE_SPAN, MULTICAST_GROUP_V4, MULTICAST_GROUP_V6};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Socket buffer size requested for both directions.
const SOCKET_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Sockets of one participant.
pub(super) struct Sockets {
    /// Sends everything; receives unicast.
    pub unicast: UdpSocket,
    /// Receives announces sent to the domain group, when the join worked.
    pub multicast: Option<UdpSocket>,
    /// Announce destinations: the group, then the loopback lanes.
    pub announce_targets: Vec<SocketAddr>,
}

pub(super) fn open(domain_id: u32, transport: DdsTransportType) -> io::Result<Sockets> {
    let mapping = PortMapping::calculate(domain_id, transport)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let (bind_ip, loopback, group): (IpAddr, IpAddr, Option<IpAddr>) = match transport {
        DdsTransportType::UdpV4 => (
            Ipv4Addr::UNSPECIFIED.into(),
            Ipv4Addr::LOCALHOST.into(),
            Some(MULTICAST_GROUP_V4.into()),
        ),
        DdsTransportType::UdpV6 => (
            Ipv6Addr::UNSPECIFIED.into(),
            Ipv6Addr::LOCALHOST.into(),
            Some(MULTICAST_GROUP_V6.into()),
        ),
        _ => (
            Ipv4Addr::LOCALHOST.into(),
            Ipv4Addr::LOCALHOST.into(),
            None,
        ),
    };

    let unicast = bind_unicast(bind_ip, &mapping)?;
    let local_port = unicast.local_addr()?.port();

    let multicast = group.and_then(|group| {
        if let Err(e) = enable_multicast_send(&unicast, group) {
            log::debug!("[wire] multicast send setup failed (non-fatal): {}", e);
        }
        match join_group(group, mapping.multicast) {
            Ok(socket) => Some(socket),
            Err(e) => {
                log::debug!(
                    "[wire] join {}:{} failed (non-fatal, loopback only): {}",
                    group,
                    mapping.multicast,
                    e
                );
                None
            }
        }
    });

    let mut announce_targets: Vec<SocketAddr> = group
        .map(|group| SocketAddr::new(group, mapping.multicast))
        .into_iter()
        .collect();
    announce_targets.extend(
        mapping
            .unicast_ports()
            .take(usize::from(LOOPBACK_ANNOUNCE_SPAN))
            .filter(|&port| port != local_port)
            .map(|port| SocketAddr::new(loopback, port)),
    );

    Ok(Sockets {
        unicast,
        multicast,
        announce_targets,
    })
}

fn new_socket(ip: IpAddr) -> io::Result<Socket> {
    let domain = if ip.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if ip.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    if let Err(e) = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
        log::debug!("[wire] SO_RCVBUF not applied: {}", e);
    }
    if let Err(e) = socket.set_send_buffer_size(SOCKET_BUFFER_SIZE) {
        log::debug!("[wire] SO_SNDBUF not applied: {}", e);
    }
    Ok(socket)
}

/// Bind the first free participant index, else an ephemeral port.
fn bind_unicast(ip: IpAddr, mapping: &PortMapping) -> io::Result<UdpSocket> {
    for port in mapping.unicast_ports() {
        let socket = new_socket(ip)?;
        if socket.bind(&SocketAddr::new(ip, port).into()).is_ok() {
            log::debug!("[wire] unicast bound {}:{}", ip, port);
            return Ok(socket.into());
        }
    }

    let socket = new_socket(ip)?;
    socket.bind(&SocketAddr::new(ip, 0).into())?;
    let socket: UdpSocket = socket.into();
    log::debug!(
        "[wire] participant indexes exhausted, unicast bound {}",
        socket.local_addr()?
    );
    Ok(socket)
}

fn enable_multicast_send(socket: &UdpSocket, group: IpAddr) -> io::Result<()> {
    match group {
        IpAddr::V4(_) => {
            socket.set_multicast_loop_v4(true)?;
            socket.set_multicast_ttl_v4(1)
        }
        IpAddr::V6(_) => socket.set_multicast_loop_v6(true),
    }
}

/// Shared multicast socket: SO_REUSEADDR so every participant of the host
/// receives the group traffic.
fn join_group(group: IpAddr, port: u16) -> io::Result<UdpSocket> {
    let any: IpAddr = match group {
        IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    let socket = new_socket(any)?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::new(any, port).into())?;

    let socket: UdpSocket = socket.into();
    match group {
        IpAddr::V4(group) => {
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
            socket.set_multicast_loop_v4(true)?;
        }
        IpAddr::V6(group) => {
            socket.join_multicast_v6(&group, 0)?;
            socket.set_multicast_loop_v6(true)?;
        }
    }
    log::debug!("[wire] joined {}:{}", group, port);
    Ok(socket)
}
