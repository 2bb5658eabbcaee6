// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch route construction (§4.G `Routing`): assigns each declared
//! interface its device ID, then programs one switch connection per
//! requested CPort pairing. Best-effort: a single connection failing
//! doesn't stop the rest from being attempted, since one misbehaving
//! interface shouldn't keep every other interface's links from coming up.

use ringbuf::{ringbuf, ringbuf_entry};

/// End-to-end flow control enabled on this connection.
pub const CPORT_FLAG_E2EFC: u8 = 1 << 0;
/// CSD_N: CPort shutdown disabled.
pub const CPORT_FLAG_CSD_N: u8 = 1 << 1;
/// CSV_N: CPort shutdown value (held inactive).
pub const CPORT_FLAG_CSV_N: u8 = 1 << 2;

/// The flag combination every bridge/AP connection is created with unless
/// a protocol asks for something unusual (§4.G).
pub const DEFAULT_CONNECTION_FLAGS: u8 = CPORT_FLAG_CSD_N | CPORT_FLAG_CSV_N;

/// A declared interface slot: which switch port it's wired to and which
/// UniPro device ID it should be assigned at bring-up.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterfaceRoute {
    pub name: &'static str,
    pub port: u8,
    pub device_id: u8,
}

/// One switch connection to program, in the switch's own addressing
/// (`{port, device_id, cport}` on each side).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConnectionSpec {
    pub port0: u8,
    pub device_id0: u8,
    pub cport0: u16,
    pub port1: u8,
    pub device_id1: u8,
    pub cport1: u16,
    pub traffic_class: u8,
    pub flags: u8,
}

/// Everything route construction needs from the switch ASIC.
pub trait SwitchOps {
    fn set_port_device_id(&mut self, port: u8, device_id: u8);
    fn connection_create(&mut self, spec: ConnectionSpec) -> Result<(), ()>;
}

/// One requested CPort pairing between a declared interface and the AP,
/// in the caller's terms (index into the interface table, not switch
/// addressing — `build_routes` resolves that).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RouteRequest {
    pub interface: usize,
    pub peer_cport: u16,
    pub local_cport: u16,
    pub traffic_class: u8,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RouteReport {
    pub programmed: usize,
    pub failed: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    DeviceIdProgrammed { port: u8, device_id: u8 },
    ConnectionCreated { interface: usize },
    ConnectionFailed { interface: usize },
    UnknownInterface { interface: usize },
}

ringbuf!(Trace, 32, Trace::UnknownInterface { interface: 0 });

/// Assigns every declared interface's device ID, then creates one switch
/// connection per request, continuing past individual failures. Requests
/// naming an interface index outside `interfaces` are skipped and counted
/// as failures rather than panicking — a malformed manifest-derived
/// request must not take down the whole boot.
pub fn build_routes<S: SwitchOps>(
    switch: &mut S,
    interfaces: &[InterfaceRoute],
    requests: &[RouteRequest],
    ap_device_id: u8,
    ap_port: u8,
) -> RouteReport {
    for iface in interfaces {
        switch.set_port_device_id(iface.port, iface.device_id);
        ringbuf_entry!(Trace::DeviceIdProgrammed {
            port: iface.port,
            device_id: iface.device_id
        });
    }
    switch.set_port_device_id(ap_port, ap_device_id);

    let mut report = RouteReport::default();
    for req in requests {
        let Some(iface) = interfaces.get(req.interface) else {
            ringbuf_entry!(Trace::UnknownInterface { interface: req.interface });
            report.failed += 1;
            continue;
        };

        let spec = ConnectionSpec {
            port0: iface.port,
            device_id0: iface.device_id,
            cport0: req.peer_cport,
            port1: ap_port,
            device_id1: ap_device_id,
            cport1: req.local_cport,
            traffic_class: req.traffic_class,
            flags: DEFAULT_CONNECTION_FLAGS,
        };

        match switch.connection_create(spec) {
            Ok(()) => {
                report.programmed += 1;
                ringbuf_entry!(Trace::ConnectionCreated { interface: req.interface });
            }
            Err(()) => {
                report.failed += 1;
                ringbuf_entry!(Trace::ConnectionFailed { interface: req.interface });
            }
        }
    }
    report
}
