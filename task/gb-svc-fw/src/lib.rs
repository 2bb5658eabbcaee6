// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SVC firmware image: drives `drv-gb-svc`'s bring-up state machine
//! (§4.G) and, once an interface's manifest is in hand, walks it with
//! `gb-ap` (§4.H) to register per-bundle connections on the same switch
//! the state machine already brought up. On real hardware the SVC is the
//! one role that both supervises the switch and talks Control protocol to
//! every interface, so unlike `task-gb-bridge` this image owns both
//! halves directly rather than through an IPC boundary.

#![cfg_attr(not(test), no_std)]

use drv_gb_svc::{BoardOps, ConnectionSpec, InterfaceRoute, Svc, SvcState, SwitchOps};
use gb_ap::{ApCPortAllocator, ApError, ConnectionFactory, Interface, ProtocolRegistry};
use ringbuf::{ringbuf, ringbuf_entry};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    ManifestParsed { vendor_id: u8, product_id: u8 },
    ManifestRejected,
    ConnectionsEstablished { count: usize },
}

ringbuf!(Trace, 16, Trace::ManifestRejected);

/// Adapts [`SwitchOps`] to [`ConnectionFactory`] so `gb_ap::init_bundles`
/// can ask for switch connections without knowing anything about switch
/// addressing — that translation lives here, against the same
/// `InterfaceRoute` table `drv-gb-svc`'s own route construction uses.
struct SwitchConnectionFactory<'a, S: SwitchOps> {
    switch: &'a mut S,
    interfaces: &'a [InterfaceRoute],
    ap_device_id: u8,
    ap_port: u8,
    traffic_class: u8,
}

impl<'a, S: SwitchOps> ConnectionFactory for SwitchConnectionFactory<'a, S> {
    fn create_connection(
        &mut self,
        peer_interface: usize,
        peer_cport: u16,
        local_cport: u16,
    ) -> Result<(), ApError> {
        let iface = self
            .interfaces
            .get(peer_interface)
            .ok_or(ApError::ConnectionFailed)?;
        let spec = ConnectionSpec {
            port0: iface.port,
            device_id0: iface.device_id,
            cport0: peer_cport,
            port1: self.ap_port,
            device_id1: self.ap_device_id,
            cport1: local_cport,
            traffic_class: self.traffic_class,
            flags: drv_gb_svc::DEFAULT_CONNECTION_FLAGS,
        };
        self.switch
            .connection_create(spec)
            .map_err(|_| ApError::ConnectionFailed)
    }
}

/// Wires the bring-up state machine to the per-interface manifest walk.
/// `B` is the board (regulators, switch reset, IRQ enables); `S` is the
/// switch ASIC's own connection-creation surface, kept separate because
/// `Svc<B>` only needs the former and `gb-ap` only needs the latter.
pub struct SvcFirmware<B: BoardOps, S: SwitchOps, const N: usize> {
    pub svc: Svc<B>,
    switch: S,
    interfaces: &'static [InterfaceRoute],
    registry: ProtocolRegistry<N>,
    ap_device_id: u8,
    ap_port: u8,
}

impl<B: BoardOps, S: SwitchOps, const N: usize> SvcFirmware<B, S, N> {
    pub fn new(
        board: B,
        switch: S,
        rails: &'static [drv_gb_svc::InterfaceRail],
        interfaces: &'static [InterfaceRoute],
        registry: ProtocolRegistry<N>,
        ap_device_id: u8,
        ap_port: u8,
    ) -> Self {
        SvcFirmware {
            svc: Svc::new(board, rails),
            switch,
            interfaces,
            registry,
            ap_device_id,
            ap_port,
        }
    }

    /// Drives one bring-up step; see [`Svc::advance`].
    pub fn boot_step(&mut self, now_ms: u32) -> SvcState {
        self.svc.advance(now_ms)
    }

    /// Parses a fetched manifest and registers one switch connection per
    /// CPort whose protocol is in `self.registry`, skipping Control
    /// (§4.H). Only meaningful once [`SvcFirmware::boot_step`] has
    /// reached [`SvcState::IrqOn`] — routes can't be programmed before
    /// the switch itself is initialized.
    pub fn bring_up_interface(
        &mut self,
        peer_interface: usize,
        manifest: &[u8],
    ) -> Result<usize, ApError> {
        let interface = match Interface::parse(manifest) {
            Ok(i) => i,
            Err(e) => {
                ringbuf_entry!(Trace::ManifestRejected);
                return Err(e);
            }
        };
        ringbuf_entry!(Trace::ManifestParsed {
            vendor_id: interface.vendor_id,
            product_id: interface.product_id
        });

        let mut allocator = ApCPortAllocator::new(16, abi::registers::AP_BRIDGE_CPORT_COUNT as u16);
        let mut factory = SwitchConnectionFactory {
            switch: &mut self.switch,
            interfaces: self.interfaces,
            ap_device_id: self.ap_device_id,
            ap_port: self.ap_port,
            traffic_class: 0,
        };

        let allocated = gb_ap::registry::init_bundles(
            peer_interface,
            &interface,
            &self.registry,
            &mut allocator,
            &mut factory,
        )?;
        ringbuf_entry!(Trace::ConnectionsEstablished { count: allocated.len() });
        Ok(allocated.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::manifest::{DescriptorType, DESCRIPTOR_HEADER_SIZE, MANIFEST_HEADER_SIZE};
    use drv_gb_svc::SvcError;

    #[derive(Default)]
    struct FakeBoard;
    impl BoardOps for FakeBoard {
        fn board_init(&mut self) -> Result<(), SvcError> { Ok(()) }
        fn release_switch_reset(&mut self) {}
        fn switch_init(&mut self) -> Result<(), SvcError> { Ok(()) }
        fn power_interface_rail(&mut self, _: usize, _: u32) -> Result<(), SvcError> { Ok(()) }
        fn enable_switch_irq(&mut self) {}
        fn enable_port_irq(&mut self, _: u8) {}
        fn teardown(&mut self) {}
    }

    #[derive(Default)]
    struct FakeSwitch {
        created: std::vec::Vec<ConnectionSpec>,
    }
    impl SwitchOps for FakeSwitch {
        fn set_port_device_id(&mut self, _: u8, _: u8) {}
        fn connection_create(&mut self, spec: ConnectionSpec) -> Result<(), ()> {
            self.created.push(spec);
            Ok(())
        }
    }

    static RAILS: [drv_gb_svc::InterfaceRail; 1] =
        [drv_gb_svc::InterfaceRail { name: "iface0", hold_time_ms: 10 }];
    static INTERFACES: [InterfaceRoute; 1] =
        [InterfaceRoute { name: "iface0", port: 1, device_id: 2 }];

    fn push_descriptor(buf: &mut std::vec::Vec<u8>, kind: u8, body: &[u8]) {
        let size = (DESCRIPTOR_HEADER_SIZE + body.len()) as u16;
        buf.extend_from_slice(&size.to_le_bytes());
        buf.push(kind);
        buf.push(0);
        buf.extend_from_slice(body);
    }

    fn manifest_with(body: &[u8]) -> std::vec::Vec<u8> {
        let mut buf = std::vec::Vec::new();
        let total = (MANIFEST_HEADER_SIZE + body.len()) as u16;
        buf.extend_from_slice(&total.to_le_bytes());
        buf.push(0);
        buf.push(1);
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn bring_up_interface_creates_one_connection_per_registered_protocol() {
        let mut registry: ProtocolRegistry<4> = ProtocolRegistry::new();
        registry.register(0x07).unwrap();

        let mut fw = SvcFirmware::new(
            FakeBoard,
            FakeSwitch::default(),
            &RAILS,
            &INTERFACES,
            registry,
            1,
            0,
        );

        let mut body = std::vec::Vec::new();
        push_descriptor(&mut body, DescriptorType::Interface as u8, &[0x11, 0x22]);
        push_descriptor(&mut body, DescriptorType::Bundle as u8, &[0, 0x01]);
        push_descriptor(&mut body, DescriptorType::CPort as u8, &[0x04, 0x00, 0x00, 0x07]);
        let manifest = manifest_with(&body);

        let count = fw.bring_up_interface(0, &manifest).unwrap();
        assert_eq!(count, 1);
        assert_eq!(fw.switch.created.len(), 1);
        assert_eq!(fw.switch.created[0].cport0, 4);
    }

    #[test]
    fn malformed_manifest_is_reported_without_panicking() {
        let registry: ProtocolRegistry<4> = ProtocolRegistry::new();
        let mut fw = SvcFirmware::new(FakeBoard, FakeSwitch::default(), &RAILS, &INTERFACES, registry, 1, 0);
        assert!(fw.bring_up_interface(0, &[1, 2]).is_err());
    }
}
