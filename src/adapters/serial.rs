//! Schedule link adapter (UART1 to the companion app bridge).
//!
//! Implements [`TransportPort`].  On ESP-IDF it polls the UART driver
//! installed by [`hw_init`](crate::drivers::hw_init) without blocking.
//! On host it is a loopback: tests push inbound bytes and inspect what
//! the device wrote back.

use crate::app::ports::TransportPort;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

pub struct SerialLink {
    #[cfg(not(target_os = "espidf"))]
    inbound: VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    outbound: Vec<u8>,
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            inbound: VecDeque::new(),
            #[cfg(not(target_os = "espidf"))]
            outbound: Vec::new(),
        }
    }

    /// Queue bytes as if the companion app had sent them.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&mut self, data: &[u8]) {
        self.inbound.extend(data);
    }

    /// Drain everything written to the link so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn take_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.outbound)
    }
}

#[cfg(target_os = "espidf")]
impl TransportPort for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        use crate::drivers::hw_init::LINK_UART_PORT;
        // SAFETY: the UART driver was installed in init_peripherals();
        // zero ticks makes this a non-blocking poll of the RX ring.
        let n = unsafe {
            esp_idf_svc::sys::uart_read_bytes(
                LINK_UART_PORT,
                buf.as_mut_ptr().cast(),
                buf.len() as u32,
                0,
            )
        };
        n.max(0) as usize
    }

    fn write(&mut self, data: &[u8]) {
        use crate::drivers::hw_init::LINK_UART_PORT;
        // SAFETY: as above; the TX path copies `data` before returning.
        let n = unsafe {
            esp_idf_svc::sys::uart_write_bytes(LINK_UART_PORT, data.as_ptr().cast(), data.len())
        };
        if n < 0 {
            log::warn!("serial: write of {} bytes failed", data.len());
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl TransportPort for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&mut self, data: &[u8]) {
        self.outbound.extend_from_slice(data);
    }
}
