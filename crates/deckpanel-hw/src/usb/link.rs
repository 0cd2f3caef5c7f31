//! libusb-backed panel link.

use super::Link;
use crate::{Error, Result};
use rusb::{
    Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Zero means no timeout: reads block until a report or an error arrives.
const READ_TIMEOUT: Duration = Duration::ZERO;

/// Timeout for a single output report.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// An IN or OUT endpoint of the claimed interface.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    address: u8,
    transfer: TransferType,
}

/// Interface and endpoint pair located on the device.
#[derive(Debug, Clone, Copy)]
struct Endpoints {
    interface: u8,
    setting: u8,
    input: Endpoint,
    output: Endpoint,
}

/// An open, claimed device.
struct Connection {
    handle: DeviceHandle<Context>,
    descriptor: DeviceDescriptor,
    endpoints: Endpoints,
}

impl Connection {
    fn read(&self, buf: &mut [u8]) -> rusb::Result<usize> {
        let ep = self.endpoints.input;
        match ep.transfer {
            TransferType::Bulk => self.handle.read_bulk(ep.address, buf, READ_TIMEOUT),
            _ => self.handle.read_interrupt(ep.address, buf, READ_TIMEOUT),
        }
    }

    fn write(&self, data: &[u8]) -> rusb::Result<usize> {
        let ep = self.endpoints.output;
        match ep.transfer {
            TransferType::Bulk => self.handle.write_bulk(ep.address, data, WRITE_TIMEOUT),
            _ => self.handle.write_interrupt(ep.address, data, WRITE_TIMEOUT),
        }
    }
}

/// Panel link over libusb.
///
/// The connection is shared behind an `Arc` so a blocking read does not
/// hold the state lock and writes can proceed concurrently.
pub struct UsbLink {
    vendor_id: u16,
    product_id: u16,
    serial: Option<String>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl UsbLink {
    /// Creates a disconnected link for the given VID:PID.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            serial: None,
            connection: Mutex::new(None),
        }
    }

    /// Restricts the link to the panel with this serial number.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Returns the active connection, or a transport error when disconnected.
    fn current(&self) -> Result<Arc<Connection>> {
        self.connection
            .lock()
            .map_err(|_| Error::StatePoisoned("link"))?
            .clone()
            .ok_or(Error::Transport(rusb::Error::NoDevice))
    }

    /// Marks the link disconnected, unless `conn` was already replaced.
    fn drop_connection(&self, conn: &Arc<Connection>) {
        if let Ok(mut slot) = self.connection.lock() {
            if slot.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn)) {
                *slot = None;
            }
        }
    }

    /// Finds and opens the panel, honouring the serial filter.
    fn open_device(
        &self,
        context: &Context,
    ) -> Result<(Device<Context>, DeviceHandle<Context>, DeviceDescriptor)> {
        let mut found = false;

        for device in context.devices()?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(e) => {
                    debug!("Skipping device without descriptor: {}", e);
                    continue;
                }
            };
            if descriptor.vendor_id() != self.vendor_id
                || descriptor.product_id() != self.product_id
            {
                continue;
            }
            found = true;
            debug!(
                "Found panel on bus {} address {}",
                device.bus_number(),
                device.address()
            );

            let handle = device.open()?;
            let Some(wanted) = &self.serial else {
                return Ok((device, handle, descriptor));
            };
            match handle.read_serial_number_string_ascii(&descriptor) {
                Ok(serial) if &serial == wanted => return Ok((device, handle, descriptor)),
                Ok(serial) => debug!("Skipping panel with serial {}", serial),
                Err(e) => debug!("Failed to read serial number: {}", e),
            }
        }

        match (&self.serial, found) {
            (Some(wanted), true) => Err(Error::SerialMismatch(wanted.clone())),
            _ => Err(Error::NoDeviceFound {
                vendor_id: self.vendor_id,
                product_id: self.product_id,
            }),
        }
    }
}

/// Walks the device configurations for an interface carrying both an IN and
/// an OUT bulk or interrupt endpoint.
fn find_endpoints(device: &Device<Context>, descriptor: &DeviceDescriptor) -> Result<Endpoints> {
    let mut saw_input = false;

    for config_index in 0..descriptor.num_configurations() {
        let config = device.config_descriptor(config_index)?;
        for interface in config.interfaces() {
            for setting in interface.descriptors() {
                let mut input = None;
                let mut output = None;

                for ep in setting.endpoint_descriptors() {
                    let transfer = ep.transfer_type();
                    if !matches!(transfer, TransferType::Bulk | TransferType::Interrupt) {
                        continue;
                    }
                    let endpoint = Endpoint {
                        address: ep.address(),
                        transfer,
                    };
                    match ep.direction() {
                        Direction::In => {
                            input.get_or_insert(endpoint);
                        }
                        Direction::Out => {
                            output.get_or_insert(endpoint);
                        }
                    }
                }

                match (input, output) {
                    (Some(input), Some(output)) => {
                        return Ok(Endpoints {
                            interface: setting.interface_number(),
                            setting: setting.setting_number(),
                            input,
                            output,
                        });
                    }
                    (Some(_), None) => saw_input = true,
                    _ => {}
                }
            }
        }
    }

    Err(Error::EndpointNotFound(if saw_input { "OUT" } else { "IN" }))
}

impl Link for UsbLink {
    fn connect(&self) -> Result<()> {
        if self.is_connected() {
            debug!("Link already connected");
            return Ok(());
        }

        let context = Context::new()?;
        let (device, handle, descriptor) = self.open_device(&context)?;
        let endpoints = find_endpoints(&device, &descriptor)?;

        // The OS HID driver usually owns the interface already.
        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) => {}
            Err(rusb::Error::NotSupported) => debug!("Kernel driver auto-detach not supported"),
            Err(e) => return Err(e.into()),
        }
        handle.claim_interface(endpoints.interface)?;
        if endpoints.setting != 0 {
            handle.set_alternate_setting(endpoints.interface, endpoints.setting)?;
        }

        info!(
            "Panel connected (VID:{:04X} PID:{:04X}, interface={}, in=0x{:02X}, out=0x{:02X})",
            self.vendor_id,
            self.product_id,
            endpoints.interface,
            endpoints.input.address,
            endpoints.output.address
        );

        let connection = Arc::new(Connection {
            handle,
            descriptor,
            endpoints,
        });
        *self
            .connection
            .lock()
            .map_err(|_| Error::StatePoisoned("link"))? = Some(connection);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        let conn = self.current()?;
        let written = conn.write(data)?;
        if written != data.len() {
            warn!("Short write: {} of {} bytes", written, data.len());
            return Err(Error::Transport(rusb::Error::Io));
        }
        Ok(written)
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let conn = self.current()?;
        match conn.read(buf) {
            Ok(count) => Ok(count),
            Err(e) => {
                self.drop_connection(&conn);
                warn!("Panel read failed, link marked disconnected: {}", e);
                Err(e.into())
            }
        }
    }

    fn close(&self) -> Result<()> {
        let taken = self
            .connection
            .lock()
            .map_err(|_| Error::StatePoisoned("link"))?
            .take();
        let Some(conn) = taken else {
            return Ok(());
        };

        match Arc::try_unwrap(conn) {
            Ok(conn) => {
                let interface = conn.endpoints.interface;
                conn.handle.release_interface(interface)?;
            }
            // A blocked read still holds the handle; dropping the last
            // reference releases the interface and closes the device.
            Err(_) => debug!("Read in flight, deferring handle release"),
        }

        info!("Panel link closed");
        Ok(())
    }

    fn serial_number(&self) -> Result<String> {
        let conn = self.current()?;
        Ok(conn.handle.read_serial_number_string_ascii(&conn.descriptor)?)
    }
}

/// Lists the serial numbers of all attached panels with this VID:PID.
pub fn list_serial_numbers(vendor_id: u16, product_id: u16) -> Result<Vec<String>> {
    let context = Context::new()?;
    let mut serials = Vec::new();

    for device in context.devices()?.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };
        if descriptor.vendor_id() != vendor_id || descriptor.product_id() != product_id {
            continue;
        }
        match device
            .open()
            .and_then(|handle| handle.read_serial_number_string_ascii(&descriptor))
        {
            Ok(serial) => serials.push(serial),
            Err(e) => warn!(
                "Cannot read serial of panel on bus {} address {}: {}",
                device.bus_number(),
                device.address(),
                e
            ),
        }
    }

    Ok(serials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PRODUCT_ID, VENDOR_ID};

    #[test]
    fn test_new_link_is_disconnected() {
        let link = UsbLink::new(VENDOR_ID, PRODUCT_ID);
        assert!(!link.is_connected());
        assert_eq!(link.vendor_id(), VENDOR_ID);
        assert_eq!(link.product_id(), PRODUCT_ID);
    }

    #[test]
    fn test_io_without_connection_fails() {
        let link = UsbLink::new(VENDOR_ID, PRODUCT_ID);
        let mut buf = [0u8; 17];
        assert!(matches!(
            link.write(&[0u8; 4]),
            Err(Error::Transport(rusb::Error::NoDevice))
        ));
        assert!(matches!(
            link.read(&mut buf),
            Err(Error::Transport(rusb::Error::NoDevice))
        ));
        assert!(link.serial_number().is_err());
    }

    #[test]
    fn test_close_when_disconnected_is_noop() {
        let link = UsbLink::new(VENDOR_ID, PRODUCT_ID).with_serial("ABC");
        assert!(link.close().is_ok());
        assert!(link.close().is_ok());
    }

    // Hardware tests are skipped by default
    #[test]
    #[ignore]
    fn test_connect() {
        let link = UsbLink::new(VENDOR_ID, PRODUCT_ID);
        assert!(link.connect().is_ok());
        assert!(link.is_connected());
        assert!(link.serial_number().is_ok());
        assert!(link.close().is_ok());
        assert!(!link.is_connected());
    }
}
