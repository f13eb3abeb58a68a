// Bus transport for the ST7796S: a 4-wire SPI link where a D/C line selects
// between command bytes (low) and parameter / pixel data (high).
//
// Every pixel-carrying write is split into sub-transfers of at most
// CHUNK_BYTES so a single SPI transaction never exceeds what the DMA
// descriptor chain was sized for.

use core::fmt;

use embedded_hal::{digital::OutputPin, spi::SpiDevice};

/// Largest single data transfer issued by the bulk colour writers.
pub const CHUNK_BYTES: usize = 1024;

/// Error type that wraps SPI and D/C pin errors.
#[derive(Debug)]
pub enum BusError<SpiE, DcE> {
    Spi(SpiE),
    Dc(DcE),
}

impl<SpiE: fmt::Debug, DcE: fmt::Debug> fmt::Display for BusError<SpiE, DcE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "spi transfer failed: {:?}", e),
            Self::Dc(e) => write!(f, "d/c line failed: {:?}", e),
        }
    }
}

/// Command/data framing on top of a synchronous bus.
///
/// Implementors only provide the two raw writes; the payload helpers are
/// built on them and are what the controller uses.
pub trait BusTransport {
    type Error: fmt::Debug;

    /// Send one command byte with the mode line in command position.
    fn write_command(&mut self, cmd: u8) -> Result<(), Self::Error>;

    /// Send parameter or pixel bytes with the mode line in data position.
    fn write_data(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    fn write_data_byte(&mut self, data: u8) -> Result<(), Self::Error> {
        self.write_data(&[data])
    }

    /// One 16-bit word, most significant byte first.
    fn write_data_word(&mut self, data: u16) -> Result<(), Self::Error> {
        self.write_data(&data.to_be_bytes())
    }

    /// Start/end address pair as used by CASET and RASET.
    fn write_address(&mut self, start: u16, end: u16) -> Result<(), Self::Error> {
        let [s_hi, s_lo] = start.to_be_bytes();
        let [e_hi, e_lo] = end.to_be_bytes();
        self.write_data(&[s_hi, s_lo, e_hi, e_lo])
    }

    /// Stream `count` copies of one RGB565 colour.
    fn write_color(&mut self, color: u16, count: u32) -> Result<(), Self::Error> {
        let mut chunk = [0u8; CHUNK_BYTES];
        let be = color.to_be_bytes();
        for px in chunk.chunks_exact_mut(2) {
            px.copy_from_slice(&be);
        }

        let mut remaining = count as usize * 2;
        while remaining > 0 {
            let take = remaining.min(CHUNK_BYTES);
            self.write_data(&chunk[..take])?;
            remaining -= take;
        }
        Ok(())
    }

    /// Stream a sequence of RGB565 colours, big-endian on the wire.
    fn write_colors<I>(&mut self, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = u16>,
    {
        let mut chunk = [0u8; CHUNK_BYTES];
        let mut filled = 0usize;
        for color in colors {
            if filled == CHUNK_BYTES {
                self.write_data(&chunk)?;
                filled = 0;
            }
            chunk[filled..filled + 2].copy_from_slice(&color.to_be_bytes());
            filled += 2;
        }
        if filled > 0 {
            self.write_data(&chunk[..filled])?;
        }
        Ok(())
    }

    /// Stream pixels that are already big-endian RGB565 bytes.
    fn write_pixel_bytes(&mut self, pixels: &[u8]) -> Result<(), Self::Error> {
        for chunk in pixels.chunks(CHUNK_BYTES) {
            self.write_data(chunk)?;
        }
        Ok(())
    }
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    type Error = T::Error;

    fn write_command(&mut self, cmd: u8) -> Result<(), Self::Error> {
        (**self).write_command(cmd)
    }

    fn write_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_data(data)
    }
}

/// SPI transport: chip select is owned by the `SpiDevice`, D/C is ours.
pub struct SpiBus<SPI, DC> {
    spi: SPI,
    dc: DC,
}

impl<SPI, DC> SpiBus<SPI, DC>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    pub fn new(spi: SPI, dc: DC) -> Self {
        Self { spi, dc }
    }

    /// Give back the SPI device and D/C pin.
    pub fn release(self) -> (SPI, DC) {
        (self.spi, self.dc)
    }
}

impl<SPI, DC> BusTransport for SpiBus<SPI, DC>
where
    SPI: SpiDevice<u8>,
    DC: OutputPin,
{
    type Error = BusError<SPI::Error, DC::Error>;

    fn write_command(&mut self, cmd: u8) -> Result<(), Self::Error> {
        self.dc.set_low().map_err(BusError::Dc)?;
        self.spi.write(&[cmd]).map_err(|e| {
            log::error!("spi write failed for command 0x{:02X}: {:?}", cmd, e);
            BusError::Spi(e)
        })
    }

    fn write_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        if data.is_empty() {
            return Ok(());
        }
        self.dc.set_high().map_err(BusError::Dc)?;
        self.spi.write(data).map_err(BusError::Spi)
    }
}
