//! Display setup for the ESP32-S3 board.
//
// - SPI2 at 40 MHz, mode 0, MOSI only, with DMA.
// - CS is handled by `ExclusiveDevice`, D/C by `SpiBus`.
// - The panel is reset and configured before this returns.

use core::convert::Infallible;
use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal_bus::spi::{DeviceError, ExclusiveDevice, NoDelay};
use esp_hal::{
    dma::{DmaBufError, DmaRxBuf, DmaTxBuf},
    dma_buffers,
    gpio::Output,
    spi::{
        master::{Config, ConfigError, Spi, SpiDmaBus},
        Mode,
    },
    time::Rate,
    Blocking,
};

use crate::bus::{BusError, SpiBus, CHUNK_BYTES};
use crate::st7796s::{PanelConfig, St7796s, St7796sError, ST7796S_320X480};
use crate::wiring::DisplayPins;

pub const PANEL: PanelConfig = ST7796S_320X480;
const SPI_FREQUENCY_HZ: u32 = 40_000_000;

pub type SpiDev<'a> = ExclusiveDevice<SpiDmaBus<'a, Blocking>, Output<'a>, NoDelay>;
pub type DisplayType<'a> = St7796s<SpiBus<SpiDev<'a>, Output<'a>>, Output<'a>>;
pub type PanelError =
    St7796sError<BusError<DeviceError<esp_hal::spi::Error, Infallible>, Infallible>, Infallible>;

#[derive(Debug)]
pub enum SetupError {
    Spi(ConfigError),
    DmaBuffer(DmaBufError),
    Panel(PanelError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "spi config rejected: {:?}", e),
            Self::DmaBuffer(e) => write!(f, "dma buffer: {:?}", e),
            Self::Panel(e) => write!(f, "panel init: {}", e),
        }
    }
}

pub fn setup_display<'a>(
    display_pins: DisplayPins<'a>,
    delay: &mut impl DelayNs,
) -> Result<DisplayType<'a>, SetupError> {
    let DisplayPins {
        spi2,
        sck,
        mosi,
        cs,
        dc,
        rst,
        bl,
        dma_ch0,
    } = display_pins;

    let spi = Spi::new(
        spi2,
        Config::default()
            .with_frequency(Rate::from_hz(SPI_FREQUENCY_HZ))
            .with_mode(Mode::_0),
    )
    .map_err(SetupError::Spi)?
    .with_sck(sck)
    .with_mosi(mosi)
    .with_dma(dma_ch0);

    // TX sized for one bulk chunk; nothing is ever read back.
    let (rx_buf, rx_desc, tx_buf, tx_desc) = dma_buffers!(32, CHUNK_BYTES);
    let rx = DmaRxBuf::new(rx_desc, rx_buf).map_err(SetupError::DmaBuffer)?;
    let tx = DmaTxBuf::new(tx_desc, tx_buf).map_err(SetupError::DmaBuffer)?;

    let spi_bus: SpiDmaBus<'_, Blocking> = spi.with_buffers(rx, tx);
    let spi_dev = ExclusiveDevice::new(spi_bus, cs, NoDelay).unwrap_or_else(|e| match e {});

    let mut display = St7796s::new(SpiBus::new(spi_dev, dc), PANEL, Some(rst), Some(bl));
    display.init(delay).map_err(SetupError::Panel)?;
    log::info!("ST7796S ready: {}x{}", display.width(), display.height());
    Ok(display)
}
