// Board pin mapping for the ESP32-S3 + 3.5" ST7796S module.
// Selected with the "esp32s3-st7796s" feature.
//! The following wiring is assumed:
//! - LCD SCK  => GPIO10
//! - LCD MOSI => GPIO11 (no MISO, the panel is write-only here)
//! - LCD CS   => GPIO9
//! - LCD D/C  => GPIO8
//! - LCD RST  => GPIO14
//! - LCD BL   => GPIO2 (high = on)
//! - GND => GND
//! - 3.3V => VCC

use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::peripherals::{Peripherals, DMA_CH0, GPIO10, GPIO11, SPI2, TIMG0};

/// Everything the display setup consumes.
pub struct DisplayPins<'a> {
    pub spi2: SPI2<'a>,
    pub sck: GPIO10<'a>,
    pub mosi: GPIO11<'a>,
    pub cs: Output<'a>,
    pub dc: Output<'a>,
    pub rst: Output<'a>,
    pub bl: Output<'a>,
    pub dma_ch0: DMA_CH0<'a>,
}

pub struct BoardPins<'a> {
    pub display_pins: DisplayPins<'a>,
    // Watchdog lives in timer group 0.
    pub timg0: TIMG0<'a>,
}

pub fn init_board_pins<'a>(p: Peripherals) -> BoardPins<'a> {
    // CS idles high, D/C starts in command position, RST released,
    // backlight off until the panel is configured.
    let cs = Output::new(p.GPIO9, Level::High, OutputConfig::default());
    let dc = Output::new(p.GPIO8, Level::Low, OutputConfig::default());
    let rst = Output::new(p.GPIO14, Level::High, OutputConfig::default());
    let bl = Output::new(p.GPIO2, Level::Low, OutputConfig::default());

    BoardPins {
        display_pins: DisplayPins {
            spi2: p.SPI2,
            sck: p.GPIO10,
            mosi: p.GPIO11,
            cs,
            dc,
            rst,
            bl,
            dma_ch0: p.DMA_CH0,
        },
        timg0: p.TIMG0,
    }
}
