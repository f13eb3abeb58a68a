// ST7796S panel driver (4-wire SPI, D/C line, optional RST and backlight).
// Works with esp-hal (no_std) and embedded-graphics.
//
// Protocol:
//   Command byte with D/C low, parameter bytes with D/C high.
//   Pixel writes: CASET (0x2A) and RASET (0x2B) select a window in panel
//   coordinates, RAMWR (0x2C) opens the stream, and exactly
//   (x2-x1+1)*(y2-y1+1) RGB565 words must follow. Streaming any other
//   count leaves the controller's write pointer out of step until the next
//   full window set.
// Geometry: 320 x 480 portrait by default; logical coordinates are shifted
// by the panel offsets before they reach the controller.

use core::fmt;

use embedded_graphics::{
    pixelcolor::Rgb565,
    prelude::*,
    primitives::Rectangle,
};
use embedded_hal::{delay::DelayNs, digital::OutputPin};

use crate::bus::BusTransport;
use crate::rgb565ani::BlitTarget;

pub const ST7796S_WIDTH: u16 = 320;
pub const ST7796S_HEIGHT: u16 = 480;

pub const SWRESET: u8 = 0x01;
pub const SLPIN: u8 = 0x10;
pub const SLPOUT: u8 = 0x11;
pub const NORON: u8 = 0x13;
pub const INVOFF: u8 = 0x20;
pub const INVON: u8 = 0x21;
pub const DISPOFF: u8 = 0x28;
pub const DISPON: u8 = 0x29;
pub const CASET: u8 = 0x2A;
pub const RASET: u8 = 0x2B;
pub const RAMWR: u8 = 0x2C;
pub const MADCTL: u8 = 0x36;
pub const COLMOD: u8 = 0x3A;
pub const PORCTRL: u8 = 0xB2;
pub const VCOMS: u8 = 0xBB;
pub const LCMCTRL: u8 = 0xC0;
pub const VDVVRHEN: u8 = 0xC2;
pub const VRHS: u8 = 0xC3;
pub const VDVS: u8 = 0xC4;
pub const FRCTRL2: u8 = 0xC6;
pub const PWCTRL1: u8 = 0xD0;
pub const PGAMCTRL: u8 = 0xE0;
pub const NGAMCTRL: u8 = 0xE1;

/// Hardware reset: RESX low for at least 10 ms, then wait for the reset to finish.
const RESET_LOW_MS: u32 = 20;
const RESET_SETTLE_MS: u32 = 120;
const SLEEP_SETTLE_MS: u32 = 120;

/// One entry of a panel bring-up table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitStep {
    pub cmd: u8,
    pub data: &'static [u8],
    pub delay_ms: u32,
}

const fn step(cmd: u8, data: &'static [u8], delay_ms: u32) -> InitStep {
    InitStep { cmd, data, delay_ms }
}

/// Panel tuning for this module. Gamma, porch, VCOM and power values are
/// matched to the glass; changing any byte changes what the panel shows.
pub const INIT_SEQUENCE: &[InitStep] = &[
    step(SWRESET, &[], 150),
    step(SLPOUT, &[], 120),
    step(MADCTL, &[0x48], 10),
    step(COLMOD, &[0x55], 10), // 16 bpp, RGB565
    step(PORCTRL, &[0x0C, 0x0C, 0x00, 0x33, 0x33], 10),
    step(VCOMS, &[0x35], 10),
    step(LCMCTRL, &[0x2C], 10),
    step(VDVVRHEN, &[0x01], 10),
    step(VRHS, &[0x12], 10),
    step(VDVS, &[0x20], 10),
    step(FRCTRL2, &[0x0F], 10), // 60 Hz
    step(PWCTRL1, &[0xA4, 0xA1], 10),
    step(
        PGAMCTRL,
        &[0xD0, 0x08, 0x11, 0x08, 0x0C, 0x15, 0x39, 0x33, 0x50, 0x36, 0x13, 0x14, 0x29, 0x2D],
        10,
    ),
    step(
        NGAMCTRL,
        &[0xD0, 0x08, 0x10, 0x08, 0x06, 0x06, 0x39, 0x44, 0x51, 0x0B, 0x16, 0x14, 0x2F, 0x31],
        10,
    ),
    step(INVON, &[], 10),
    step(NORON, &[], 10),
    step(DISPON, &[], 120),
];

/// Geometry of the visible area and where it sits in controller RAM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub width: u16,
    pub height: u16,
    pub offset_x: u16,
    pub offset_y: u16,
}

impl PanelConfig {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height, offset_x: 0, offset_y: 0 }
    }

    pub const fn with_offset(self, offset_x: u16, offset_y: u16) -> Self {
        Self { offset_x, offset_y, ..self }
    }
}

/// The 3.5" 320x480 module, no RAM offset.
pub const ST7796S_320X480: PanelConfig = PanelConfig::new(ST7796S_WIDTH, ST7796S_HEIGHT);

impl Default for PanelConfig {
    fn default() -> Self {
        ST7796S_320X480
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelState {
    Uninitialized,
    Resetting,
    Configuring,
    Ready,
    SleepingOrOff,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// Text attributes kept for a glyph renderer; nothing here draws text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FontState {
    pub direction: Direction,
    pub fill: Option<Rgb565>,
    pub underline: Option<Rgb565>,
}

/// Error type that wraps bus and GPIO errors.
#[derive(Debug)]
pub enum St7796sError<BusE, PinE> {
    Bus(BusE),
    Pin(PinE),
    /// Pixel buffer length does not match the requested rectangle.
    BufferSize { expected: usize, actual: usize },
}

impl<BusE: fmt::Debug, PinE: fmt::Debug> fmt::Display for St7796sError<BusE, PinE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus fault: {:?}", e),
            Self::Pin(e) => write!(f, "gpio fault: {:?}", e),
            Self::BufferSize { expected, actual } => {
                write!(f, "pixel buffer is {} bytes, window needs {}", actual, expected)
            }
        }
    }
}

/// Device context for one panel. All drawing goes through `&mut self`, so
/// at most one bus transaction is ever in flight.
pub struct St7796s<BUS, PIN> {
    bus: BUS,
    rst: Option<PIN>,
    bl: Option<PIN>,
    w: u16,
    h: u16,
    x_off: u16,
    y_off: u16,
    state: PanelState,
    font: FontState,
}

pub type Result<T, BUS, PIN> =
    core::result::Result<T, St7796sError<<BUS as BusTransport>::Error, <PIN as embedded_hal::digital::ErrorType>::Error>>;

impl<BUS, PIN> St7796s<BUS, PIN>
where
    BUS: BusTransport,
    PIN: OutputPin,
{
    /// Wrap a bus. Nothing is sent until `init`.
    pub fn new(bus: BUS, config: PanelConfig, rst: Option<PIN>, bl: Option<PIN>) -> Self {
        Self {
            bus,
            rst,
            bl,
            w: config.width,
            h: config.height,
            x_off: config.offset_x,
            y_off: config.offset_y,
            state: PanelState::Uninitialized,
            font: FontState::default(),
        }
    }

    /// Reset and configure the panel, then turn it and the backlight on.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), BUS, PIN> {
        log::info!("Initializing ST7796S LCD ({}x{})", self.w, self.h);

        self.state = PanelState::Resetting;
        if let Some(rst) = self.rst.as_mut() {
            rst.set_low().map_err(St7796sError::Pin)?;
            delay.delay_ms(RESET_LOW_MS);
            rst.set_high().map_err(St7796sError::Pin)?;
            delay.delay_ms(RESET_SETTLE_MS);
        }

        self.state = PanelState::Configuring;
        self.run_sequence(INIT_SEQUENCE, delay)?;

        if let Some(bl) = self.bl.as_mut() {
            bl.set_high().map_err(St7796sError::Pin)?;
            log::info!("Backlight turned on");
        }

        self.state = PanelState::Ready;
        Ok(())
    }

    /// Send each step's command and payload, then wait its settle time.
    pub fn run_sequence(&mut self, steps: &[InitStep], delay: &mut impl DelayNs) -> Result<(), BUS, PIN> {
        for s in steps {
            log::debug!("cmd 0x{:02X} + {} bytes, settle {} ms", s.cmd, s.data.len(), s.delay_ms);
            self.cmd(s.cmd, s.data)?;
            if s.delay_ms > 0 {
                delay.delay_ms(s.delay_ms);
            }
        }
        Ok(())
    }

    // Panel width in pixels.
    #[inline]
    pub fn width(&self) -> u16 {
        self.w
    }

    // Panel height in pixels.
    #[inline]
    pub fn height(&self) -> u16 {
        self.h
    }

    pub fn size(&self) -> (u16, u16) {
        (self.w, self.h)
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn bus(&self) -> &BUS {
        &self.bus
    }

    /// Give back the bus and pins.
    pub fn release(self) -> (BUS, Option<PIN>, Option<PIN>) {
        (self.bus, self.rst, self.bl)
    }

    // ---- Pixel writes ----

    pub fn draw_pixel(&mut self, x: u16, y: u16, color: Rgb565) -> Result<(), BUS, PIN> {
        if x >= self.w || y >= self.h {
            return Ok(());
        }
        self.set_window(x, y, x, y)
            .and_then(|_| self.bus.write_data_word(color.into_storage()))
            .map_err(St7796sError::Bus)
    }

    /// One horizontal run of colours starting at (x, y). Runs that would
    /// leave the screen are dropped whole.
    pub fn draw_multi_pixels(&mut self, x: u16, y: u16, colors: &[Rgb565]) -> Result<(), BUS, PIN> {
        if colors.is_empty() || y >= self.h || x as usize + colors.len() > self.w as usize {
            return Ok(());
        }
        let x2 = x + (colors.len() as u16 - 1);
        self.set_window(x, y, x2, y)
            .and_then(|_| self.bus.write_colors(colors.iter().map(|c| c.into_storage())))
            .map_err(St7796sError::Bus)
    }

    /// Solid rectangle, corners inclusive. A start corner off screen draws
    /// nothing; an end corner off screen is pulled back to the last row/column.
    pub fn draw_filled_rect(
        &mut self,
        x1: u16,
        y1: u16,
        x2: u16,
        y2: u16,
        color: Rgb565,
    ) -> Result<(), BUS, PIN> {
        if x1 >= self.w || y1 >= self.h {
            return Ok(());
        }
        let x2 = x2.min(self.w - 1);
        let y2 = y2.min(self.h - 1);
        if x2 < x1 || y2 < y1 {
            return Ok(());
        }

        let count = (x2 - x1 + 1) as u32 * (y2 - y1 + 1) as u32;
        self.set_window(x1, y1, x2, y2)
            .and_then(|_| self.bus.write_color(color.into_storage(), count))
            .map_err(St7796sError::Bus)
    }

    pub fn fill_screen(&mut self, color: Rgb565) -> Result<(), BUS, PIN> {
        if self.w == 0 || self.h == 0 {
            return Ok(());
        }
        self.draw_filled_rect(0, 0, self.w - 1, self.h - 1, color)
    }

    /// Blit a `width` x `height` block of big-endian RGB565 bytes with its
    /// top-left at (x, y). The part hanging off the screen is clipped; only
    /// the visible rows and columns are streamed.
    pub fn draw_bitmap(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        pixels: &[u8],
    ) -> Result<(), BUS, PIN> {
        let expected = width as usize * height as usize * 2;
        if pixels.len() != expected {
            return Err(St7796sError::BufferSize { expected, actual: pixels.len() });
        }
        if width == 0 || height == 0 || x >= self.w || y >= self.h {
            return Ok(());
        }

        let vis_w = width.min(self.w - x);
        let vis_h = height.min(self.h - y);
        let stride = width as usize * 2;

        self.set_window(x, y, x + vis_w - 1, y + vis_h - 1)
            .and_then(|_| {
                if vis_w == width {
                    self.bus.write_pixel_bytes(&pixels[..stride * vis_h as usize])
                } else {
                    let row_bytes = vis_w as usize * 2;
                    pixels
                        .chunks_exact(stride)
                        .take(vis_h as usize)
                        .try_for_each(|row| self.bus.write_pixel_bytes(&row[..row_bytes]))
                }
            })
            .map_err(St7796sError::Bus)
    }

    // ---- Power and mode control ----

    pub fn display_off(&mut self) -> Result<(), BUS, PIN> {
        self.cmd(DISPOFF, &[])?;
        self.state = PanelState::SleepingOrOff;
        Ok(())
    }

    pub fn display_on(&mut self) -> Result<(), BUS, PIN> {
        self.cmd(DISPON, &[])?;
        self.state = PanelState::Ready;
        Ok(())
    }

    pub fn sleep_in(&mut self, delay: &mut impl DelayNs) -> Result<(), BUS, PIN> {
        self.cmd(SLPIN, &[])?;
        delay.delay_ms(SLEEP_SETTLE_MS);
        self.state = PanelState::SleepingOrOff;
        Ok(())
    }

    pub fn sleep_out(&mut self, delay: &mut impl DelayNs) -> Result<(), BUS, PIN> {
        self.cmd(SLPOUT, &[])?;
        delay.delay_ms(SLEEP_SETTLE_MS);
        self.state = PanelState::Ready;
        Ok(())
    }

    pub fn inversion_off(&mut self) -> Result<(), BUS, PIN> {
        log::info!("Disabling display inversion");
        self.cmd(INVOFF, &[])
    }

    pub fn inversion_on(&mut self) -> Result<(), BUS, PIN> {
        log::info!("Enabling display inversion");
        self.cmd(INVON, &[])
    }

    /// Backlight is a plain GPIO; without one wired this does nothing.
    pub fn backlight_off(&mut self) -> Result<(), BUS, PIN> {
        if let Some(bl) = self.bl.as_mut() {
            bl.set_low().map_err(St7796sError::Pin)?;
            log::info!("Backlight turned off");
        }
        Ok(())
    }

    pub fn backlight_on(&mut self) -> Result<(), BUS, PIN> {
        if let Some(bl) = self.bl.as_mut() {
            bl.set_high().map_err(St7796sError::Pin)?;
            log::info!("Backlight turned on");
        }
        Ok(())
    }

    // ---- Font state ----

    pub fn font(&self) -> FontState {
        self.font
    }

    pub fn set_font_direction(&mut self, direction: Direction) {
        self.font.direction = direction;
    }

    pub fn set_font_fill(&mut self, color: Rgb565) {
        self.font.fill = Some(color);
    }

    pub fn unset_font_fill(&mut self) {
        self.font.fill = None;
    }

    pub fn set_font_underline(&mut self, color: Rgb565) {
        self.font.underline = Some(color);
    }

    pub fn unset_font_underline(&mut self) {
        self.font.underline = None;
    }

    // ---- Low-level helpers ----

    // Column range, row range, then RAMWR. Coordinates are logical and
    // must already be on screen. RAM addresses pin at 0xFFFF.
    fn set_window(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) -> core::result::Result<(), BUS::Error> {
        let (xo, yo) = (self.x_off, self.y_off);
        self.bus.write_command(CASET)?;
        self.bus.write_address(x1.saturating_add(xo), x2.saturating_add(xo))?;
        self.bus.write_command(RASET)?;
        self.bus.write_address(y1.saturating_add(yo), y2.saturating_add(yo))?;
        self.bus.write_command(RAMWR)
    }

    fn cmd(&mut self, cmd: u8, data: &[u8]) -> Result<(), BUS, PIN> {
        self.bus.write_command(cmd).map_err(St7796sError::Bus)?;
        if !data.is_empty() {
            self.bus.write_data(data).map_err(St7796sError::Bus)?;
        }
        Ok(())
    }
}

impl<BUS, PIN> BlitTarget for St7796s<BUS, PIN>
where
    BUS: BusTransport,
    PIN: OutputPin,
{
    type Error = St7796sError<BUS::Error, PIN::Error>;

    fn draw_bitmap(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        pixels: &[u8],
    ) -> core::result::Result<(), Self::Error> {
        St7796s::draw_bitmap(self, x, y, width, height, pixels)
    }
}

// -------------------- embedded-graphics integration --------------------
impl<BUS, PIN> OriginDimensions for St7796s<BUS, PIN> {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl<BUS, PIN> DrawTarget for St7796s<BUS, PIN>
where
    BUS: BusTransport,
    PIN: OutputPin,
{
    type Color = Rgb565;
    type Error = St7796sError<BUS::Error, PIN::Error>;

    fn draw_iter<I>(&mut self, pixels: I) -> core::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Rgb565>>,
    {
        for Pixel(p, c) in pixels {
            if let (Ok(x), Ok(y)) = (u16::try_from(p.x), u16::try_from(p.y)) {
                self.draw_pixel(x, y, c)?;
            }
        }
        Ok(())
    }

    // Solid fills go out as one window instead of pixel by pixel.
    fn fill_solid(&mut self, area: &Rectangle, color: Rgb565) -> core::result::Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        match area.bottom_right() {
            Some(br) => self.draw_filled_rect(
                area.top_left.x as u16,
                area.top_left.y as u16,
                br.x as u16,
                br.y as u16,
                color,
            ),
            None => Ok(()),
        }
    }

    fn clear(&mut self, color: Rgb565) -> core::result::Result<(), Self::Error> {
        self.fill_screen(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_spy::{BusSpy, DelaySpy, PinSpy, Sent};
    use embedded_graphics::pixelcolor::raw::RawU16;

    type Panel = St7796s<BusSpy, PinSpy>;

    fn rgb(raw: u16) -> Rgb565 {
        Rgb565::from(RawU16::new(raw))
    }

    fn panel(w: u16, h: u16) -> (Panel, BusSpy) {
        let bus = BusSpy::new();
        let disp = St7796s::new(bus.clone(), PanelConfig::new(w, h), None, None);
        (disp, bus)
    }

    #[test]
    fn init_sends_table_bit_exact() {
        let bus = BusSpy::new();
        let rst = PinSpy::new();
        let bl = PinSpy::new();
        let mut delay = DelaySpy::new();
        let mut disp = St7796s::new(bus.clone(), PanelConfig::default(), Some(rst.clone()), Some(bl.clone()));
        assert_eq!(disp.state(), PanelState::Uninitialized);

        disp.init(&mut delay).unwrap();

        let mut expected = Vec::new();
        for s in INIT_SEQUENCE {
            expected.push(Sent::Cmd(s.cmd));
            if !s.data.is_empty() {
                expected.push(Sent::Data(s.data.to_vec()));
            }
        }
        assert_eq!(bus.sent(), expected);
        assert_eq!(
            bus.commands(),
            vec![0x01, 0x11, 0x36, 0x3A, 0xB2, 0xBB, 0xC0, 0xC2, 0xC3, 0xC4, 0xC6, 0xD0, 0xE0, 0xE1, 0x21, 0x13, 0x29]
        );
        assert_eq!(rst.levels(), vec![false, true]);
        assert_eq!(bl.levels(), vec![true]);
        assert_eq!(disp.state(), PanelState::Ready);

        let mut waits = vec![RESET_LOW_MS, RESET_SETTLE_MS];
        waits.extend(INIT_SEQUENCE.iter().map(|s| s.delay_ms));
        assert_eq!(delay.calls_ms(), waits);
        assert!(delay.calls_ms()[0] >= 10);
        assert_eq!(delay.total_ms(), 670);
    }

    #[test]
    fn init_without_pins_skips_hardware_reset() {
        let (mut disp, bus) = panel(320, 480);
        let mut delay = DelaySpy::new();
        disp.init(&mut delay).unwrap();
        assert_eq!(bus.commands()[0], SWRESET);
        assert_eq!(delay.calls_ms()[0], 150);
    }

    #[test]
    fn gamma_tables() {
        let pos = INIT_SEQUENCE.iter().find(|s| s.cmd == PGAMCTRL).unwrap();
        let neg = INIT_SEQUENCE.iter().find(|s| s.cmd == NGAMCTRL).unwrap();
        assert_eq!(pos.data.len(), 14);
        assert_eq!(neg.data.len(), 14);
        assert_eq!(pos.data[6], 0x39);
        assert_eq!(neg.data[13], 0x31);
    }

    #[test]
    fn pixel_applies_offsets() {
        let bus = BusSpy::new();
        let cfg = PanelConfig::new(240, 240).with_offset(40, 53);
        let mut disp: Panel = St7796s::new(bus.clone(), cfg, None, None);
        disp.draw_pixel(10, 20, rgb(0xF800)).unwrap();
        assert_eq!(
            bus.sent(),
            vec![
                Sent::Cmd(CASET),
                Sent::Data(vec![0, 50, 0, 50]),
                Sent::Cmd(RASET),
                Sent::Data(vec![0, 73, 0, 73]),
                Sent::Cmd(RAMWR),
                Sent::Data(vec![0xF8, 0x00]),
            ]
        );
    }

    #[test]
    fn huge_offsets_pin_the_address() {
        let bus = BusSpy::new();
        let cfg = PanelConfig::new(10, 10).with_offset(u16::MAX - 2, 1);
        let mut disp: Panel = St7796s::new(bus.clone(), cfg, None, None);
        disp.draw_filled_rect(1, 0, 5, 0, rgb(1)).unwrap();
        let sent = bus.sent();
        assert_eq!(sent[1], Sent::Data(vec![0xFF, 0xFE, 0xFF, 0xFF]));
        assert_eq!(sent[3], Sent::Data(vec![0, 1, 0, 1]));
    }

    #[test]
    fn zero_sized_panel_ignores_fills() {
        for (w, h) in [(4, 0), (0, 4), (0, 0)] {
            let (mut disp, bus) = panel(w, h);
            disp.fill_screen(rgb(0xFFFF)).unwrap();
            disp.draw_filled_rect(0, 0, 3, 3, rgb(1)).unwrap();
            assert!(bus.sent().is_empty(), "{}x{}", w, h);
        }
    }

    #[test]
    fn pixel_off_screen_is_silent() {
        let (mut disp, bus) = panel(10, 10);
        disp.draw_pixel(10, 0, rgb(1)).unwrap();
        disp.draw_pixel(0, 10, rgb(1)).unwrap();
        assert!(bus.sent().is_empty());
    }

    #[test]
    fn multi_pixels_window_is_one_row() {
        let (mut disp, bus) = panel(10, 10);
        let colors = [rgb(1), rgb(2), rgb(3)];
        disp.draw_multi_pixels(7, 4, &colors).unwrap();
        let w = bus.windows();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].cols, (7, 9));
        assert_eq!(w[0].rows, (4, 4));
        assert_eq!(w[0].pixels, vec![1, 2, 3]);

        bus.clear();
        disp.draw_multi_pixels(8, 4, &colors).unwrap();
        disp.draw_multi_pixels(0, 10, &colors).unwrap();
        disp.draw_multi_pixels(0, 0, &[]).unwrap();
        assert!(bus.sent().is_empty());
    }

    #[test]
    fn filled_rect_clamps_end_corner() {
        let (mut disp, bus) = panel(20, 10);
        disp.draw_filled_rect(15, 5, 100, 100, rgb(0x1234)).unwrap();
        let w = bus.windows();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].cols, (15, 19));
        assert_eq!(w[0].rows, (5, 9));
        assert_eq!(w[0].pixels.len(), w[0].area());
        assert!(w[0].pixels.iter().all(|&p| p == 0x1234));
    }

    #[test]
    fn filled_rect_start_off_screen_is_silent() {
        let (mut disp, bus) = panel(20, 10);
        disp.draw_filled_rect(20, 0, 25, 5, rgb(1)).unwrap();
        disp.draw_filled_rect(0, 10, 5, 15, rgb(1)).unwrap();
        disp.draw_filled_rect(5, 5, 2, 8, rgb(1)).unwrap();
        assert!(bus.sent().is_empty());
    }

    #[test]
    fn fill_screen_covers_everything() {
        let (mut disp, bus) = panel(40, 30);
        disp.fill_screen(rgb(0xFFFF)).unwrap();
        let w = bus.windows();
        assert_eq!(w[0].cols, (0, 39));
        assert_eq!(w[0].rows, (0, 29));
        assert_eq!(w[0].pixels.len(), 1200);
    }

    #[test]
    fn bitmap_streams_bytes_as_given() {
        let (mut disp, bus) = panel(4, 4);
        let data: Vec<u8> = (0..16u16).flat_map(|p| p.to_be_bytes()).collect();
        disp.draw_bitmap(0, 0, 4, 4, &data).unwrap();
        let w = bus.windows();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].pixels, (0..16u16).collect::<Vec<_>>());
    }

    #[test]
    fn bitmap_is_clipped_to_screen() {
        let (mut disp, bus) = panel(4, 4);
        // 3x3 block at (2, 3): two columns and one row are visible.
        let data: Vec<u8> = (0..9u16).flat_map(|p| p.to_be_bytes()).collect();
        disp.draw_bitmap(2, 3, 3, 3, &data).unwrap();
        let w = bus.windows();
        assert_eq!(w[0].cols, (2, 3));
        assert_eq!(w[0].rows, (3, 3));
        assert_eq!(w[0].pixels, vec![0, 1]);
        assert_eq!(w[0].pixels.len(), w[0].area());
    }

    #[test]
    fn bitmap_rejects_wrong_length() {
        let (mut disp, bus) = panel(4, 4);
        let err = disp.draw_bitmap(0, 0, 2, 2, &[0u8; 7]).unwrap_err();
        assert!(matches!(err, St7796sError::BufferSize { expected: 8, actual: 7 }));
        assert!(bus.sent().is_empty());
    }

    #[test]
    fn toggles_and_state() {
        let (mut disp, bus) = panel(4, 4);
        let mut delay = DelaySpy::new();
        disp.display_off().unwrap();
        assert_eq!(disp.state(), PanelState::SleepingOrOff);
        disp.display_on().unwrap();
        assert_eq!(disp.state(), PanelState::Ready);
        disp.inversion_off().unwrap();
        disp.inversion_on().unwrap();
        disp.sleep_in(&mut delay).unwrap();
        disp.sleep_out(&mut delay).unwrap();
        // no backlight pin: nothing on the bus
        disp.backlight_off().unwrap();
        disp.backlight_on().unwrap();
        assert_eq!(bus.commands(), vec![DISPOFF, DISPON, INVOFF, INVON, SLPIN, SLPOUT]);
    }

    #[test]
    fn backlight_drives_pin() {
        let bl = PinSpy::new();
        let bus = BusSpy::new();
        let mut disp = St7796s::new(bus.clone(), PanelConfig::new(4, 4), None, Some(bl.clone()));
        disp.backlight_off().unwrap();
        disp.backlight_on().unwrap();
        assert_eq!(bl.levels(), vec![false, true]);
        assert!(bus.sent().is_empty());
    }

    #[test]
    fn font_state_setters() {
        let (mut disp, _bus) = panel(4, 4);
        disp.set_font_direction(Direction::Deg90);
        disp.set_font_fill(rgb(0x001F));
        disp.set_font_underline(rgb(0xF800));
        assert_eq!(
            disp.font(),
            FontState { direction: Direction::Deg90, fill: Some(rgb(0x001F)), underline: Some(rgb(0xF800)) }
        );
        disp.unset_font_fill();
        disp.unset_font_underline();
        assert_eq!(disp.font().fill, None);
        assert_eq!(disp.font().underline, None);
    }

    #[test]
    fn bus_fault_surfaces_as_error() {
        let (mut disp, bus) = panel(4, 4);
        bus.fail_after(2);
        let err = disp.fill_screen(rgb(0)).unwrap_err();
        assert!(matches!(err, St7796sError::Bus(_)));
    }

    #[test]
    fn draw_target_fill_solid_is_one_window() {
        let (mut disp, bus) = panel(10, 10);
        Rectangle::new(Point::new(-2, 3), Size::new(5, 20))
            .into_styled(embedded_graphics::primitives::PrimitiveStyle::with_fill(rgb(7)))
            .draw(&mut disp)
            .unwrap();
        let w = bus.windows();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].cols, (0, 2));
        assert_eq!(w[0].rows, (3, 9));
        assert_eq!(w[0].pixels.len(), 21);
    }

    #[test]
    fn draw_target_skips_negative_pixels() {
        let (mut disp, bus) = panel(10, 10);
        disp.draw_iter([Pixel(Point::new(-1, 0), rgb(1)), Pixel(Point::new(1, 1), rgb(2))])
            .unwrap();
        let w = bus.windows();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].cols, (1, 1));
    }
}
