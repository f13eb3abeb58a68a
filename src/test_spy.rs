//! Recording test doubles for the bus, pins and delay.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::{
    delay::DelayNs,
    digital::{self, OutputPin},
    spi::{self, Operation, SpiDevice},
};

use crate::bus::BusTransport;
use crate::st7796s::{CASET, RAMWR, RASET};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Cmd(u8),
    Data(Vec<u8>),
}

impl Sent {
    pub fn data(&self) -> &[u8] {
        match self {
            Sent::Data(d) => d,
            Sent::Cmd(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpyFault;

/// One CASET/RASET/RAMWR sequence and the pixels streamed after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub cols: (u16, u16),
    pub rows: (u16, u16),
    pub pixels: Vec<u16>,
}

impl Window {
    pub fn area(&self) -> usize {
        (self.cols.1 - self.cols.0 + 1) as usize * (self.rows.1 - self.rows.0 + 1) as usize
    }
}

/// Bus that records everything and can be told to fail.
#[derive(Clone, Default)]
pub struct BusSpy {
    log: Rc<RefCell<Vec<Sent>>>,
    fail_after: Rc<Cell<Option<usize>>>,
}

impl BusSpy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more writes through, then fail every one after that.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.set(Some(n));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn commands(&self) -> Vec<u8> {
        self.log
            .borrow()
            .iter()
            .filter_map(|s| match s {
                Sent::Cmd(c) => Some(*c),
                Sent::Data(_) => None,
            })
            .collect()
    }

    /// Decode the recorded traffic into addressing windows.
    pub fn windows(&self) -> Vec<Window> {
        let mut out = Vec::new();
        let mut cols = None;
        let mut rows = None;
        let mut last_cmd = None;
        let mut current: Option<Window> = None;

        for s in self.log.borrow().iter() {
            match s {
                Sent::Cmd(c) => {
                    if let Some(w) = current.take() {
                        out.push(w);
                    }
                    if *c == RAMWR {
                        current = Some(Window {
                            cols: cols.expect("RAMWR without CASET"),
                            rows: rows.expect("RAMWR without RASET"),
                            pixels: Vec::new(),
                        });
                    }
                    last_cmd = Some(*c);
                }
                Sent::Data(d) => match last_cmd {
                    Some(CASET) => cols = Some(pair(d)),
                    Some(RASET) => rows = Some(pair(d)),
                    Some(RAMWR) => {
                        if let Some(w) = current.as_mut() {
                            w.pixels
                                .extend(d.chunks_exact(2).map(|p| u16::from_be_bytes([p[0], p[1]])));
                        }
                    }
                    _ => {}
                },
            }
        }
        if let Some(w) = current.take() {
            out.push(w);
        }
        out
    }

    fn record(&self, s: Sent) -> Result<(), SpyFault> {
        if let Some(n) = self.fail_after.get() {
            if n == 0 {
                return Err(SpyFault);
            }
            self.fail_after.set(Some(n - 1));
        }
        self.log.borrow_mut().push(s);
        Ok(())
    }
}

fn pair(d: &[u8]) -> (u16, u16) {
    assert_eq!(d.len(), 4, "address payload must be 4 bytes");
    (u16::from_be_bytes([d[0], d[1]]), u16::from_be_bytes([d[2], d[3]]))
}

impl BusTransport for BusSpy {
    type Error = SpyFault;

    fn write_command(&mut self, cmd: u8) -> Result<(), SpyFault> {
        self.record(Sent::Cmd(cmd))
    }

    fn write_data(&mut self, data: &[u8]) -> Result<(), SpyFault> {
        self.record(Sent::Data(data.to_vec()))
    }
}

/// Output pin that remembers every level it was driven to.
#[derive(Clone, Default)]
pub struct PinSpy {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl PinSpy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl digital::ErrorType for PinSpy {
    type Error = Infallible;
}

impl OutputPin for PinSpy {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

/// Delay that only adds up how long it was asked to wait.
#[derive(Clone, Default)]
pub struct DelaySpy {
    waited_ns: Rc<Cell<u64>>,
    calls: Rc<RefCell<Vec<u32>>>,
}

impl DelaySpy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> u64 {
        self.waited_ns.get() / 1_000_000
    }

    pub fn calls_ms(&self) -> Vec<u32> {
        self.calls.borrow().clone()
    }
}

impl DelayNs for DelaySpy {
    fn delay_ns(&mut self, ns: u32) {
        self.waited_ns.set(self.waited_ns.get() + ns as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls.borrow_mut().push(ms);
        self.waited_ns.set(self.waited_ns.get() + ms as u64 * 1_000_000);
    }
}

/// Raw wire activity seen by `WireSpy`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Level(bool),
    Write(Vec<u8>),
}

/// Shared log for an SPI device and a D/C pin, to check their interleaving.
#[derive(Clone, Default)]
pub struct WireSpy {
    log: Rc<RefCell<Vec<Line>>>,
}

impl WireSpy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spi(&self) -> WireSpi {
        WireSpi { log: self.log.clone() }
    }

    pub fn pin(&self) -> WirePin {
        WirePin { log: self.log.clone() }
    }

    pub fn lines(&self) -> Vec<Line> {
        self.log.borrow().clone()
    }
}

pub struct WireSpi {
    log: Rc<RefCell<Vec<Line>>>,
}

impl spi::ErrorType for WireSpi {
    type Error = Infallible;
}

impl SpiDevice<u8> for WireSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        for op in operations.iter() {
            if let Operation::Write(buf) = op {
                self.log.borrow_mut().push(Line::Write(buf.to_vec()));
            }
        }
        Ok(())
    }
}

pub struct WirePin {
    log: Rc<RefCell<Vec<Line>>>,
}

impl digital::ErrorType for WirePin {
    type Error = Infallible;
}

impl OutputPin for WirePin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push(Line::Level(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push(Line::Level(true));
        Ok(())
    }
}
