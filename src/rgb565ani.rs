//! RGB565ANI player.
//!
//! Container layout (little-endian header, big-endian pixels):
//!
//! ```text
//! "RGB565ANI"            9 bytes magic
//! frame_count            u32
//! width, height          u16, u16
//! { duration_ms  u32
//!   pixels       width * height * 2 bytes, row-major RGB565 }  * frame_count
//! ```
//!
//! Each frame is read whole into one of two bulk buffers, then copied out in
//! bands of at most `band_lines` rows through a transfer-safe buffer to the
//! display. The liveness hook is fed after every band so a long frame never
//! starves the watchdog.

use core::fmt;

use embedded_io::{Error as _, ErrorKind, Read};

use crate::memory::{MemoryKind, RegionAllocator};
use crate::store::AnimationStore;

pub const MAGIC: &[u8; 9] = b"RGB565ANI";
pub const HEADER_LEN: usize = 17;
pub const DEFAULT_BAND_LINES: u16 = 160;

/// Anything the player can push a block of big-endian RGB565 rows to.
pub trait BlitTarget {
    type Error: fmt::Debug;

    fn draw_bitmap(&mut self, x: u16, y: u16, width: u16, height: u16, pixels: &[u8])
        -> Result<(), Self::Error>;
}

/// Keeps an external supervisor (task watchdog) from firing during playback.
pub trait Liveness {
    fn feed(&mut self);
}

impl<F: FnMut()> Liveness for F {
    fn feed(&mut self) {
        self()
    }
}

/// Monotonic milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<F: Fn() -> u64> Clock for F {
    fn now_ms(&self) -> u64 {
        self()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub frame_count: u32,
    pub width: u16,
    pub height: u16,
}

impl Header {
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, FormatError> {
        let mut magic = [0u8; 9];
        magic.copy_from_slice(&bytes[..9]);
        if &magic != MAGIC {
            return Err(FormatError::BadMagic(magic));
        }
        let header = Self {
            frame_count: u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]),
            width: u16::from_le_bytes([bytes[13], bytes[14]]),
            height: u16::from_le_bytes([bytes[15], bytes[16]]),
        };
        if header.width == 0 || header.height == 0 {
            return Err(FormatError::EmptyGeometry);
        }
        if header.frame_bytes().is_none() {
            return Err(FormatError::FrameTooLarge { width: header.width, height: header.height });
        }
        Ok(header)
    }

    /// Size of one frame's pixel payload, or `None` past 4 GiB (which also
    /// covers every 32-bit `usize`).
    pub fn frame_bytes(&self) -> Option<usize> {
        let bytes = (self.width as u32).checked_mul(self.height as u32)?.checked_mul(2)?;
        usize::try_from(bytes).ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatError {
    BadMagic([u8; 9]),
    TruncatedHeader,
    EmptyGeometry,
    /// One frame would not fit in the address space.
    FrameTooLarge { width: u16, height: u16 },
    /// `frame` is the zero-based index of the frame that came up short.
    TruncatedFrame { frame: u32, expected: usize, got: usize },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic(m) => write!(f, "invalid magic number {:02X?}", m),
            Self::TruncatedHeader => f.write_str("file ends inside the header"),
            Self::EmptyGeometry => f.write_str("frame width or height is zero"),
            Self::FrameTooLarge { width, height } => {
                write!(f, "{}x{} frame is too large to buffer", width, height)
            }
            Self::TruncatedFrame { frame, expected, got } => write!(
                f,
                "frame {} is short: expected {} bytes, got {}",
                frame, expected, got
            ),
        }
    }
}

#[derive(Debug)]
pub enum PlayError<DisplayE, OpenE> {
    Open(OpenE),
    Io(ErrorKind),
    Format(FormatError),
    ResourceExhaustion { kind: MemoryKind, bytes: usize },
    Display(DisplayE),
}

impl<DisplayE, OpenE> From<FormatError> for PlayError<DisplayE, OpenE> {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl<DisplayE: fmt::Debug, OpenE: fmt::Debug> fmt::Display for PlayError<DisplayE, OpenE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(e) => write!(f, "failed to open animation: {:?}", e),
            Self::Io(kind) => write!(f, "read failed: {:?}", kind),
            Self::Format(e) => write!(f, "bad animation file: {}", e),
            Self::ResourceExhaustion { kind, bytes } => {
                write!(f, "failed to allocate {} bytes of {} memory", bytes, kind)
            }
            Self::Display(e) => write!(f, "display fault: {:?}", e),
        }
    }
}

type Fault<D, S> = PlayError<<D as BlitTarget>::Error, <S as AnimationStore>::Error>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub frames: u32,
    pub elapsed_ms: u64,
    /// Sum of the per-frame `duration_ms` fields that were read.
    pub declared_ms: u64,
}

impl PlaybackStats {
    pub fn fps(&self) -> f32 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.frames as f32 * 1000.0 / self.elapsed_ms as f32
    }
}

/// Swap each 16-bit pair in place (little-endian <-> big-endian RGB565).
pub fn swap_bytes(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(2) {
        px.swap(0, 1);
    }
}

// Read until `buf` is full or the reader hits end of file.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, ErrorKind> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.kind()),
        }
    }
    Ok(filled)
}

pub struct Player<A, L, C> {
    alloc: A,
    liveness: L,
    clock: C,
    band_lines: u16,
    byte_swap: bool,
}

impl<A, L, C> Player<A, L, C>
where
    A: RegionAllocator,
    L: Liveness,
    C: Clock,
{
    pub fn new(alloc: A, liveness: L, clock: C) -> Self {
        Self {
            alloc,
            liveness,
            clock,
            band_lines: DEFAULT_BAND_LINES,
            byte_swap: false,
        }
    }

    /// Rows per display transfer; also sizes the transfer-safe buffer.
    pub fn with_band_lines(mut self, lines: u16) -> Self {
        self.band_lines = lines.max(1);
        self
    }

    /// Swap every pixel's bytes before display, for files written little-endian.
    pub fn with_byte_swap(mut self, swap: bool) -> Self {
        self.byte_swap = swap;
        self
    }

    pub fn release(self) -> (A, L, C) {
        (self.alloc, self.liveness, self.clock)
    }

    /// Play `path` from `store` on `display`, top-left aligned.
    ///
    /// A header whose geometry differs from `expected_width` x
    /// `expected_height` is logged and played anyway. Playback stops after
    /// `frame_count` frames or at a clean end of file, whichever is first.
    /// All buffers are released before this returns, on every path.
    pub fn play<D, S>(
        &mut self,
        display: &mut D,
        store: &mut S,
        path: &str,
        expected_width: u16,
        expected_height: u16,
    ) -> Result<PlaybackStats, PlayError<D::Error, S::Error>>
    where
        D: BlitTarget,
        S: AnimationStore,
    {
        let started = self.clock.now_ms();

        let mut file = store.open(path).map_err(|e| {
            log::error!("Failed to open file {}: {:?}", path, e);
            Fault::<D, S>::Open(e)
        })?;

        let mut raw = [0u8; HEADER_LEN];
        let (magic, rest) = raw.split_at_mut(MAGIC.len());
        if read_full(&mut file, magic).map_err(Fault::<D, S>::Io)? < magic.len() {
            log::error!("Failed to read magic number");
            return Err(FormatError::TruncatedHeader.into());
        }
        if magic != MAGIC {
            log::error!("Invalid magic number");
            let mut found = [0u8; 9];
            found.copy_from_slice(magic);
            return Err(FormatError::BadMagic(found).into());
        }
        if read_full(&mut file, rest).map_err(Fault::<D, S>::Io)? < rest.len() {
            log::error!("File ends inside the header");
            return Err(FormatError::TruncatedHeader.into());
        }
        let header = Header::parse(&raw)?;

        log::info!(
            "Frame count: {}, width: {}, height: {}",
            header.frame_count,
            header.width,
            header.height
        );
        if header.width != expected_width || header.height != expected_height {
            log::warn!(
                "Frame dimensions ({}x{}) don't match screen ({}x{})",
                header.width,
                header.height,
                expected_width,
                expected_height
            );
        }

        let width = header.width;
        let height = header.height;
        let stride = width as usize * 2;
        // Every band offset below stays inside one frame.
        let frame_bytes = header
            .frame_bytes()
            .ok_or(FormatError::FrameTooLarge { width, height })?;
        let band = self.band_lines.min(height);

        let mut current = self.take::<D, S>(MemoryKind::Bulk, frame_bytes)?;
        let mut next = self.take::<D, S>(MemoryKind::Bulk, frame_bytes)?;
        let mut transfer = self.take::<D, S>(MemoryKind::TransferSafe, stride * band as usize)?;

        let mut stats = PlaybackStats::default();
        let mut duration = [0u8; 4];

        while stats.frames < header.frame_count {
            let n = read_full(&mut file, &mut duration).map_err(Fault::<D, S>::Io)?;
            if n < duration.len() {
                if n > 0 {
                    log::warn!("{} trailing bytes after frame {}", n, stats.frames);
                }
                log::info!("End of file reached");
                break;
            }
            let duration_ms = u32::from_le_bytes(duration);
            stats.declared_ms += duration_ms as u64;

            let got = read_full(&mut file, &mut next[..]).map_err(Fault::<D, S>::Io)?;
            if got != frame_bytes {
                log::error!(
                    "Failed to read full frame data, expected {} bytes, got {} bytes",
                    frame_bytes,
                    got
                );
                return Err(FormatError::TruncatedFrame {
                    frame: stats.frames,
                    expected: frame_bytes,
                    got,
                }
                .into());
            }
            if self.byte_swap {
                swap_bytes(&mut next[..]);
            }
            log::trace!("frame {} ({} ms)", stats.frames, duration_ms);

            let mut row = 0u16;
            while row < height {
                let rows = band.min(height - row);
                let start = row as usize * stride;
                let len = rows as usize * stride;
                transfer[..len].copy_from_slice(&next[start..start + len]);
                display
                    .draw_bitmap(0, row, width, rows, &transfer[..len])
                    .map_err(|e| {
                        log::error!("display fault on frame {}: {:?}", stats.frames, e);
                        Fault::<D, S>::Display(e)
                    })?;
                self.liveness.feed();
                row += rows;
            }

            core::mem::swap(&mut current, &mut next);
            stats.frames += 1;
            self.liveness.feed();
        }

        if stats.frames == header.frame_count {
            log::info!("Reached end of animation frames");
        }

        drop(transfer);
        drop(next);
        drop(current);

        stats.elapsed_ms = self.clock.now_ms().saturating_sub(started);
        log::info!(
            "Playback completed - Total frames: {}, Elapsed time: {} ms, FPS: {:.3}",
            stats.frames,
            stats.elapsed_ms,
            stats.fps()
        );
        Ok(stats)
    }

    fn take<D, S>(&mut self, kind: MemoryKind, bytes: usize) -> Result<A::Buffer, Fault<D, S>>
    where
        D: BlitTarget,
        S: AnimationStore,
    {
        self.alloc.allocate(kind, bytes).ok_or_else(|| {
            log::error!("Failed to allocate {} bytes of {} memory", bytes, kind);
            PlayError::ResourceExhaustion { kind, bytes }
        })
    }
}
