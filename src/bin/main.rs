//! ST7796S animation player
//! ========================================
//! needs to be run in WSL2 terminal
//! source ~/export-esp.sh
//! cargo run --release --features esp32s3-st7796s
//! ========================================
//!
//! Plays `assets/animation.rgb565ani` (embedded at build time) in a loop on a
//! 320x480 ST7796S. Without an animation it draws a test pattern instead.

//% CHIPS: esp32s3
//% FEATURES: esp-hal/unstable

#![no_std]
#![no_main]

// Define the application description, which is placed in a special section of the binary.
// This is used by the bootloader to verify the application.
// The macro automatically fills in the fields.
esp_bootloader_esp_idf::esp_app_desc!();

use st7796s_anim::{
    display::{setup_display, DisplayType, PANEL},
    memory::CapsAllocator,
    rgb565ani::Player,
    store::MemoryStore,
    wiring::{init_board_pins, BoardPins},
};

use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use embedded_hal::delay::DelayNs;
use esp_backtrace as _;
use esp_hal::{
    delay::Delay,
    main,
    time::Duration,
    timer::{
        systimer::{SystemTimer, Unit},
        timg::{MwdtStage, TimerGroup},
    },
    Config,
};

const ANIMATION_PATH: &str = "/spiffs/animation.rgb565ani";
static ANIMATION: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/animation.rgb565ani"));

const WDT_TIMEOUT_S: u64 = 5;
const PAUSE_BETWEEN_LOOPS_MS: u32 = 500;

fn now_ms() -> u64 {
    let t = SystemTimer::unit_value(Unit::Unit0);
    t.saturating_mul(1000) / SystemTimer::ticks_per_second()
}

fn draw_test_pattern(display: &mut DisplayType<'_>) {
    let w = display.width() as i32;
    let h = display.height() as i32;
    let (cx, cy) = (w / 2, h / 2);

    display.fill_screen(Rgb565::BLACK).expect("fill failed");
    display.draw_rect(0, 0, w - 1, h - 1, Rgb565::WHITE).expect("draw failed");
    display.draw_line(0, 0, w - 1, h - 1, Rgb565::RED).expect("draw failed");
    display.draw_line(w - 1, 0, 0, h - 1, Rgb565::GREEN).expect("draw failed");
    display
        .draw_filled_rect(10, 10, 59, 59, Rgb565::BLUE)
        .expect("draw failed");
    for angle in (0..90).step_by(15) {
        display
            .draw_rect_angle(cx, cy, 160, 100, angle, Rgb565::CYAN)
            .expect("draw failed");
    }
    display
        .draw_triangle(cx, cy + 150, 80, 60, 0, Rgb565::YELLOW)
        .expect("draw failed");
}

fn idle(mut feed: impl FnMut(), delay: &mut Delay) -> ! {
    loop {
        feed();
        delay.delay_ms(1000);
    }
}

#[main]
fn main() -> ! {
    // Initialize peripherals
    let peripherals = esp_hal::init(Config::default());

    esp_alloc::heap_allocator!(size: 72 * 1024);
    esp_alloc::psram_allocator!(&peripherals.PSRAM, esp_hal::psram);

    esp_println::logger::init_logger(log::LevelFilter::Info);

    let BoardPins { display_pins, timg0 } = init_board_pins(peripherals);

    let mut delay = Delay::new();
    let mut display = setup_display(display_pins, &mut delay).expect("ST7796S init failed");

    let timg0 = TimerGroup::new(timg0);
    let mut wdt = timg0.wdt;
    wdt.set_timeout(MwdtStage::Stage0, Duration::from_secs(WDT_TIMEOUT_S));
    wdt.enable();

    if ANIMATION.is_empty() {
        log::warn!("No animation embedded, showing test pattern");
        draw_test_pattern(&mut display);
        idle(|| wdt.feed(), &mut delay);
    }

    let mut store: MemoryStore<'static, 1> = MemoryStore::new();
    store
        .insert(ANIMATION_PATH, ANIMATION)
        .expect("store has room for one file");

    let mut player = Player::new(CapsAllocator, || wdt.feed(), now_ms);
    let err = loop {
        match player.play(&mut display, &mut store, ANIMATION_PATH, PANEL.width, PANEL.height) {
            Ok(stats) => log::info!(
                "loop done: {} frames, {} ms declared",
                stats.frames,
                stats.declared_ms
            ),
            Err(e) => break e,
        }
        delay.delay_ms(PAUSE_BETWEEN_LOOPS_MS);
    };
    drop(player);

    log::error!("Playback stopped: {}", err);
    draw_test_pattern(&mut display);
    idle(|| wdt.feed(), &mut delay)
}
