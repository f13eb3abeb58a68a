#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bus;
pub mod memory;
pub mod rgb565ani;
pub mod shapes;
pub mod st7796s;
pub mod store;

#[cfg(feature = "esp32s3-st7796s")]
pub mod display;
#[cfg(feature = "esp32s3-st7796s")]
pub mod wiring;

#[cfg(test)]
mod test_spy;
