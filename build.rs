use std::env;
use std::fs;
use std::path::Path;

const ANIMATION: &str = "assets/animation.rgb565ani";

/// Stage the animation for `include_bytes!`. A missing asset becomes an
/// empty file so the firmware still builds and falls back to a test pattern.
fn stage_animation(out_dir: &Path) -> std::io::Result<()> {
    println!("cargo:rerun-if-changed={}", ANIMATION);
    let target = out_dir.join("animation.rgb565ani");

    if !Path::new(ANIMATION).exists() {
        println!("cargo:warning=Animation '{}' not found, embedding an empty file", ANIMATION);
        fs::write(&target, [])?;
        return Ok(());
    }

    let bytes = fs::copy(ANIMATION, &target)?;
    println!("cargo:warning=Embedding {} ({} bytes)", ANIMATION, bytes);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = env::var("OUT_DIR")?;
    stage_animation(Path::new(&out_dir))?;

    if env::var_os("CARGO_FEATURE_ESP32S3_ST7796S").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
    }
    Ok(())
}
