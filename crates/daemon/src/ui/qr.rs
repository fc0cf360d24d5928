//! QR codes for the share URL.
//!
//! Phones on the same network scan the code to open the share page. The code
//! can be rendered in the terminal with Unicode half blocks, or as a PNG for
//! the presentation layer.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use image::{ImageBuffer, ImageFormat, Luma};
use qrcode::{Color, QrCode};

/// QR code module size in pixels for PNG output.
const PNG_MODULE_SIZE: u32 = 8;

/// Quiet zone (border) size in modules.
const QUIET_ZONE: usize = 4;

fn encode(url: &str) -> anyhow::Result<QrCode> {
    QrCode::new(url.as_bytes()).with_context(|| format!("Failed to encode QR code for {url}"))
}

/// Renders a QR code for `url` as terminal text.
///
/// Two module rows are packed into each text row:
/// - Upper half block (U+2580): dark on top, light below
/// - Lower half block (U+2584): light on top, dark below
/// - Full block (U+2588): both dark
/// - Space: both light
pub fn generate_terminal_qr(url: &str) -> anyhow::Result<String> {
    let code = encode(url)?;
    let modules = code.to_colors();
    let width = code.width();
    let height = modules.len() / width;
    let is_dark = |row: usize, col: usize| row < height && modules[row * width + col] == Color::Dark;

    let full_width = width + 2 * QUIET_ZONE;
    let blank_line = " ".repeat(full_width);
    let margin = " ".repeat(QUIET_ZONE);

    let mut output = String::new();
    for _ in 0..QUIET_ZONE / 2 {
        output.push_str(&blank_line);
        output.push('\n');
    }

    for row in (0..height).step_by(2) {
        output.push_str(&margin);
        for col in 0..width {
            let ch = match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '\u{2588}',
                (true, false) => '\u{2580}',
                (false, true) => '\u{2584}',
                (false, false) => ' ',
            };
            output.push(ch);
        }
        output.push_str(&margin);
        output.push('\n');
    }

    for _ in 0..QUIET_ZONE / 2 {
        output.push_str(&blank_line);
        output.push('\n');
    }

    Ok(output)
}

fn render_image(url: &str) -> anyhow::Result<ImageBuffer<Luma<u8>, Vec<u8>>> {
    let code = encode(url)?;
    let modules = code.to_colors();
    let qr_width = code.width();

    let quiet_zone_pixels = QUIET_ZONE as u32 * PNG_MODULE_SIZE;
    let image_size = qr_width as u32 * PNG_MODULE_SIZE + 2 * quiet_zone_pixels;

    let mut img = ImageBuffer::from_pixel(image_size, image_size, Luma([255u8]));

    for (idx, color) in modules.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let x_start = quiet_zone_pixels + (idx % qr_width) as u32 * PNG_MODULE_SIZE;
        let y_start = quiet_zone_pixels + (idx / qr_width) as u32 * PNG_MODULE_SIZE;

        for dy in 0..PNG_MODULE_SIZE {
            for dx in 0..PNG_MODULE_SIZE {
                img.put_pixel(x_start + dx, y_start + dy, Luma([0u8]));
            }
        }
    }

    Ok(img)
}

/// Renders a QR code for `url` as PNG bytes.
pub fn generate_png_qr_bytes(url: &str) -> anyhow::Result<Vec<u8>> {
    let img = render_image(url)?;
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode QR code as PNG")?;
    Ok(bytes)
}

/// Writes a PNG QR code for `url` to `path`.
pub fn generate_png_qr(url: &str, path: &Path) -> anyhow::Result<()> {
    let img = render_image(url)?;
    img.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Failed to write QR code to {}", path.display()))?;
    Ok(())
}
