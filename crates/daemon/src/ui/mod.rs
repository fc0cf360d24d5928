//! Terminal-facing helpers: the share URL and its QR code.

pub mod lan;
pub mod qr;

pub use lan::{advertised_ip, lan_ip, share_url};
pub use qr::{generate_png_qr, generate_png_qr_bytes, generate_terminal_qr};
