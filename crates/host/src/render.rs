//! Bitmap capture for screenshots.
//!
//! Rendering is deliberately simple: a window renders as its background
//! fill at its current size, anything else as a fixed placeholder tile.
//! Captures are PNG-encoded; the service transports them base64-encoded.

use std::io::Cursor;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::tree::NodeRef;
use crate::widgets::Window;

const TILE_WIDTH: u32 = 128;
const TILE_HEIGHT: u32 = 64;
const TILE_FILL: Rgba<u8> = Rgba([0xD0, 0xD0, 0xD0, 0xFF]);

fn dimension(value: f64) -> u32 {
	value.max(1.0) as u32
}

fn window_image(window: &Window) -> RgbaImage {
	let (width, height) = window.size();
	let background = window.background();
	let fill = Rgba([background.r, background.g, background.b, background.a]);
	RgbaImage::from_pixel(dimension(width), dimension(height), fill)
}

fn encode_png(image: RgbaImage) -> Result<Vec<u8>, String> {
	let mut png = Vec::new();
	image
		.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
		.map_err(|err| format!("Failed to encode screenshot: {err}"))?;
	Ok(png)
}

/// Renders a single node to PNG bytes.
pub fn render_node(node: &NodeRef) -> Result<Vec<u8>, String> {
	let image = match node.downcast_ref::<Window>() {
		Some(window) => window_image(window),
		None => RgbaImage::from_pixel(TILE_WIDTH, TILE_HEIGHT, TILE_FILL),
	};
	encode_png(image)
}

/// Renders every window, stacked vertically, into one PNG capture.
pub fn render_windows(windows: &[Arc<Window>]) -> Result<Vec<u8>, String> {
	if windows.is_empty() {
		return Err("No windows to capture".to_owned());
	}
	let images: Vec<RgbaImage> = windows.iter().map(|window| window_image(window)).collect();
	let width = images.iter().map(RgbaImage::width).max().unwrap_or(1);
	let height = images.iter().map(RgbaImage::height).sum();
	let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0xFF]));
	let mut offset = 0u32;
	for image in &images {
		image::imageops::overlay(&mut canvas, image, 0, i64::from(offset));
		offset += image.height();
	}
	encode_png(canvas)
}
