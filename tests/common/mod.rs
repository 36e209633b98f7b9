#![allow(dead_code)]

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use omr_grader::layout::{CoordinateMap, FormLayout};
use std::io::Cursor;

pub const SHEET_WIDTH: u32 = 700;
pub const SHEET_HEIGHT: u32 = 450;

/// Radius of a pencil mark; fills a bit over half of the sampled square.
pub const MARK_RADIUS: i32 = 10;

/// White sheet with a dark disc on every `(question, option)` mark.
pub fn render_sheet(layout: &FormLayout, marks: &[(u32, &str)]) -> GrayImage {
    let coords = CoordinateMap::build(layout).expect("valid layout");
    let mut sheet = GrayImage::from_pixel(SHEET_WIDTH, SHEET_HEIGHT, Luma([255]));

    for (question, option) in marks {
        let center = coords
            .center_of(*question, option)
            .expect("mark inside layout");
        draw_filled_circle_mut(
            &mut sheet,
            (center.x as i32, center.y as i32),
            MARK_RADIUS,
            Luma([20]),
        );
    }

    sheet
}

pub fn encode_png(image: GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn sheet_png(layout: &FormLayout, marks: &[(u32, &str)]) -> Vec<u8> {
    encode_png(render_sheet(layout, marks))
}

/// Bytes with a PNG signature and nothing decodable after it.
pub fn corrupt_png() -> Vec<u8> {
    b"\x89PNG\r\n\x1a\nthis is not an image".to_vec()
}
