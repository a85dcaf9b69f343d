// CleanLog - core/heatmap.rs
//
// Weekday x hour activity heatmap rendered straight to PNG with the
// `image` crate. Rows are Monday..Sunday, columns are hours 0..23, and a
// vertical colour bar on the right shows the scale (top = busiest cell).
// The chart carries no text; the dashboard captions it.

use crate::core::model::ChatMessage;
use crate::util::error::ExportError;
use chrono::{Datelike, Timelike};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

const CELL: u32 = 32;
const MARGIN: u32 = 16;
const BAR_GAP: u32 = 16;
const BAR_WIDTH: u32 = 16;
const DAYS: usize = 7;
const HOURS: usize = 24;

/// YlOrRd, nine steps from pale yellow to dark red.
const YL_OR_RD: [[u8; 3]; 9] = [
    [0xff, 0xff, 0xcc],
    [0xff, 0xed, 0xa0],
    [0xfe, 0xd9, 0x76],
    [0xfe, 0xb2, 0x4c],
    [0xfd, 0x8d, 0x3c],
    [0xfc, 0x4e, 0x2a],
    [0xe3, 0x1a, 0x1c],
    [0xbd, 0x00, 0x26],
    [0x80, 0x00, 0x26],
];

const GRID_LINE: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);
const BACKGROUND: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

/// Message counts indexed by `[weekday from Monday][hour]`.
pub fn activity_grid(messages: &[ChatMessage]) -> [[usize; HOURS]; DAYS] {
    let mut grid = [[0usize; HOURS]; DAYS];
    for m in messages {
        let day = m.create_time.weekday().num_days_from_monday() as usize;
        let hour = m.create_time.hour() as usize;
        grid[day][hour] += 1;
    }
    grid
}

/// Colour for `t` in [0, 1], linearly interpolated across the palette.
pub fn colormap(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let scaled = t * (YL_OR_RD.len() - 1) as f64;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(YL_OR_RD.len() - 1);
    let frac = scaled - lo as f64;
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    Rgb([
        mix(YL_OR_RD[lo][0], YL_OR_RD[hi][0]),
        mix(YL_OR_RD[lo][1], YL_OR_RD[hi][1]),
        mix(YL_OR_RD[lo][2], YL_OR_RD[hi][2]),
    ])
}

/// Render the activity heatmap. Returns `None` when there are no messages.
pub fn render(messages: &[ChatMessage]) -> Result<Option<Vec<u8>>, ExportError> {
    if messages.is_empty() {
        return Ok(None);
    }

    let grid = activity_grid(messages);
    let max = grid.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;

    let grid_w = CELL * HOURS as u32;
    let grid_h = CELL * DAYS as u32;
    let width = MARGIN + grid_w + BAR_GAP + BAR_WIDTH + MARGIN;
    let height = MARGIN + grid_h + MARGIN;
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

    for (day, row) in grid.iter().enumerate() {
        for (hour, &count) in row.iter().enumerate() {
            let colour = colormap(count as f64 / max);
            let x0 = MARGIN + hour as u32 * CELL;
            let y0 = MARGIN + day as u32 * CELL;
            for y in y0..y0 + CELL {
                for x in x0..x0 + CELL {
                    let edge = x == x0 || y == y0;
                    img.put_pixel(x, y, if edge { GRID_LINE } else { colour });
                }
            }
        }
    }

    let bar_x = MARGIN + grid_w + BAR_GAP;
    for y in 0..grid_h {
        let t = 1.0 - y as f64 / (grid_h - 1) as f64;
        let colour = colormap(t);
        for x in bar_x..bar_x + BAR_WIDTH {
            img.put_pixel(x, MARGIN + y, colour);
        }
    }

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|source| ExportError::Image { source })?;
    Ok(Some(buf.into_inner()))
}
