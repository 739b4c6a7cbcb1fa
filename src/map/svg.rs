//! SVG tile grid

use std::fmt::Write;

use crate::types::Region;

const COLUMNS: usize = 5;
const TILE_WIDTH: usize = 200;
const TILE_HEIGHT: usize = 80;
const GAP: usize = 4;

const ALERT_FILL: &str = "#d32f2f";
const CLEAR_FILL: &str = "#388e3c";

/// One tile per region in list order, red while the alert is on
pub fn render_svg(regions: &[Region]) -> String {
    let rows = regions.len().div_ceil(COLUMNS);
    let width = COLUMNS * (TILE_WIDTH + GAP) + GAP;
    let height = rows * (TILE_HEIGHT + GAP) + GAP;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    svg.push('\n');

    for (index, region) in regions.iter().enumerate() {
        let x = GAP + (index % COLUMNS) * (TILE_WIDTH + GAP);
        let y = GAP + (index / COLUMNS) * (TILE_HEIGHT + GAP);
        let fill = if region.alert { ALERT_FILL } else { CLEAR_FILL };

        // Writing into a String cannot fail
        let _ = writeln!(
            svg,
            r##"<g id="region-{id}"><rect x="{x}" y="{y}" width="{TILE_WIDTH}" height="{TILE_HEIGHT}" rx="6" fill="{fill}"/><text x="{tx}" y="{ty}" fill="#fff" font-family="sans-serif" font-size="14" text-anchor="middle">{name}</text></g>"##,
            id = region.id,
            tx = x + TILE_WIDTH / 2,
            ty = y + TILE_HEIGHT / 2 + 5,
            name = escape(&region.intl_name),
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
