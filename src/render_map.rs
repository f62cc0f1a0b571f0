//! Render map: a read-only snapshot of where everything in a system is
//! drawn. This is what a renderer or a playback cursor needs from the
//! layout engine, without drawing anything itself.
//!
//! All x values are relative to the left edge of the system rectangle and
//! all y values to its top.

use serde::Serialize;

use crate::model::BarType;
use crate::system::{Rect, System};

/// Layout of one system.
#[derive(Debug, Clone, Serialize)]
pub struct RenderMap {
    pub rect: Rect,
    pub position_spacing: u8,
    /// X of the first position's left boundary
    pub first_position_x: i32,
    /// X of every valid position, indexed by position (end bar included).
    pub position_x: Vec<i32>,
    /// Start bar, interior barlines, end bar.
    pub barlines: Vec<BarlinePosition>,
    /// One entry per bar, between consecutive barlines.
    pub measures: Vec<MeasurePosition>,
    pub staves: Vec<StaffPosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarlinePosition {
    pub position: u32,
    pub x: i32,
    pub bar_type: BarType,
    pub repeat_count: u8,
    /// Width of the key and time signature drawn after the bar
    pub signature_width: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasurePosition {
    /// Position of the opening barline
    pub start_position: u32,
    /// Position of the closing barline
    pub end_position: u32,
    pub x: i32,
    pub width: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffPosition {
    pub index: usize,
    /// Top of the staff, from the top of the system
    pub y: u32,
    pub height: u32,
    pub shown: bool,
}

/// Computes the render map of `system`.
pub fn build_render_map(system: &System) -> RenderMap {
    let first_position_x = system.first_position_x();
    let position_x = (0..=system.position_count())
        .map(|p| system.position_x(p))
        .collect();

    let barlines: Vec<BarlinePosition> = system
        .barlines()
        .into_iter()
        .map(|bar| {
            let x = if bar.position == 0 {
                // The start bar is drawn just before the first position.
                first_position_x - if bar.is_bar() { 1 } else { system.position_spacing() as i32 }
            } else {
                system.position_x(bar.position)
            };
            BarlinePosition {
                position: bar.position,
                x,
                bar_type: bar.bar_type,
                repeat_count: bar.repeat_count,
                signature_width: bar.key_and_time_signature_width(),
            }
        })
        .collect();

    let measures = barlines
        .windows(2)
        .map(|pair| MeasurePosition {
            start_position: pair[0].position,
            end_position: pair[1].position,
            x: pair[0].x,
            width: pair[1].x - pair[0].x,
        })
        .collect();

    let staves = system
        .staves()
        .iter()
        .enumerate()
        .map(|(index, staff)| StaffPosition {
            index,
            y: system.staff_top(index).unwrap_or(0),
            height: staff.height(),
            shown: staff.shown,
        })
        .collect();

    RenderMap {
        rect: system.rect(),
        position_spacing: system.position_spacing(),
        first_position_x,
        position_x,
        barlines,
        measures,
        staves,
    }
}

/// Serialize a RenderMap to JSON.
pub fn render_map_to_json(map: &RenderMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}
