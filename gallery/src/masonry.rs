//! Greedy shortest-column masonry layout.

use lookup_client::PhotoRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Layout needs at least one column")]
    NoColumns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub columns: usize,
    pub spacing: f32,
    pub viewport_width: f32,
    /// Height assumed for a card whose image has not been measured yet.
    pub placeholder_height: f32,
    pub min_height: f32,
    pub max_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            columns: 2,
            spacing: 12.0,
            viewport_width: 390.0,
            placeholder_height: 200.0,
            min_height: 150.0,
            max_height: 300.0,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.columns == 0 {
            return Err(LayoutError::NoColumns);
        }
        Ok(())
    }

    pub fn card_width(&self) -> f32 {
        let columns = self.columns.max(1) as f32;
        ((self.viewport_width - (columns + 1.0) * self.spacing) / columns).max(0.0)
    }

    pub fn clamp_height(&self, height: f32) -> f32 {
        height.max(self.min_height).min(self.max_height)
    }
}

/// Measured aspect ratios (height / width) keyed by record id.
///
/// Measurements arrive one at a time after images load. Each one only
/// updates this cache; the caller re-runs the whole layout afterwards.
#[derive(Debug, Clone, Default)]
pub struct HeightCache {
    ratios: HashMap<String, f32>,
}

impl HeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the pixel size reported for `id`. Returns `true` when the
    /// stored ratio changed and a re-layout is due.
    pub fn record_measurement(&mut self, id: &str, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            tracing::debug!(id, width, height, "ignoring degenerate image size");
            return false;
        }
        let ratio = height as f32 / width as f32;
        match self.ratios.insert(id.to_string(), ratio) {
            Some(previous) => previous != ratio,
            None => true,
        }
    }

    pub fn is_measured(&self, id: &str) -> bool {
        self.ratios.contains_key(id)
    }

    /// Card height for `id`: measured and clamped, or the placeholder.
    pub fn height_for(&self, id: &str, config: &LayoutConfig) -> f32 {
        match self.ratios.get(id) {
            Some(ratio) => config.clamp_height(config.card_width() * ratio),
            None => config.placeholder_height,
        }
    }

    /// Drops measurements whose id fails `keep`.
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.ratios.retain(|id, _| keep(id));
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }
}

/// Column chosen for each height in order, plus the final column totals.
///
/// Each item goes to the column with the smallest running total; ties go to
/// the lowest index.
pub fn assign_columns(heights: &[f32], columns: usize) -> Result<(Vec<usize>, Vec<f32>), LayoutError> {
    if columns == 0 {
        return Err(LayoutError::NoColumns);
    }
    let mut totals = vec![0.0f32; columns];
    let mut placements = Vec::with_capacity(heights.len());
    for &height in heights {
        let mut shortest = 0;
        for (idx, total) in totals.iter().enumerate().skip(1) {
            if *total < totals[shortest] {
                shortest = idx;
            }
        }
        placements.push(shortest);
        totals[shortest] += height;
    }
    Ok((placements, totals))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutAssignment {
    pub columns: Vec<Vec<PhotoRecord>>,
    /// Running height estimate per column after the pass.
    pub column_heights: Vec<f32>,
}

impl LayoutAssignment {
    pub fn column_of(&self, id: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.iter().any(|r| r.id == id))
    }
}

/// Lays out `records` in order using the cached measurements.
pub fn layout(
    records: &[PhotoRecord],
    config: &LayoutConfig,
    heights: &HeightCache,
) -> Result<LayoutAssignment, LayoutError> {
    let estimates: Vec<f32> = records
        .iter()
        .map(|r| heights.height_for(&r.id, config))
        .collect();
    let (placements, column_heights) = assign_columns(&estimates, config.columns)?;
    let mut columns = vec![Vec::new(); config.columns];
    for (record, column) in records.iter().zip(placements) {
        columns[column].push(record.clone());
    }
    Ok(LayoutAssignment {
        columns,
        column_heights,
    })
}
