//! Overlay selection and the draw requests handed to presentation sinks.
//!
//! The flags only decide what gets drawn. Detections are computed and reported the
//! same way whatever the overlay says.

use bitflags::bitflags;

use crate::detect::result::{BoundingBox, Detection};

/// Overlay used when `--overlay` is not given.
pub const DEFAULT_OVERLAY: &str = "box,labels,conf";

/// Default blending alpha for filled overlay boxes.
pub const DEFAULT_ALPHA: u8 = 120;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct OverlayFlags: u32 {
        const BOX = 0b0001;
        const LABEL = 0b0010;
        const CONFIDENCE = 0b0100;
    }
}

impl OverlayFlags {
    /// Parse a comma separated list such as `box,labels,conf` or `none`.
    ///
    /// Unknown entries are ignored with a warning; `none` clears everything.
    pub fn parse(value: &str) -> Self {
        let mut flags = OverlayFlags::empty();
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_ascii_lowercase().as_str() {
                "box" | "boxes" => flags |= OverlayFlags::BOX,
                "label" | "labels" => flags |= OverlayFlags::LABEL,
                "conf" | "confidence" => flags |= OverlayFlags::CONFIDENCE,
                "none" => return OverlayFlags::empty(),
                other => log::warn!("ignoring unknown overlay flag '{}'", other),
            }
        }
        flags
    }
}

/// Overlay settings, fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayConfig {
    pub flags: OverlayFlags,
    pub alpha: u8,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            flags: OverlayFlags::parse(DEFAULT_OVERLAY),
            alpha: DEFAULT_ALPHA,
        }
    }
}

/// One thing a sink is asked to draw for a detection.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayElement {
    pub class_id: u32,
    pub bbox: BoundingBox,
    pub draw_box: bool,
    pub label: Option<String>,
    pub confidence: Option<f32>,
}

/// Everything a sink is asked to draw on one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
    pub alpha: u8,
    pub elements: Vec<OverlayElement>,
}

impl Overlay {
    /// Build the draw requests for a tick's detections, in detection order.
    pub fn build(
        detections: &[Detection],
        config: &OverlayConfig,
        label_for: impl Fn(u32) -> String,
    ) -> Self {
        let flags = config.flags;
        let elements = if flags.is_empty() {
            Vec::new()
        } else {
            detections
                .iter()
                .map(|det| OverlayElement {
                    class_id: det.class_id,
                    bbox: det.bbox,
                    draw_box: flags.contains(OverlayFlags::BOX),
                    label: flags
                        .contains(OverlayFlags::LABEL)
                        .then(|| label_for(det.class_id)),
                    confidence: flags
                        .contains(OverlayFlags::CONFIDENCE)
                        .then_some(det.confidence),
                })
                .collect()
        };
        Self {
            alpha: config.alpha,
            elements,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Caption for an element, e.g. `person 87%`.
    pub fn caption(element: &OverlayElement) -> Option<String> {
        match (&element.label, element.confidence) {
            (Some(label), Some(conf)) => Some(format!("{} {:.0}%", label, conf * 100.0)),
            (Some(label), None) => Some(label.clone()),
            (None, Some(conf)) => Some(format!("{:.0}%", conf * 100.0)),
            (None, None) => None,
        }
    }
}
