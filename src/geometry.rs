//! Page geometry: the media box rectangle and the quarter-turn display rotation.

use std::fmt;

use log::warn;
use lopdf::Object;

use crate::error::{Error, Result};

/// Absolute page rotation, always one of 0, 90, 180 or 270 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Rotation(u16);

impl Rotation {
    pub const ZERO: Rotation = Rotation(0);
    pub const CLOCKWISE: Rotation = Rotation(90);
    pub const HALF_TURN: Rotation = Rotation(180);
    pub const COUNTER_CLOCKWISE: Rotation = Rotation(270);

    /// Normalize any multiple of 90 (negative values included) into `0..360`.
    pub fn from_degrees(degrees: i64) -> Result<Self> {
        if degrees.rem_euclid(90) != 0 {
            return Err(Error::InvalidAngle(degrees));
        }
        Ok(Rotation(degrees.rem_euclid(360) as u16))
    }

    /// Value of a page's `/Rotate` entry. Anything that is not a quarter
    /// turn is ignored, as viewers do.
    pub(crate) fn from_page_attribute(degrees: i64) -> Self {
        Rotation::from_degrees(degrees).unwrap_or_else(|_| {
            warn!("ignoring /Rotate {} (not a multiple of 90)", degrees);
            Rotation::ZERO
        })
    }

    /// Add `delta` degrees to this rotation.
    pub fn rotated(self, delta: i64) -> Result<Self> {
        let delta = Rotation::from_degrees(delta)?;
        Ok(Rotation((self.0 + delta.0) % 360))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.0)
    }
}

/// Page rectangle in default user space units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl MediaBox {
    /// US Letter, used when neither the page nor any ancestor carries a box.
    pub const LETTER: MediaBox = MediaBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    pub fn width(&self) -> f64 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f64 {
        (self.ury - self.lly).abs()
    }

    /// Width and height as displayed once `rotation` is applied.
    pub fn displayed_size(&self, rotation: Rotation) -> (f64, f64) {
        match rotation.degrees() {
            90 | 270 => (self.height(), self.width()),
            _ => (self.width(), self.height()),
        }
    }

    pub(crate) fn from_array(items: &[Object]) -> Option<Self> {
        if items.len() != 4 {
            return None;
        }
        let mut coords = [0.0f64; 4];
        for (slot, item) in coords.iter_mut().zip(items) {
            *slot = number(item)?;
        }
        Some(MediaBox {
            llx: coords[0],
            lly: coords[1],
            urx: coords[2],
            ury: coords[3],
        })
    }
}

impl fmt::Display for MediaBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {} {}]", self.llx, self.lly, self.urx, self.ury)
    }
}

/// Geometry a renderer needs to draw a page preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub media_box: MediaBox,
    pub rotation: Rotation,
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(*value as f64),
        _ => None,
    }
}
