use std::sync::Arc;

use nalgebra::{Point3, Vector3};

use crate::data::geometry::WirePlaneId;

/// A single physical wire segment.
///
/// Wrapped wires give one channel several segments, distinguished by
/// `segment`, possibly lying on different faces.
#[derive(Clone, Debug, PartialEq)]
pub struct Wire {
    pub ident: i32,
    pub plane: WirePlaneId,
    pub index: i32,
    pub channel: i32,
    pub segment: i32,
    pub tail: Point3<f64>,
    pub head: Point3<f64>,
}

impl Wire {
    pub fn new(
        ident: i32,
        plane: WirePlaneId,
        index: i32,
        channel: i32,
        segment: i32,
        tail: Point3<f64>,
        head: Point3<f64>,
    ) -> Self {
        Wire { ident, plane, index, channel, segment, tail, head }
    }

    pub fn direction(&self) -> Vector3<f64> {
        self.head - self.tail
    }

    pub fn length(&self) -> f64 {
        self.direction().norm()
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.tail, &self.head)
    }
}

/// A readout channel and the wire segments it reads out.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub ident: i32,
    pub plane: WirePlaneId,
    pub index: i32,
    pub wires: Vec<Arc<Wire>>,
}

impl Channel {
    pub fn new(ident: i32, plane: WirePlaneId, index: i32, wires: Vec<Arc<Wire>>) -> Self {
        Channel { ident, plane, index, wires }
    }
}
