use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::geometry::{Face, WirePlaneLayer, BOUNDARY_LAYERS};
use crate::data::measurement::Measurement;
use crate::data::slice::Slice;

/// A half-open range `[lo, hi)` of wire-in-plane indices in one strip layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Strip {
    pub layer: usize,
    pub bounds: (i32, i32),
}

impl Strip {
    pub fn new(layer: usize, lo: i32, hi: i32) -> Self {
        Strip { layer, bounds: (lo, hi) }
    }

    pub fn is_boundary(&self) -> bool {
        self.layer < BOUNDARY_LAYERS
    }

    /// The wire plane layer, `None` for a boundary strip.
    pub fn view(&self) -> Option<WirePlaneLayer> {
        WirePlaneLayer::from_strip_layer(self.layer)
    }

    pub fn width(&self) -> i32 {
        self.bounds.1 - self.bounds.0
    }

    /// Overlap test with `tolerance` index positions of slack on either side.
    pub fn overlaps(&self, other: &Strip, tolerance: i32) -> bool {
        self.bounds.0 - tolerance < other.bounds.1 && other.bounds.0 < self.bounds.1 + tolerance
    }
}

/// The strips bounding a blob, one per layer, boundary layers first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlobShape {
    pub strips: Vec<Strip>,
}

impl BlobShape {
    pub fn new(strips: Vec<Strip>) -> Self {
        BlobShape { strips }
    }

    /// Shape with the two boundary strips and the given (lo, hi) per view.
    pub fn from_views(views: [(i32, i32); 3]) -> Self {
        let mut strips = vec![Strip::new(0, 0, 1), Strip::new(1, 0, 1)];
        for layer in WirePlaneLayer::ALL {
            let (lo, hi) = views[layer.index()];
            strips.push(Strip::new(layer.strip_layer(), lo, hi));
        }
        BlobShape { strips }
    }

    /// Strips of the wire-plane layers.
    pub fn views(&self) -> impl Iterator<Item = (WirePlaneLayer, &Strip)> {
        self.strips.iter().filter_map(|s| s.view().map(|v| (v, s)))
    }

    pub fn strip(&self, layer: WirePlaneLayer) -> Option<&Strip> {
        self.strips.iter().find(|s| s.layer == layer.strip_layer())
    }

    /// True if every wire-plane layer present in both shapes overlaps under
    /// the given tolerance.
    pub fn overlaps(&self, other: &BlobShape, tolerance: i32) -> bool {
        let mut any = false;
        for (view, strip) in self.views() {
            if let Some(theirs) = other.strip(view) {
                any = true;
                if !strip.overlaps(theirs, tolerance) {
                    return false;
                }
            }
        }
        any
    }
}

/// A reconstructed region of one slice on one face.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub ident: i32,
    pub value: Measurement,
    pub slice: Arc<Slice>,
    pub face: Arc<Face>,
    pub shape: BlobShape,
}

impl Blob {
    pub fn new(ident: i32, value: Measurement, slice: Arc<Slice>, face: Arc<Face>, shape: BlobShape) -> Self {
        Blob { ident, value, slice, face, shape }
    }

    /// A copy carrying a new charge, everything else shared.
    pub fn with_value(&self, value: Measurement) -> Blob {
        Blob { value, ..self.clone() }
    }

    /// Rerun-stable sort key.
    pub fn ordering_key(&self) -> i32 {
        self.ident
    }
}
