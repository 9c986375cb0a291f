use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::data::channel::{Channel, Wire};
use crate::error::{CoreError, Result};

/// Number of strip layers that bound the sensitive area of a face.
///
/// Blob shapes carry these two layers ahead of the wire-plane layers; they
/// never take part in overlap, shadow or coverage computations.
pub const BOUNDARY_LAYERS: usize = 2;

/// One of the stacked wire grids of a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WirePlaneLayer {
    U,
    V,
    W,
}

impl WirePlaneLayer {
    pub const ALL: [WirePlaneLayer; 3] = [WirePlaneLayer::U, WirePlaneLayer::V, WirePlaneLayer::W];

    /// Index of the view, 0 for U through 2 for W.
    pub fn index(&self) -> usize {
        match self {
            WirePlaneLayer::U => 0,
            WirePlaneLayer::V => 1,
            WirePlaneLayer::W => 2,
        }
    }

    /// The layer of a given view index.
    pub fn from_index(index: usize) -> Option<WirePlaneLayer> {
        WirePlaneLayer::ALL.get(index).copied()
    }

    /// The layer addressed by a strip layer number, `None` for boundary strips.
    pub fn from_strip_layer(layer: usize) -> Option<WirePlaneLayer> {
        layer.checked_sub(BOUNDARY_LAYERS).and_then(WirePlaneLayer::from_index)
    }

    /// The strip layer number used by blob shapes for this view.
    pub fn strip_layer(&self) -> usize {
        self.index() + BOUNDARY_LAYERS
    }
}

impl fmt::Display for WirePlaneLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WirePlaneLayer::U => write!(f, "u"),
            WirePlaneLayer::V => write!(f, "v"),
            WirePlaneLayer::W => write!(f, "w"),
        }
    }
}

/// Identifies a wire plane by its layer, the face it sits on and its anode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WirePlaneId {
    pub layer: WirePlaneLayer,
    pub face: i32,
    pub apa: i32,
}

impl WirePlaneId {
    pub fn new(layer: WirePlaneLayer, face: i32, apa: i32) -> Self {
        WirePlaneId { layer, face, apa }
    }
}

impl fmt::Display for WirePlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:f{}:a{}", self.layer, self.face, self.apa)
    }
}

/// One side of one anode volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub ident: i32,
    pub which: i32,
    pub anode: i32,
}

impl Face {
    pub fn new(ident: i32, which: i32, anode: i32) -> Self {
        Face { ident, which, anode }
    }

    /// The plane id of the given layer on this face.
    pub fn plane(&self, layer: WirePlaneLayer) -> WirePlaneId {
        WirePlaneId::new(layer, self.which, self.anode)
    }
}

/// Static detector geometry lookups: faces, channels and the ordered wires
/// of each plane.
#[derive(Clone, Debug, Default)]
pub struct Detector {
    faces: FxHashMap<i32, Arc<Face>>,
    channels: BTreeMap<i32, Arc<Channel>>,
    planes: FxHashMap<WirePlaneId, Vec<Arc<Wire>>>,
}

impl Detector {
    pub fn new() -> Self {
        Detector::default()
    }

    /// Build a face whose three planes hold `nwires[view]` wires, one wire per
    /// channel. Channel identities are assigned consecutively from
    /// `first_channel`, plane after plane.
    ///
    /// # Examples
    ///
    /// ```
    /// use tpccore::data::geometry::{Detector, Face, WirePlaneLayer};
    ///
    /// let face = Face::new(0, 0, 0);
    /// let det = Detector::uniform(face.clone(), [4, 4, 6], 0, 5.0).unwrap();
    /// let wires = det.wires_in_plane(face.plane(WirePlaneLayer::W)).unwrap();
    /// assert_eq!(wires.len(), 6);
    /// assert_eq!(wires[0].channel, 8);
    /// ```
    pub fn uniform(face: Face, nwires: [usize; 3], first_channel: i32, pitch: f64) -> Result<Self> {
        let mut det = Detector::new();
        let mut chident = first_channel;
        let mut wident = 0;
        for layer in WirePlaneLayer::ALL {
            let plane = face.plane(layer);
            for index in 0..nwires[layer.index()] {
                let y = index as f64 * pitch;
                let z = layer.index() as f64 * pitch;
                let wire = Wire::new(
                    wident,
                    plane,
                    index as i32,
                    chident,
                    0,
                    Point3::new(0.0, y, z),
                    Point3::new(1000.0, y, z),
                );
                det.add_channel(Channel::new(chident, plane, index as i32, vec![Arc::new(wire)]))?;
                wident += 1;
                chident += 1;
            }
        }
        det.add_face(face)?;
        Ok(det)
    }

    pub fn add_face(&mut self, face: Face) -> Result<Arc<Face>> {
        if self.faces.contains_key(&face.ident) {
            return Err(CoreError::Duplicate { kind: "face", ident: face.ident });
        }
        let face = Arc::new(face);
        self.faces.insert(face.ident, face.clone());
        Ok(face)
    }

    /// Register a channel and the wire segments it reads out.
    pub fn add_channel(&mut self, channel: Channel) -> Result<Arc<Channel>> {
        if self.channels.contains_key(&channel.ident) {
            return Err(CoreError::Duplicate { kind: "channel", ident: channel.ident });
        }
        for wire in &channel.wires {
            let plane = self.planes.entry(wire.plane).or_default();
            let pos = plane.partition_point(|w| w.index < wire.index);
            plane.insert(pos, wire.clone());
        }
        let channel = Arc::new(channel);
        self.channels.insert(channel.ident, channel.clone());
        Ok(channel)
    }

    pub fn face(&self, ident: i32) -> Result<&Arc<Face>> {
        self.faces
            .get(&ident)
            .ok_or_else(|| CoreError::Geometry(format!("no face {}", ident)))
    }

    pub fn faces(&self) -> impl Iterator<Item = &Arc<Face>> {
        self.faces.values()
    }

    pub fn channel(&self, ident: i32) -> Result<&Arc<Channel>> {
        self.channels
            .get(&ident)
            .ok_or_else(|| CoreError::Geometry(format!("no channel {}", ident)))
    }

    /// Channels in order of their identity.
    pub fn channels(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.channels.values()
    }

    /// The wires of a plane ordered by wire-in-plane index.
    pub fn wires_in_plane(&self, plane: WirePlaneId) -> Result<&[Arc<Wire>]> {
        self.planes
            .get(&plane)
            .map(|v| v.as_slice())
            .ok_or_else(|| CoreError::Geometry(format!("no wires in plane {}", plane)))
    }

    /// All wire segments with the given wire-in-plane index.
    pub fn wires_at(&self, plane: WirePlaneId, index: i32) -> Result<Vec<&Arc<Wire>>> {
        let wires = self.wires_in_plane(plane)?;
        let lo = wires.partition_point(|w| w.index < index);
        let hi = wires.partition_point(|w| w.index <= index);
        Ok(wires[lo..hi].iter().collect())
    }
}
