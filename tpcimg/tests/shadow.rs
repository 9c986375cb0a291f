use std::collections::BTreeSet;
use std::sync::Arc;

use nalgebra::Point3;

use tpccore::data::blob::{Blob, BlobShape};
use tpccore::data::channel::{Channel, Wire};
use tpccore::data::geometry::{Detector, Face, WirePlaneLayer};
use tpccore::data::measurement::Measurement;
use tpccore::data::slice::Slice;
use tpccore::graph::builder::EventBuilder;
use tpccore::graph::event::{EventGraph, VertexId};

use tpcimg::shadow::{blob, cluster};

/// Two faces whose wires wrap: channel `4 * layer + index` reads wire
/// `index` of its layer on both faces.
fn wrapped() -> Detector {
    let mut det = Detector::new();
    let faces = [
        det.add_face(Face::new(0, 0, 0)).unwrap(),
        det.add_face(Face::new(1, 1, 0)).unwrap(),
    ];
    let mut wident = 0;
    for layer in WirePlaneLayer::ALL {
        for index in 0..4 {
            let ch = 4 * layer.index() as i32 + index;
            let mut wires = Vec::new();
            for (segment, face) in faces.iter().enumerate() {
                let y = index as f64;
                wires.push(Arc::new(Wire::new(
                    wident,
                    face.plane(layer),
                    index,
                    ch,
                    segment as i32,
                    Point3::new(0.0, y, 0.0),
                    Point3::new(10.0, y, 0.0),
                )));
                wident += 1;
            }
            det.add_channel(Channel::new(ch, faces[0].plane(layer), index, wires)).unwrap();
        }
    }
    det
}

/// Blob 0 and blob 2 on face 0 share U and V wires. Blob 1 on face 1 reaches
/// channel 0 of blob 0 and blob 2 only through the wrap.
fn event(det: &Detector) -> (EventGraph, [VertexId; 3]) {
    let slice = Arc::new(Slice::new(0, 0, 0.0, 1.0, Default::default()));
    let mut builder = EventBuilder::new(det).unwrap();
    builder.add_slice(slice.clone()).unwrap();
    let shapes = [
        (0, BlobShape::from_views([(0, 1), (0, 1), (0, 1)])),
        (1, BlobShape::from_views([(0, 1), (2, 3), (2, 3)])),
        (0, BlobShape::from_views([(0, 2), (0, 1), (3, 4)])),
    ];
    let mut blobs = Vec::new();
    for (ident, (face, shape)) in shapes.into_iter().enumerate() {
        let face = det.face(face).unwrap().clone();
        blobs.push(
            builder
                .add_blob(Blob::new(ident as i32, Measurement::exact(1.0), slice.clone(), face, shape))
                .unwrap(),
        );
    }
    (builder.build(), [blobs[0], blobs[1], blobs[2]])
}

#[test]
fn test_wire_shadow_implies_channel_shadow() {
    let det = wrapped();
    let (eg, _) = event(&det);
    let wires = blob::shadow(&eg, 'w');
    let channels = blob::shadow(&eg, 'c');
    assert!(wires.edge_count() > 0);
    for (a, b, edge) in wires.edges() {
        assert!(channels.edge(a, b, edge.plane).is_some());
    }
}

#[test]
fn test_wire_shadow_implies_channel_shadow_on_second_face() {
    let det = wrapped();
    let face = det.face(1).unwrap().clone();
    let slice = Arc::new(Slice::new(0, 0, 0.0, 1.0, Default::default()));
    let mut builder = EventBuilder::new(&det).unwrap();
    builder.add_slice(slice.clone()).unwrap();
    for ident in 0..2 {
        let shape = BlobShape::from_views([(1, 3), (0, 2), (2, 4)]);
        builder
            .add_blob(Blob::new(ident, Measurement::exact(1.0), slice.clone(), face.clone(), shape))
            .unwrap();
    }
    let eg = builder.build();

    let wires = blob::shadow(&eg, 'w');
    let channels = blob::shadow(&eg, 'c');
    assert_eq!(wires.edge_count(), 3);
    assert_eq!(channels.edge_count(), 3);
    for (a, b, edge) in wires.edges() {
        assert_eq!(edge.plane.face, face.which);
        let c = channels.edge(a, b, edge.plane).unwrap();
        assert_eq!((c.beg, c.end), (edge.beg, edge.end));
    }
}

#[test]
fn test_wrapped_wires_only_in_channel_shadow() {
    let det = wrapped();
    let (eg, [b0, b1, b2]) = event(&det);
    let u = det.face(0).unwrap().plane(WirePlaneLayer::U);

    let wires = blob::shadow(&eg, 'w');
    assert_eq!(wires.node_count(), 3);
    assert_eq!(wires.edge_count(), 2);
    assert_eq!(wires.degree(b1), 0);
    let e = wires.edge(b0, b2, u).unwrap();
    assert_eq!((e.beg, e.end), (0, 1));

    let channels = blob::shadow(&eg, 'c');
    assert!(channels.edge(b0, b1, u).is_some());
    assert!(channels.edge(b1, b2, u).is_some());
    assert_eq!(channels.edge_count(), 4);
}

#[test]
fn test_cluster_edges_unique_per_layer() {
    let det = wrapped();
    let (mut eg, [b0, _, b2]) = event(&det);
    let bsg = blob::shadow(&eg, 'c');
    let (csg, b2c) = cluster::shadow(&eg, &bsg).unwrap();
    assert_eq!(csg.node_count(), 3);
    let keys: BTreeSet<_> = csg.edges().map(|(a, b, e)| (a, b, e.layer)).collect();
    assert_eq!(keys.len(), csg.edge_count());
    assert_ne!(b2c[&b0], b2c[&b2]);

    // joining blob 0 and blob 2 folds their shadow into the cluster
    eg.add_edge(b0, b2).unwrap();
    let bsg = blob::shadow(&eg, 'c');
    let (csg, b2c) = cluster::shadow(&eg, &bsg).unwrap();
    assert_eq!(csg.node_count(), 2);
    assert_eq!(b2c[&b0], b2c[&b2]);
    assert_eq!(csg.edge_count(), 1);
    let (_, _, edge) = csg.edges().next().unwrap();
    assert_eq!(edge.layer, WirePlaneLayer::U);
}
