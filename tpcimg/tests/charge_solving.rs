use std::sync::Arc;

use rustc_hash::FxHashMap;

use tpccore::data::blob::{Blob, BlobShape};
use tpccore::data::geometry::{Detector, Face, WirePlaneLayer};
use tpccore::data::measure::Measure;
use tpccore::data::measurement::Measurement;
use tpccore::data::slice::Slice;
use tpccore::error::CoreError;
use tpccore::graph::builder::EventBuilder;
use tpccore::graph::event::{EventGraph, VertexId};
use tpccore::graph::node::NodeCode;

use tpcimg::config::ChargeSolvingConfig;
use tpcimg::error::ImgError;
use tpcimg::grouping::group_measures;
use tpcimg::solve::charge::ChargeSolving;
use tpcimg::solve::csgraph::{repack, unpack, MeasureThreshold};

fn blob_values(eg: &EventGraph) -> Vec<(i32, f64)> {
    let mut out: Vec<(i32, f64)> = eg
        .vertices_of(NodeCode::Blob)
        .into_iter()
        .map(|bv| {
            let b = eg.blob(bv).unwrap();
            (b.ident, b.value.value)
        })
        .collect();
    out.sort_by_key(|(ident, _)| *ident);
    out
}

/// Two slices; in the first, two blobs share their U channels.
fn event() -> EventGraph {
    let det = Detector::uniform(Face::new(0, 0, 0), [8, 8, 8], 0, 1.0).unwrap();
    let face = det.face(0).unwrap().clone();
    // U channels 0 and 1 carry the signal of two blobs
    let activity: FxHashMap<i32, Measurement> = (0..24)
        .map(|ch| (ch, Measurement::new(if ch < 2 { 1000.0 } else { 500.0 }, 20.0)))
        .collect();
    let mut builder = EventBuilder::new(&det).unwrap();
    let s0 = Arc::new(Slice::new(0, 0, 0.0, 2.0, activity.clone()));
    let s1 = Arc::new(Slice::new(1, 0, 2.0, 2.0, activity));
    builder.add_slice(s0.clone()).unwrap();
    builder.add_slice(s1.clone()).unwrap();
    let blobs = [
        (s0.clone(), [(0, 2), (0, 2), (0, 2)]),
        (s0, [(0, 2), (4, 6), (4, 6)]),
        (s1, [(2, 4), (2, 4), (2, 4)]),
    ];
    for (ident, (slice, views)) in blobs.into_iter().enumerate() {
        builder
            .add_blob(Blob::new(
                ident as i32,
                Measurement::new(0.0, 9.0),
                slice,
                face.clone(),
                BlobShape::from_views(views),
            ))
            .unwrap();
    }
    group_measures(&builder.build()).unwrap()
}

#[test]
fn test_unpack_repack_identity() {
    let eg = event();
    // blob 0 and 1 share the U measure of slice 0
    assert_eq!(eg.vertices_of(NodeCode::Measure).len(), 8);

    let threshold = MeasureThreshold { value: 0.0, error: 0.0 };
    let csgs = unpack(&eg, &threshold).unwrap();
    assert_eq!(csgs.len(), 2);
    let out = repack(&eg, &csgs).unwrap();
    assert_eq!(out.node_count(), eg.node_count());
    assert_eq!(out.edge_count(), eg.edge_count());
    assert_eq!(blob_values(&out), blob_values(&eg));
    assert_eq!(out.summary(), eg.summary());
}

#[test]
fn test_repack_drops_unsolved() {
    let eg = event();
    let threshold = MeasureThreshold { value: 0.0, error: 0.0 };
    let mut csgs = unpack(&eg, &threshold).unwrap();
    // forget the second slice
    csgs.retain(|c| c.slice_ident == 0);
    let out = repack(&eg, &csgs).unwrap();
    assert_eq!(out.vertices_of(NodeCode::Blob).len(), 2);
    assert_eq!(out.vertices_of(NodeCode::Measure).len(), 5);
    assert_eq!(out.vertices_of(NodeCode::Slice).len(), 2);
}

/// One blob of slice 0 observed by two measures of the given values.
fn single(values: [f64; 2]) -> EventGraph {
    let det = Detector::uniform(Face::new(0, 0, 0), [2, 2, 2], 0, 1.0).unwrap();
    let face = det.face(0).unwrap().clone();
    let slice = Arc::new(Slice::new(0, 0, 0.0, 2.0, Default::default()));
    let mut builder = EventBuilder::new(&det).unwrap();
    builder.add_slice(slice.clone()).unwrap();
    let bv: VertexId = builder
        .add_blob(Blob::new(0, Measurement::new(0.0, 9.0), slice, face.clone(), BlobShape::from_views([(0, 1); 3])))
        .unwrap();
    let mut eg = builder.build();
    for (i, (value, layer)) in values.iter().zip([WirePlaneLayer::U, WirePlaneLayer::V]).enumerate() {
        let m = Measure::new(i as i32, face.plane(layer), vec![i as i32 * 2], Measurement::new(*value, 1.0 + i as f64));
        let mv = eg.add_node(m);
        eg.add_edge(bv, mv).unwrap();
    }
    eg
}

#[test]
fn test_single_blob_simple_profile_is_mean() {
    let cfg = ChargeSolvingConfig {
        meas_value_threshold: 0.0,
        solve_config: "simple".to_string(),
        ..ChargeSolvingConfig::default()
    };
    let (out, summaries) = ChargeSolving::new(&cfg).unwrap().run(&single([10.0, 20.0])).unwrap();
    let values = blob_values(&out);
    assert_eq!(values.len(), 1);
    assert!((values[0].1 - 15.0).abs() < 1e-9);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].nblob, 1);
    assert_eq!(summaries[0].nmeas, 2);
}

#[test]
fn test_solve_recovers_shared_charge() {
    let eg = event();
    let cfg = ChargeSolvingConfig {
        meas_value_threshold: 0.0,
        weighting_strategies: vec!["uniform".to_string(), "uboone".to_string()],
        ..ChargeSolvingConfig::default()
    };
    let (out, summaries) = ChargeSolving::new(&cfg).unwrap().run(&eg).unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.converged));

    // every blob carries 1000 in each view
    for (ident, q) in blob_values(&out) {
        assert!((q - 1000.0).abs() < 20.0, "blob {} solved to {}", ident, q);
    }
    let json = serde_json::to_string(&summaries).unwrap();
    assert!(json.contains("chi2_base"));
}

/// Three blobs of one slice, each with its own measures.
fn thresholded(measures: [&[Measurement]; 3]) -> EventGraph {
    let det = Detector::uniform(Face::new(0, 0, 0), [8, 8, 8], 0, 1.0).unwrap();
    let face = det.face(0).unwrap().clone();
    let slice = Arc::new(Slice::new(0, 0, 0.0, 2.0, Default::default()));
    let mut builder = EventBuilder::new(&det).unwrap();
    builder.add_slice(slice.clone()).unwrap();
    let mut blobs = Vec::new();
    for ident in 0..3 {
        let w = 2 * ident;
        let shape = BlobShape::from_views([(w, w + 2), (w, w + 2), (w, w + 2)]);
        blobs.push(
            builder
                .add_blob(Blob::new(ident, Measurement::new(0.0, 9.0), slice.clone(), face.clone(), shape))
                .unwrap(),
        );
    }
    let mut eg = builder.build();
    let mut ident = 0;
    for (bv, values) in blobs.into_iter().zip(measures) {
        for (layer, value) in WirePlaneLayer::ALL.into_iter().zip(values) {
            let mv = eg.add_node(Measure::new(ident, face.plane(layer), vec![ident], *value));
            eg.add_edge(bv, mv).unwrap();
            ident += 1;
        }
    }
    eg
}

#[test]
fn test_blobs_without_passing_measures_are_removed() {
    let below = [Measurement::new(5.0, 1.0)];
    let uncertain = [Measurement::new(500.0, 2e9)];
    let good = [Measurement::new(500.0, 1.0), Measurement::new(700.0, 1.0)];
    let eg = thresholded([&good, &below, &uncertain]);
    assert_eq!(eg.vertices_of(NodeCode::Measure).len(), 4);

    let cfg = ChargeSolvingConfig::default();
    assert!(cfg.meas_value_threshold > 5.0 && cfg.meas_error_threshold < 2e9);
    let (out, summaries) = ChargeSolving::new(&cfg).unwrap().run(&eg).unwrap();
    assert_eq!(summaries.len(), 1);

    let values = blob_values(&out);
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].0, 0);
    assert!((values[0].1 - 600.0).abs() < 1e-9);

    let measures: Vec<f64> = out
        .vertices_of(NodeCode::Measure)
        .into_iter()
        .map(|mv| out.measure(mv).unwrap().value.value)
        .collect();
    assert_eq!(measures, vec![500.0, 700.0]);

    for code in [NodeCode::Slice, NodeCode::Wire, NodeCode::Channel] {
        assert_eq!(out.vertices_of(code).len(), eg.vertices_of(code).len());
    }
}

#[test]
fn test_blob_without_slice_is_an_error() {
    let mut eg = event();
    let det = Detector::uniform(Face::new(0, 0, 0), [8, 8, 8], 0, 1.0).unwrap();
    let face = det.face(0).unwrap().clone();
    let orphan = Blob::new(9, Measurement::new(0.0, 9.0), Arc::new(Slice::default()), face.clone(), BlobShape::default());
    let bv = eg.add_node(orphan);
    let mv = eg.add_node(Measure::new(99, face.plane(WirePlaneLayer::U), vec![0], Measurement::new(100.0, 1.0)));
    eg.add_edge(bv, mv).unwrap();

    let cfg = ChargeSolvingConfig { meas_value_threshold: 0.0, ..ChargeSolvingConfig::default() };
    let res = ChargeSolving::new(&cfg).unwrap().run(&eg);
    assert!(matches!(res, Err(ImgError::Core(CoreError::BlobSlice { blob: 9, count: 0 }))));
}
