// src/lib.rs
pub mod error;
pub mod config;
pub mod grouping;

// shadow module
pub mod shadow {
    pub mod blob;
    pub mod coverage;
    pub mod cluster;
}

// clustering module
pub mod clustering {
    pub mod policy;
    pub mod geom;
}

// solve module
pub mod solve {
    pub mod csgraph;
    pub mod lasso;
    pub mod weighting;
    pub mod prune;
    pub mod charge;
}

// deghost module
pub mod deghost {
    pub mod projection;
    pub mod judge;
    pub mod deghosting;
}
