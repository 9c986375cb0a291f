// data module
pub mod data {
    pub mod measurement;
    pub mod geometry;
    pub mod channel;
    pub mod slice;
    pub mod blob;
    pub mod measure;
}

// graph module
pub mod graph {
    pub mod node;
    pub mod event;
    pub mod directed;
    pub mod components;
    pub mod builder;
}

pub mod error;
