use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImgError;

/// Decides which slice separations are searched for blob-blob adjacency and
/// how much slack the overlap test gets at each separation.
pub trait GeomClusteringPolicy {
    /// Largest relative slice separation, in units of slice span, considered.
    fn max_rel_diff(&self) -> i32;

    /// Index tolerance for a relative separation, `None` if not searched.
    fn tolerance(&self, rel_diff: i32) -> Option<i32>;

    /// Only join blobs of slices that follow each other in time order.
    fn adjacent_only(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringPolicy {
    Simple,
    Uboone,
    UbooneLocal,
}

impl GeomClusteringPolicy for ClusteringPolicy {
    fn max_rel_diff(&self) -> i32 {
        match self {
            ClusteringPolicy::Simple => 1,
            ClusteringPolicy::Uboone | ClusteringPolicy::UbooneLocal => 2,
        }
    }

    fn tolerance(&self, rel_diff: i32) -> Option<i32> {
        match (self, rel_diff) {
            (ClusteringPolicy::Simple, 1) => Some(0),
            (ClusteringPolicy::Uboone, 1) => Some(2),
            (ClusteringPolicy::Uboone, 2) => Some(1),
            (ClusteringPolicy::UbooneLocal, 1 | 2) => Some(2),
            _ => None,
        }
    }

    fn adjacent_only(&self) -> bool {
        matches!(self, ClusteringPolicy::UbooneLocal)
    }
}

impl FromStr for ClusteringPolicy {
    type Err = ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(ClusteringPolicy::Simple),
            "uboone" => Ok(ClusteringPolicy::Uboone),
            "uboone_local" => Ok(ClusteringPolicy::UbooneLocal),
            other => Err(ImgError::config(format!("unknown geometric clustering policy '{}'", other))),
        }
    }
}

impl fmt::Display for ClusteringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusteringPolicy::Simple => "simple",
            ClusteringPolicy::Uboone => "uboone",
            ClusteringPolicy::UbooneLocal => "uboone_local",
        };
        write!(f, "{}", name)
    }
}
