pub mod api;
pub mod error;
pub mod ids;
pub mod path;
pub mod time;
pub mod value;

pub use api::*;
pub use error::{StrataError, StrataResult};
pub use ids::*;
pub use path::{Observed, Snapshot, SnapshotNode, StoredLeaf, flatten, unflatten};
pub use time::*;
pub use value::*;
