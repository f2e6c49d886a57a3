//! The visible-pack engine.
//!
//! - **pack**: immutable data/visible pack value types
//! - **filterer**: filter specification → visible pack
//! - **refresher**: single-writer controller serializing session requests
//! - **snapshot**: memory-bounded packs for inactive sessions

mod filterer;
mod pack;
mod refresher;
mod snapshot;

pub use filterer::{CancelToken, Cancelled, Filterer};
pub use pack::{DataPack, DataPackBuilder, RootInfo, VisiblePack};
pub use refresher::{ListenerId, VisiblePackRefresher};
pub use snapshot::{SNAPSHOT_WINDOW, build_snapshot};
