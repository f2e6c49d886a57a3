mod commit;
mod count_stage;
mod filters;
mod refs;

pub use commit::{CommitHash, CommitId, CommitMetadata, RootId};
pub use count_stage::CommitCountStage;
pub use filters::{
    BranchFilter, DateFilter, FilterCollection, HashFilter, RevisionFilter, RootFilter,
    StructureFilter, TextFilter, UserFilter,
};
pub use refs::{RefsModel, VcsRef};
