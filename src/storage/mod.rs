mod interner;

pub use interner::CommitStorage;
