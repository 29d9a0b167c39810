pub(crate) mod report;
pub(crate) mod shared;
pub(crate) mod sync;
