pub(crate) mod inspect;
pub(crate) mod invoke;
pub(crate) mod weave;
