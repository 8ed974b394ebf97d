pub(crate) mod migrate;
pub(crate) mod parse;
pub(crate) mod status;
pub(crate) mod tick;
