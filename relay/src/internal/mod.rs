pub(crate) mod head_watch;
pub(crate) mod observers;
pub(crate) mod signal;
