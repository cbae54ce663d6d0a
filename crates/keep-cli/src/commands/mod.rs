pub(crate) mod auth;
pub(crate) mod note;
pub(crate) mod sync;
pub(crate) mod workspace;
