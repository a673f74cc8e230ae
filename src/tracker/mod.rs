//!  Time tracking is organized around [store::SessionStore].
//!  The basic idea is:
//!   - A finished span of work is a [entities::Session], billed under one category.
//!   - Sessions come either from the [timer::Timer] or from manual entry through
//!     [entry::SessionDraft].
//!   - All sessions are kept as one json document under a single key of a [store::KeyValueStore].

pub mod entities;
pub mod entry;
pub mod runner;
pub mod store;
pub mod timer;
