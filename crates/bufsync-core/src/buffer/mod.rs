//! Buffer operations built on a [`HostSession`](crate::host::HostSession).
//!
//! - [`open`]: resolve a name to a live buffer, escaping host-unsafe characters
//! - [`ensure`] and [`modifiable`]: scoped guards that always restore
//! - [`append`], [`replace`], [`assign`]: content mutators
//! - [`concrete`]: make in-memory content survive a reload

pub mod concrete;
pub mod guard;
pub mod mutate;
pub mod open;

pub use concrete::concrete;
pub use guard::{ensure, modifiable, with_guard, BufferFocus, ModifiableFlag, ScopedState};
pub use mutate::{append, assign, decode_for, dump, replace, AppendOptions, ReplaceOptions};
pub use open::{escape_buffer_name, open, OpenOptions, Opener};
