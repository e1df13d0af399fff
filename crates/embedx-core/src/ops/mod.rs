pub mod cast;
pub mod change;

pub use cast::{cast, CastOutcome};
pub use change::{change, ChangeInput, EmbedInput};
