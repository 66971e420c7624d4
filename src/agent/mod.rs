//! Agent front door: command routing, local tools and autocomplete.

pub mod autocomplete;
pub mod router;
pub mod tools;

pub use autocomplete::Autocompleter;
pub use router::{Agent, Command, parse_command};
