pub mod cell;
pub mod coord;
pub mod error;
pub mod token;
pub mod value;

pub use cell::*;
pub use coord::{A1ParseError, Coord, CoordError, RelativeCoord};
pub use error::*;
pub use token::*;
pub use value::*;
