pub mod board;
pub mod dt;
pub mod pod;
pub mod preset;

pub use board::*;
pub use dt::*;
pub use pod::*;
pub use preset::*;
