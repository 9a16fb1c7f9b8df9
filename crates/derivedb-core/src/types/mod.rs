mod key;
mod stamps;

pub use key::Key;
pub use stamps::Stamps;
