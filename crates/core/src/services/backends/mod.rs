pub mod pahole;

pub use pahole::Pahole;
