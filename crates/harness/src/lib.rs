pub mod fixture;

pub use fixture::{ACTOR, DAY, NOW, TestEngine, init_logging};
