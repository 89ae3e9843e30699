pub mod aggregate;
pub mod clock;
pub mod error;
pub mod ids;
pub mod link;
pub mod timeline;
pub mod value;

pub use error::CoreError;
pub use ids::*;
pub use link::LinkComposition;
pub use timeline::{Interval, Segment};
pub use value::{Data, Value};
