mod alert;
mod child;

pub use alert::{Alert, AlertType, Priority};
pub use child::{ChildRecord, ChildStatus};
