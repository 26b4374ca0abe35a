//! Mock remote services reachable from sandboxed programs, and the catalog that
//! lets an agent discover them.

pub mod backend;
pub mod call;
pub mod catalog;
pub mod clock;

pub use backend::MockBackend;
pub use call::{CrmOp, DriveOp, MessagingOp, Service, ServiceCall, ServiceError, SheetsOp};
pub use catalog::{Catalog, CatalogError, ToolSpec, TOOLS};
pub use clock::{Clock, FixedClock, SystemClock};
