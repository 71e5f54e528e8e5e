//! Interface statistics: the status record type, the sysfs counter reader,
//! and the link activator.

pub mod activate;
pub mod record;
pub mod sysfs;

pub use activate::LinkActivator;
pub use record::{InterfaceCounters, StatusRecord};
pub use sysfs::SysfsReader;
