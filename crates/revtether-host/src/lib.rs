// revtether-host: the real collaborators behind revtether-core's
// capability traits (adb, iproute2, ping, procfs/sysfs, HTTP).

pub mod adb;
pub mod error;
pub mod iproute;
pub mod linux;
pub mod ping;
pub mod process;
pub mod speedtest;
pub mod sysfs;

pub use adb::AdbExecutor;
pub use error::HostError;
pub use iproute::IpRoute;
pub use linux::{HostOptions, LinuxHost, capabilities};
pub use ping::Ping;
pub use process::{CommandOutput, ProcessRunner};
pub use speedtest::{DEFAULT_SPEEDTEST_URL, HttpThroughputProbe};
pub use sysfs::SysFs;
