// ── procfs and sysfs access ──
//
// Interface enumeration, kernel tunables and USB power control are all
// plain files. Roots are configurable so tests can point them at a
// temporary directory.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use revtether_core::InterfaceSnapshot;

use crate::error::HostError;

pub const NET_CLASS_ROOT: &str = "/sys/class/net";
pub const PROC_SYS_ROOT: &str = "/proc/sys";

const POWER_CONTROL: &str = "power/control";
/// Present on USB device nodes, absent on their interface children.
const USB_DEVICE_MARKER: &str = "idVendor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysFs {
    net_root: PathBuf,
    proc_sys: PathBuf,
}

impl Default for SysFs {
    fn default() -> Self {
        Self::new(NET_CLASS_ROOT, PROC_SYS_ROOT)
    }
}

impl SysFs {
    pub fn new(net_root: impl Into<PathBuf>, proc_sys: impl Into<PathBuf>) -> Self {
        Self {
            net_root: net_root.into(),
            proc_sys: proc_sys.into(),
        }
    }

    /// `net.ipv4.tcp_rmem` → `/proc/sys/net/ipv4/tcp_rmem`.
    pub fn tunable_path(&self, key: &str) -> PathBuf {
        self.proc_sys.join(key.replace('.', "/"))
    }

    pub async fn list_interfaces(&self) -> Result<InterfaceSnapshot, HostError> {
        let mut entries = tokio::fs::read_dir(&self.net_root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names.into_iter().collect())
    }

    pub async fn read_tunable(&self, key: &str) -> Result<Option<String>, HostError> {
        match tokio::fs::read_to_string(self.tunable_path(key)).await {
            Ok(value) => Ok(Some(value.trim().to_owned())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write_tunable(&self, key: &str, value: &str) -> Result<(), HostError> {
        let path = self.tunable_path(key);
        debug!(path = %path.display(), value, "writing tunable");
        tokio::fs::write(&path, format!("{value}\n")).await?;
        Ok(())
    }

    /// The `power/control` file of the USB device behind `interface`,
    /// found by walking up from `/sys/class/net/<if>/device`.
    pub async fn usb_power_control(&self, interface: &str) -> Result<Option<PathBuf>, HostError> {
        let link = self.net_root.join(interface).join("device");
        let device = match tokio::fs::canonicalize(&link).await {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(find_power_control(&device).await)
    }

    pub async fn write_power(&self, path: &Path, value: &str) -> Result<(), HostError> {
        debug!(path = %path.display(), value, "writing power control");
        tokio::fs::write(path, value).await?;
        Ok(())
    }

    /// Copy `source` over `target`, following a symlinked target.
    pub async fn replace_file(&self, source: &Path, target: &Path) -> Result<(), HostError> {
        debug!(from = %source.display(), to = %target.display(), "replacing file");
        tokio::fs::copy(source, target).await?;
        Ok(())
    }
}

/// First ancestor of `device` (itself included) that is a USB device
/// with a power control file. Falls back to the first ancestor with a
/// power control file at all.
async fn find_power_control(device: &Path) -> Option<PathBuf> {
    let mut fallback = None;
    for dir in device.ancestors() {
        let control = dir.join(POWER_CONTROL);
        if !exists(&control).await {
            continue;
        }
        if exists(&dir.join(USB_DEVICE_MARKER)).await {
            return Some(control);
        }
        if fallback.is_none() {
            fallback = Some(control);
        }
    }
    fallback
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    fn fake_sysfs(dir: &Path) -> SysFs {
        let usb = dir.join("devices/pci0000:00/usb1/1-2");
        let iface = usb.join("1-2:1.0");
        fs::create_dir_all(iface.join("power")).unwrap();
        fs::write(iface.join("power/runtime_status"), "active\n").unwrap();
        fs::create_dir_all(usb.join("power")).unwrap();
        fs::write(usb.join("power/control"), "auto\n").unwrap();
        fs::write(usb.join("idVendor"), "18d1\n").unwrap();

        let net = dir.join("class/net");
        fs::create_dir_all(net.join("usb0")).unwrap();
        fs::create_dir_all(net.join("lo")).unwrap();
        fs::create_dir_all(net.join("eth0")).unwrap();
        std::os::unix::fs::symlink(&iface, net.join("usb0/device")).unwrap();

        fs::create_dir_all(dir.join("proc/net/ipv4")).unwrap();
        fs::write(
            dir.join("proc/net/ipv4/tcp_available_congestion_control"),
            "reno cubic bbr\n",
        )
        .unwrap();

        SysFs::new(net, dir.join("proc"))
    }

    #[tokio::test]
    async fn lists_interfaces_without_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let sys = fake_sysfs(dir.path());
        let snapshot = sys.list_interfaces().await.unwrap();
        assert_eq!(snapshot.names().collect::<Vec<_>>(), ["eth0", "usb0"]);
    }

    #[tokio::test]
    async fn tunables_map_dots_to_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sys = fake_sysfs(dir.path());

        assert_eq!(
            sys.read_tunable("net.ipv4.tcp_available_congestion_control")
                .await
                .unwrap()
                .as_deref(),
            Some("reno cubic bbr")
        );
        assert_eq!(sys.read_tunable("net.ipv4.nope").await.unwrap(), None);

        sys.write_tunable("net.ipv4.tcp_congestion_control", "bbr")
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("proc/net/ipv4/tcp_congestion_control")).unwrap(),
            "bbr\n"
        );
    }

    #[tokio::test]
    async fn finds_usb_device_power_control() {
        let dir = tempfile::tempdir().unwrap();
        let sys = fake_sysfs(dir.path());

        let control = sys.usb_power_control("usb0").await.unwrap().unwrap();
        assert!(control.ends_with("usb1/1-2/power/control"));

        sys.write_power(&control, "on").await.unwrap();
        assert_eq!(fs::read_to_string(&control).unwrap(), "on");
    }

    #[tokio::test]
    async fn replace_file_overwrites_target() {
        let dir = tempfile::tempdir().unwrap();
        let sys = fake_sysfs(dir.path());
        let staged = dir.path().join("resolv.conf.staging");
        let live = dir.path().join("resolv.conf");
        fs::write(&staged, "nameserver 8.8.8.8\n").unwrap();
        fs::write(&live, "nameserver 192.168.1.1\n").unwrap();

        sys.replace_file(&staged, &live).await.unwrap();
        assert_eq!(fs::read_to_string(&live).unwrap(), "nameserver 8.8.8.8\n");

        let missing = dir.path().join("gone");
        assert!(sys.replace_file(&missing, &live).await.is_err());
    }

    #[tokio::test]
    async fn virtual_interface_has_no_power_control() {
        let dir = tempfile::tempdir().unwrap();
        let sys = fake_sysfs(dir.path());
        assert_eq!(sys.usb_power_control("eth0").await.unwrap(), None);
        assert_eq!(sys.usb_power_control("usb7").await.unwrap(), None);
    }
}
