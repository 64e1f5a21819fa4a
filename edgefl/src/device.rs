//! Device identity for reports. Resolved per report; never fails.

#[cfg(target_os = "linux")]
use std::fs;
#[cfg(target_os = "linux")]
use std::path::Path;

pub const UNKNOWN_DEVICE: &str = "unknown-device";

pub trait DeviceResolver: Send + Sync {
    fn resolve(&self) -> String;
}

/// `"{vendor}-{model}"` from firmware tables when available, else the host name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDevice;

impl DeviceResolver for SystemDevice {
    fn resolve(&self) -> String {
        #[cfg(target_os = "linux")]
        {
            if let Some(id) = vendor_model(Path::new("/sys/class/dmi/id")) {
                return id;
            }
        }
        sysinfo::System::host_name()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE.into())
    }
}

/// Fixed id, e.g. from configuration.
#[derive(Debug, Clone)]
pub struct FixedDevice(pub String);

impl DeviceResolver for FixedDevice {
    fn resolve(&self) -> String {
        if self.0.trim().is_empty() {
            UNKNOWN_DEVICE.into()
        } else {
            self.0.clone()
        }
    }
}

#[cfg(target_os = "linux")]
fn vendor_model(dmi: &Path) -> Option<String> {
    let read = |name: &str| {
        fs::read_to_string(dmi.join(name))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let vendor = read("sys_vendor")?;
    let model = read("product_name")?;
    Some(format!("{vendor}-{model}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_device_never_empty() {
        assert!(!SystemDevice.resolve().is_empty());
    }

    #[test]
    fn blank_fixed_id_falls_back() {
        assert_eq!(FixedDevice("  ".into()).resolve(), UNKNOWN_DEVICE);
        assert_eq!(FixedDevice("lab-7".into()).resolve(), "lab-7");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn vendor_model_joins_dmi_fields() {
        let td = tempfile::tempdir().unwrap();
        fs::write(td.path().join("sys_vendor"), "Acme\n").unwrap();
        assert_eq!(vendor_model(td.path()), None);
        fs::write(td.path().join("product_name"), "Pocket 3\n").unwrap();
        assert_eq!(vendor_model(td.path()).as_deref(), Some("Acme-Pocket 3"));
    }
}
