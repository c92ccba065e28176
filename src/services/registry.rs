//! Registry store backends.
//!
//! The updater only needs to find textual values mentioning a path and to
//! write a value back with its declared type. `WindowsRegistry` does that
//! against the live registry; `MemoryRegistry` keeps values in a map and is
//! used on other hosts and in tests.

use crate::models::registry::RegistryReference;
use crate::Result;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Access to registry values.
pub trait RegistryStore: Send + Sync {
    /// Textual values whose data contains `needle` (case-insensitive).
    fn find_references(&self, needle: &str) -> Result<Vec<RegistryReference>>;

    /// Write `reference.value_data` with `reference.value_type`.
    fn write_value(&self, reference: &RegistryReference) -> Result<()>;

    /// Backend label for diagnostics.
    fn backend_name(&self) -> &'static str;
}

type ValueKey = (String, String);

fn value_key(key_path: &str, value_name: &str) -> ValueKey {
    (key_path.to_lowercase(), value_name.to_lowercase())
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    values: Mutex<BTreeMap<ValueKey, RegistryReference>>,
    denied: Mutex<HashSet<ValueKey>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: impl IntoIterator<Item = RegistryReference>) -> Self {
        let registry = Self::new();
        for value in values {
            registry.insert(value);
        }
        registry
    }

    pub fn insert(&self, reference: RegistryReference) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(value_key(&reference.key_path, &reference.value_name), reference);
        }
    }

    pub fn get(&self, key_path: &str, value_name: &str) -> Option<RegistryReference> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(&value_key(key_path, value_name)).cloned())
    }

    /// Make writes to a value fail with permission denied.
    pub fn deny_writes(&self, key_path: &str, value_name: &str) {
        if let Ok(mut denied) = self.denied.lock() {
            denied.insert(value_key(key_path, value_name));
        }
    }
}

impl RegistryStore for MemoryRegistry {
    fn find_references(&self, needle: &str) -> Result<Vec<RegistryReference>> {
        let needle = needle.to_lowercase();
        let values = self
            .values
            .lock()
            .map_err(|_| crate::Error::other("registry lock poisoned"))?;
        Ok(values
            .values()
            .filter(|r| r.value_type.is_textual() && r.value_data.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn write_value(&self, reference: &RegistryReference) -> Result<()> {
        let key = value_key(&reference.key_path, &reference.value_name);
        let denied = self
            .denied
            .lock()
            .map_err(|_| crate::Error::other("registry lock poisoned"))?
            .contains(&key);
        if denied {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("access denied: {}", reference.location()),
            )));
        }

        let mut values = self
            .values
            .lock()
            .map_err(|_| crate::Error::other("registry lock poisoned"))?;
        values.insert(key, reference.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(windows)]
pub use windows::WindowsRegistry;

#[cfg(windows)]
mod windows {
    use super::RegistryStore;
    use crate::models::registry::{RegistryReference, RegistryValueType};
    use crate::Result;
    use winreg::enums::*;
    use winreg::types::FromRegValue;
    use winreg::{RegKey, RegValue};

    const MAX_DEPTH: usize = 4;

    /// Live Windows registry, scanning a fixed set of key roots.
    #[derive(Debug, Clone)]
    pub struct WindowsRegistry {
        roots: Vec<String>,
    }

    impl WindowsRegistry {
        pub fn new(roots: Vec<String>) -> Self {
            Self { roots }
        }
    }

    /// Split `HKLM\SOFTWARE\...` into its predefined hive and subkey.
    fn open_hive(key_path: &str) -> Result<(RegKey, &str)> {
        let (hive, sub) = key_path.split_once('\\').unwrap_or((key_path, ""));
        let predef = match hive.to_uppercase().as_str() {
            "HKLM" | "HKEY_LOCAL_MACHINE" => HKEY_LOCAL_MACHINE,
            "HKCU" | "HKEY_CURRENT_USER" => HKEY_CURRENT_USER,
            "HKCR" | "HKEY_CLASSES_ROOT" => HKEY_CLASSES_ROOT,
            "HKU" | "HKEY_USERS" => HKEY_USERS,
            other => {
                return Err(crate::Error::RegistryUpdate(format!("unknown hive: {}", other)));
            }
        };
        Ok((RegKey::predef(predef), sub))
    }

    fn textual(value: &RegValue) -> Option<(String, RegistryValueType)> {
        match value.vtype {
            REG_SZ => String::from_reg_value(value).ok().map(|s| (s, RegistryValueType::String)),
            REG_EXPAND_SZ => String::from_reg_value(value)
                .ok()
                .map(|s| (s, RegistryValueType::ExpandString)),
            REG_MULTI_SZ => Vec::<String>::from_reg_value(value)
                .ok()
                .map(|v| (v.join("\n"), RegistryValueType::MultiString)),
            _ => None,
        }
    }

    fn walk(key: &RegKey, path: &str, depth: usize, needle: &str, out: &mut Vec<RegistryReference>) {
        for (name, value) in key.enum_values().filter_map(|v| v.ok()) {
            if let Some((data, value_type)) = textual(&value) {
                if data.to_lowercase().contains(needle) {
                    out.push(RegistryReference::new(path, name, data, value_type));
                }
            }
        }

        if depth >= MAX_DEPTH {
            return;
        }
        for sub in key.enum_keys().filter_map(|k| k.ok()) {
            if let Ok(child) = key.open_subkey_with_flags(&sub, KEY_READ) {
                walk(&child, &format!("{}\\{}", path, sub), depth + 1, needle, out);
            }
        }
    }

    fn utf16_bytes(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|u| u.to_le_bytes())
            .collect()
    }

    impl RegistryStore for WindowsRegistry {
        fn find_references(&self, needle: &str) -> Result<Vec<RegistryReference>> {
            let needle = needle.to_lowercase();
            let mut out = Vec::new();
            for root in &self.roots {
                let (hive, sub) = open_hive(root)?;
                match hive.open_subkey_with_flags(sub, KEY_READ) {
                    Ok(key) => walk(&key, root, 0, &needle, &mut out),
                    Err(e) => tracing::debug!("Skipping registry root {}: {}", root, e),
                }
            }
            Ok(out)
        }

        fn write_value(&self, reference: &RegistryReference) -> Result<()> {
            let (hive, sub) = open_hive(&reference.key_path)?;
            let key = hive.open_subkey_with_flags(sub, KEY_SET_VALUE)?;
            let name = reference.value_name.as_str();
            match reference.value_type {
                RegistryValueType::String => key.set_value(name, &reference.value_data)?,
                RegistryValueType::ExpandString => key.set_raw_value(
                    name,
                    &RegValue {
                        bytes: utf16_bytes(&reference.value_data),
                        vtype: REG_EXPAND_SZ,
                    },
                )?,
                RegistryValueType::MultiString => {
                    let parts: Vec<String> =
                        reference.value_data.split('\n').map(str::to_string).collect();
                    key.set_value(name, &parts)?
                }
                other => {
                    return Err(crate::Error::RegistryUpdate(format!(
                        "{:?} values cannot hold a path: {}",
                        other,
                        reference.location()
                    )));
                }
            }
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "windows"
        }
    }
}
