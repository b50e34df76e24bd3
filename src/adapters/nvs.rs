//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`DurableStore`] for the dispense
//! counter.  Both records are `postcard` blobs in one namespace:
//!
//! | Key        | Record                 |
//! |------------|------------------------|
//! | `devcfg`   | [`DeviceConfig`]       |
//! | `counters` | [`PersistedConfig`]    |
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`, so
//!   a power cut mid-save leaves the previous record readable.

use crate::app::ports::{ConfigError, ConfigPort, DurableStore, StoreError};
use crate::config::DeviceConfig;
use crate::store::PersistedConfig;
use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use core::ffi::CStr;

const NAMESPACE: &str = "dispense";
const CONFIG_KEY: &str = "devcfg";
const COUNTERS_KEY: &str = "counters";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

/// Longest transmit interval accepted (one day).
const MAX_TX_INTERVAL_SECS: u32 = 86_400;
/// Highest sub-band index (US915 has 8 blocks of 8 channels).
const MAX_SUB_BAND: u8 = 8;

/// Low-level failure from the blob backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlobError {
    NotFound,
    Full,
    Io,
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<&'static str, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t
            {
                warn!("NVS: erasing and re-initialising flash partition");
                let ret2 = unsafe { nvs_flash_erase() };
                if ret2 != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
                let ret3 = unsafe { nvs_flash_init() };
                if ret3 != ESP_OK as esp_err_t {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as esp_err_t {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    // ── Blob backend: simulation ──────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &'static str) -> Result<Vec<u8>, BlobError> {
        self.store
            .borrow()
            .get(key)
            .cloned()
            .ok_or(BlobError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, key: &'static str, bytes: &[u8]) -> Result<(), BlobError> {
        self.store.borrow_mut().insert(key, bytes.to_vec());
        Ok(())
    }

    // ── Blob backend: ESP-IDF ─────────────────────────────────

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, esp_err_t>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = NAMESPACE.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as esp_err_t {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn key_cstr(key: &'static str) -> &'static CStr {
        match key {
            CONFIG_KEY => c"devcfg",
            _ => c"counters",
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &'static str) -> Result<Vec<u8>, BlobError> {
        let key_cstr = Self::key_cstr(key);
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(handle, key_cstr.as_ptr(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_cstr.as_ptr(),
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(buf)
        });
        result.map_err(|e| match e {
            e if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => BlobError::NotFound,
            _ => {
                warn!("NvsAdapter: read '{}' failed ({})", key, e);
                BlobError::Io
            }
        })
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, key: &'static str, bytes: &[u8]) -> Result<(), BlobError> {
        let key_cstr = Self::key_cstr(key);
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_cstr.as_ptr(),
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsAdapter: write '{}' failed ({})", key, e);
            match e {
                e if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as esp_err_t => BlobError::Full,
                _ => BlobError::Io,
            }
        })
    }
}

pub(crate) fn validate_config(cfg: &DeviceConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_TX_INTERVAL_SECS).contains(&cfg.tx_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "tx_interval_secs must be 1–86400",
        ));
    }
    if !(1..=u32::from(u16::MAX)).contains(&cfg.full_dispense_count) {
        return Err(ConfigError::ValidationFailed(
            "full_dispense_count must be 1–65535",
        ));
    }
    if cfg.network.frequency_sub_band > MAX_SUB_BAND {
        return Err(ConfigError::ValidationFailed(
            "frequency_sub_band must be 0–8",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        match self.read_blob(CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: DeviceConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                validate_config(&cfg)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(BlobError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(DeviceConfig::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(CONFIG_KEY, &bytes)
            .map_err(|_| ConfigError::IoError)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl DurableStore for NvsAdapter {
    fn load(&self) -> Result<Option<PersistedConfig>, StoreError> {
        match self.read_blob(COUNTERS_KEY) {
            Ok(bytes) => postcard::from_bytes(&bytes)
                .map(Some)
                .map_err(|_| StoreError::Corrupted),
            Err(BlobError::NotFound) => Ok(None),
            Err(BlobError::Full) => Err(StoreError::Full),
            Err(BlobError::Io) => Err(StoreError::Io),
        }
    }

    fn save(&self, record: &PersistedConfig) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(record).map_err(|_| StoreError::Io)?;
        self.write_blob(COUNTERS_KEY, &bytes).map_err(|e| match e {
            BlobError::Full => StoreError::Full,
            _ => StoreError::Io,
        })
    }
}
