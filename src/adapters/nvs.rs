//! NVS (Non-Volatile Storage) settings adapter.
//!
//! Implements [`ConfigPort`]: the configuration is serialised with
//! `postcard` and wrapped with an HMAC-SHA256 tag before it goes to flash.
//! The tag is an integrity check against bit rot and torn writes — the key
//! is a fixed device constant, not a secret.  A blob that fails the check
//! is reported as [`ConfigError::Corrupted`] and the caller falls back to
//! defaults instead of running with half-written calibration.
//!
//! On the host target the flash is replaced by an in-memory map so the
//! same adapter drives simulation and integration tests.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

#[cfg(not(target_os = "espidf"))]
use std::cell::RefCell;
#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "radmeter";
const CONFIG_KEY: &str = "syscfg";

/// HMAC tag length prefixed to the stored blob.
const TAG_LEN: usize = 32;

/// Fixed integrity key.  Shared across all units; changing it invalidates
/// every stored config (useful for breaking format changes).
const INTEGRITY_KEY: &[u8] = b"radmeter-settings-v1";

#[allow(dead_code)]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<HashMap<String, Vec<u8>>>,
}

impl Default for NvsAdapter {
    /// Storage-less fallback used when flash init fails: load returns
    /// defaults, save reaches the backend and fails there.
    fn default() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: RefCell::new(HashMap::new()),
        }
    }
}

impl NvsAdapter {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after an NVS version mismatch the partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self::default())
    }

    /// Wrap a serialised config: `tag(32) || payload`.
    fn seal(payload: &[u8]) -> Vec<u8> {
        let tag = hmac_sha256::HMAC::mac(payload, INTEGRITY_KEY);
        let mut blob = Vec::with_capacity(TAG_LEN + payload.len());
        blob.extend_from_slice(&tag);
        blob.extend_from_slice(payload);
        blob
    }

    /// Check and strip the integrity tag.
    fn unseal(blob: &[u8]) -> Result<&[u8], ConfigError> {
        if blob.len() < TAG_LEN {
            return Err(ConfigError::Corrupted);
        }
        let (tag, payload) = blob.split_at(TAG_LEN);
        let expected = hmac_sha256::HMAC::mac(payload, INTEGRITY_KEY);
        // Plain comparison: the tag guards against corruption, not forgery.
        if tag == expected {
            Ok(payload)
        } else {
            Err(ConfigError::Corrupted)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = CONFIG_NAMESPACE.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// Range-check every field before it reaches flash.
fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !(1..=60).contains(&cfg.integration_time_secs) {
        return Err(ConfigError::ValidationFailed(
            "integration_time_secs must be 1–60",
        ));
    }
    if !(cfg.conversion_factor_usvh_per_cpm > 0.0 && cfg.conversion_factor_usvh_per_cpm < 1.0) {
        return Err(ConfigError::ValidationFailed(
            "conversion_factor_usvh_per_cpm must be in (0, 1)",
        ));
    }
    if !(1..=4).contains(&cfg.tube_count) {
        return Err(ConfigError::ValidationFailed("tube_count must be 1–4"));
    }
    if !(10..=10_000).contains(&cfg.tube_dead_time_us) {
        return Err(ConfigError::ValidationFailed(
            "tube_dead_time_us must be 10–10000",
        ));
    }
    if !(10..=10_000).contains(&cfg.coincidence_window_us) {
        return Err(ConfigError::ValidationFailed(
            "coincidence_window_us must be 10–10000",
        ));
    }
    if cfg.rng_maximum < cfg.rng_minimum {
        return Err(ConfigError::ValidationFailed(
            "rng_maximum must be >= rng_minimum",
        ));
    }
    if !(50..=5000).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 50–5000",
        ));
    }
    if !(5..=3600).contains(&cfg.telemetry_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "telemetry_interval_secs must be 5–3600",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key();
            if let Some(blob) = self.store.borrow().get(&key) {
                let payload = Self::unseal(blob)?;
                let cfg: SystemConfig =
                    postcard::from_bytes(payload).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let key_cstr = b"syscfg\0";
                let mut size: usize = 0;

                // First call: get size.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret == ESP_ERR_NVS_NOT_FOUND {
                    return Err(ESP_ERR_NVS_NOT_FOUND);
                }
                if ret != ESP_OK || size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ret);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }

                Ok(buf)
            });

            match result {
                Ok(blob) => {
                    let payload = Self::unseal(&blob)?;
                    let cfg: SystemConfig =
                        postcard::from_bytes(payload).map_err(|_| ConfigError::Corrupted)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", blob.len());
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(SystemConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    Ok(SystemConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;

        let payload = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        let blob = Self::seal(&payload);

        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().insert(Self::composite_key(), blob);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let key_cstr = b"syscfg\0";
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        blob.as_ptr() as *const _,
                        blob.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", blob.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn save_load_roundtrip() {
        let nvs = NvsAdapter::new().unwrap();
        let mut cfg = SystemConfig::default();
        cfg.integration_time_secs = 15;
        cfg.rng_maximum = 20;
        nvs.save(&cfg).unwrap();

        let loaded = nvs.load().unwrap();
        assert_eq!(loaded.integration_time_secs, 15);
        assert_eq!(loaded.rng_maximum, 20);
    }

    #[test]
    fn missing_config_yields_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        let loaded = nvs.load().unwrap();
        assert_eq!(
            loaded.integration_time_secs,
            SystemConfig::default().integration_time_secs
        );
    }

    #[test]
    fn flipped_bit_fails_integrity_check() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.save(&SystemConfig::default()).unwrap();

        {
            let mut store = nvs.store.borrow_mut();
            let blob = store.get_mut(&NvsAdapter::composite_key()).unwrap();
            let last = blob.len() - 1;
            blob[last] ^= 0x01;
        }

        assert!(matches!(nvs.load(), Err(ConfigError::Corrupted)));
    }

    #[test]
    fn truncated_blob_is_corrupted() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.store
            .borrow_mut()
            .insert(NvsAdapter::composite_key(), vec![0u8; 7]);
        assert!(matches!(nvs.load(), Err(ConfigError::Corrupted)));
    }

    #[test]
    fn invalid_config_is_rejected_before_write() {
        let nvs = NvsAdapter::new().unwrap();
        let mut cfg = SystemConfig::default();
        cfg.integration_time_secs = 0;
        assert!(matches!(
            nvs.save(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
        // Nothing landed in the store.
        assert!(nvs.store.borrow().is_empty());
    }

    #[test]
    fn rng_bound_pair_is_validated() {
        let nvs = NvsAdapter::new().unwrap();
        let mut cfg = SystemConfig::default();
        cfg.rng_minimum = 10;
        cfg.rng_maximum = 5;
        assert!(matches!(
            nvs.save(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }
}
