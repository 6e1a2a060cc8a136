//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`NonVolatileStore`] and [`ConfigPort`] for the node.
//!
//! The byte store is a RAM image of a small EEPROM: reads and writes hit
//! the image and [`NvsAdapter::flush`] commits a changed image as one NVS
//! blob. The host build keeps blobs in a map so the simulator and tests
//! share the same code path.
//!
//! - Config validation: fields are range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use log::{debug, info};

#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort, NV_ERASED, NonVolatileStore};
use crate::config::NodeConfig;
use crate::error::Error;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "radvalve";
const CONFIG_KEY: &str = "nodecfg";
#[cfg(not(target_os = "espidf"))]
const IMAGE_KEY: &str = "eeprom";

/// Size of the byte store image.
pub const NV_IMAGE_SIZE: usize = 1024;

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsAdapter {
    image: [u8; NV_IMAGE_SIZE],
    dirty: bool,
    /// Physical byte writes and erases since creation.
    wear: u32,
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl NvsAdapter {
    /// A blank store: every byte erased, no config saved.
    pub fn new() -> Self {
        Self {
            image: [NV_ERASED; NV_IMAGE_SIZE],
            dirty: false,
            wear: 0,
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }

    /// Initialise NVS flash and load the saved byte image, if any.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised.
    #[cfg(target_os = "espidf")]
    pub fn open() -> Result<Self, ConfigError> {
        // SAFETY: called from the single main-task context before any
        // other NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                return Err(ConfigError::IoError);
            }
        } else if ret != ESP_OK {
            return Err(ConfigError::IoError);
        }

        let mut adapter = Self::new();
        let loaded = Self::with_nvs_handle(NAMESPACE, false, |handle| {
            let mut size = NV_IMAGE_SIZE;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    b"eeprom\0".as_ptr() as *const _,
                    adapter.image.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        });
        match loaded {
            Ok(size) => info!("NvsAdapter: loaded {} byte image", size),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => info!("NvsAdapter: blank image"),
            Err(e) => {
                warn!("NvsAdapter: image read error {}, starting blank", e);
                adapter.image = [NV_ERASED; NV_IMAGE_SIZE];
            }
        }
        Ok(adapter)
    }

    /// Host builds have no flash to open.
    #[cfg(not(target_os = "espidf"))]
    pub fn open() -> Result<Self, ConfigError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self::new())
    }

    /// Physical writes and erases so far.
    pub fn wear(&self) -> u32 {
        self.wear
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Commit the image if anything changed since the last flush.
    pub fn flush(&mut self) -> Result<(), ConfigError> {
        if !self.dirty {
            return Ok(());
        }
        self.put_blob_image()?;
        self.dirty = false;
        debug!("NvsAdapter: image committed");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn put_blob_image(&self) -> Result<(), ConfigError> {
        let key = Self::composite_key(NAMESPACE, IMAGE_KEY);
        self.store.borrow_mut().insert(key, self.image.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn put_blob_image(&self) -> Result<(), ConfigError> {
        Self::with_nvs_handle(NAMESPACE, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    b"eeprom\0".as_ptr() as *const _,
                    self.image.as_ptr() as *const _,
                    self.image.len(),
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
        })
        .map_err(|e| {
            warn!("NvsAdapter: image write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
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

// ── Byte store ─────────────────────────────────────────────────

impl NonVolatileStore for NvsAdapter {
    fn read_byte(&self, addr: u16) -> u8 {
        self.image.get(usize::from(addr)).copied().unwrap_or(NV_ERASED)
    }

    fn smart_update_byte(&mut self, addr: u16, value: u8) -> bool {
        let Some(cell) = self.image.get_mut(usize::from(addr)) else {
            return false;
        };
        if *cell == value {
            return false;
        }
        *cell = value;
        self.dirty = true;
        self.wear += 1;
        true
    }

    fn smart_erase_byte(&mut self, addr: u16) -> bool {
        self.smart_update_byte(addr, NV_ERASED)
    }
}

// ── Config blob ────────────────────────────────────────────────

fn validate_config(cfg: &NodeConfig) -> Result<(), ConfigError> {
    cfg.validate().map_err(|e| match e {
        Error::Config(msg) => ConfigError::ValidationFailed(msg),
        _ => ConfigError::ValidationFailed("invalid config"),
    })
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(NAMESPACE, CONFIG_KEY);
            if let Some(bytes) = self.store.borrow().get(&key) {
                let cfg: NodeConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                validate_config(&cfg)?;
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(NodeConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(NAMESPACE, false, |handle| {
                let key_cstr = b"nodecfg\0";
                let mut buf = [0u8; MAX_BLOB_SIZE];
                let mut size = buf.len();
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
                Ok((buf, size))
            });

            match result {
                Ok((buf, size)) => {
                    let cfg: NodeConfig =
                        postcard::from_bytes(&buf[..size]).map_err(|_| ConfigError::Corrupted)?;
                    validate_config(&cfg)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", size);
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(NodeConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    Ok(NodeConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(NAMESPACE, CONFIG_KEY);
            let len = bytes.len();
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved ({} bytes, simulation)", len);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(NAMESPACE, true, |handle| {
                let key_cstr = b"nodecfg\0";
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
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
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
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
