//! SD card file store adapter.
//!
//! Implements [`FileStore`] on top of `std::fs`, rooted at a directory.
//! On ESP-IDF the card is first mounted as FAT over SPI at
//! [`SD_MOUNT_POINT`](crate::pins::SD_MOUNT_POINT) and the VFS layer makes
//! it reachable through `std::fs`; on host the root is any directory
//! (tests use a scratch dir).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{FileStore, StorageError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub struct SdCardStore {
    root: PathBuf,
    open: Option<(String, File)>,
}

impl SdCardStore {
    /// Store rooted at `root`.  The directory must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn open_file(&mut self, name: &str) -> Result<&mut File, StorageError> {
        match &mut self.open {
            Some((open_name, file)) if open_name == name => Ok(file),
            _ => Err(StorageError::NotFound),
        }
    }
}

fn map_io(err: &io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl FileStore for SdCardStore {
    fn exists(&mut self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        fs::remove_file(self.path(name)).map_err(|e| map_io(&e))
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        // FAT rename refuses an existing target; match that on host.
        if self.exists(to) {
            return Err(StorageError::IoError);
        }
        fs::rename(self.path(from), self.path(to)).map_err(|e| map_io(&e))
    }

    fn create(&mut self, name: &str) -> Result<(), StorageError> {
        if let Some((open_name, _)) = &self.open {
            warn!("SD: create({}) while {} still open, closing it", name, open_name);
            self.open = None;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path(name))
            .map_err(|e| map_io(&e))?;
        self.open = Some((name.to_string(), file));
        Ok(())
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        self.open_file(name)?.write_all(data).map_err(|e| map_io(&e))
    }

    fn sync(&mut self, name: &str) -> Result<(), StorageError> {
        let file = self.open_file(name)?;
        file.flush().map_err(|e| map_io(&e))?;
        file.sync_all().map_err(|e| map_io(&e))
    }

    fn close(&mut self, name: &str) -> Result<(), StorageError> {
        self.open_file(name)?;
        self.open = None;
        Ok(())
    }

    fn read_at(&mut self, name: &str, offset: usize, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut file = File::open(self.path(name)).map_err(|e| map_io(&e))?;
        file.seek(SeekFrom::Start(offset as u64)).map_err(|e| map_io(&e))?;
        file.read(buf).map_err(|e| map_io(&e))
    }
}

// ── Mount (ESP-IDF only) ──────────────────────────────────────

/// Errors from bringing up the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    SpiBusFailed(i32),
    MountFailed(i32),
}

impl core::fmt::Display for MountError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SpiBusFailed(rc) => write!(f, "SD SPI bus init failed (rc={})", rc),
            Self::MountFailed(rc) => write!(f, "SD FAT mount failed (rc={})", rc),
        }
    }
}

/// Mount the card at [`SD_MOUNT_POINT`](crate::pins::SD_MOUNT_POINT).
/// Never formats: a card that does not mount is reported, not wiped.
#[cfg(target_os = "espidf")]
pub fn mount() -> Result<SdCardStore, MountError> {
    use crate::pins;

    let host_id = spi_host_device_t_SPI2_HOST;

    let bus = spi_bus_config_t {
        __bindgen_anon_1: spi_bus_config_t__bindgen_ty_1 { mosi_io_num: pins::SD_MOSI_GPIO },
        __bindgen_anon_2: spi_bus_config_t__bindgen_ty_2 { miso_io_num: pins::SD_MISO_GPIO },
        sclk_io_num: pins::SD_SCLK_GPIO,
        __bindgen_anon_3: spi_bus_config_t__bindgen_ty_3 { quadwp_io_num: -1 },
        __bindgen_anon_4: spi_bus_config_t__bindgen_ty_4 { quadhd_io_num: -1 },
        max_transfer_sz: 4000,
        ..Default::default()
    };
    // SAFETY: called once from main() before the control loop.
    let ret = unsafe { spi_bus_initialize(host_id, &bus, spi_common_dma_t_SPI_DMA_CH_AUTO) };
    if ret != ESP_OK as i32 {
        return Err(MountError::SpiBusFailed(ret));
    }

    let host = sdmmc_host_t {
        flags: SDMMC_HOST_FLAG_SPI | SDMMC_HOST_FLAG_DEINIT_ARG,
        slot: host_id as i32,
        max_freq_khz: SDMMC_FREQ_DEFAULT as i32,
        io_voltage: 3.3,
        init: Some(sdspi_host_init),
        set_card_clk: Some(sdspi_host_set_card_clk),
        do_transaction: Some(sdspi_host_do_transaction),
        __bindgen_anon_1: sdmmc_host_t__bindgen_ty_1 {
            deinit_p: Some(sdspi_host_remove_device),
        },
        io_int_enable: Some(sdspi_host_io_int_enable),
        io_int_wait: Some(sdspi_host_io_int_wait),
        get_real_freq: Some(sdspi_host_get_real_freq),
        ..Default::default()
    };

    let slot = sdspi_device_config_t {
        host_id,
        gpio_cs: pins::SD_CS_GPIO,
        gpio_cd: -1,
        gpio_wp: -1,
        gpio_int: -1,
        ..Default::default()
    };

    let mount_cfg = esp_vfs_fat_mount_config_t {
        format_if_mount_failed: false,
        max_files: 4,
        allocation_unit_size: 16 * 1024,
        ..Default::default()
    };

    let mut card: *mut sdmmc_card_t = core::ptr::null_mut();
    // SAFETY: all config structs outlive the call; the mount point is a
    // NUL-terminated literal.
    let ret = unsafe {
        esp_vfs_fat_sdspi_mount(c"/sdcard".as_ptr(), &host, &slot, &mount_cfg, &mut card)
    };
    if ret != ESP_OK as i32 {
        return Err(MountError::MountFailed(ret));
    }

    info!("SD: mounted at {}", pins::SD_MOUNT_POINT);
    Ok(SdCardStore::new(pins::SD_MOUNT_POINT))
}

/// Host build: the "card" is a scratch directory under the system temp dir.
#[cfg(not(target_os = "espidf"))]
pub fn mount() -> Result<SdCardStore, MountError> {
    let root = std::env::temp_dir().join("meddispenser-sd");
    fs::create_dir_all(&root).map_err(|e| MountError::MountFailed(e.raw_os_error().unwrap_or(-1)))?;
    info!("SD(sim): rooted at {}", root.display());
    Ok(SdCardStore::new(root))
}
