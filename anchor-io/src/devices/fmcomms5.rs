//! FMCOMMS5 (dual AD9361) radio over libiio and libad9361.
//!
//! Built only with the `fmcomms5` feature; `build.rs` links `libiio` and
//! `libad9361` in that case.
//!
//! # Device map
//!
//! | IIO device | Role |
//! |------------|------|
//! | `ad9361-phy` | Chip A attributes (gain, bandwidth, rate, LO) |
//! | `ad9361-phy-B` | Chip B attributes |
//! | `cf-ad9361-A` | Capture core streaming all RX channels of both chips |
//!
//! The capture core delivers `voltage0..voltage7`: I/Q of RX1/RX2 on chip A,
//! then chip B, interleaved per sample row. Exactly `stream_channels` of them
//! are enabled, starting at `voltage0`.

use crate::core::radio::{RadioCollaborator, RadioSettings, RxStream};
use crate::error::{Error, Result};

use std::ffi::{CString, c_char, c_int, c_longlong, c_uint, c_void};
use std::sync::Arc;

type IioContext = c_void;
type IioDevice = c_void;
type IioChannel = c_void;
type IioBuffer = c_void;

unsafe extern "C" {
    fn iio_create_local_context() -> *mut IioContext;
    fn iio_context_destroy(ctx: *mut IioContext);
    fn iio_context_find_device(ctx: *const IioContext, name: *const c_char) -> *mut IioDevice;
    fn iio_device_find_channel(
        dev: *const IioDevice,
        name: *const c_char,
        output: bool,
    ) -> *mut IioChannel;
    fn iio_channel_attr_write(chn: *const IioChannel, attr: *const c_char, src: *const c_char)
    -> isize;
    fn iio_channel_enable(chn: *mut IioChannel);
    fn iio_device_create_buffer(
        dev: *const IioDevice,
        samples_count: usize,
        cyclic: bool,
    ) -> *mut IioBuffer;
    fn iio_buffer_destroy(buf: *mut IioBuffer);
    fn iio_buffer_refill(buf: *mut IioBuffer) -> isize;
    fn iio_buffer_start(buf: *const IioBuffer) -> *mut c_void;
    fn iio_buffer_end(buf: *const IioBuffer) -> *mut c_void;
    fn iio_device_reg_read(dev: *mut IioDevice, addr: u32, value: *mut u32) -> c_int;
}

unsafe extern "C" {
    fn ad9361_fmcomms5_multichip_sync(ctx: *mut IioContext, flags: c_uint) -> c_int;
    fn ad9361_fmcomms5_phase_sync(ctx: *mut IioContext, lo: c_longlong) -> c_int;
}

const PHY_DEVICES: [&str; 2] = ["ad9361-phy", "ad9361-phy-B"];
const CAPTURE_DEVICE: &str = "cf-ad9361-A";

/// Multi-chip sync flags: FIXUP_INTERFACE_TIMING | CHECK_SAMPLE_RATES
const MCS_FLAGS: c_uint = 3;

/// Capture core status register and its overflow bit
const ADC_STATUS_REG: u32 = 0x8000_0088;
const ADC_STATUS_OVERFLOW: u32 = 1 << 2;

fn cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|e| Error::InvalidParameter(format!("{:?}: {}", s, e)))
}

/// Owned local IIO context
struct Context {
    ptr: *mut IioContext,
}

// The context is only touched from one thread at a time: the supervisor during
// startup, then the acquisition thread through the stream.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    fn find_device(&self, name: &str) -> Result<*mut IioDevice> {
        let cname = cstring(name)?;
        let dev = unsafe { iio_context_find_device(self.ptr, cname.as_ptr()) };
        if dev.is_null() {
            return Err(Error::Radio(format!("IIO device '{}' not found", name)));
        }
        Ok(dev)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { iio_context_destroy(self.ptr) };
    }
}

fn find_channel(dev: *mut IioDevice, name: &str, output: bool) -> Result<*mut IioChannel> {
    let cname = cstring(name)?;
    let chn = unsafe { iio_device_find_channel(dev, cname.as_ptr(), output) };
    if chn.is_null() {
        return Err(Error::Radio(format!(
            "IIO channel '{}' ({}) not found",
            name,
            if output { "output" } else { "input" }
        )));
    }
    Ok(chn)
}

fn write_attr(chn: *mut IioChannel, attr: &str, value: &str) -> Result<()> {
    let cattr = cstring(attr)?;
    let cval = cstring(value)?;
    let ret = unsafe { iio_channel_attr_write(chn, cattr.as_ptr(), cval.as_ptr()) };
    if ret < 0 {
        return Err(Error::Radio(format!(
            "writing {}={} failed: errno {}",
            attr, value, -ret
        )));
    }
    Ok(())
}

/// Capture channel names for `count` scalar streams
fn rx_channel_names(count: usize) -> impl Iterator<Item = String> {
    (0..count).map(|n| format!("voltage{}", n))
}

fn missing_channels(found: usize, wanted: usize) -> Error {
    Error::Radio(format!(
        "{} exposes {} RX channels, {} configured",
        CAPTURE_DEVICE, found, wanted
    ))
}

/// FMCOMMS5 board handle
pub struct Fmcomms5Radio {
    ctx: Arc<Context>,
    center_freq: Option<u64>,
    stream_channels: Option<usize>,
}

impl Fmcomms5Radio {
    /// Open the local IIO context
    pub fn open() -> Result<Self> {
        let ptr = unsafe { iio_create_local_context() };
        if ptr.is_null() {
            return Err(Error::Radio(
                "failed to create local IIO context".to_string(),
            ));
        }
        Ok(Self {
            ctx: Arc::new(Context { ptr }),
            center_freq: None,
            stream_channels: None,
        })
    }
}

impl RadioCollaborator for Fmcomms5Radio {
    fn name(&self) -> &str {
        "fmcomms5"
    }

    fn configure(&mut self, settings: &RadioSettings) -> Result<()> {
        for phy_name in PHY_DEVICES {
            let phy = self.ctx.find_device(phy_name)?;

            for idx in 0..2 {
                let chn = find_channel(phy, &format!("voltage{}", idx), false)?;
                write_attr(chn, "gain_control_mode", &settings.gain_mode)?;
                write_attr(chn, "hardwaregain", &settings.rx_gain_db.to_string())?;

                // Chip-wide attributes live on channel 0
                if idx == 0 {
                    write_attr(chn, "rf_bandwidth", &settings.rf_bandwidth.to_string())?;
                    write_attr(
                        chn,
                        "sampling_frequency",
                        &settings.sample_rate.to_string(),
                    )?;
                    write_attr(chn, "bb_dc_offset_tracking_en", "1")?;
                    write_attr(chn, "rf_dc_offset_tracking_en", "1")?;
                    write_attr(chn, "quadrature_tracking_en", "1")?;
                }
            }

            let rx_lo = find_channel(phy, "altvoltage0", true)?;
            write_attr(rx_lo, "frequency", &settings.center_freq.to_string())?;
            log::info!("{}: RX configured", phy_name);
        }

        self.center_freq = Some(settings.center_freq);
        self.stream_channels = Some(settings.stream_channels);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        let lo = self.center_freq.ok_or_else(|| {
            Error::Radio("synchronize called before configure".to_string())
        })?;

        let status = unsafe { ad9361_fmcomms5_multichip_sync(self.ctx.ptr, MCS_FLAGS) };
        if status != 0 {
            return Err(Error::SynchronizationFailed {
                stage: "multichip",
                status,
            });
        }

        let status = unsafe { ad9361_fmcomms5_phase_sync(self.ctx.ptr, lo as c_longlong) };
        if status != 0 {
            return Err(Error::SynchronizationFailed {
                stage: "phase",
                status,
            });
        }

        log::info!("FMCOMMS5 chips synchronized at LO {} Hz", lo);
        Ok(())
    }

    fn create_stream(&mut self, batch_len: usize) -> Result<Box<dyn RxStream>> {
        let wanted = self.stream_channels.ok_or_else(|| {
            Error::Radio("create_stream called before configure".to_string())
        })?;
        let dev = self.ctx.find_device(CAPTURE_DEVICE)?;

        // Resolve every channel before enabling any
        let mut channels = Vec::with_capacity(wanted);
        for name in rx_channel_names(wanted) {
            let cname = cstring(&name)?;
            let chn = unsafe { iio_device_find_channel(dev, cname.as_ptr(), false) };
            if chn.is_null() {
                return Err(missing_channels(channels.len(), wanted));
            }
            channels.push(chn);
        }
        for &chn in &channels {
            unsafe { iio_channel_enable(chn) };
        }
        let enabled = channels.len();

        let buf = unsafe { iio_device_create_buffer(dev, batch_len, false) };
        if buf.is_null() {
            return Err(Error::Radio(format!(
                "failed to create {}-sample IIO buffer",
                batch_len
            )));
        }

        log::info!(
            "{}: {} channels enabled, buffer {} samples",
            CAPTURE_DEVICE,
            enabled,
            batch_len
        );

        Ok(Box::new(Fmcomms5Stream {
            _ctx: Arc::clone(&self.ctx),
            dev,
            buf,
        }))
    }
}

/// DMA-backed IIO RX buffer
struct Fmcomms5Stream {
    _ctx: Arc<Context>,
    dev: *mut IioDevice,
    buf: *mut IioBuffer,
}

// Moved once into the acquisition thread and used only there.
unsafe impl Send for Fmcomms5Stream {}

impl RxStream for Fmcomms5Stream {
    fn refill(&mut self) -> Result<()> {
        let ret = unsafe { iio_buffer_refill(self.buf) };
        if ret < 0 {
            return Err(Error::Radio(format!("buffer refill failed: errno {}", -ret)));
        }
        Ok(())
    }

    fn overflowed(&mut self) -> Result<bool> {
        let mut value: u32 = 0;
        let ret = unsafe { iio_device_reg_read(self.dev, ADC_STATUS_REG, &mut value) };
        if ret < 0 {
            return Err(Error::Radio(format!("status register read failed: errno {}", -ret)));
        }
        Ok(value & ADC_STATUS_OVERFLOW != 0)
    }

    fn samples(&self) -> &[u8] {
        unsafe {
            let start = iio_buffer_start(self.buf) as *const u8;
            let end = iio_buffer_end(self.buf) as *const u8;
            let len = (end as usize).saturating_sub(start as usize);
            if start.is_null() || len == 0 {
                return &[];
            }
            std::slice::from_raw_parts(start, len)
        }
    }
}

impl Drop for Fmcomms5Stream {
    fn drop(&mut self) {
        unsafe { iio_buffer_destroy(self.buf) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rx_channel_names_follow_stream_channels() {
        let names: Vec<String> = rx_channel_names(4).collect();
        assert_eq!(names, vec!["voltage0", "voltage1", "voltage2", "voltage3"]);
        assert_eq!(rx_channel_names(0).count(), 0);
    }

    #[test]
    fn test_missing_channels_is_radio_error() {
        let err = missing_channels(4, 8);
        assert!(matches!(&err, Error::Radio(msg) if msg.contains("4 RX channels, 8 configured")));
    }
}
