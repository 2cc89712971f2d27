//! `cpal`-backed [`HardwareDriver`] implementation.
//!
//! `cpal` does not expose ASIO-style raw channel pointers or a true
//! double-buffer index, so this adapter bridges its per-stream interleaved
//! callbacks onto the buffer-switch model: an input stream deposits
//! deinterleaved blocks into a [`bbx_core::Pool`] (never allocating on its
//! callback thread), and the output stream's callback pops the freshest
//! available block, invokes the engine's tick closure with planar slices,
//! and writes the result back out interleaved. `double_index` is tracked
//! locally and alternates every output callback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bbx_core::audio_buffer::{BufferShape, Planarity, Pool, SampleFormat};
use bbx_core::spsc::{Consumer, Producer, SpscRingBuffer};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Stream, StreamConfig};
use log::{info, warn};

use crate::device::{BufferSwitch, BufferSwitchCallback, DeviceInfo, HardwareDriver, StreamCapabilities};
use crate::error::{DriverError, Result};

const INPUT_QUEUE_CAPACITY: usize = 4;

/// # Safety
/// `bytes` must be valid for `bytes.len() / 4` `f32`s and sufficiently
/// aligned; `Pool` over-allocates every plane by [`PLANE_ALIGNMENT`](bbx_core::audio_buffer)
/// bytes specifically so this holds in practice.
unsafe fn as_f32_slice(bytes: &[u8]) -> &[f32] {
    unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f32, bytes.len() / 4) }
}

unsafe fn as_f32_slice_mut(bytes: &mut [u8]) -> &mut [f32] {
    unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f32, bytes.len() / 4) }
}

struct OpenDevice {
    device: Device,
    config: StreamConfig,
}

/// Hardware driver adapter backed by `cpal`.
pub struct CpalDriver {
    host: Host,
    open: Option<OpenDevice>,
    input_channels: Vec<usize>,
    output_channels: Vec<usize>,
    pool: Option<Pool>,
    input_stream: Option<Stream>,
    output_stream: Option<Stream>,
    double_index: Arc<AtomicUsize>,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            open: None,
            input_channels: Vec::new(),
            output_channels: Vec::new(),
            pool: None,
            input_stream: None,
            output_stream: None,
            double_index: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn device_info(device: &Device) -> Option<DeviceInfo> {
    let name = device.name().ok()?;
    let input_conf = device.supported_input_configs().ok();
    let output_conf = device.supported_output_configs().ok();

    let max_input_channels = input_conf
        .map(|c| c.map(|cfg| cfg.channels() as usize).max().unwrap_or(0))
        .unwrap_or(0);
    let max_output_channels = output_conf
        .map(|c| c.map(|cfg| cfg.channels() as usize).max().unwrap_or(0))
        .unwrap_or(0);

    let default_sample_rate = device
        .default_output_config()
        .map(|c| c.sample_rate().0)
        .or_else(|_| device.default_input_config().map(|c| c.sample_rate().0))
        .unwrap_or(48_000);

    Some(DeviceInfo {
        name,
        max_input_channels,
        max_output_channels,
        input_channel_names: (0..max_input_channels).map(|i| format!("In {}", i + 1)).collect(),
        output_channel_names: (0..max_output_channels).map(|i| format!("Out {}", i + 1)).collect(),
        default_sample_rate,
    })
}

impl HardwareDriver for CpalDriver {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        let mut devices = Vec::new();
        let cpal_devices = self
            .host
            .devices()
            .map_err(|e| DriverError::OpenFailed(e.to_string()))?;
        for device in cpal_devices {
            if let Some(info) = device_info(&device) {
                devices.push(info);
            }
        }
        Ok(devices)
    }

    fn open(&mut self, name: Option<&str>) -> Result<()> {
        let device = match name {
            Some(n) => self
                .host
                .devices()
                .map_err(|e| DriverError::OpenFailed(e.to_string()))?
                .find(|d| d.name().map(|dn| dn == n).unwrap_or(false))
                .ok_or_else(|| DriverError::DeviceNotFound(n.to_string()))?,
            None => self
                .host
                .default_output_device()
                .ok_or_else(|| DriverError::DeviceNotFound("default".into()))?,
        };

        let supported = device
            .default_output_config()
            .map_err(|e| DriverError::ConfigNegotiationFailed(e.to_string()))?;

        info!("opened audio device `{}`", device.name().unwrap_or_default());

        self.open = Some(OpenDevice { config: supported.config(), device });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stop()?;
        self.open = None;
        self.pool = None;
        Ok(())
    }

    fn init(&mut self) -> Result<StreamCapabilities> {
        let open = self.open.as_ref().ok_or_else(|| DriverError::OpenFailed("no device open".into()))?;

        let output_names = (0..open.config.channels as usize).map(|i| format!("Out {}", i + 1)).collect();
        let input_names = open
            .device
            .default_input_config()
            .map(|c| (0..c.channels() as usize).map(|i| format!("In {}", i + 1)).collect())
            .unwrap_or_default();

        Ok(StreamCapabilities {
            min_block_frames: 32,
            max_block_frames: 4096,
            preferred_block_frames: 512,
            supported_sample_rates: vec![44_100, 48_000, 96_000],
            current_sample_rate: open.config.sample_rate.0,
            current_block_frames: 512,
            input_channel_names: input_names,
            output_channel_names: output_names,
        })
    }

    fn create_buffers(&mut self, input_channels: &[usize], output_channels: &[usize]) -> Result<()> {
        let open = self.open.as_ref().ok_or_else(|| DriverError::OpenFailed("no device open".into()))?;

        let max_available = open.config.channels as usize;
        for &ch in output_channels {
            if ch >= max_available {
                return Err(DriverError::ChannelOutOfRange { index: ch, available: max_available });
            }
        }

        self.input_channels = input_channels.to_vec();
        self.output_channels = output_channels.to_vec();

        let shape = BufferShape::new(
            512,
            input_channels.len().max(1),
            open.config.sample_rate.0,
            SampleFormat::F32,
            Planarity::Planar,
        );
        self.pool = Some(Pool::new(shape, INPUT_QUEUE_CAPACITY));
        Ok(())
    }

    fn start(&mut self, callback: BufferSwitchCallback) -> Result<()> {
        let open = self.open.as_ref().ok_or(DriverError::BuffersNotCreated)?;
        let pool = self.pool.as_ref().ok_or(DriverError::BuffersNotCreated)?.clone();

        let (ready_producer, ready_consumer) = SpscRingBuffer::new(INPUT_QUEUE_CAPACITY);

        let input_stream = self.build_input_stream(open, pool, ready_producer)?;
        let output_stream = self.build_output_stream(open, ready_consumer, callback)?;

        if let Some(stream) = &input_stream {
            stream.play().map_err(|e| DriverError::StartFailed(e.to_string()))?;
        }
        output_stream.play().map_err(|e| DriverError::StartFailed(e.to_string()))?;

        self.input_stream = input_stream;
        self.output_stream = Some(output_stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.output_stream.take() {
            stream.pause().map_err(|e| DriverError::StopFailed(e.to_string()))?;
        }
        if let Some(stream) = self.input_stream.take() {
            stream.pause().map_err(|e| DriverError::StopFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl CpalDriver {
    fn build_input_stream(
        &self,
        open: &OpenDevice,
        pool: Pool,
        mut ready: Producer<bbx_core::audio_buffer::Handle>,
    ) -> Result<Option<Stream>> {
        if self.input_channels.is_empty() {
            return Ok(None);
        }

        let input_device = open.device.clone();
        let input_config = input_device
            .default_input_config()
            .map_err(|e| DriverError::ConfigNegotiationFailed(e.to_string()))?;
        let config: StreamConfig = input_config.config();
        let channels = self.input_channels.clone();
        let err_fn = |e| warn!("input stream error: {e}");

        let stream = input_device
            .build_input_stream(
                &config,
                move |data: &[f32], _| {
                    let Some(mut handle) = pool.acquire() else {
                        // transient drop: pool exhausted, skip this block
                        return;
                    };
                    let device_channels = config_channels(&config);
                    if let Some(buffer) = handle.as_mut() {
                        for (plane_idx, &ch) in channels.iter().enumerate() {
                            if ch >= device_channels || plane_idx >= buffer.channels() {
                                continue;
                            }
                            let frames = buffer.frames();
                            let dst = unsafe { as_f32_slice_mut(buffer.plane_mut(plane_idx)) };
                            for frame in 0..frames.min(data.len() / device_channels) {
                                dst[frame] = data[frame * device_channels + ch];
                            }
                        }
                    }
                    let _ = ready.try_push(handle);
                },
                err_fn,
                None,
            )
            .map_err(|e| DriverError::StartFailed(e.to_string()))?;
        Ok(Some(stream))
    }

    fn build_output_stream(
        &self,
        open: &OpenDevice,
        mut ready: Consumer<bbx_core::audio_buffer::Handle>,
        callback: BufferSwitchCallback,
    ) -> Result<Stream> {
        let config = open.config.clone();
        let output_channels = self.output_channels.clone();
        let device_channels = config.channels as usize;
        let callback = Arc::new(Mutex::new(callback));
        let double_index = self.double_index.clone();
        let err_fn = |e| warn!("output stream error: {e}");

        let mut scratch_out: Vec<Vec<f32>> = output_channels.iter().map(|_| Vec::new()).collect();

        let stream = open
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    let frames = data.len() / device_channels.max(1);
                    for scratch in &mut scratch_out {
                        scratch.clear();
                        scratch.resize(frames, 0.0);
                    }

                    let input_handle = ready.try_pop();
                    let input_planes: Vec<&[f32]> = match &input_handle {
                        Some(h) => (0..h.as_ref().channels())
                            .map(|ch| unsafe { as_f32_slice(h.as_ref().plane(ch)) })
                            .collect(),
                        None => Vec::new(),
                    };

                    let mut output_refs: Vec<&mut [f32]> = scratch_out.iter_mut().map(|v| v.as_mut_slice()).collect();

                    let idx = double_index.fetch_xor(1, Ordering::AcqRel);
                    if let Ok(mut cb) = callback.lock() {
                        cb(BufferSwitch {
                            double_index: idx,
                            direct: true,
                            inputs: &input_planes,
                            outputs: &mut output_refs,
                        });
                    }

                    data.fill(0.0);
                    for (plane_idx, &ch) in output_channels.iter().enumerate() {
                        if ch >= device_channels {
                            continue;
                        }
                        for (frame, &sample) in scratch_out[plane_idx].iter().enumerate() {
                            data[frame * device_channels + ch] = sample;
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| DriverError::StartFailed(e.to_string()))?;
        Ok(stream)
    }
}

fn config_channels(config: &StreamConfig) -> usize {
    config.channels as usize
}

