use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info, warn};
use tickboy_core::audio_queue::SampleConsumer;

/// Unsigned 8-bit mixer sample to a signed 16-bit PCM sample.
fn to_i16(sample: u8) -> i16 {
    ((sample as i16) - 128) << 8
}

fn to_f32(sample: u8) -> f32 {
    (sample as f32 - 128.0) / 128.0
}

/// Next stereo frame, or silence while the queue is dry or the emulated
/// APU is powered off.
fn next_frame(consumer: &SampleConsumer) -> [u8; 2] {
    if !consumer.is_playing() {
        return [128, 128];
    }
    consumer.pop().unwrap_or([128, 128])
}

fn fill<T: Copy>(data: &mut [T], channels: usize, consumer: &SampleConsumer, convert: fn(u8) -> T) {
    for frame in data.chunks_mut(channels) {
        let [left, right] = next_frame(consumer);
        frame[0] = convert(left);
        if channels > 1 {
            frame[1] = convert(right);
        }
        for extra in frame.iter_mut().skip(2) {
            *extra = convert(128);
        }
    }
}

/// Output device sample rate, so the emulator can decimate to it before
/// any sample is queued.
pub fn device_sample_rate() -> Option<u32> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;
    match device.default_output_config() {
        Ok(c) => Some(c.sample_rate()),
        Err(e) => {
            warn!("no supported output config: {e}");
            None
        }
    }
}

/// Start audio playback using `cpal`, pulling frames the emulation thread
/// pushed into the sample queue.
///
/// Returns the active [`cpal::Stream`] if successful.
pub fn start_stream(consumer: SampleConsumer) -> Option<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;
    let supported = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            warn!("no supported output config: {e}");
            return None;
        }
    };
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels as usize;
    let err_fn = |err| error!("cpal stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _| fill(data, channels, &consumer, to_i16),
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_output_stream(
            &config,
            move |data: &mut [u16], _| {
                fill(data, channels, &consumer, |s| (to_i16(s) as i32 + 32768) as u16)
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _| fill(data, channels, &consumer, to_f32),
            err_fn,
            None,
        ),
        other => {
            warn!("unsupported sample format {other:?}, audio disabled");
            return None;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            warn!("failed to open audio stream: {e}");
            return None;
        }
    };
    if let Err(e) = stream.play() {
        warn!("failed to start audio stream: {e}");
        return None;
    }
    info!(
        "audio output at {} Hz, {channels} channels",
        config.sample_rate
    );
    Some(stream)
}
