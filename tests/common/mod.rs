//! Shared helpers: sample stores and in-memory module builders
#![allow(dead_code)]

use modmix::{SampleOptions, SampleStore};
use std::sync::Arc;

/// Store with a constant-level one-shot sample under `name`
pub fn constant_store(name: &str, level: i8, len: usize) -> Arc<SampleStore> {
    let store = Arc::new(SampleStore::new());
    store
        .load_pcm(name, vec![level; len], SampleOptions::default())
        .expect("valid sample");
    store
}

/// Sine-ish test waveform so interpolation has something to do
pub fn waveform(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i as f64 * 0.3).sin() * 100.0) as i8 as u8)
        .collect()
}

/// Pack one MOD pattern cell
pub fn mod_cell(sample: u8, period: u16, effect: u8, param: u8) -> [u8; 4] {
    [
        (sample & 0xF0) | ((period >> 8) as u8 & 0x0F),
        period as u8,
        (sample << 4) | (effect & 0x0F),
        param,
    ]
}

/// Minimal MOD file.
///
/// `tag` of `None` writes the 15-sample Soundtracker layout. Samples are
/// `(pcm, volume)`; cells are `(pattern, row, channel, bytes)` on 4 channels.
pub fn build_mod(
    title: &str,
    tag: Option<&[u8; 4]>,
    samples: &[(Vec<u8>, u8)],
    orders: &[u8],
    cells: &[(usize, usize, usize, [u8; 4])],
) -> Vec<u8> {
    let slots = if tag.is_some() { 31 } else { 15 };
    let mut data = Vec::new();

    let mut name = title.as_bytes().to_vec();
    name.resize(20, 0);
    data.extend_from_slice(&name);

    for slot in 0..slots {
        let mut header = [0u8; 30];
        if let Some((pcm, volume)) = samples.get(slot) {
            header[22..24].copy_from_slice(&((pcm.len() / 2) as u16).to_be_bytes());
            header[25] = *volume;
            header[29] = 1;
        }
        data.extend_from_slice(&header);
    }

    data.push(orders.len() as u8);
    data.push(0x7F);
    let mut table = orders.to_vec();
    table.resize(128, 0);
    data.extend_from_slice(&table);
    if let Some(tag) = tag {
        data.extend_from_slice(tag);
    }

    let pattern_count = usize::from(orders.iter().copied().max().unwrap_or(0)) + 1;
    let pattern_len = 64 * 4 * 4;
    let base = data.len();
    data.resize(base + pattern_count * pattern_len, 0);
    for &(pattern, row, channel, bytes) in cells {
        let offset = base + pattern * pattern_len + (row * 4 + channel) * 4;
        data[offset..offset + 4].copy_from_slice(&bytes);
    }

    for (pcm, _) in samples {
        data.extend_from_slice(pcm);
    }
    data
}

/// One S3M event: (row, channel, note, instrument, volume column, command, info)
pub type S3mEvent = (usize, u8, u8, u8, Option<u8>, u8, u8);

/// Minimal S3M file: one signed 8-bit instrument, one pattern, channels
/// 0-3 enabled.
pub fn build_s3m(pcm: &[u8], default_volume: u8, events: &[S3mEvent]) -> Vec<u8> {
    let orders = [0u8, 255];
    let header_len = 96 + orders.len() + 2 + 2;
    let mut data = vec![0u8; header_len];

    data[..8].copy_from_slice(b"s3m test");
    data[28] = 0x1A;
    data[29] = 16;
    data[32..34].copy_from_slice(&(orders.len() as u16).to_le_bytes());
    data[34..36].copy_from_slice(&1u16.to_le_bytes());
    data[36..38].copy_from_slice(&1u16.to_le_bytes());
    data[40..42].copy_from_slice(&0x1320u16.to_le_bytes());
    data[42..44].copy_from_slice(&1u16.to_le_bytes());
    data[44..48].copy_from_slice(b"SCRM");
    data[48] = 64;
    data[49] = 6;
    data[50] = 125;
    data[51] = 0xB0;
    for (channel, setting) in data[64..96].iter_mut().enumerate() {
        *setting = match channel {
            0 | 2 => channel as u8,
            1 | 3 => 8 + channel as u8,
            _ => 255,
        };
    }
    data[96..98].copy_from_slice(&orders);

    // Instrument record
    let record = align(&mut data);
    data[98..100].copy_from_slice(&((record / 16) as u16).to_le_bytes());
    data.resize(record + 80, 0);
    data[record] = 1;
    data[record + 16..record + 20].copy_from_slice(&(pcm.len() as u32).to_le_bytes());
    data[record + 28] = default_volume;
    data[record + 32..record + 36].copy_from_slice(&8363u32.to_le_bytes());
    data[record + 76..record + 80].copy_from_slice(b"SCRS");

    // Packed pattern
    let pattern = align(&mut data);
    data[100..102].copy_from_slice(&((pattern / 16) as u16).to_le_bytes());
    let mut packed = Vec::new();
    for row in 0..64 {
        for &(_, channel, note, instrument, volume, command, info) in
            events.iter().filter(|e| e.0 == row)
        {
            let mut lead = channel | 0x20;
            if volume.is_some() {
                lead |= 0x40;
            }
            if command != 0 {
                lead |= 0x80;
            }
            packed.extend_from_slice(&[lead, note, instrument]);
            if let Some(volume) = volume {
                packed.push(volume);
            }
            if command != 0 {
                packed.extend_from_slice(&[command, info]);
            }
        }
        packed.push(0);
    }
    data.extend_from_slice(&(packed.len() as u16 + 2).to_le_bytes());
    data.extend_from_slice(&packed);

    // Sample data
    let sample = align(&mut data);
    let memseg = sample / 16;
    data[record + 13] = (memseg >> 16) as u8;
    data[record + 14..record + 16].copy_from_slice(&(memseg as u16).to_le_bytes());
    data.extend_from_slice(pcm);
    data
}

fn align(data: &mut Vec<u8>) -> usize {
    let aligned = (data.len() + 15) / 16 * 16;
    data.resize(aligned, 0);
    aligned
}
