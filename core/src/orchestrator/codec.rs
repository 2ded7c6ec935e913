/// Wire encoding for processed chunk bytes handed back across the
/// `get_chunk`/`stream_track` boundary: a small fixed header (channel
/// count, sample count) followed by each channel's little-endian f32
/// samples in turn. No compression, no container format — the host is
/// expected to already be decoding/encoding its own playback format; this
/// is purely the orchestrator's cache/wire representation.
pub fn encode_pcm_f32(channels: &[Vec<f32>]) -> Vec<u8> {
    let num_channels = channels.len() as u8;
    let num_samples = channels.first().map(|c| c.len()).unwrap_or(0) as u32;

    let mut out = Vec::with_capacity(5 + channels.len() * num_samples as usize * 4);
    out.push(num_channels);
    out.extend_from_slice(&num_samples.to_le_bytes());
    for ch in channels {
        for &s in ch {
            out.extend_from_slice(&s.to_le_bytes());
        }
    }
    out
}

pub fn decode_pcm_f32(bytes: &[u8]) -> Option<Vec<Vec<f32>>> {
    if bytes.len() < 5 {
        return None;
    }
    let num_channels = bytes[0] as usize;
    let num_samples = u32::from_le_bytes(bytes[1..5].try_into().ok()?) as usize;
    let expected_len = 5 + num_channels * num_samples * 4;
    if bytes.len() != expected_len {
        return None;
    }

    let mut channels = Vec::with_capacity(num_channels);
    let mut offset = 5;
    for _ in 0..num_channels {
        let mut samples = Vec::with_capacity(num_samples);
        for _ in 0..num_samples {
            let bytes4: [u8; 4] = bytes[offset..offset + 4].try_into().ok()?;
            samples.push(f32::from_le_bytes(bytes4));
            offset += 4;
        }
        channels.push(samples);
    }
    Some(channels)
}
