//! VITA-49 packet structures and parsing
//!
//! Implements the PVAN-11 data format: a VITA-49-derived framing used by the
//! Crimson TNG SDR to stream digitized I/Q samples over UDP.
//!
//! ## Packet Layout (big-endian throughout)
//!
//! 1. **Header word** (4 bytes) - packet type, indicators, timestamp format,
//!    4-bit sequence count, 16-bit size in 32-bit words
//! 2. **Stream ID** (4 bytes) - present only when `packet_type == 1`
//! 3. **Fractional timestamp** (8 bytes) - present only when TSF selects the
//!    free-running count
//! 4. **Payload** - one 32-bit word per sample pair: 16-bit signed I then
//!    16-bit signed Q
//! 5. **Trailer** (4 bytes, ignored) - present per an indicator bit
//!
//! ## Permissiveness
//!
//! The declared `size_words` field is carried through but never validated
//! against the datagram length; the actual buffer length governs parsing.
//! The producing hardware is known to emit inaccurate size fields. A payload
//! whose length is not a multiple of four loses its trailing partial word
//! silently.

use crate::DecodeError;
use tracing::trace;

/// Size of the mandatory header word in bytes.
const HEADER_SIZE: usize = 4;

/// Size of the optional trailer word in bytes.
pub const TRAILER_SIZE: usize = 4;

/// TSF value selecting a free-running count timestamp.
pub const TSF_FREE_RUNNING: u8 = 0x3;

/// A decoded PVAN-11 packet.
///
/// Produced per datagram by [`VitaPacket::decode`]; owned by the caller until
/// the samples are consumed. `i_samples` and `q_samples` are always equal in
/// length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VitaPacket {
    /// Packet type from bits 31-28 of the header word.
    /// 0 = signal data without stream ID, 1 = signal data with stream ID.
    pub packet_type: u8,
    /// Class identifier bit (bit 27). Carried but unused.
    pub class_id: bool,
    /// Indicator bits 26-24. Bit 2 flags a trailer word.
    pub indicators: u8,
    /// Integer-seconds timestamp mode (bits 23-22). Carried but unused.
    pub tsi: u8,
    /// Fractional timestamp mode (bits 21-20).
    pub tsf: u8,
    /// 4-bit rolling sequence count (bits 19-16), wraps modulo 16.
    pub sequence_count: u8,
    /// Declared packet size in 32-bit words (bits 15-0). Informational only.
    pub size_words: u16,
    /// Stream identifier; zero when `packet_type != 1`.
    pub stream_id: u32,
    /// Free-running fractional timestamp; zero when `tsf` is not free-running.
    pub timestamp: u64,
    /// Whether the datagram carried a trailer word.
    pub trailer_present: bool,
    /// In-phase samples, one per payload word.
    pub i_samples: Vec<i16>,
    /// Quadrature samples, one per payload word.
    pub q_samples: Vec<i16>,
    /// Raw datagram length in bytes.
    pub raw_len: usize,
}

impl VitaPacket {
    /// Decode a raw datagram into a packet.
    ///
    /// Pure function: never panics, never blocks, no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TooShort`] for datagrams smaller than the
    /// header word, and [`DecodeError::Truncated`] when a declared stream-ID
    /// or timestamp field extends past the end of the datagram.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < HEADER_SIZE {
            return Err(DecodeError::TooShort { len: data.len() });
        }

        // Header word field layout:
        //   bits 31:28  packet_type
        //   bit  27     class identifier present
        //   bits 26:24  indicators (bit 2 = trailer present)
        //   bits 23:22  TSI (integer timestamp mode)
        //   bits 21:20  TSF (fractional timestamp mode)
        //   bits 19:16  sequence count (4-bit, wrapping)
        //   bits 15:0   packet size in 32-bit words
        let header = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);

        let packet_type = ((header >> 28) & 0xF) as u8;
        let class_id = (header >> 27) & 0x1 != 0;
        let indicators = ((header >> 24) & 0x7) as u8;
        let tsi = ((header >> 22) & 0x3) as u8;
        let tsf = ((header >> 20) & 0x3) as u8;
        let sequence_count = ((header >> 16) & 0xF) as u8;
        let size_words = (header & 0xFFFF) as u16;

        let mut pos = HEADER_SIZE;

        // Stream identifier, present for packet type 1 only
        let stream_id = if packet_type == 0x1 {
            let id = read_u32_be(data, pos, "stream ID")?;
            pos += 4;
            id
        } else {
            0
        };

        // Fractional timestamp, present only in free-running count mode
        let timestamp = if tsf == TSF_FREE_RUNNING {
            let ts = read_u64_be(data, pos, "timestamp")?;
            pos += 8;
            ts
        } else {
            0
        };

        let trailer_present = indicators & 0x4 != 0;
        let trailer_size = if trailer_present { TRAILER_SIZE } else { 0 };
        let payload_end = data.len().saturating_sub(trailer_size);
        let payload = if payload_end > pos { &data[pos..payload_end] } else { &[][..] };

        // One 32-bit word per pair; a trailing partial word is dropped
        let num_pairs = payload.len() / 4;
        let mut i_samples = Vec::with_capacity(num_pairs);
        let mut q_samples = Vec::with_capacity(num_pairs);

        for pair in payload.chunks_exact(4) {
            i_samples.push(i16::from_be_bytes([pair[0], pair[1]]));
            q_samples.push(i16::from_be_bytes([pair[2], pair[3]]));
        }

        trace!(
            packet_type,
            stream_id,
            sequence_count,
            size_words,
            samples = num_pairs,
            "Decoded packet ({} bytes)",
            data.len()
        );

        Ok(Self {
            packet_type,
            class_id,
            indicators,
            tsi,
            tsf,
            sequence_count,
            size_words,
            stream_id,
            timestamp,
            trailer_present,
            i_samples,
            q_samples,
            raw_len: data.len(),
        })
    }

    /// Build a synthetic signal-data packet the way the hardware frames one.
    ///
    /// Packet type 1 (stream ID present), free-running timestamp, trailer
    /// word appended, size field filled in. Used for loopback simulation and
    /// round-trip testing.
    ///
    /// # Panics
    ///
    /// Panics if `i_samples` and `q_samples` differ in length (test/sim
    /// construction error, not a runtime path).
    pub fn synthetic(
        stream_id: u32,
        sequence_count: u8,
        timestamp: u64,
        i_samples: Vec<i16>,
        q_samples: Vec<i16>,
    ) -> Self {
        assert_eq!(i_samples.len(), q_samples.len(), "I/Q arrays must be equal length");

        // header + stream ID + 2 timestamp words + payload + trailer
        let total_words = 1 + 1 + 2 + i_samples.len() + 1;
        let raw_len = total_words * 4;

        Self {
            packet_type: 0x1,
            class_id: false,
            indicators: 0x5,
            tsi: 0x0,
            tsf: TSF_FREE_RUNNING,
            sequence_count: sequence_count & 0xF,
            size_words: (total_words & 0xFFFF) as u16,
            stream_id,
            timestamp,
            trailer_present: true,
            i_samples,
            q_samples,
            raw_len,
        }
    }

    /// Number of I/Q sample pairs carried by this packet.
    pub fn sample_count(&self) -> usize {
        self.i_samples.len()
    }

    /// Re-serialize this packet into wire format.
    ///
    /// Inverse of [`VitaPacket::decode`] for the fields a datagram actually
    /// carries; the trailer, when present, is written as zeros.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.raw_len.max(HEADER_SIZE));

        let header = (u32::from(self.packet_type) << 28)
            | (u32::from(self.class_id) << 27)
            | (u32::from(self.indicators) << 24)
            | (u32::from(self.tsi) << 22)
            | (u32::from(self.tsf) << 20)
            | (u32::from(self.sequence_count & 0xF) << 16)
            | u32::from(self.size_words);
        out.extend_from_slice(&header.to_be_bytes());

        if self.packet_type == 0x1 {
            out.extend_from_slice(&self.stream_id.to_be_bytes());
        }
        if self.tsf == TSF_FREE_RUNNING {
            out.extend_from_slice(&self.timestamp.to_be_bytes());
        }

        for (i, q) in self.i_samples.iter().zip(&self.q_samples) {
            out.extend_from_slice(&i.to_be_bytes());
            out.extend_from_slice(&q.to_be_bytes());
        }

        if self.trailer_present {
            out.extend_from_slice(&[0u8; TRAILER_SIZE]);
        }

        out
    }
}

fn read_u32_be(data: &[u8], pos: usize, field: &'static str) -> Result<u32, DecodeError> {
    let end = pos + 4;
    if data.len() < end {
        return Err(DecodeError::Truncated { field, needed: 4, available: data.len() - pos });
    }
    Ok(u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]))
}

fn read_u64_be(data: &[u8], pos: usize, field: &'static str) -> Result<u64, DecodeError> {
    let end = pos + 8;
    if data.len() < end {
        return Err(DecodeError::Truncated { field, needed: 8, available: data.len() - pos });
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[pos..end]);
    Ok(u64::from_be_bytes(bytes))
}
