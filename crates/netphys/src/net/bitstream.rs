//! Bit-level wire encoding
//!
//! The transport layer frames and delivers byte buffers; this module only
//! defines how state is packed into them. Quantized encodings trade
//! precision for size: vectors as magnitude plus normalized 16-bit
//! components, orientations as quaternions with a recovered scalar part.
//! Both ends must agree on the encoding (see the `net-quantized` feature).

use crate::foundation::math::{BodyFrame, Mat3, Quat, Vec3};

const QUANT_SCALE: f32 = i16::MAX as f32;

/// Bit-packing writer over a growable byte buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Finish writing and take the byte buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The written bytes so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Append a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        let byte_index = self.bit_len / 8;
        if byte_index == self.bytes.len() {
            self.bytes.push(0);
        }
        if bit {
            self.bytes[byte_index] |= 1 << (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Append the low `count` bits of `value`, LSB first.
    pub fn write_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 32);
        for i in 0..count {
            self.write_bit(value & (1 << i) != 0);
        }
    }

    /// Append a u16
    pub fn write_u16(&mut self, value: u16) {
        self.write_bits(u32::from(value), 16);
    }

    /// Append a u32
    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(value, 32);
    }

    /// Append an f32
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Append an f32 only if it differs from `default`: one flag bit,
    /// then the value when present.
    pub fn write_delta_f32(&mut self, value: f32, default: f32) {
        if value == default {
            self.write_bit(false);
        } else {
            self.write_bit(true);
            self.write_f32(value);
        }
    }

    /// Append a vector as three plain f32s.
    pub fn write_vec3(&mut self, v: Vec3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    /// Append a vector as its magnitude plus 16-bit normalized components.
    pub fn write_vec3_quantized(&mut self, v: Vec3) {
        let magnitude = v.norm();
        self.write_f32(magnitude);
        if magnitude > 1e-6 {
            let n = v / magnitude;
            self.write_i16_scaled(n.x);
            self.write_i16_scaled(n.y);
            self.write_i16_scaled(n.z);
        }
    }

    /// Append an orthonormal rotation matrix as a quantized quaternion:
    /// a sign bit for the scalar part plus 16-bit vector components.
    pub fn write_mat3_quantized(&mut self, m: &Mat3) {
        let q = Quat::from_matrix(m);
        self.write_bit(q.w < 0.0);
        self.write_i16_scaled(q.i);
        self.write_i16_scaled(q.j);
        self.write_i16_scaled(q.k);
    }

    /// Append a rigid frame: plain 3x3 rotation plus translation, or the
    /// quantized quaternion/vector forms.
    pub fn write_frame(&mut self, frame: &BodyFrame, quantized: bool) {
        if quantized {
            self.write_mat3_quantized(&frame.rotation);
            self.write_vec3_quantized(frame.translation);
        } else {
            for row in 0..3 {
                for col in 0..3 {
                    self.write_f32(frame.rotation[(row, col)]);
                }
            }
            self.write_vec3(frame.translation);
        }
    }

    fn write_i16_scaled(&mut self, value: f32) {
        let scaled = (value.clamp(-1.0, 1.0) * QUANT_SCALE) as i16;
        self.write_u16(scaled as u16);
    }
}

/// Bit-unpacking reader over a byte buffer.
///
/// All reads return `None` once the buffer is exhausted; callers treat a
/// short read as a malformed update and abort.
#[derive(Debug)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader over `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Number of bits consumed so far
    pub fn bit_pos(&self) -> usize {
        self.pos
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Option<bool> {
        let byte_index = self.pos / 8;
        if byte_index >= self.bytes.len() {
            return None;
        }
        let bit = self.bytes[byte_index] & (1 << (self.pos % 8)) != 0;
        self.pos += 1;
        Some(bit)
    }

    /// Read `count` bits, LSB first.
    pub fn read_bits(&mut self, count: u32) -> Option<u32> {
        debug_assert!(count <= 32);
        let mut value = 0u32;
        for i in 0..count {
            if self.read_bit()? {
                value |= 1 << i;
            }
        }
        Some(value)
    }

    /// Read a u16
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_bits(16).map(|v| v as u16)
    }

    /// Read a u32
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_bits(32)
    }

    /// Read an f32
    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Read a delta-encoded f32, yielding `default` when absent.
    pub fn read_delta_f32(&mut self, default: f32) -> Option<f32> {
        if self.read_bit()? {
            self.read_f32()
        } else {
            Some(default)
        }
    }

    /// Read three plain f32s as a vector.
    pub fn read_vec3(&mut self) -> Option<Vec3> {
        Some(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Read a magnitude-plus-components quantized vector.
    pub fn read_vec3_quantized(&mut self) -> Option<Vec3> {
        let magnitude = self.read_f32()?;
        if magnitude <= 1e-6 {
            return Some(Vec3::zeros());
        }
        let x = self.read_i16_scaled()?;
        let y = self.read_i16_scaled()?;
        let z = self.read_i16_scaled()?;
        let n = Vec3::new(x, y, z);
        let len = n.norm();
        if len < 1e-6 {
            return Some(Vec3::zeros());
        }
        Some(n / len * magnitude)
    }

    /// Read a quantized quaternion back into a rotation matrix.
    pub fn read_mat3_quantized(&mut self) -> Option<Mat3> {
        let w_negative = self.read_bit()?;
        let i = self.read_i16_scaled()?;
        let j = self.read_i16_scaled()?;
        let k = self.read_i16_scaled()?;

        let w_sq = (1.0 - i * i - j * j - k * k).max(0.0);
        let mut w = w_sq.sqrt();
        if w_negative {
            w = -w;
        }
        let q = Quat::new_normalize(nalgebra::Quaternion::new(w, i, j, k));
        Some(q.to_rotation_matrix().matrix().clone_owned())
    }

    /// Read a rigid frame written by [`BitWriter::write_frame`].
    pub fn read_frame(&mut self, quantized: bool) -> Option<BodyFrame> {
        if quantized {
            let rotation = self.read_mat3_quantized()?;
            let translation = self.read_vec3_quantized()?;
            Some(BodyFrame::new(rotation, translation))
        } else {
            let mut rotation = Mat3::zeros();
            for row in 0..3 {
                for col in 0..3 {
                    rotation[(row, col)] = self.read_f32()?;
                }
            }
            let translation = self.read_vec3()?;
            Some(BodyFrame::new(rotation, translation))
        }
    }

    fn read_i16_scaled(&mut self) -> Option<f32> {
        self.read_u16().map(|v| f32::from(v as i16) / QUANT_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bit_round_trip() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bits(0b1011, 4);
        writer.write_u16(54321);
        writer.write_f32(-3.25);

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bit(), Some(true));
        assert_eq!(reader.read_bits(4), Some(0b1011));
        assert_eq!(reader.read_u16(), Some(54321));
        assert_eq!(reader.read_f32(), Some(-3.25));
        assert_eq!(reader.read_bit(), None);
    }

    #[test]
    fn delta_f32_skips_default() {
        let mut writer = BitWriter::new();
        writer.write_delta_f32(0.0, 0.0);
        writer.write_delta_f32(12.5, 0.0);
        assert_eq!(writer.bit_len(), 1 + 1 + 32);

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_delta_f32(0.0), Some(0.0));
        assert_eq!(reader.read_delta_f32(0.0), Some(12.5));
    }

    #[test]
    fn quantized_vector_round_trips_within_tolerance() {
        let v = Vec3::new(3.0, -4.0, 12.0);
        let mut writer = BitWriter::new();
        writer.write_vec3_quantized(v);

        let bytes = writer.into_bytes();
        let restored = BitReader::new(&bytes).read_vec3_quantized().unwrap();
        assert_relative_eq!(restored, v, epsilon = 1e-2);
        // Magnitude is carried exactly.
        assert_relative_eq!(restored.norm(), v.norm(), epsilon = 1e-4);
    }

    #[test]
    fn quantized_rotation_round_trips_within_tolerance() {
        let rotation = nalgebra::Rotation3::from_euler_angles(0.4, -1.2, 2.8)
            .matrix()
            .clone_owned();
        let mut writer = BitWriter::new();
        writer.write_mat3_quantized(&rotation);

        let bytes = writer.into_bytes();
        let restored = BitReader::new(&bytes).read_mat3_quantized().unwrap();
        assert_relative_eq!(restored, rotation, epsilon = 1e-3);
    }

    #[test]
    fn frame_round_trips_both_encodings() {
        let frame = BodyFrame::new(
            nalgebra::Rotation3::from_euler_angles(0.1, 0.9, -0.5)
                .matrix()
                .clone_owned(),
            Vec3::new(10.0, -2.0, 33.0),
        );

        for quantized in [false, true] {
            let mut writer = BitWriter::new();
            writer.write_frame(&frame, quantized);
            let bytes = writer.into_bytes();
            let restored = BitReader::new(&bytes).read_frame(quantized).unwrap();
            let eps = if quantized { 1e-2 } else { 1e-6 };
            assert_relative_eq!(restored.translation, frame.translation, epsilon = eps);
            assert_relative_eq!(restored.rotation, frame.rotation, epsilon = eps);
        }
    }
}
