//! Binary data reader for texture headers
//!
//! Every read is length-checked against the remaining input before it
//! happens, so a malformed header can never pull the cursor past the end of
//! the buffer.

use crate::error::{Result, TextureError};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// Byte order for reading binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Big endian (network byte order)
    Big,
    /// Little endian (most common on x86/x64)
    #[default]
    Little,
}

/// Bounds-checked reader over a header byte slice
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
    byte_order: ByteOrder,
}

impl<'a> BinaryReader<'a> {
    /// Create a new binary reader from a byte slice
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            cursor: Cursor::new(data),
            byte_order,
        }
    }

    /// Get current position in the stream
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Set position in the stream
    pub fn set_position(&mut self, pos: u64) {
        self.cursor.set_position(pos);
    }

    /// Get the total length of the data
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Check if the reader is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position() as usize)
    }

    /// Check if we have at least `count` bytes remaining
    pub fn has_bytes(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    /// Advance to the next `alignment`-byte boundary
    pub fn align_to(&mut self, alignment: u64) {
        let pos = self.position();
        let aligned = (pos + alignment - 1) & !(alignment - 1);
        if aligned != pos {
            self.set_position(aligned);
        }
    }

    /// Skip `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        if !self.has_bytes(count) {
            return Err(TextureError::truncated(count, self.remaining()));
        }
        self.set_position(self.position() + count as u64);
        Ok(())
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        if !self.has_bytes(1) {
            return Err(TextureError::truncated(1, self.remaining()));
        }
        Ok(self.cursor.read_u8()?)
    }

    /// Read a signed 8-bit integer
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read an unsigned 16-bit integer
    pub fn read_u16(&mut self) -> Result<u16> {
        if !self.has_bytes(2) {
            return Err(TextureError::truncated(2, self.remaining()));
        }
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_u16::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_u16::<LittleEndian>()?),
        }
    }

    /// Read an unsigned 32-bit integer
    pub fn read_u32(&mut self) -> Result<u32> {
        if !self.has_bytes(4) {
            return Err(TextureError::truncated(4, self.remaining()));
        }
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_u32::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_u32::<LittleEndian>()?),
        }
    }

    /// Read a signed 32-bit integer
    pub fn read_i32(&mut self) -> Result<i32> {
        if !self.has_bytes(4) {
            return Err(TextureError::truncated(4, self.remaining()));
        }
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_i32::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_i32::<LittleEndian>()?),
        }
    }

    /// Read an unsigned 64-bit integer
    pub fn read_u64(&mut self) -> Result<u64> {
        if !self.has_bytes(8) {
            return Err(TextureError::truncated(8, self.remaining()));
        }
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_u64::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_u64::<LittleEndian>()?),
        }
    }

    /// Read a 32-bit floating point number
    pub fn read_f32(&mut self) -> Result<f32> {
        if !self.has_bytes(4) {
            return Err(TextureError::truncated(4, self.remaining()));
        }
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_f32::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_f32::<LittleEndian>()?),
        }
    }

    /// Read a four-character code as raw bytes, independent of byte order
    pub fn read_fourcc(&mut self) -> Result<[u8; 4]> {
        let mut fourcc = [0u8; 4];
        if !self.has_bytes(4) {
            return Err(TextureError::truncated(4, self.remaining()));
        }
        self.cursor.read_exact(&mut fourcc)?;
        Ok(fourcc)
    }

    /// Read a fixed number of bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if !self.has_bytes(count) {
            return Err(TextureError::truncated(count, self.remaining()));
        }
        let mut buffer = vec![0u8; count];
        self.cursor.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Get the current byte order
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Set the byte order
    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// Create a new reader for a subset of the data
    pub fn sub_reader(&self, offset: usize, length: usize) -> Result<BinaryReader<'a>> {
        let data: &'a [u8] = self.cursor.get_ref();
        let end = offset
            .checked_add(length)
            .ok_or(TextureError::BufferOverflow)?;
        if end > data.len() {
            return Err(TextureError::truncated(end, data.len()));
        }
        Ok(BinaryReader::new(&data[offset..end], self.byte_order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_reading() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn test_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04];

        let mut reader_le = BinaryReader::new(&data, ByteOrder::Little);
        assert_eq!(reader_le.read_u32().unwrap(), 0x04030201);

        let mut reader_be = BinaryReader::new(&data, ByteOrder::Big);
        assert_eq!(reader_be.read_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_out_of_bounds_read() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);
        assert!(matches!(
            reader.read_u32(),
            Err(TextureError::TruncatedInput { expected: 4, actual: 2 })
        ));
        // Position is unchanged after a failed read.
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_fourcc() {
        let data = *b"DDS \x01\x00";
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);
        assert_eq!(&reader.read_fourcc().unwrap(), b"DDS ");
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_alignment() {
        let data = [0u8; 8];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);
        reader.read_u8().unwrap(); // pos = 1
        reader.align_to(4); // pos = 4
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_sub_reader_bounds() {
        let data = [0u8; 8];
        let reader = BinaryReader::new(&data, ByteOrder::Little);
        assert!(reader.sub_reader(4, 4).is_ok());
        assert!(reader.sub_reader(6, 4).is_err());
    }
}
