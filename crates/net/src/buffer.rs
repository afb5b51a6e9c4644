/// Growable byte buffer with big-endian read and write cursors.
///
/// Writes always succeed. Reads never fail either: a read past the end sets the
/// overflow flag and yields a default value, and once the flag is set every
/// later read yields a default value too. Parsers read a whole message and
/// check [`WireBuffer::overflowed`] once at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireBuffer {
    data: Vec<u8>,
    read_pos: usize,
    overflow: bool,
}

impl WireBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
            overflow: false,
        }
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            read_pos: 0,
            overflow: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// True when every byte has been read or a read overflowed.
    pub fn is_exhausted(&self) -> bool {
        self.overflow || self.read_pos >= self.data.len()
    }

    /// Moves the read cursor back to the start and clears the overflow flag.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
        self.overflow = false;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.rewind();
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Appends the string followed by a terminating zero byte.
    ///
    /// Interior zero bytes would truncate the string on the reading side, so the
    /// string is cut at the first one.
    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.data.extend_from_slice(&bytes[..end]);
        self.data.push(0);
    }

    /// Appends raw bytes without any framing.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends a `u32` length followed by the bytes.
    pub fn write_length_prefixed(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.data.extend_from_slice(bytes);
    }

    fn take(&mut self, count: usize) -> Option<&[u8]> {
        if self.overflow || self.remaining() < count {
            self.overflow = true;
            return None;
        }
        let start = self.read_pos;
        self.read_pos += count;
        Some(&self.data[start..self.read_pos])
    }

    pub fn read_u8(&mut self) -> u8 {
        self.take(1).map_or(0, |b| b[0])
    }

    pub fn read_u16(&mut self) -> u16 {
        self.take(2).map_or(0, |b| u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> u32 {
        self.take(4)
            .map_or(0, |b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    /// Reads a zero-terminated string.
    ///
    /// Returns `None` and sets the overflow flag when no terminator exists
    /// before the end of the buffer, which is how truncated or hostile input
    /// shows up.
    pub fn read_string(&mut self) -> Option<String> {
        if self.overflow {
            return None;
        }
        let rest = self.data.get(self.read_pos..).unwrap_or_default();
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                let value = String::from_utf8_lossy(&rest[..end]).into_owned();
                self.read_pos += end + 1;
                Some(value)
            }
            None => {
                self.read_pos = self.data.len();
                self.overflow = true;
                None
            }
        }
    }

    pub fn read_bytes(&mut self, count: usize) -> Vec<u8> {
        self.take(count).map(<[u8]>::to_vec).unwrap_or_default()
    }

    /// Reads a `u32` length followed by that many bytes.
    pub fn read_length_prefixed(&mut self) -> Vec<u8> {
        let len = self.read_u32() as usize;
        self.read_bytes(len)
    }

    /// Consumes and returns every unread byte.
    pub fn read_remaining(&mut self) -> Vec<u8> {
        if self.overflow {
            return Vec::new();
        }
        let rest = self.data[self.read_pos.min(self.data.len())..].to_vec();
        self.read_pos = self.data.len();
        rest
    }
}

impl From<Vec<u8>> for WireBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl AsRef<[u8]> for WireBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
