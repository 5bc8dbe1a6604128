use crate::error::{DecodeError, DecodeErrorKind};

pub const MAJOR_UINT: u8 = 0;
pub const MAJOR_NINT: u8 = 1;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_TEXT: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_TAG: u8 = 6;
pub const MAJOR_SIMPLE: u8 = 7;

/// The "break" stop code that terminates indefinite-length items.
pub const BREAK: u8 = 0xff;

/// The argument carried by an item head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Argument {
    Value(u64),
    Indefinite,
}

/// A decoded item head: the major type, the raw additional information
/// (needed to tell float widths apart) and the argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Head {
    pub major:    u8,
    pub info:     u8,
    pub argument: Argument,
}

/// A CBOR byte buffer meant for reading.
///
/// Example usage:
///
/// ```
/// let mut bb = brine_cddl_runtime::ByteBuffer::new(&[0x18, 0x64, 0x63, 0x61, 0x62, 0x63]);
/// assert_eq!(bb.read_uint(), Ok(100));
/// assert_eq!(bb.read_text(), Ok("abc"));
/// ```
///
pub struct ByteBuffer<'a> {
    data:  &'a [u8],
    index: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice. The lifetime
    /// of the returned ByteBuffer must not outlive the lifetime of the byte
    /// slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data, index: 0 }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice. This starts
    /// off as 0 and ends up as `self.data().len()` when everything has been
    /// read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    /// Look at the byte at the current index without consuming it.
    pub fn peek_byte(&self) -> Result<u8, DecodeError> {
        self.data
            .get(self.index)
            .copied()
            .ok_or_else(|| DecodeError::new(DecodeErrorKind::UnexpectedEnd(self.index)))
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let value = self.peek_byte()?;
        self.index += 1;
        Ok(value)
    }

    /// Try to read `len` bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::new(DecodeErrorKind::UnexpectedEnd(self.data.len())));
        }
        let value = &self.data[self.index..self.index + len];
        self.index += len;
        Ok(value)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Try to read an item head starting at the current index.
    pub fn read_head(&mut self) -> Result<Head, DecodeError> {
        let offset = self.index;
        let initial = self.read_byte()?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        let argument = match info {
            0..=23 => Argument::Value(info as u64),
            24 => Argument::Value(self.read_byte()? as u64),
            25 => Argument::Value(u16::from_be_bytes(self.read_array::<2>()?) as u64),
            26 => Argument::Value(u32::from_be_bytes(self.read_array::<4>()?) as u64),
            27 => Argument::Value(u64::from_be_bytes(self.read_array::<8>()?)),
            31 if matches!(major, MAJOR_BYTES | MAJOR_TEXT | MAJOR_ARRAY | MAJOR_MAP | MAJOR_SIMPLE) => {
                Argument::Indefinite
            }
            _ => {
                return Err(malformed(
                    offset,
                    format!("additional information {} is not valid for major type {}", info, major),
                ))
            }
        };

        Ok(Head { major, info, argument })
    }

    /// Try to read a head of the given major type with a definite argument.
    pub fn read_definite(&mut self, major: u8) -> Result<u64, DecodeError> {
        let offset = self.index;
        let head = self.read_head()?;
        if head.major != major {
            return Err(malformed(
                offset,
                format!("expected major type {} but found {}", major, head.major),
            ));
        }
        match head.argument {
            Argument::Value(value) => Ok(value),
            Argument::Indefinite => Err(malformed(offset, "unexpected indefinite length".to_owned())),
        }
    }

    /// Try to read an unsigned integer (major type 0).
    pub fn read_uint(&mut self) -> Result<u64, DecodeError> {
        self.read_definite(MAJOR_UINT)
    }

    /// Try to read a definite-length UTF-8 text string. The string aliases the
    /// underlying memory.
    pub fn read_text(&mut self) -> Result<&'a str, DecodeError> {
        let offset = self.index;
        let len = self.read_definite(MAJOR_TEXT)?;
        let bytes = self.read_bytes(to_len(len, offset)?)?;
        std::str::from_utf8(bytes).map_err(|_| malformed(offset, "invalid UTF-8 in text string".to_owned()))
    }

    /// Consume a break stop code if it is the next byte.
    pub fn read_break(&mut self) -> Result<bool, DecodeError> {
        if self.peek_byte()? == BREAK {
            self.index += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

pub(crate) fn malformed(offset: usize, reason: String) -> DecodeError {
    DecodeError::new(DecodeErrorKind::Malformed { offset, reason })
}

pub(crate) fn to_len(value: u64, offset: usize) -> Result<usize, DecodeError> {
    usize::try_from(value).map_err(|_| malformed(offset, format!("length {} does not fit in memory", value)))
}

/// Widen an IEEE 754 half-precision float to a double.
pub fn f16_to_f64(bits: u16) -> f64 {
    let exponent = (bits >> 10) & 0x1f;
    let mantissa = (bits & 0x3ff) as f64;
    let value = match exponent {
        0 => mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (mantissa + 1024.0) * 2f64.powi(exponent as i32 - 25),
    };
    if bits & 0x8000 != 0 {
        -value
    } else {
        value
    }
}

#[test]
fn read_byte() {
    let read = |bytes| ByteBuffer::new(bytes).read_byte();
    assert!(read(&[]).is_err());
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[255]), Ok(255));
}

#[test]
fn read_bytes() {
    let read = |bytes, len| ByteBuffer::new(bytes).read_bytes(len);
    assert_eq!(read(&[], 0), Ok(vec![].as_slice()));
    assert!(read(&[], 1).is_err());
    assert_eq!(read(&[0], 1), Ok(vec![0].as_slice()));
    assert!(read(&[0], usize::MAX).is_err());

    let mut bb = ByteBuffer::new(&[1, 2, 3, 4, 5]);
    assert_eq!(bb.read_bytes(3), Ok(vec![1, 2, 3].as_slice()));
    assert_eq!(bb.read_bytes(2), Ok(vec![4, 5].as_slice()));
    assert!(bb.read_bytes(1).is_err());
}

#[test]
fn read_uint() {
    let read = |bytes| ByteBuffer::new(bytes).read_uint();
    assert!(read(&[]).is_err());
    assert_eq!(read(&[0x00]), Ok(0));
    assert_eq!(read(&[0x17]), Ok(23));
    assert_eq!(read(&[0x18, 0x18]), Ok(24));
    assert_eq!(read(&[0x19, 0x01, 0x00]), Ok(256));
    assert_eq!(read(&[0x1a, 0x00, 0x01, 0x00, 0x00]), Ok(65536));
    assert_eq!(
        read(&[0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
        Ok(u64::MAX)
    );
    assert!(read(&[0x18]).is_err());
    assert!(read(&[0x1c]).is_err());
    assert!(read(&[0x20]).is_err());
}

#[test]
fn read_head_indefinite() {
    let mut bb = ByteBuffer::new(&[0x9f, 0x01, 0xff]);
    assert_eq!(
        bb.read_head(),
        Ok(Head { major: MAJOR_ARRAY, info: 31, argument: Argument::Indefinite })
    );
    assert_eq!(bb.read_uint(), Ok(1));
    assert_eq!(bb.read_break(), Ok(true));

    // Unsigned integers and tags never have an indefinite form.
    assert!(ByteBuffer::new(&[0x1f]).read_head().is_err());
    assert!(ByteBuffer::new(&[0xdf]).read_head().is_err());
}

#[test]
fn read_text() {
    let read = |bytes| ByteBuffer::new(bytes).read_text();
    assert_eq!(read(&[0x60]), Ok(""));
    assert_eq!(read(&[0x61, 0x61]), Ok("a"));
    assert_eq!(read(&[0x64, 240, 159, 141, 149]), Ok("🍕"));
    assert!(read(&[0x62, 0x61]).is_err());
    assert!(read(&[0x61, 0xff]).is_err());
}

#[test]
fn half_floats() {
    assert_eq!(f16_to_f64(0x0000), 0.0);
    assert_eq!(f16_to_f64(0x3c00), 1.0);
    assert_eq!(f16_to_f64(0xc400), -4.0);
    assert_eq!(f16_to_f64(0x7bff), 65504.0);
    assert_eq!(f16_to_f64(0x0001), 5.960464477539063e-8);
    assert_eq!(f16_to_f64(0x7c00), f64::INFINITY);
    assert!(f16_to_f64(0x7e00).is_nan());
}

/// A CBOR byte buffer meant for writing.
///
/// Example usage:
///
/// ```
/// let mut bb = brine_cddl_runtime::ByteBufferMut::new();
/// bb.write_uint(100);
/// bb.write_text("abc");
/// assert_eq!(bb.data(), [0x18, 0x64, 0x63, 0x61, 0x62, 0x63]);
/// ```
///
#[derive(Default)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Consumes this buffer and returns the underlying backing store. Use this
    /// to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a raw byte to the end of the buffer.
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write an item head using the shortest argument encoding.
    pub fn write_head(&mut self, major: u8, value: u64) {
        let major = major << 5;
        if value < 24 {
            self.data.push(major | value as u8);
        } else if value <= u8::MAX as u64 {
            self.data.push(major | 24);
            self.data.push(value as u8);
        } else if value <= u16::MAX as u64 {
            self.data.push(major | 25);
            self.data.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= u32::MAX as u64 {
            self.data.push(major | 26);
            self.data.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.data.push(major | 27);
            self.data.extend_from_slice(&value.to_be_bytes());
        }
    }

    /// Start an indefinite-length item of the given major type.
    pub fn write_indefinite(&mut self, major: u8) {
        self.data.push((major << 5) | 31);
    }

    pub fn write_break(&mut self) {
        self.data.push(BREAK);
    }

    pub fn write_uint(&mut self, value: u64) {
        self.write_head(MAJOR_UINT, value);
    }

    /// Write the negative integer `-1 - n`.
    pub fn write_nint(&mut self, n: u64) {
        self.write_head(MAJOR_NINT, n);
    }

    pub fn write_int(&mut self, value: i64) {
        if value >= 0 {
            self.write_uint(value as u64);
        } else {
            self.write_nint(!value as u64);
        }
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_head(MAJOR_BYTES, value.len() as u64);
        self.data.extend_from_slice(value);
    }

    pub fn write_text(&mut self, value: &str) {
        self.write_head(MAJOR_TEXT, value.len() as u64);
        self.data.extend_from_slice(value.as_bytes());
    }

    pub fn write_array_header(&mut self, len: usize) {
        self.write_head(MAJOR_ARRAY, len as u64);
    }

    pub fn write_map_header(&mut self, len: usize) {
        self.write_head(MAJOR_MAP, len as u64);
    }

    pub fn write_tag(&mut self, tag: u64) {
        self.write_head(MAJOR_TAG, tag);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.push(if value { 0xf5 } else { 0xf4 });
    }

    pub fn write_null(&mut self) {
        self.data.push(0xf6);
    }

    pub fn write_undefined(&mut self) {
        self.data.push(0xf7);
    }

    /// Floats are always written at double precision.
    pub fn write_float(&mut self, value: f64) {
        self.data.push(0xfb);
        self.data.extend_from_slice(&value.to_bits().to_be_bytes());
    }
}

#[test]
fn write_head() {
    let write = |major, value| {
        let mut bb = ByteBufferMut::new();
        bb.write_head(major, value);
        bb.data()
    };
    assert_eq!(write(MAJOR_UINT, 0), [0x00]);
    assert_eq!(write(MAJOR_UINT, 23), [0x17]);
    assert_eq!(write(MAJOR_UINT, 24), [0x18, 0x18]);
    assert_eq!(write(MAJOR_UINT, 255), [0x18, 0xff]);
    assert_eq!(write(MAJOR_UINT, 256), [0x19, 0x01, 0x00]);
    assert_eq!(write(MAJOR_UINT, 65536), [0x1a, 0x00, 0x01, 0x00, 0x00]);
    assert_eq!(
        write(MAJOR_UINT, u64::MAX),
        [0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
    );
    assert_eq!(write(MAJOR_MAP, 2), [0xa2]);
    assert_eq!(write(MAJOR_TAG, 24), [0xd8, 0x18]);
}

#[test]
fn write_int() {
    let write = |value| {
        let mut bb = ByteBufferMut::new();
        bb.write_int(value);
        bb.data()
    };
    assert_eq!(write(0), [0x00]);
    assert_eq!(write(-1), [0x20]);
    assert_eq!(write(-24), [0x37]);
    assert_eq!(write(-25), [0x38, 0x18]);
    assert_eq!(write(-500), [0x39, 0x01, 0xf3]);
    assert_eq!(
        write(i64::MIN),
        [0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
    );
}

#[test]
fn write_sequence() {
    let mut bb = ByteBufferMut::new();
    bb.write_indefinite(MAJOR_ARRAY);
    bb.write_bool(true);
    bb.write_null();
    bb.write_bytes(&[1, 2]);
    bb.write_float(1.5);
    bb.write_break();
    assert_eq!(
        bb.data(),
        [0x9f, 0xf5, 0xf6, 0x42, 0x01, 0x02, 0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0, 0xff]
    );
}
