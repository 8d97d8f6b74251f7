use std::collections::BTreeMap;

use thiserror::Error;

const SNAPSHOT_MAGIC: [u8; 4] = *b"MTKS";
const FORMAT_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

/// magic + format version + device id + device version
const HEADER_LEN: usize = 4 + 4 + 4 + 4;
/// tag (u16) + payload length (u32)
const FIELD_HEADER_LEN: usize = 2 + 4;

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unexpected end of snapshot data")]
    UnexpectedEof,

    #[error("invalid snapshot magic")]
    InvalidMagic,

    #[error("unsupported snapshot format major version {found} (supported: {supported})")]
    UnsupportedFormatVersion { found: u16, supported: u16 },

    #[error("snapshot device id mismatch (expected {expected:?}, found {found:?})")]
    DeviceIdMismatch { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported device major version {found} (supported: {supported})")]
    UnsupportedDeviceMajorVersion { found: u16, supported: u16 },

    #[error("duplicate snapshot field tag {0}")]
    DuplicateFieldTag(u16),

    #[error("invalid field encoding: {0}")]
    InvalidFieldEncoding(&'static str),

    #[error("corrupt snapshot: {0}")]
    Corrupt(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotVersion {
    pub major: u16,
    pub minor: u16,
}

impl SnapshotVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub format_version: SnapshotVersion,
    pub device_id: [u8; 4],
    pub device_version: SnapshotVersion,
}

/// Builds a device snapshot blob.
///
/// Fields are buffered and emitted in ascending tag order by [`SnapshotWriter::finish`], so the
/// output is independent of the order in which a device writes its fields. Writing the same tag
/// twice keeps the last value.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    device_id: [u8; 4],
    device_version: SnapshotVersion,
    fields: BTreeMap<u16, Vec<u8>>,
}

impl SnapshotWriter {
    pub fn new(device_id: [u8; 4], device_version: SnapshotVersion) -> Self {
        Self {
            device_id,
            device_version,
            fields: BTreeMap::new(),
        }
    }

    pub fn field_u8(&mut self, tag: u16, value: u8) {
        self.fields.insert(tag, vec![value]);
    }

    pub fn field_u16(&mut self, tag: u16, value: u16) {
        self.fields.insert(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u32(&mut self, tag: u16, value: u32) {
        self.fields.insert(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u64(&mut self, tag: u16, value: u64) {
        self.fields.insert(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_bool(&mut self, tag: u16, value: bool) {
        self.field_u8(tag, u8::from(value));
    }

    pub fn field_bytes(&mut self, tag: u16, bytes: Vec<u8>) {
        self.fields.insert(tag, bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        let body_len: usize = self
            .fields
            .values()
            .map(|payload| FIELD_HEADER_LEN + payload.len())
            .sum();
        let mut out = Vec::with_capacity(HEADER_LEN + body_len);

        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.major.to_le_bytes());
        out.extend_from_slice(&FORMAT_VERSION.minor.to_le_bytes());
        out.extend_from_slice(&self.device_id);
        out.extend_from_slice(&self.device_version.major.to_le_bytes());
        out.extend_from_slice(&self.device_version.minor.to_le_bytes());

        for (tag, payload) in self.fields {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&payload);
        }
        out
    }
}

/// Parsed view over a device snapshot blob.
///
/// Typed accessors return `Ok(None)` when the tag is absent (older snapshot) and
/// [`SnapshotError::InvalidFieldEncoding`] when the payload has the wrong size.
#[derive(Debug, Clone)]
pub struct SnapshotReader<'a> {
    header: SnapshotHeader,
    fields: BTreeMap<u16, &'a [u8]>,
}

impl<'a> SnapshotReader<'a> {
    pub fn parse(bytes: &'a [u8], expected_device_id: [u8; 4]) -> SnapshotResult<Self> {
        let mut d = codec::Decoder::new(bytes);

        let magic = d.array::<4>()?;
        if magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }

        let format_version = SnapshotVersion::new(d.u16()?, d.u16()?);
        if format_version.major != FORMAT_VERSION.major {
            return Err(SnapshotError::UnsupportedFormatVersion {
                found: format_version.major,
                supported: FORMAT_VERSION.major,
            });
        }

        let device_id = d.array::<4>()?;
        if device_id != expected_device_id {
            return Err(SnapshotError::DeviceIdMismatch {
                expected: expected_device_id,
                found: device_id,
            });
        }
        let device_version = SnapshotVersion::new(d.u16()?, d.u16()?);

        let mut fields = BTreeMap::new();
        while !d.is_empty() {
            let tag = d.u16()?;
            let len = d.u32()? as usize;
            let payload = d.bytes(len)?;
            if fields.insert(tag, payload).is_some() {
                return Err(SnapshotError::DuplicateFieldTag(tag));
            }
        }

        Ok(Self {
            header: SnapshotHeader {
                format_version,
                device_id,
                device_version,
            },
            fields,
        })
    }

    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    pub fn ensure_device_major(&self, supported: u16) -> SnapshotResult<()> {
        let found = self.header.device_version.major;
        if found != supported {
            return Err(SnapshotError::UnsupportedDeviceMajorVersion { found, supported });
        }
        Ok(())
    }

    pub fn bytes(&self, tag: u16) -> Option<&'a [u8]> {
        self.fields.get(&tag).copied()
    }

    pub fn u8(&self, tag: u16) -> SnapshotResult<Option<u8>> {
        self.fixed::<1>(tag, "u8 field").map(|v| v.map(|b| b[0]))
    }

    pub fn u16(&self, tag: u16) -> SnapshotResult<Option<u16>> {
        self.fixed::<2>(tag, "u16 field")
            .map(|v| v.map(u16::from_le_bytes))
    }

    pub fn u32(&self, tag: u16) -> SnapshotResult<Option<u32>> {
        self.fixed::<4>(tag, "u32 field")
            .map(|v| v.map(u32::from_le_bytes))
    }

    pub fn u64(&self, tag: u16) -> SnapshotResult<Option<u64>> {
        self.fixed::<8>(tag, "u64 field")
            .map(|v| v.map(u64::from_le_bytes))
    }

    pub fn bool(&self, tag: u16) -> SnapshotResult<Option<bool>> {
        match self.u8(tag)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(_) => Err(SnapshotError::InvalidFieldEncoding("bool field")),
        }
    }

    fn fixed<const N: usize>(
        &self,
        tag: u16,
        what: &'static str,
    ) -> SnapshotResult<Option<[u8; N]>> {
        let Some(payload) = self.fields.get(&tag) else {
            return Ok(None);
        };
        let array: [u8; N] = (*payload)
            .try_into()
            .map_err(|_| SnapshotError::InvalidFieldEncoding(what))?;
        Ok(Some(array))
    }
}

/// Little-endian helpers for encoding nested field payloads.
pub mod codec {
    use super::{SnapshotError, SnapshotResult};

    #[derive(Debug, Default, Clone)]
    pub struct Encoder {
        buf: Vec<u8>,
    }

    impl Encoder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn u8(mut self, value: u8) -> Self {
            self.buf.push(value);
            self
        }

        pub fn u16(mut self, value: u16) -> Self {
            self.buf.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub fn u32(mut self, value: u32) -> Self {
            self.buf.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub fn u64(mut self, value: u64) -> Self {
            self.buf.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub fn bool(self, value: bool) -> Self {
            self.u8(u8::from(value))
        }

        pub fn bytes(mut self, bytes: &[u8]) -> Self {
            self.buf.extend_from_slice(bytes);
            self
        }

        pub fn finish(self) -> Vec<u8> {
            self.buf
        }
    }

    #[derive(Debug, Clone)]
    pub struct Decoder<'a> {
        buf: &'a [u8],
    }

    impl<'a> Decoder<'a> {
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf }
        }

        pub fn is_empty(&self) -> bool {
            self.buf.is_empty()
        }

        pub fn remaining(&self) -> usize {
            self.buf.len()
        }

        pub fn bytes(&mut self, len: usize) -> SnapshotResult<&'a [u8]> {
            if self.buf.len() < len {
                return Err(SnapshotError::UnexpectedEof);
            }
            let (head, tail) = self.buf.split_at(len);
            self.buf = tail;
            Ok(head)
        }

        pub fn array<const N: usize>(&mut self) -> SnapshotResult<[u8; N]> {
            let bytes = self.bytes(N)?;
            let mut out = [0u8; N];
            out.copy_from_slice(bytes);
            Ok(out)
        }

        pub fn u8(&mut self) -> SnapshotResult<u8> {
            Ok(self.array::<1>()?[0])
        }

        pub fn u16(&mut self) -> SnapshotResult<u16> {
            Ok(u16::from_le_bytes(self.array()?))
        }

        pub fn u32(&mut self) -> SnapshotResult<u32> {
            Ok(u32::from_le_bytes(self.array()?))
        }

        pub fn u64(&mut self) -> SnapshotResult<u64> {
            Ok(u64::from_le_bytes(self.array()?))
        }

        pub fn bool(&mut self) -> SnapshotResult<bool> {
            match self.u8()? {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(SnapshotError::InvalidFieldEncoding("bool")),
            }
        }

        /// Fails if any bytes remain unread.
        pub fn finish(self) -> SnapshotResult<()> {
            if !self.buf.is_empty() {
                return Err(SnapshotError::Corrupt("trailing bytes in field payload"));
            }
            Ok(())
        }
    }
}
