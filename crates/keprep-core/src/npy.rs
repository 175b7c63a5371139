//! Minimal `.npy` support for 1-D `int64` arrays.
//!
//! Writes NumPy format 1.0: magic, version, little-endian header length, a
//! Python-literal header dict padded to a 64-byte boundary, then raw
//! little-endian values.

use crate::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;

/// Encode `values` as a 1-D `<i8` array.
pub fn encode_i64(values: &[i64]) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<i8', 'fortran_order': False, 'shape': ({},), }}",
        values.len()
    );
    // magic(6) + version(2) + header_len(2) + dict + padding + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(unpadded + padding + values.len() * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    // Format 1.0 stores the header length as u16; the dict above is far shorter.
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Write `values` to `path` as a 1-D `<i8` array.
pub fn write_i64(path: impl AsRef<Path>, values: &[i64]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&encode_i64(values))?;
    writer.flush()?;
    Ok(())
}

/// Read a 1-D `<i8` array written by [`write_i64`].
pub fn read_i64(path: impl AsRef<Path>) -> Result<Vec<i64>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    decode_i64(&bytes)
}

pub fn decode_i64(bytes: &[u8]) -> Result<Vec<i64>> {
    if bytes.len() < 10 || &bytes[0..6] != MAGIC {
        return Err(invalid("Invalid NPY magic number"));
    }
    if (bytes[6], bytes[7]) != (1, 0) {
        return Err(invalid(format!(
            "Unsupported NPY version: {:?}",
            (bytes[6], bytes[7])
        )));
    }
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = 10 + header_len;
    if bytes.len() < data_start {
        return Err(invalid("Truncated NPY header"));
    }
    let header = String::from_utf8_lossy(&bytes[10..data_start]);
    if !header.contains("'<i8'") {
        return Err(invalid(format!("Unsupported NPY dtype in header: {}", header.trim())));
    }

    let data = &bytes[data_start..];
    if data.len() % 8 != 0 {
        return Err(invalid("NPY payload is not a whole number of int64 values"));
    }
    Ok(data
        .chunks_exact(8)
        .map(|c| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(c);
            i64::from_le_bytes(buf)
        })
        .collect())
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into()))
}
