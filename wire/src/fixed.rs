//! Fixed-width little-endian helpers for headers and snapshot-cache index entries.
use crate::error::Error;
use std::io::{Read, Write};

pub fn write_u64_le<W: Write>(mut w: W, value: u64) -> Result<(), Error> {
    w.write_all(&value.to_le_bytes()).map_err(Into::into)
}

pub fn read_u64_le<R: Read>(mut r: R) -> Result<u64, Error> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_u32_le<W: Write>(mut w: W, value: u32) -> Result<(), Error> {
    w.write_all(&value.to_le_bytes()).map_err(Into::into)
}

pub fn read_u32_le<R: Read>(mut r: R) -> Result<u32, Error> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_u16_le<W: Write>(mut w: W, value: u16) -> Result<(), Error> {
    w.write_all(&value.to_le_bytes()).map_err(Into::into)
}

pub fn read_u16_le<R: Read>(mut r: R) -> Result<u16, Error> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}
