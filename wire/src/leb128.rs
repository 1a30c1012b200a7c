//! Signed/unsigned LEB128 varints, DWARF convention.
//!
//! Every length-like field in the journal and mim formats uses these
//! (spec.md §6); the fixed-width snapshot-cache index entries do not.

use crate::error::Error;
use std::io::{Read, Write};

pub fn write_u64<W: Write>(mut w: W, mut value: u64) -> Result<(), Error> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        if value == 0 {
            break;
        }
    }
    Ok(())
}

pub fn read_u64<R: Read>(mut r: R) -> Result<u64, Error> {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        if shift >= 64 {
            return Err(Error::VarintOverflow);
        }
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        let byte = byte[0];
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

pub fn write_i64<W: Write>(mut w: W, mut value: i64) -> Result<(), Error> {
    let mut more = true;
    while more {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        let sign_bit_set = byte & 0x40 != 0;
        if (value == 0 && !sign_bit_set) || (value == -1 && sign_bit_set) {
            more = false;
        } else {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
    }
    Ok(())
}

pub fn read_i64<R: Read>(mut r: R) -> Result<i64, Error> {
    let mut result: i64 = 0;
    let mut shift = 0;
    let mut byte;
    loop {
        if shift >= 64 {
            return Err(Error::VarintOverflow);
        }
        let mut buf = [0u8; 1];
        r.read_exact(&mut buf)?;
        byte = buf[0];
        result |= ((byte & 0x7f) as i64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
    }
    if shift < 64 && (byte & 0x40) != 0 {
        result |= -1i64 << shift;
    }
    Ok(result)
}

pub fn write_u32<W: Write>(w: W, value: u32) -> Result<(), Error> {
    write_u64(w, value as u64)
}

pub fn read_u32<R: Read>(r: R) -> Result<u32, Error> {
    let v = read_u64(r)?;
    u32::try_from(v).map_err(|_| Error::VarintOverflow)
}

pub fn write_i32<W: Write>(w: W, value: i32) -> Result<(), Error> {
    write_i64(w, value as i64)
}

pub fn read_i32<R: Read>(r: R) -> Result<i32, Error> {
    let v = read_i64(r)?;
    i32::try_from(v).map_err(|_| Error::VarintOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn unsigned_known_values() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 300).unwrap();
        assert_eq!(buf, vec![0xAC, 0x02]);
        assert_eq!(read_u64(buf.as_slice()).unwrap(), 300);
    }

    #[test]
    fn signed_known_values() {
        let mut buf = Vec::new();
        write_i64(&mut buf, -123456).unwrap();
        assert_eq!(read_i64(buf.as_slice()).unwrap(), -123456);
    }

    quickcheck! {
        fn roundtrip_u64(value: u64) -> bool {
            let mut buf = Vec::new();
            write_u64(&mut buf, value).unwrap();
            read_u64(buf.as_slice()).unwrap() == value
        }

        fn roundtrip_i64(value: i64) -> bool {
            let mut buf = Vec::new();
            write_i64(&mut buf, value).unwrap();
            read_i64(buf.as_slice()).unwrap() == value
        }

        fn roundtrip_u32(value: u32) -> bool {
            let mut buf = Vec::new();
            write_u32(&mut buf, value).unwrap();
            read_u32(buf.as_slice()).unwrap() == value
        }

        fn roundtrip_i32(value: i32) -> bool {
            let mut buf = Vec::new();
            write_i32(&mut buf, value).unwrap();
            read_i32(buf.as_slice()).unwrap() == value
        }
    }
}
