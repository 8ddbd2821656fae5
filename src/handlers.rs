//! Codec handlers (spec §6 "Entry I/O format"). Each handler is a pure
//! `(table, write, userbuf, lenp, ppos) -> error|bytes` function over the
//! entry's shared [`Datum`](crate::header::Datum); the filesystem adapter
//! dispatches to these after permission checks, never interpreting the
//! wire format itself.

use crate::error::{SysctlError, SysctlResult};
use crate::header::{Datum, Extra, Handler, TableEntry};

/// read(entry, offset, len) -> bytes written into the caller's buffer,
/// formatted per the entry's handler.
pub fn read(entry: &TableEntry, offset: usize, len: usize) -> SysctlResult<Vec<u8>> {
    let datum = entry.datum.lock().unwrap();
    let encoded = match entry.handler {
        Handler::String => encode_string(&datum, entry.maxlen),
        Handler::IntVec | Handler::IntMinMax => encode_ints(&datum, &entry.extra, 1),
        Handler::Jiffies => encode_ints(&datum, &entry.extra, entry.extra.hz),
        Handler::Bitmap => encode_bitmap(&datum),
    }?;
    Ok(slice_from_offset(&encoded, offset, len))
}

/// write(entry, offset, payload) -> bytes consumed, per the entry's handler.
pub fn write(entry: &TableEntry, offset: usize, payload: &[u8]) -> SysctlResult<usize> {
    let mut datum = entry.datum.lock().unwrap();
    match entry.handler {
        Handler::String => decode_string(&mut datum, entry.maxlen, payload),
        Handler::IntVec => decode_ints(&mut datum, entry.maxlen, &Extra::none(), payload),
        Handler::IntMinMax => decode_ints(&mut datum, entry.maxlen, &entry.extra, payload),
        Handler::Jiffies => decode_jiffies(&mut datum, entry.maxlen, entry.extra.hz, payload),
        Handler::Bitmap => decode_bitmap(&mut datum, offset, payload),
    }
}

fn slice_from_offset(bytes: &[u8], offset: usize, len: usize) -> Vec<u8> {
    if offset >= bytes.len() {
        return Vec::new();
    }
    let end = (offset + len).min(bytes.len());
    bytes[offset..end].to_vec()
}

// ---- string (spec §6 "String entries") ------------------------------------

fn encode_string(datum: &Datum, maxlen: usize) -> SysctlResult<Vec<u8>> {
    let Datum::Bytes(bytes) = datum else { return Err(SysctlError::Inval) };
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len()).min(maxlen);
    let mut out = bytes[..len].to_vec();
    if out.len() < maxlen {
        out.push(b'\n');
    }
    Ok(out)
}

/// Copies up to `maxlen - 1` bytes, truncating at the first NUL or newline,
/// and NUL-terminates. Returns the number of input bytes consumed — the
/// full payload length, per spec example 2 ("return value = 200" for a
/// 200-byte write that stored only 127 bytes).
fn decode_string(datum: &mut Datum, maxlen: usize, payload: &[u8]) -> SysctlResult<usize> {
    if maxlen == 0 {
        return Err(SysctlError::Inval);
    }
    let limit = maxlen - 1;
    let cut = payload.iter().position(|&b| b == 0 || b == b'\n').unwrap_or(payload.len()).min(limit);
    let mut stored = payload[..cut].to_vec();
    stored.push(0);
    stored.resize(maxlen, 0);
    *datum = Datum::Bytes(stored);
    Ok(payload.len())
}

// ---- integer vector / int-minmax (spec §6 "Integer vector entries") -------

fn encode_ints(datum: &Datum, extra: &Extra, hz: i64) -> SysctlResult<Vec<u8>> {
    let Datum::Ints(values) = datum else { return Err(SysctlError::Inval) };
    let _ = extra;
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        let scaled = v.checked_div(hz).ok_or(SysctlError::Inval)?;
        out.push_str(&scaled.to_string());
    }
    out.push('\n');
    Ok(out.into_bytes())
}

fn decode_ints(datum: &mut Datum, maxlen: usize, extra: &Extra, payload: &[u8]) -> SysctlResult<usize> {
    decode_ints_scaled(datum, maxlen, extra, 1, payload)
}

fn decode_jiffies(datum: &mut Datum, maxlen: usize, hz: i64, payload: &[u8]) -> SysctlResult<usize> {
    decode_ints_scaled(datum, maxlen, &Extra::none(), hz, payload)
}

/// The element width `maxlen` is denominated in (spec §6 "assign
/// element-wise up to `maxlen/sizeof(element)`", matching the original's
/// C `int` element, not this crate's wider `i64` storage type).
const ELEMENT_WIDTH: usize = std::mem::size_of::<i32>();

/// Shared parser for int-vector, int-minmax and jiffies writes: whitespace
/// separated decimal integers (optional leading `-`), scaled by `hz`
/// (1 for plain integer vectors), bounds-checked if `extra` carries a
/// min/max, assigned up to `maxlen / sizeof(element)` elements.
fn decode_ints_scaled(datum: &mut Datum, maxlen: usize, extra: &Extra, hz: i64, payload: &[u8]) -> SysctlResult<usize> {
    let text = std::str::from_utf8(payload).map_err(|_| SysctlError::Inval)?;
    let max_elements = maxlen / ELEMENT_WIDTH;
    let mut values = Vec::new();
    for tok in text.split_whitespace() {
        if values.len() >= max_elements {
            break;
        }
        let parsed: i64 = tok.parse().map_err(|_| SysctlError::Inval)?;
        let scaled = parsed.checked_mul(hz).ok_or(SysctlError::Inval)?;
        if let Some(min) = extra.min {
            if scaled < min {
                return Err(SysctlError::Inval);
            }
        }
        if let Some(max) = extra.max {
            if scaled > max {
                return Err(SysctlError::Inval);
            }
        }
        values.push(scaled);
    }
    *datum = Datum::Ints(values);
    Ok(payload.len())
}

// ---- bitmap (spec §6 "Bitmap entries") -------------------------------------

fn encode_bitmap(datum: &Datum) -> SysctlResult<Vec<u8>> {
    let Datum::Bitmap(bits) = datum else { return Err(SysctlError::Inval) };
    Ok(format_ranges(*bits).into_bytes())
}

/// Formats the set bits of `bits` as `a,b-c,d` canonical range-list form.
fn format_ranges(bits: u64) -> String {
    let mut parts = Vec::new();
    let mut i = 0u32;
    while i < 64 {
        if bits & (1 << i) == 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < 64 && bits & (1 << i) != 0 {
            i += 1;
        }
        let end = i - 1;
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    let mut out = parts.join(",");
    out.push('\n');
    out
}

/// Parses `a,b-c,d` range-list syntax. At offset zero the result replaces
/// the bitmap; at a non-zero offset it is OR'd in (spec §6 "on write with
/// non-zero file offset, OR into existing bitmap; at offset zero, replace").
fn decode_bitmap(datum: &mut Datum, offset: usize, payload: &[u8]) -> SysctlResult<usize> {
    let text = std::str::from_utf8(payload).map_err(|_| SysctlError::Inval)?;
    let mut parsed: u64 = 0;
    for item in text.trim().split(',').filter(|s| !s.is_empty()) {
        match item.split_once('-') {
            Some((a, b)) => {
                let start: u32 = a.parse().map_err(|_| SysctlError::Inval)?;
                let end: u32 = b.parse().map_err(|_| SysctlError::Inval)?;
                if start > end || end >= 64 {
                    return Err(SysctlError::Inval);
                }
                for bit in start..=end {
                    parsed |= 1 << bit;
                }
            }
            None => {
                let bit: u32 = item.parse().map_err(|_| SysctlError::Inval)?;
                if bit >= 64 {
                    return Err(SysctlError::Inval);
                }
                parsed |= 1 << bit;
            }
        }
    }

    let Datum::Bitmap(existing) = datum else { return Err(SysctlError::Inval) };
    if offset == 0 {
        *existing = parsed;
    } else {
        *existing |= parsed;
    }
    Ok(payload.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn entry(handler: Handler, maxlen: usize, extra: Extra, datum: Datum) -> TableEntry {
        TableEntry { procname: "x".into(), maxlen, mode: 0o644, handler, extra, datum: Arc::new(Mutex::new(datum)) }
    }

    #[test]
    fn int_minmax_round_trip_with_bounds() {
        // maxlen:4 is one C-int-wide element (spec example 1's pid_max) —
        // this must not be zero-capacity just because `Datum::Ints` stores
        // wider `i64`s internally.
        let e = entry(Handler::IntMinMax, 4, Extra::min_max(300, 32768), Datum::Ints(vec![0]));
        write(&e, 0, b"1024\n").unwrap();
        let out = read(&e, 0, 8).unwrap();
        assert_eq!(out, b"1024\n");
        assert_eq!(write(&e, 0, b"100\n"), Err(SysctlError::Inval));
        assert_eq!(write(&e, 0, b"99999\n"), Err(SysctlError::Inval));
    }

    #[test]
    fn string_truncates_and_reports_full_len() {
        let e = entry(Handler::String, 128, Extra::none(), Datum::Bytes(vec![0; 128]));
        let payload = vec![b'a'; 200];
        let n = write(&e, 0, &payload).unwrap();
        assert_eq!(n, 200);
        let Datum::Bytes(stored) = &*e.datum.lock().unwrap() else { unreachable!() };
        assert_eq!(stored.len(), 128);
        assert_eq!(stored[127], 0);
        assert!(stored[..127].iter().all(|&b| b == b'a'));
    }

    #[test]
    fn bitmap_round_trip_and_clear() {
        let e = entry(Handler::Bitmap, 8, Extra::none(), Datum::Bitmap(0));
        write(&e, 0, b"1,3-5,10\n").unwrap();
        assert_eq!(read(&e, 0, 64).unwrap(), b"1,3-5,10\n");
        write(&e, 0, b"\n").unwrap();
        assert_eq!(read(&e, 0, 64).unwrap(), b"\n");
    }

    #[test]
    fn bitmap_write_at_nonzero_offset_ors_in() {
        let e = entry(Handler::Bitmap, 8, Extra::none(), Datum::Bitmap(0));
        write(&e, 0, b"1\n").unwrap();
        write(&e, 4, b"3\n").unwrap();
        assert_eq!(read(&e, 0, 64).unwrap(), b"1,3\n");
    }

    #[test]
    fn jiffies_scales_on_write_and_read() {
        let e = entry(Handler::Jiffies, 8, Extra::jiffies(100), Datum::Ints(vec![0]));
        write(&e, 0, b"2\n").unwrap();
        let Datum::Ints(stored) = &*e.datum.lock().unwrap() else { unreachable!() };
        assert_eq!(stored[0], 200);
        drop(stored);
        assert_eq!(read(&e, 0, 8).unwrap(), b"2\n");
    }
}
