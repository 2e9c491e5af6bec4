use std::io::{Cursor, Result};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use iqfall_types::ByteOrderKind;

pub fn read_u32_ordered(
    cur: &mut Cursor<&[u8]>,
    order: ByteOrderKind,
) -> Result<u32> {
    match order {
        ByteOrderKind::Little => cur.read_u32::<LittleEndian>(),
        ByteOrderKind::Big => cur.read_u32::<BigEndian>(),
    }
}

pub fn read_i32_ordered(
    cur: &mut Cursor<&[u8]>,
    order: ByteOrderKind,
) -> Result<i32> {
    match order {
        ByteOrderKind::Little => cur.read_i32::<LittleEndian>(),
        ByteOrderKind::Big => cur.read_i32::<BigEndian>(),
    }
}

/// Читает 64-битное значение, переданное двумя словами `lo`, `hi`.
pub fn read_u64_split(
    cur: &mut Cursor<&[u8]>,
    order: ByteOrderKind,
) -> Result<u64> {
    let lo = read_u32_ordered(cur, order)? as u64;
    let hi = read_u32_ordered(cur, order)? as u64;

    Ok((hi << 32) | lo)
}
