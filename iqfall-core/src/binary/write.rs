use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use iqfall_types::ByteOrderKind;

// Запись в Vec<u8> не может завершиться ошибкой, поэтому результат
// WriteBytesExt отбрасывается.

pub fn write_u32_ordered(
    buf: &mut Vec<u8>,
    order: ByteOrderKind,
    val: u32,
) {
    let _ = match order {
        ByteOrderKind::Little => buf.write_u32::<LittleEndian>(val),
        ByteOrderKind::Big => buf.write_u32::<BigEndian>(val),
    };
}

pub fn write_i32_ordered(
    buf: &mut Vec<u8>,
    order: ByteOrderKind,
    val: i32,
) {
    let _ = match order {
        ByteOrderKind::Little => buf.write_i32::<LittleEndian>(val),
        ByteOrderKind::Big => buf.write_i32::<BigEndian>(val),
    };
}

/// Пишет 64-битное значение как два слова: `lo`, затем `hi`.
pub fn write_u64_split(
    buf: &mut Vec<u8>,
    order: ByteOrderKind,
    val: u64,
) {
    write_u32_ordered(buf, order, val as u32);
    write_u32_ordered(buf, order, (val >> 32) as u32);
}
