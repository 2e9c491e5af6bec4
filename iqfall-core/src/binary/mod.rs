pub mod read;
pub mod write;

pub use read::*;
pub use write::*;

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use iqfall_types::ByteOrderKind;

    use super::*;

    #[test]
    fn test_u64_split_both_orders() {
        for order in [ByteOrderKind::Little, ByteOrderKind::Big] {
            let mut buf = Vec::new();
            write_u64_split(&mut buf, order, 0x0000_0001_DCD6_5000);
            assert_eq!(buf.len(), 8);

            let mut cur = Cursor::new(buf.as_slice());
            assert_eq!(read_u64_split(&mut cur, order).unwrap(), 0x0000_0001_DCD6_5000);
        }
    }

    #[test]
    fn test_u32_byte_layout() {
        let mut le = Vec::new();
        write_u32_ordered(&mut le, ByteOrderKind::Little, 0x5048_5849);
        assert_eq!(le, b"IXHP");

        let mut be = Vec::new();
        write_u32_ordered(&mut be, ByteOrderKind::Big, 0x5048_5849);
        assert_eq!(be, b"PHXI");
    }

    #[test]
    fn test_i32_negative() {
        let mut buf = Vec::new();
        write_i32_ordered(&mut buf, ByteOrderKind::Big, -250);

        let mut cur = Cursor::new(buf.as_slice());
        assert_eq!(read_i32_ordered(&mut cur, ByteOrderKind::Big).unwrap(), -250);
    }
}
