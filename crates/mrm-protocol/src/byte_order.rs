//! 负载字段字节序
//!
//! 各板卡固件对 16/32 位字段的打包方式并不统一：大部分按小端发送，
//! 测温板与 mrm-node 使用 `(data[1] << 8) | data[2]`（大端）。
//! 字节序是每种板卡类型的固定常量，由 [`crate::BoardKind::byte_order`] 给出。

/// 多字节字段的字节序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// 读取 `data[offset..offset + 2]` 为 u16，越界返回 `None`
    pub fn read_u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    /// 读取 i16
    pub fn read_i16(self, data: &[u8], offset: usize) -> Option<i16> {
        self.read_u16(data, offset).map(|v| v as i16)
    }

    /// 读取 `data[offset..offset + 4]` 为 i32
    pub fn read_i32(self, data: &[u8], offset: usize) -> Option<i32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => i32::from_le_bytes(bytes),
            ByteOrder::Big => i32::from_be_bytes(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoardKind;

    #[test]
    fn test_read_u16_both_orders() {
        let data = [0x13, 0x34, 0x12];
        assert_eq!(ByteOrder::Little.read_u16(&data, 1), Some(0x1234));
        assert_eq!(ByteOrder::Big.read_u16(&data, 1), Some(0x3412));
    }

    #[test]
    fn test_read_i16_negative() {
        let data = [0x13, 0xFF, 0xFE];
        assert_eq!(ByteOrder::Big.read_i16(&data, 1), Some(-2));
        assert_eq!(ByteOrder::Little.read_i16(&data, 1), Some(-257));
    }

    #[test]
    fn test_read_out_of_bounds() {
        assert_eq!(ByteOrder::Little.read_u16(&[0x13, 0x01], 1), None);
        assert_eq!(ByteOrder::Little.read_i32(&[0x13, 1, 2, 3], 1), None);
    }

    #[test]
    fn test_read_i32() {
        let data = [0x13, 0x78, 0x56, 0x34, 0x12];
        assert_eq!(ByteOrder::Little.read_i32(&data, 1), Some(0x12345678));
    }

    #[test]
    fn test_per_kind_order_is_fixed() {
        assert_eq!(BoardKind::Thermal.byte_order(), ByteOrder::Big);
        assert_eq!(BoardKind::Node.byte_order(), ByteOrder::Big);
        assert_eq!(BoardKind::Color.byte_order(), ByteOrder::Little);
        assert_eq!(BoardKind::Lidar2m.byte_order(), ByteOrder::Little);
    }
}
