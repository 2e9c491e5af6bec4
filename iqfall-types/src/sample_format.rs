use crate::{ProtocolError, ProtocolResult};

/// Формат IQ выборок, объявленный источником
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SampleFormat {
    /// 16-битные целые числа (I16, Q16)
    Int16 = 1,
    /// 32-битные числа с плавающей точкой (F32, F32), уже нормированы
    Float32 = 2,
    /// 8-битные беззнаковые (U8, U8) со смещением 127.5
    UInt8 = 3,
}

impl SampleFormat {
    pub fn from_u32(v: u32) -> ProtocolResult<Self> {
        match v {
            1 => Ok(SampleFormat::Int16),
            2 => Ok(SampleFormat::Float32),
            3 => Ok(SampleFormat::UInt8),
            _ => Err(ProtocolError::UnsupportedFormat(v)),
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Размер одной компоненты (I или Q) в байтах
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Float32 => 4,
            SampleFormat::UInt8 => 1,
        }
    }

    /// Размер одной IQ пары в байтах
    pub fn pair_size(&self) -> usize {
        2 * self.bytes_per_sample()
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            SampleFormat::Int16 => "S16",
            SampleFormat::Float32 => "F32",
            SampleFormat::UInt8 => "U8",
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl std::str::FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int16" | "i16" | "s16" => Ok(SampleFormat::Int16),
            "float32" | "f32" => Ok(SampleFormat::Float32),
            "uint8" | "u8" => Ok(SampleFormat::UInt8),
            _ => Err(format!(
                "Unknown sample format '{s}'. Use: int16, float32, uint8"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u32_round_trip() {
        for f in [SampleFormat::Int16, SampleFormat::Float32, SampleFormat::UInt8] {
            assert_eq!(SampleFormat::from_u32(f.as_u32()).unwrap(), f);
        }
        assert!(matches!(
            SampleFormat::from_u32(0),
            Err(ProtocolError::UnsupportedFormat(0))
        ));
    }

    #[test]
    fn test_pair_size() {
        assert_eq!(SampleFormat::Int16.pair_size(), 4);
        assert_eq!(SampleFormat::Float32.pair_size(), 8);
        assert_eq!(SampleFormat::UInt8.pair_size(), 2);
    }

    #[test]
    fn test_fromstr() {
        assert_eq!("s16".parse::<SampleFormat>().unwrap(), SampleFormat::Int16);
        assert_eq!("F32".parse::<SampleFormat>().unwrap(), SampleFormat::Float32);
        assert_eq!("u8".parse::<SampleFormat>().unwrap(), SampleFormat::UInt8);
        assert!("i24".parse::<SampleFormat>().is_err());
    }
}
