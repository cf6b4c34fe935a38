use nom::bytes::complete::take;
use nom::number::complete::{be_i16, be_u16, be_u32};
use nom::IResult;

/// Marker the logger uses for "channel not fitted" in 16-bit fields.
pub const UNUSED_U16: u16 = 0xFFFF;

pub struct Utils;

impl Utils {
    pub fn be_u16_div100(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, num) = be_u16(input)?;
        Ok((input, num as f64 / 100.0))
    }

    pub fn be_i16_div10(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, num) = be_i16(input)?;
        Ok((input, num as f64 / 10.0))
    }

    pub fn be_u32_div10(input: &[u8]) -> IResult<&[u8], f64> {
        let (input, num) = be_u32(input)?;
        Ok((input, num as f64 / 10.0))
    }

    // 0xFFFF means the logger has nothing on that channel (a single-phase
    // inverter reports phases 2 and 3 like this, for example).
    pub fn be_u16_checked(input: &[u8]) -> IResult<&[u8], Option<u16>> {
        let (input, num) = be_u16(input)?;
        Ok((input, (num != UNUSED_U16).then_some(num)))
    }

    pub fn be_u16_checked_div10(input: &[u8]) -> IResult<&[u8], Option<f64>> {
        let (input, num) = Self::be_u16_checked(input)?;
        Ok((input, num.map(|n| n as f64 / 10.0)))
    }

    pub fn be_u16_checked_div100(input: &[u8]) -> IResult<&[u8], Option<f64>> {
        let (input, num) = Self::be_u16_checked(input)?;
        Ok((input, num.map(|n| n as f64 / 100.0)))
    }

    /// Fixed-width ASCII field, with NUL and space padding stripped.
    pub fn ascii_string(input: &[u8], len: usize) -> IResult<&[u8], String> {
        let (input, raw) = take(len)(input)?;
        let s = String::from_utf8_lossy(raw)
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string();
        Ok((input, s))
    }

    /// Formats bytes as colon separated hex, `68:02:40:30`.
    pub fn hex(data: &[u8]) -> String {
        data.iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}
