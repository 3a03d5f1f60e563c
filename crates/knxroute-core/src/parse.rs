use crate::address::{GroupAddress, IndividualAddress};
use crate::ParseError;

/// Parses an individual address in `area.line.device` notation.
pub fn readaddr(text: &str) -> Result<IndividualAddress, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parts = text.split('.');
    let area = parse_field(parts.next(), 0x0F)?;
    let line = parse_field(parts.next(), 0x0F)?;
    let device = parse_field(parts.next(), 0xFF)?;
    if parts.next().is_some() {
        return Err(ParseError::InvalidSyntax);
    }
    Ok(IndividualAddress::new(area as u8, line as u8, device as u8))
}

/// Parses an address block `area.line.device:len`, returning the first
/// address and the block length.
///
/// A bare address is a block of one. The block must not run past the end of
/// its line.
pub fn readaddrblock(text: &str) -> Result<(IndividualAddress, u16), ParseError> {
    let text = text.trim();
    let (addr, len) = match text.split_once(':') {
        Some((addr, len)) => {
            let len = parse_field(Some(len.trim()), 0x100).map_err(|err| match err {
                ParseError::OutOfRange => ParseError::InvalidLength,
                other => other,
            })?;
            (addr, len as u16)
        }
        None => (text, 1),
    };

    let start = readaddr(addr)?;
    if len == 0 || u16::from(start.device()) + len > 0x100 {
        return Err(ParseError::InvalidLength);
    }
    Ok((start, len))
}

/// Parses a group address in three-level (`main/middle/sub`) or two-level
/// (`main/sub`) notation.
pub fn read_group_addr(text: &str) -> Result<GroupAddress, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let parts: Vec<&str> = text.split('/').collect();
    match parts.as_slice() {
        [main, middle, sub] => {
            let main = parse_field(Some(main), 0x1F)?;
            let middle = parse_field(Some(middle), 0x07)?;
            let sub = parse_field(Some(sub), 0xFF)?;
            Ok(GroupAddress::new(main as u8, middle as u8, sub as u8))
        }
        [main, sub] => {
            let main = parse_field(Some(main), 0x1F)?;
            let sub = parse_field(Some(sub), 0x07FF)?;
            Ok(GroupAddress::two_level(main as u8, sub as u16))
        }
        _ => Err(ParseError::InvalidSyntax),
    }
}

fn parse_field(part: Option<&str>, max: u32) -> Result<u32, ParseError> {
    let part = part.ok_or(ParseError::InvalidSyntax)?;
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidSyntax);
    }
    // All-digit input only fails to parse on overflow.
    let value: u32 = part.parse().map_err(|_| ParseError::OutOfRange)?;
    if value > max {
        return Err(ParseError::OutOfRange);
    }
    Ok(value)
}
