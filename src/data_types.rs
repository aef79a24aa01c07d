//! Data types and field readers shared by the formats.

use core::fmt::Write as _;

/// Read a little endian `u16` at `at`,
/// or `None` if the slice is too short.
pub(crate) fn le_u16(input: &[u8], at: usize) -> Option<u16> {
    let bytes = input.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a little endian `u32` at `at`,
/// or `None` if the slice is too short.
pub(crate) fn le_u32(input: &[u8], at: usize) -> Option<u32> {
    let bytes = input.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a big endian `u16` at `at`,
/// or `None` if the slice is too short.
pub(crate) fn be_u16(input: &[u8], at: usize) -> Option<u16> {
    let bytes = input.get(at..at.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big endian `u32` at `at`,
/// or `None` if the slice is too short.
pub(crate) fn be_u32(input: &[u8], at: usize) -> Option<u32> {
    let bytes = input.get(at..at.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Display an array of bytes as ASCII text
pub(crate) struct Ascii<T>(pub T);

impl<T> core::fmt::Debug for Ascii<T>
where
    T: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_char('"')?;
        core::fmt::Display::fmt(self, f)?;
        f.write_char('"')?;
        Ok(())
    }
}

impl<T> core::fmt::Display for Ascii<T>
where
    T: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for &byte in self.0.as_ref() {
            if byte.is_ascii_graphic() {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02X}", byte)?;
            }
        }
        Ok(())
    }
}
