//! # Human-Readable Record Encoding
//!
//! Records are encoded as text: every character is a 16-bit little-endian
//! code unit, so a hex dump of a container reads almost like the data it
//! stores. The price is space; the payoff is that every field has a fixed,
//! computable width, which keeps record addressing pointer-free.
//!
//! ## Field Widths
//!
//! | Field     | Characters | Bytes |
//! |-----------|------------|-------|
//! | byte      | 3          | 6     |
//! | int       | 11         | 22    |
//! | long      | 20         | 40    |
//! | offset    | 1 + 11     | 24    |
//! | reference | 1 + 20     | 42    |
//!
//! Integers are right-justified, space-padded decimals. Encoding and
//! decoding both run on a negated accumulator so that `i64::MIN`, whose
//! magnitude has no positive counterpart, round-trips.
//!
//! ## Indicators
//!
//! Structural characters (`[` `]` `(` `)` `"` `,` and the `\r\n` object
//! separator) are decoration: readers verify them and fail on a mismatch,
//! but no parsing decision depends on them.

use eyre::{ensure, eyre, Result, WrapErr};

use crate::memory::{ReadBytes, WriteBytes};

pub const SIZE_CHAR: usize = 2;

/// Character width of the widest `u8`, `i32` and `i64` decimals.
pub const BYTE_CHARS: usize = 3;
pub const INT_CHARS: usize = 11;
pub const LONG_CHARS: usize = 20;

pub const SIZE_BYTE: usize = BYTE_CHARS * SIZE_CHAR;
pub const SIZE_INT: usize = INT_CHARS * SIZE_CHAR;
pub const SIZE_LONG: usize = LONG_CHARS * SIZE_CHAR;

pub const SIZE_OFFSET: usize = SIZE_CHAR + SIZE_INT;
pub const SIZE_REFERENCE: usize = SIZE_CHAR + SIZE_LONG;

pub const SIZE_QUOTE: usize = SIZE_CHAR;
pub const SIZE_ARRAY_START: usize = SIZE_CHAR;
pub const SIZE_ARRAY_END: usize = SIZE_CHAR;
pub const SIZE_TUPLE_START: usize = SIZE_CHAR;
pub const SIZE_TUPLE_END: usize = SIZE_CHAR;
pub const SIZE_PROPERTY_SEPARATOR: usize = SIZE_CHAR;
pub const SIZE_OBJECT_SEPARATOR: usize = 2 * SIZE_CHAR;

pub const ARRAY_START: char = '[';
pub const ARRAY_END: char = ']';
pub const TUPLE_START: char = '(';
pub const TUPLE_END: char = ')';
pub const QUOTE: char = '"';
pub const PROPERTY_SEPARATOR: char = ',';
pub const REFERENCE_MARK: char = '*';
pub const OFFSET_MARK: char = '@';

const SPACE: u16 = ' ' as u16;
const MINUS: u16 = '-' as u16;
const ZERO: u16 = '0' as u16;
const NINE: u16 = '9' as u16;

/// Writes one 16-bit code unit, low byte first.
pub fn write_char<W: WriteBytes>(writer: &mut W, unit: u16) -> Result<()> {
    writer.put_byte(unit as u8)?;
    writer.put_byte((unit >> 8) as u8)
}

/// Reads one 16-bit code unit.
pub fn read_char<R: ReadBytes>(reader: &mut R) -> Result<u16> {
    let low = reader.next_byte()?;
    let high = reader.next_byte()?;
    Ok(low as u16 | (high as u16) << 8)
}

/// Reads one code unit and verifies it is `expected`.
pub fn expect_char<R: ReadBytes>(reader: &mut R, expected: char) -> Result<()> {
    let unit = read_char(reader)?;
    ensure!(
        unit == expected as u16,
        "expected {expected:?}, found {}",
        describe(unit)
    );
    Ok(())
}

pub fn write_u8<W: WriteBytes>(writer: &mut W, value: u8) -> Result<()> {
    write_decimal(writer, value as i64, BYTE_CHARS)
}

pub fn read_u8<R: ReadBytes>(reader: &mut R) -> Result<u8> {
    let value = read_decimal(reader, BYTE_CHARS)?;
    u8::try_from(value).map_err(|_| eyre!("byte value {value} out of range"))
}

pub fn write_i32<W: WriteBytes>(writer: &mut W, value: i32) -> Result<()> {
    write_decimal(writer, value as i64, INT_CHARS)
}

pub fn read_i32<R: ReadBytes>(reader: &mut R) -> Result<i32> {
    let value = read_decimal(reader, INT_CHARS)?;
    i32::try_from(value).map_err(|_| eyre!("int value {value} out of range"))
}

pub fn write_i64<W: WriteBytes>(writer: &mut W, value: i64) -> Result<()> {
    write_decimal(writer, value, LONG_CHARS)
}

pub fn read_i64<R: ReadBytes>(reader: &mut R) -> Result<i64> {
    read_decimal(reader, LONG_CHARS)
}

/// `'*'` followed by a long; points at an absolute position in a data
/// stream.
pub fn write_reference<W: WriteBytes>(writer: &mut W, value: i64) -> Result<()> {
    write_char(writer, REFERENCE_MARK as u16)?;
    write_i64(writer, value)
}

pub fn read_reference<R: ReadBytes>(reader: &mut R) -> Result<i64> {
    expect_char(reader, REFERENCE_MARK)?;
    read_i64(reader)
}

/// `'@'` followed by an int; a relative position within a record.
pub fn write_offset<W: WriteBytes>(writer: &mut W, value: i32) -> Result<()> {
    write_char(writer, OFFSET_MARK as u16)?;
    write_i32(writer, value)
}

pub fn read_offset<R: ReadBytes>(reader: &mut R) -> Result<i32> {
    expect_char(reader, OFFSET_MARK)?;
    read_i32(reader)
}

pub fn write_object_separator<W: WriteBytes>(writer: &mut W) -> Result<()> {
    write_char(writer, '\r' as u16)?;
    write_char(writer, '\n' as u16)
}

pub fn expect_object_separator<R: ReadBytes>(reader: &mut R) -> Result<()> {
    expect_char(reader, '\r')?;
    expect_char(reader, '\n')
}

/// Encoded byte size of `text`: length int, open quote, one character per
/// UTF-16 code unit, close quote.
pub fn text_size(text: &str) -> usize {
    SIZE_INT + SIZE_QUOTE + text.encode_utf16().count() * SIZE_CHAR + SIZE_QUOTE
}

pub fn write_text<W: WriteBytes>(writer: &mut W, text: &str) -> Result<()> {
    let units = text.encode_utf16().count();
    let length =
        i32::try_from(units).map_err(|_| eyre!("string of {units} code units is too long"))?;
    write_i32(writer, length)?;
    write_char(writer, QUOTE as u16)?;
    for unit in text.encode_utf16() {
        write_char(writer, unit)?;
    }
    write_char(writer, QUOTE as u16)
}

pub fn read_text<R: ReadBytes>(reader: &mut R) -> Result<String> {
    let length = read_i32(reader)?;
    ensure!(length >= 0, "negative string length {length}");
    expect_char(reader, QUOTE)?;
    let mut units = Vec::with_capacity(length as usize);
    for _ in 0..length {
        units.push(read_char(reader)?);
    }
    expect_char(reader, QUOTE)?;
    String::from_utf16(&units).wrap_err("string is not valid UTF-16")
}

/// Writes `value` as a right-justified, space-padded decimal of `width`
/// characters.
fn write_decimal<W: WriteBytes>(writer: &mut W, value: i64, width: usize) -> Result<()> {
    debug_assert!(width <= LONG_CHARS);
    let mut field = [b' '; LONG_CHARS];
    let mut at = width;
    if value == 0 {
        at -= 1;
        field[at] = b'0';
    } else {
        // digits of the negated value, so i64::MIN never overflows
        let mut accumulator = if value > 0 { -value } else { value };
        while accumulator != 0 {
            at -= 1;
            field[at] = b'0' + (-(accumulator % 10)) as u8;
            accumulator /= 10;
        }
        if value < 0 {
            at -= 1;
            field[at] = b'-';
        }
    }
    for &character in &field[..width] {
        write_char(writer, character as u16)?;
    }
    Ok(())
}

/// Reads a `width`-character decimal: leading spaces, an optional `-`,
/// then digits to the end of the field.
fn read_decimal<R: ReadBytes>(reader: &mut R, width: usize) -> Result<i64> {
    let mut remaining = width;
    let mut unit = read_char(reader)?;
    remaining -= 1;
    while unit == SPACE && remaining > 0 {
        unit = read_char(reader)?;
        remaining -= 1;
    }

    let negative = unit == MINUS;
    if negative {
        ensure!(remaining > 0, "sign without digits in decimal field");
        unit = read_char(reader)?;
        remaining -= 1;
    }

    let mut accumulator: i64 = 0;
    loop {
        ensure!(
            (ZERO..=NINE).contains(&unit),
            "expected digit, found {}",
            describe(unit)
        );
        let digit = (unit - ZERO) as i64;
        accumulator = accumulator
            .checked_mul(10)
            .and_then(|shifted| shifted.checked_sub(digit))
            .ok_or_else(|| eyre!("decimal field overflows a 64-bit integer"))?;
        if remaining == 0 {
            break;
        }
        unit = read_char(reader)?;
        remaining -= 1;
    }

    if negative {
        Ok(accumulator)
    } else {
        accumulator
            .checked_neg()
            .ok_or_else(|| eyre!("decimal field overflows a 64-bit integer"))
    }
}

fn describe(unit: u16) -> String {
    match char::from_u32(unit as u32) {
        Some(character) => format!("{character:?}"),
        None => format!("u+{unit:04x}"),
    }
}
