//! # Record Layouts
//!
//! A layout describes how one value type is arranged as encoded
//! characters: primitives, strings, tuples of layouts (arity 1 to 7), and
//! arrays of a single element layout. Layouts compose by value and carry
//! no identity; a `(LongLayout, TextLayout)` is itself a layout whose
//! value type is `(i64, String)`.
//!
//! Dispatch is static. Every node answers [`Layout::fixed_size`] with
//! `Some(bytes)` when every value of the type encodes to the same width
//! and `None` otherwise; a composite is fixed exactly when all of its
//! children are.
//!
//! `read` and `write` advance their cursor by exactly
//! [`Layout::size_of`] of the value they carry; the typed table leans on
//! that contract to address records without a scan.

use eyre::{ensure, eyre, Result};

use crate::memory::{ReadBytes, WriteBytes};

use super::encoding::{
    self, SIZE_ARRAY_END, SIZE_ARRAY_START, SIZE_BYTE, SIZE_INT, SIZE_LONG,
    SIZE_PROPERTY_SEPARATOR, SIZE_TUPLE_END, SIZE_TUPLE_START,
};

pub trait Layout {
    type Value;

    /// Encoded byte width shared by all values, if the layout has one.
    fn fixed_size(&self) -> Option<usize>;

    /// Encoded byte width of `value`.
    fn size_of(&self, value: &Self::Value) -> usize;

    /// Decodes one value, advancing the cursor by its encoded width.
    fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<Self::Value>;

    /// Encodes `value`, advancing the cursor by its encoded width.
    fn write<W: WriteBytes>(&self, writer: &mut W, value: &Self::Value) -> Result<()>;

    fn is_fixed_size(&self) -> bool {
        self.fixed_size().is_some()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ByteLayout;

impl Layout for ByteLayout {
    type Value = u8;

    fn fixed_size(&self) -> Option<usize> {
        Some(SIZE_BYTE)
    }

    fn size_of(&self, _value: &u8) -> usize {
        SIZE_BYTE
    }

    fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<u8> {
        encoding::read_u8(reader)
    }

    fn write<W: WriteBytes>(&self, writer: &mut W, value: &u8) -> Result<()> {
        encoding::write_u8(writer, *value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntLayout;

impl Layout for IntLayout {
    type Value = i32;

    fn fixed_size(&self) -> Option<usize> {
        Some(SIZE_INT)
    }

    fn size_of(&self, _value: &i32) -> usize {
        SIZE_INT
    }

    fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<i32> {
        encoding::read_i32(reader)
    }

    fn write<W: WriteBytes>(&self, writer: &mut W, value: &i32) -> Result<()> {
        encoding::write_i32(writer, *value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LongLayout;

impl Layout for LongLayout {
    type Value = i64;

    fn fixed_size(&self) -> Option<usize> {
        Some(SIZE_LONG)
    }

    fn size_of(&self, _value: &i64) -> usize {
        SIZE_LONG
    }

    fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<i64> {
        encoding::read_i64(reader)
    }

    fn write<W: WriteBytes>(&self, writer: &mut W, value: &i64) -> Result<()> {
        encoding::write_i64(writer, *value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextLayout;

impl Layout for TextLayout {
    type Value = String;

    fn fixed_size(&self) -> Option<usize> {
        None
    }

    fn size_of(&self, value: &String) -> usize {
        encoding::text_size(value)
    }

    fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<String> {
        encoding::read_text(reader)
    }

    fn write<W: WriteBytes>(&self, writer: &mut W, value: &String) -> Result<()> {
        encoding::write_text(writer, value)
    }
}

macro_rules! tuple_layouts {
    ($( ($($child:ident $index:tt),+) )+) => {$(
        impl<$($child: Layout),+> Layout for ($($child,)+) {
            type Value = ($($child::Value,)+);

            fn fixed_size(&self) -> Option<usize> {
                let mut total = SIZE_TUPLE_START + SIZE_TUPLE_END;
                let mut children = 0usize;
                $(
                    total += self.$index.fixed_size()?;
                    children += 1;
                )+
                Some(total + (children - 1) * SIZE_PROPERTY_SEPARATOR)
            }

            fn size_of(&self, value: &Self::Value) -> usize {
                let mut total = SIZE_TUPLE_START + SIZE_TUPLE_END;
                let mut children = 0usize;
                $(
                    total += self.$index.size_of(&value.$index);
                    children += 1;
                )+
                total + (children - 1) * SIZE_PROPERTY_SEPARATOR
            }

            fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<Self::Value> {
                encoding::expect_char(reader, encoding::TUPLE_START)?;
                let mut first = true;
                let value = ($(
                    {
                        if !first {
                            encoding::expect_char(reader, encoding::PROPERTY_SEPARATOR)?;
                        }
                        first = false;
                        self.$index.read(reader)?
                    },
                )+);
                let _ = first;
                encoding::expect_char(reader, encoding::TUPLE_END)?;
                Ok(value)
            }

            fn write<W: WriteBytes>(&self, writer: &mut W, value: &Self::Value) -> Result<()> {
                encoding::write_char(writer, encoding::TUPLE_START as u16)?;
                let mut first = true;
                $(
                    if !first {
                        encoding::write_char(writer, encoding::PROPERTY_SEPARATOR as u16)?;
                    }
                    first = false;
                    self.$index.write(writer, &value.$index)?;
                )+
                let _ = first;
                encoding::write_char(writer, encoding::TUPLE_END as u16)
            }
        }
    )+};
}

tuple_layouts! {
    (A 0)
    (A 0, B 1)
    (A 0, B 1, C 2)
    (A 0, B 1, C 2, D 3)
    (A 0, B 1, C 2, D 3, E 4)
    (A 0, B 1, C 2, D 3, E 4, F 5)
    (A 0, B 1, C 2, D 3, E 4, F 5, G 6)
}

/// Variable-length array: a length int, `[`, the items separated by `,`,
/// and `]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayLayout<L> {
    element: L,
}

impl<L> ArrayLayout<L> {
    pub fn new(element: L) -> Self {
        Self { element }
    }
}

impl<L: Layout> Layout for ArrayLayout<L> {
    type Value = Vec<L::Value>;

    fn fixed_size(&self) -> Option<usize> {
        None
    }

    fn size_of(&self, value: &Self::Value) -> usize {
        array_size(&self.element, value)
    }

    fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<Self::Value> {
        read_items(&self.element, reader, None)
    }

    fn write<W: WriteBytes>(&self, writer: &mut W, value: &Self::Value) -> Result<()> {
        write_items(&self.element, writer, value)
    }
}

/// Array of a fixed item count; fixed-size whenever its element layout is.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedArrayLayout<L> {
    element: L,
    length: usize,
}

impl<L> FixedArrayLayout<L> {
    pub fn new(element: L, length: usize) -> Self {
        Self { element, length }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl<L: Layout> Layout for FixedArrayLayout<L> {
    type Value = Vec<L::Value>;

    fn fixed_size(&self) -> Option<usize> {
        let element = self.element.fixed_size()?;
        Some(
            SIZE_INT
                + SIZE_ARRAY_START
                + self.length * element
                + self.length.saturating_sub(1) * SIZE_PROPERTY_SEPARATOR
                + SIZE_ARRAY_END,
        )
    }

    fn size_of(&self, value: &Self::Value) -> usize {
        array_size(&self.element, value)
    }

    fn read<R: ReadBytes>(&self, reader: &mut R) -> Result<Self::Value> {
        read_items(&self.element, reader, Some(self.length))
    }

    fn write<W: WriteBytes>(&self, writer: &mut W, value: &Self::Value) -> Result<()> {
        ensure!(
            value.len() == self.length,
            "array of {} items does not match fixed length {}",
            value.len(),
            self.length
        );
        write_items(&self.element, writer, value)
    }
}

fn array_size<L: Layout>(element: &L, items: &[L::Value]) -> usize {
    let payload: usize = items.iter().map(|item| element.size_of(item)).sum();
    SIZE_INT
        + SIZE_ARRAY_START
        + payload
        + items.len().saturating_sub(1) * SIZE_PROPERTY_SEPARATOR
        + SIZE_ARRAY_END
}

fn read_items<L: Layout, R: ReadBytes>(
    element: &L,
    reader: &mut R,
    expected: Option<usize>,
) -> Result<Vec<L::Value>> {
    let length = encoding::read_i32(reader)?;
    ensure!(length >= 0, "negative array length {length}");
    let length = length as usize;
    if let Some(expected) = expected {
        ensure!(
            length == expected,
            "array length {length} does not match fixed length {expected}"
        );
    }

    encoding::expect_char(reader, encoding::ARRAY_START)?;
    let mut items = Vec::with_capacity(length);
    for position in 0..length {
        if position > 0 {
            encoding::expect_char(reader, encoding::PROPERTY_SEPARATOR)?;
        }
        items.push(element.read(reader)?);
    }
    encoding::expect_char(reader, encoding::ARRAY_END)?;
    Ok(items)
}

fn write_items<L: Layout, W: WriteBytes>(
    element: &L,
    writer: &mut W,
    items: &[L::Value],
) -> Result<()> {
    let length = i32::try_from(items.len())
        .map_err(|_| eyre!("array of {} items is too long", items.len()))?;
    encoding::write_i32(writer, length)?;
    encoding::write_char(writer, encoding::ARRAY_START as u16)?;
    for (position, item) in items.iter().enumerate() {
        if position > 0 {
            encoding::write_char(writer, encoding::PROPERTY_SEPARATOR as u16)?;
        }
        element.write(writer, item)?;
    }
    encoding::write_char(writer, encoding::ARRAY_END as u16)
}
