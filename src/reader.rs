//! Little-endian primitive reading shared by the field accessors and the lump codecs.

use crate::{data::field::Vector3, *};

/// The format context every lump and record carries: which dialect, and which version of the lump's record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspParseContext {
	pub format: BspFormat,
	/// Version field of the lump's directory entry. Only a few formats change record layouts across lump versions.
	pub version: i32,
}

impl BspParseContext {
	#[inline]
	pub fn new(format: BspFormat, version: i32) -> Self {
		Self { format, version }
	}
}

impl From<BspFormat> for BspParseContext {
	fn from(format: BspFormat) -> Self {
		Self::new(format, 0)
	}
}

/// Like a [`Cursor`](std::io::Cursor), but i don't have to constantly juggle buffers.
#[derive(Clone)]
pub struct BspByteReader<'a> {
	pub ctx: &'a BspParseContext,
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> BspByteReader<'a> {
	#[inline]
	pub fn new(bytes: &'a [u8], ctx: &'a BspParseContext) -> Self {
		Self { ctx, bytes, pos: 0 }
	}

	#[inline]
	pub fn read<T: BspValue>(&mut self) -> BspResult<T> {
		T::bsp_parse(self)
	}

	#[inline]
	pub fn read_bytes(&mut self, count: usize) -> BspResult<&'a [u8]> {
		let (from, to) = (self.pos, self.pos + count);
		if to > self.bytes.len() {
			return Err(BspParseError::BufferOutOfBounds {
				from,
				to,
				size: self.bytes.len(),
			});
		}
		let bytes = &self.bytes[from..to];
		self.pos += count;
		Ok(bytes)
	}

	#[inline]
	pub fn with_pos(&self, pos: usize) -> Self {
		Self {
			ctx: self.ctx,
			bytes: self.bytes,
			pos,
		}
	}

	#[inline]
	pub fn pos(&self) -> usize {
		self.pos
	}
}

/// Defines how a type should be read from a BSP file.
pub trait BspValue: Sized {
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self>;
	fn bsp_struct_size(ctx: &BspParseContext) -> usize;
}

macro_rules! impl_bsp_parse_primitive {
	($ty:ty) => {
		impl BspValue for $ty {
			#[inline]
			fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
				let mut bytes = [0; size_of::<$ty>()];
				bytes.copy_from_slice(reader.read_bytes(size_of::<$ty>())?);
				Ok(<$ty>::from_le_bytes(bytes))
			}
			#[inline]
			fn bsp_struct_size(_ctx: &BspParseContext) -> usize {
				size_of::<$ty>()
			}
		}
	};
}

impl_bsp_parse_primitive!(u16);
impl_bsp_parse_primitive!(u32);

impl_bsp_parse_primitive!(i16);
impl_bsp_parse_primitive!(i32);

impl_bsp_parse_primitive!(f32);

impl<const N: usize> BspValue for [u8; N] {
	#[inline]
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
		let mut bytes = [0; N];
		bytes.copy_from_slice(reader.read_bytes(N)?);
		Ok(bytes)
	}
	#[inline]
	fn bsp_struct_size(_ctx: &BspParseContext) -> usize {
		N
	}
}

impl<const N: usize> BspValue for [u32; N] {
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
		let mut out = [0; N];
		for value in out.iter_mut() {
			*value = reader.read()?;
		}
		Ok(out)
	}
	fn bsp_struct_size(ctx: &BspParseContext) -> usize {
		u32::bsp_struct_size(ctx) * N
	}
}

impl BspValue for Vector3 {
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
		Ok(Self([reader.read()?, reader.read()?, reader.read()?]))
	}
	fn bsp_struct_size(ctx: &BspParseContext) -> usize {
		f32::bsp_struct_size(ctx) * 3
	}
}

#[cfg(test)]
mod reader_tests {
	use super::*;

	#[test]
	fn reads_little_endian() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let bytes = [0x01, 0x02, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0x3F];
		let mut reader = BspByteReader::new(&bytes, &ctx);

		assert_eq!(reader.read::<u16>().unwrap(), 0x0201);
		assert_eq!(reader.read::<i16>().unwrap(), -1);
		assert_eq!(reader.read::<f32>().unwrap(), 1.);
		assert_eq!(reader.pos(), 8);
		assert!(matches!(
			reader.read::<i32>(),
			Err(BspParseError::BufferOutOfBounds { from: 8, to: 12, size: 8 })
		));
	}

	#[test]
	fn with_pos_jumps() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let bytes = [0, 0, 0, 0, 7, 0, 0, 0];
		let reader = BspByteReader::new(&bytes, &ctx);

		assert_eq!(reader.with_pos(4).read::<u32>().unwrap(), 7);
		assert_eq!(<[u32; 2]>::bsp_struct_size(&ctx), 8);
	}
}
