//! Segmentation of lumps whose records can't be sliced at a fixed stride.

use crate::{reader::BspByteReader, *};

/// How a lump is split into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LumpEncoding {
	/// Records of the same length, back to back.
	FixedStride,
	/// NUL-terminated names back to back, with nothing else in between. Source texture data string data.
	DelimitedNames,
	/// An `i32` record count, then that many `i32` offsets into the lump, each pointing at the start of a record. Quake mip
	/// texture lumps.
	OffsetTable,
}

/// Splits a lump of NUL-terminated names. The returned records don't include their terminators.
pub fn split_delimited(data: &[u8]) -> BspResult<Vec<Vec<u8>>> {
	if data.is_empty() {
		return Ok(Vec::new());
	}
	let Some(body) = data.strip_suffix(&[0]) else {
		let offset = data.iter().rposition(|b| *b == 0).map(|i| i + 1).unwrap_or(0);
		return Err(BspParseError::UnterminatedName { offset });
	};

	Ok(body.split(|b| *b == 0).map(<[u8]>::to_vec).collect())
}

/// Packs names back together, each followed by its NUL terminator.
pub fn join_delimited<'a>(names: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
	let mut out = Vec::new();
	for name in names {
		out.extend_from_slice(name);
		out.push(0);
	}
	out
}

/// Byte offset of the first name equal to `name` ignoring ASCII case, as packed by [`join_delimited`].
pub fn offset_of<'a>(names: impl IntoIterator<Item = &'a [u8]>, name: &str) -> Option<usize> {
	let mut offset = 0;
	for candidate in names {
		if candidate.eq_ignore_ascii_case(name.as_bytes()) {
			return Some(offset);
		}
		offset += candidate.len() + 1;
	}
	None
}

/// Position of the name whose packed bytes, terminator included, contain `offset`.
pub fn index_at_offset<'a>(names: impl IntoIterator<Item = &'a [u8]>, offset: usize) -> Option<usize> {
	let mut start = 0;
	for (i, name) in names.into_iter().enumerate() {
		let end = start + name.len() + 1;
		if offset < end {
			return Some(i);
		}
		start = end;
	}
	None
}

/// Minimum length of an offset table record: a 16-byte name, width, height and four mip offsets.
pub const MIP_TEXTURE_HEADER_LEN: usize = 40;

/// The records of an offset table lump, plus whatever sits between the table and the first record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
	pub records: Vec<Vec<u8>>,
	/// Bytes after the offsets that no record starts in, usually alignment padding. `None` if the lump had no table at
	/// all, which is how empty lumps are stored.
	pub preamble: Option<Vec<u8>>,
}

/// Splits an offset table lump.
///
/// Each record runs from its offset to the next record's start (or the end of the lump), so any pixel data stored after
/// the record's header stays with it. Negative offsets mark missing records, which come out empty.
pub fn split_offset_table(data: &[u8], ctx: &BspParseContext) -> BspResult<OffsetTable> {
	if data.is_empty() {
		return Ok(OffsetTable::default());
	}

	let mut reader = BspByteReader::new(data, ctx);
	let count: i32 = reader.read().job("Reading texture count")?;
	let table_len = usize::try_from(count)
		.ok()
		.and_then(|count| count.checked_mul(4))
		.map(|len| len + 4)
		.filter(|len| *len <= data.len())
		.ok_or(BspParseError::InvalidTextureCount { count, len: data.len() })?;

	let mut offsets = Vec::with_capacity(count as usize);
	for index in 0..count as usize {
		let offset: i32 = reader.read()?;
		if offset >= 0 {
			let start = offset as usize;
			if start < table_len || start + MIP_TEXTURE_HEADER_LEN > data.len() {
				return Err(BspParseError::TextureOffsetOutOfBounds {
					index,
					offset,
					len: data.len(),
				});
			}
		}
		offsets.push(offset);
	}

	let mut starts: Vec<usize> = offsets.iter().filter(|o| **o >= 0).map(|o| *o as usize).collect();
	starts.sort_unstable();
	starts.dedup();
	let first_start = starts.first().copied().unwrap_or(data.len());

	let records = offsets
		.into_iter()
		.map(|offset| {
			if offset < 0 {
				return Vec::new();
			}
			let start = offset as usize;
			let end = starts.iter().copied().find(|s| *s > start).unwrap_or(data.len());
			data[start..end].to_vec()
		})
		.collect();

	Ok(OffsetTable {
		records,
		preamble: Some(data[table_len..first_start].to_vec()),
	})
}

/// Rebuilds an offset table lump: count, freshly computed offsets, the preamble, then the records in order. Empty records
/// get offset `-1` and take up no space. No records and no preamble makes an empty lump.
pub fn join_offset_table<'a>(records: impl ExactSizeIterator<Item = &'a [u8]> + Clone, preamble: Option<&[u8]>) -> Vec<u8> {
	let count = records.len();
	if count == 0 && preamble.is_none() {
		return Vec::new();
	}
	let preamble = preamble.unwrap_or_default();

	let mut out = Vec::with_capacity(4 + count * 4 + preamble.len() + records.clone().map(<[u8]>::len).sum::<usize>());
	out.extend_from_slice(&(count as i32).to_le_bytes());

	let mut offset = 4 + count * 4 + preamble.len();
	for record in records.clone() {
		if record.is_empty() {
			out.extend_from_slice(&(-1i32).to_le_bytes());
		} else {
			out.extend_from_slice(&(offset as i32).to_le_bytes());
			offset += record.len();
		}
	}
	out.extend_from_slice(preamble);
	for record in records {
		out.extend_from_slice(record);
	}

	out
}

#[cfg(test)]
mod codec_tests {
	use super::*;

	#[test]
	fn delimited() {
		let records = split_delimited(b"BRICK\0METAL\0").unwrap();
		assert_eq!(records, vec![b"BRICK".to_vec(), b"METAL".to_vec()]);

		let names = || records.iter().map(Vec::as_slice);
		assert_eq!(offset_of(names(), "METAL"), Some(6));
		assert_eq!(offset_of(names(), "metal"), Some(6));
		assert_eq!(offset_of(names(), "WOOD"), None);
		assert_eq!(index_at_offset(names(), 6), Some(1));
		assert_eq!(index_at_offset(names(), 5), Some(0));
		assert_eq!(index_at_offset(names(), 12), None);

		assert_eq!(join_delimited(names()), b"BRICK\0METAL\0");
	}

	#[test]
	fn delimited_edge_cases() {
		assert_eq!(split_delimited(b"").unwrap().len(), 0);
		assert_eq!(split_delimited(b"\0\0A\0").unwrap(), vec![vec![], vec![], b"A".to_vec()]);
		assert!(matches!(split_delimited(b"A\0BC"), Err(BspParseError::UnterminatedName { offset: 2 })));
	}

	fn mip_header(name: &str) -> Vec<u8> {
		let mut bytes = vec![0; MIP_TEXTURE_HEADER_LEN];
		bytes[..name.len()].copy_from_slice(name.as_bytes());
		bytes
	}

	#[test]
	fn offset_table() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let mut data = Vec::new();
		data.extend_from_slice(&2i32.to_le_bytes());
		data.extend_from_slice(&12i32.to_le_bytes());
		data.extend_from_slice(&52i32.to_le_bytes());
		data.extend(mip_header("WALL1"));
		data.extend(mip_header("WALL2"));
		data.extend_from_slice(&[1, 2, 3]);

		let table = split_offset_table(&data, &ctx).unwrap();
		let records = &table.records;
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].len(), 40);
		// Trailing bytes stay with the last record.
		assert_eq!(records[1].len(), 43);
		assert_eq!(table.preamble, Some(Vec::new()));

		assert_eq!(join_offset_table(records.iter().map(Vec::as_slice), table.preamble.as_deref()), data);
	}

	#[test]
	fn offset_table_missing_records() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let mut data = Vec::new();
		data.extend_from_slice(&2i32.to_le_bytes());
		data.extend_from_slice(&(-1i32).to_le_bytes());
		data.extend_from_slice(&12i32.to_le_bytes());
		data.extend(mip_header("WALL"));

		let table = split_offset_table(&data, &ctx).unwrap();
		assert!(table.records[0].is_empty());
		assert_eq!(join_offset_table(table.records.iter().map(Vec::as_slice), table.preamble.as_deref()), data);
	}

	#[test]
	fn offset_table_errors() {
		let ctx = BspParseContext::from(BspFormat::Quake);

		let mut data = Vec::new();
		data.extend_from_slice(&100i32.to_le_bytes());
		assert!(matches!(
			split_offset_table(&data, &ctx),
			Err(BspParseError::InvalidTextureCount { count: 100, len: 4 })
		));

		let mut data = Vec::new();
		data.extend_from_slice(&1i32.to_le_bytes());
		data.extend_from_slice(&30i32.to_le_bytes());
		data.extend(mip_header("WALL"));
		assert!(matches!(
			split_offset_table(&data, &ctx),
			Err(BspParseError::TextureOffsetOutOfBounds { index: 0, offset: 30, len: 48 })
		));

		assert_eq!(split_offset_table(&[], &ctx).unwrap(), OffsetTable::default());
		assert!(join_offset_table(std::iter::empty::<&[u8]>(), None).is_empty());
	}

	#[test]
	fn offset_table_without_records() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let data = 0i32.to_le_bytes();

		let table = split_offset_table(&data, &ctx).unwrap();
		assert!(table.records.is_empty());
		assert_eq!(table.preamble, Some(Vec::new()));
		assert_eq!(join_offset_table(std::iter::empty::<&[u8]>(), table.preamble.as_deref()), data);
	}

	#[test]
	fn offset_table_padding() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let mut data = Vec::new();
		data.extend_from_slice(&1i32.to_le_bytes());
		data.extend_from_slice(&12i32.to_le_bytes());
		data.extend_from_slice(&[0xAA; 4]);
		data.extend(mip_header("WALL"));

		let table = split_offset_table(&data, &ctx).unwrap();
		assert_eq!(table.preamble, Some(vec![0xAA; 4]));
		assert_eq!(table.records[0].len(), 40);
		assert_eq!(join_offset_table(table.records.iter().map(Vec::as_slice), table.preamble.as_deref()), data);
	}
}
