//! Record collections: a lump's records in one format context, editable in place and serializable back to bytes.

use std::fmt;

use crate::{
	codec::LumpEncoding,
	record::{RecordBytesMut, RecordMut, RecordRef},
	refs::{LumpEdit, ReferenceReport},
	*,
};

/// Everything besides the bytes that goes into parsing a lump.
#[derive(Clone, Copy, Default)]
pub struct LumpParseOptions<'a> {
	/// Where to find pixels of mip textures.
	pub textures: Option<&'a dyn TextureSource>,
	pub settings: BspParseSettings,
}

#[derive(Debug, Clone)]
enum RecordStorage {
	/// Fixed-stride records sharing one buffer.
	Packed { data: Vec<u8>, record_len: usize },
	/// Variable-length records, each in their own buffer.
	Segmented(Vec<Vec<u8>>),
}

/// The records of one lump, in the layout of one format context.
#[derive(Clone)]
pub struct Lump<R: RecordKind> {
	ctx: BspParseContext,
	storage: RecordStorage,
	payloads: Vec<R::Payload>,
	/// Bytes stored ahead of the records that belong to none of them, written back as they were.
	preamble: Option<Vec<u8>>,
}

impl<R: RecordKind> Lump<R> {
	/// Parses a lump of `R` records without any [`TextureSource`] and with default settings.
	pub fn parse(data: &[u8], ctx: BspParseContext) -> BspResult<Self> {
		Self::parse_with(data, ctx, &LumpParseOptions::default())
	}

	pub fn parse_with(data: &[u8], ctx: BspParseContext, options: &LumpParseOptions) -> BspResult<Self> {
		R::decode_lump(data, ctx, options).job(format!("Parsing {} lump of {} bytes ({})", R::NAME, data.len(), ctx.format))
	}

	/// Slices `data` into records of the fixed record length of `ctx`. The length of `data` must be an exact multiple.
	pub(crate) fn parse_fixed(data: &[u8], ctx: BspParseContext) -> BspResult<Self> {
		let record_len = R::record_len(&ctx)?;
		if data.len() % record_len != 0 {
			return Err(BspParseError::LumpSizeMismatch { len: data.len(), record_len });
		}

		Ok(Self {
			ctx,
			storage: RecordStorage::Packed {
				data: data.to_vec(),
				record_len,
			},
			payloads: vec![R::Payload::default(); data.len() / record_len],
			preamble: None,
		})
	}

	pub(crate) fn from_segments(
		ctx: BspParseContext,
		segments: Vec<Vec<u8>>,
		payloads: Vec<R::Payload>,
		preamble: Option<Vec<u8>>,
	) -> Self {
		debug_assert_eq!(segments.len(), payloads.len());
		Self {
			ctx,
			storage: RecordStorage::Segmented(segments),
			payloads,
			preamble,
		}
	}

	/// An empty lump.
	pub fn new(ctx: BspParseContext) -> BspResult<Self> {
		let storage = match R::encoding(&ctx) {
			LumpEncoding::FixedStride => RecordStorage::Packed {
				data: Vec::new(),
				record_len: R::record_len(&ctx)?,
			},
			LumpEncoding::DelimitedNames | LumpEncoding::OffsetTable => {
				R::descriptor(&ctx)?;
				RecordStorage::Segmented(Vec::new())
			}
		};

		Ok(Self {
			ctx,
			storage,
			payloads: Vec::new(),
			preamble: None,
		})
	}

	/// Builds a lump out of `records`, converting records of other format contexts by field.
	pub fn from_records(ctx: BspParseContext, records: impl IntoIterator<Item = Record<R>>) -> BspResult<Self> {
		let mut lump = Self::new(ctx)?;
		lump.insert_untracked(0, records.into_iter().collect())?;
		Ok(lump)
	}

	#[inline]
	pub fn ctx(&self) -> &BspParseContext {
		&self.ctx
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.payloads.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.payloads.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<RecordRef<'_, R>> {
		let payload = self.payloads.get(index)?;
		let bytes = match &self.storage {
			RecordStorage::Packed { data, record_len } => data.get(index * record_len..(index + 1) * record_len)?,
			RecordStorage::Segmented(segments) => segments.get(index)?.as_slice(),
		};

		Some(RecordRef {
			bytes,
			ctx: &self.ctx,
			payload,
		})
	}

	pub fn get_mut(&mut self, index: usize) -> Option<RecordMut<'_, R>> {
		let Self { ctx, storage, payloads, .. } = self;
		let payload = payloads.get_mut(index)?;
		let bytes = match storage {
			RecordStorage::Packed { data, record_len } => {
				RecordBytesMut::Packed(data.get_mut(index * *record_len..(index + 1) * *record_len)?)
			}
			RecordStorage::Segmented(segments) => RecordBytesMut::Segment(segments.get_mut(index)?),
		};

		Some(RecordMut { bytes, ctx, payload })
	}

	pub fn iter(&self) -> impl Iterator<Item = RecordRef<'_, R>> + '_ {
		(0..self.len()).filter_map(move |i| self.get(i))
	}

	/// The records in `range`, usually from [`RecordRead::range`] of a record in another lump. `None` if out of bounds.
	pub fn get_range(&self, range: Range<usize>) -> Option<impl Iterator<Item = RecordRef<'_, R>> + '_> {
		if range.start > range.end || range.end > self.len() {
			return None;
		}
		Some(range.filter_map(move |i| self.get(i)))
	}

	/// Serializes the lump back into the bytes of its format. Unmodified lumps come out exactly as they went in.
	pub fn to_bytes(&self) -> Vec<u8> {
		R::encode_lump(self)
	}

	#[inline]
	pub(crate) fn preamble(&self) -> Option<&[u8]> {
		self.preamble.as_deref()
	}

	pub(crate) fn record_slices(&self) -> Vec<&[u8]> {
		match &self.storage {
			RecordStorage::Packed { data, record_len } => data.chunks_exact(*record_len).collect(),
			RecordStorage::Segmented(segments) => segments.iter().map(Vec::as_slice).collect(),
		}
	}

	/// All records back to back.
	pub(crate) fn concat_records(&self) -> Vec<u8> {
		match &self.storage {
			RecordStorage::Packed { data, .. } => data.clone(),
			RecordStorage::Segmented(segments) => segments.concat(),
		}
	}

	/// Inserts `record` at `at`, shifting this lump's references to itself. References from other lumps are only kept
	/// up to date when editing through [`BspData`].
	pub fn insert(&mut self, at: usize, record: Record<R>) -> BspResult<ReferenceReport> {
		self.insert_many(at, [record])
	}

	pub fn insert_many(&mut self, at: usize, records: impl IntoIterator<Item = Record<R>>) -> BspResult<ReferenceReport> {
		let edit = self.insert_untracked(at, records.into_iter().collect())?;
		Ok(self.apply_edit(&edit))
	}

	pub fn push(&mut self, record: Record<R>) -> BspResult<ReferenceReport> {
		self.insert(self.len(), record)
	}

	/// Inserts `count` records with every byte zero.
	pub fn insert_zeroed(&mut self, at: usize, count: usize) -> BspResult<ReferenceReport> {
		let edit = self.insert_zeroed_untracked(at, count)?;
		Ok(self.apply_edit(&edit))
	}

	/// Removes the records in `range`. References into the removed range are clamped to its start and reported.
	pub fn remove(&mut self, range: Range<usize>) -> BspResult<ReferenceReport> {
		let edit = self.remove_untracked(range)?;
		Ok(self.apply_edit(&edit))
	}

	pub(crate) fn insert_zeroed_untracked(&mut self, at: usize, count: usize) -> BspResult<LumpEdit> {
		let records = (0..count).map(|_| Record::zeroed(self.ctx)).collect::<BspResult<Vec<_>>>()?;
		self.insert_untracked(at, records)
	}

	pub(crate) fn insert_untracked(&mut self, at: usize, records: Vec<Record<R>>) -> BspResult<LumpEdit> {
		if at > self.len() {
			return Err(BspParseError::IndexOutOfRange { index: at, len: self.len() });
		}

		let mut bytes = Vec::with_capacity(records.len());
		let mut payloads = Vec::with_capacity(records.len());
		for record in records {
			let record = if *record.ctx() == self.ctx { record } else { Record::copy_from(&record, self.ctx)? };
			let (record_bytes, _, payload) = record.into_parts();
			if let RecordStorage::Packed { record_len, .. } = &self.storage {
				if record_bytes.len() != *record_len {
					return Err(BspParseError::LumpSizeMismatch {
						len: record_bytes.len(),
						record_len: *record_len,
					});
				}
			}
			bytes.push(record_bytes);
			payloads.push(payload);
		}
		let count = payloads.len();

		match &mut self.storage {
			RecordStorage::Packed { data, record_len } => {
				let offset = at * *record_len;
				data.splice(offset..offset, bytes.concat());
			}
			RecordStorage::Segmented(segments) => {
				segments.splice(at..at, bytes);
			}
		}
		self.payloads.splice(at..at, payloads);

		Ok(LumpEdit::Insert { lump: R::LUMP, at, count })
	}

	pub(crate) fn remove_untracked(&mut self, range: Range<usize>) -> BspResult<LumpEdit> {
		if range.start > range.end || range.end > self.len() {
			return Err(BspParseError::IndexOutOfRange {
				index: range.end.max(range.start),
				len: self.len(),
			});
		}

		match &mut self.storage {
			RecordStorage::Packed { data, record_len } => {
				data.drain(range.start * *record_len..range.end * *record_len);
			}
			RecordStorage::Segmented(segments) => {
				segments.drain(range.clone());
			}
		}
		self.payloads.drain(range.clone());

		Ok(LumpEdit::Remove { lump: R::LUMP, range })
	}
}

impl<R: RecordKind> fmt::Debug for Lump<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

/// A lump without a record descriptor: fixed-stride records of opaque bytes. These can still be edited, so the index fields
/// pointing into them are kept up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLump {
	pub kind: LumpKind,
	record_len: usize,
	data: Vec<u8>,
}

impl RawLump {
	pub fn parse(kind: LumpKind, data: &[u8], record_len: usize) -> BspResult<Self> {
		if record_len == 0 || data.len() % record_len != 0 {
			return Err(BspParseError::LumpSizeMismatch { len: data.len(), record_len });
		}
		Ok(Self {
			kind,
			record_len,
			data: data.to_vec(),
		})
	}

	#[inline]
	pub fn record_len(&self) -> usize {
		self.record_len
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.data.len() / self.record_len
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&[u8]> {
		self.data.get(index * self.record_len..(index + 1) * self.record_len)
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut [u8]> {
		self.data.get_mut(index * self.record_len..(index + 1) * self.record_len)
	}

	pub fn get_range(&self, range: Range<usize>) -> Option<std::slice::ChunksExact<'_, u8>> {
		let bytes = self.data.get(range.start * self.record_len..range.end * self.record_len)?;
		Some(bytes.chunks_exact(self.record_len))
	}

	/// Inserts records given as one buffer of whole records. Only use this directly if nothing references this lump,
	/// otherwise go through [`BspData`].
	pub fn insert(&mut self, at: usize, records: &[u8]) -> BspResult<LumpEdit> {
		if at > self.len() {
			return Err(BspParseError::IndexOutOfRange { index: at, len: self.len() });
		}
		if records.len() % self.record_len != 0 {
			return Err(BspParseError::LumpSizeMismatch {
				len: records.len(),
				record_len: self.record_len,
			});
		}
		let offset = at * self.record_len;
		self.data.splice(offset..offset, records.iter().copied());

		Ok(LumpEdit::Insert {
			lump: self.kind,
			at,
			count: records.len() / self.record_len,
		})
	}

	pub fn insert_zeroed(&mut self, at: usize, count: usize) -> BspResult<LumpEdit> {
		self.insert(at, &vec![0; count * self.record_len])
	}

	pub fn remove(&mut self, range: Range<usize>) -> BspResult<LumpEdit> {
		if range.start > range.end || range.end > self.len() {
			return Err(BspParseError::IndexOutOfRange {
				index: range.end.max(range.start),
				len: self.len(),
			});
		}
		self.data.drain(range.start * self.record_len..range.end * self.record_len);

		Ok(LumpEdit::Remove { lump: self.kind, range })
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		self.data.clone()
	}
}

/// Type erased access to the lumps of a [`BspData`], for edits that go across the whole document.
pub(crate) trait AnyLump {
	fn len(&self) -> usize;
	fn to_bytes(&self) -> Vec<u8>;
	fn insert_zeroed_untracked(&mut self, at: usize, count: usize) -> BspResult<LumpEdit>;
	fn remove_untracked(&mut self, range: Range<usize>) -> BspResult<LumpEdit>;
	fn apply_edit(&mut self, edit: &LumpEdit) -> ReferenceReport;
	fn check_references(&self, target_len: &dyn Fn(LumpKind) -> Option<usize>) -> ReferenceReport;
}

impl<R: RecordKind> AnyLump for Lump<R> {
	fn len(&self) -> usize {
		Lump::len(self)
	}
	fn to_bytes(&self) -> Vec<u8> {
		Lump::to_bytes(self)
	}
	fn insert_zeroed_untracked(&mut self, at: usize, count: usize) -> BspResult<LumpEdit> {
		Lump::insert_zeroed_untracked(self, at, count)
	}
	fn remove_untracked(&mut self, range: Range<usize>) -> BspResult<LumpEdit> {
		Lump::remove_untracked(self, range)
	}
	fn apply_edit(&mut self, edit: &LumpEdit) -> ReferenceReport {
		Lump::apply_edit(self, edit)
	}
	fn check_references(&self, target_len: &dyn Fn(LumpKind) -> Option<usize>) -> ReferenceReport {
		Lump::check_references(self, target_len)
	}
}

impl AnyLump for RawLump {
	fn len(&self) -> usize {
		RawLump::len(self)
	}
	fn to_bytes(&self) -> Vec<u8> {
		RawLump::to_bytes(self)
	}
	fn insert_zeroed_untracked(&mut self, at: usize, count: usize) -> BspResult<LumpEdit> {
		RawLump::insert_zeroed(self, at, count)
	}
	fn remove_untracked(&mut self, range: Range<usize>) -> BspResult<LumpEdit> {
		RawLump::remove(self, range)
	}
	// Opaque records hold no references.
	fn apply_edit(&mut self, _edit: &LumpEdit) -> ReferenceReport {
		ReferenceReport::default()
	}
	fn check_references(&self, _target_len: &dyn Fn(LumpKind) -> Option<usize>) -> ReferenceReport {
		ReferenceReport::default()
	}
}

#[cfg(test)]
mod lump_tests {
	use super::*;

	fn quake2_models(count: usize) -> Vec<u8> {
		let mut data = Vec::new();
		for i in 0..count {
			let mut model = Record::<Model>::zeroed(BspParseContext::from(BspFormat::Quake2)).unwrap();
			model.set(ModelField::HeadNode, i as i32).unwrap();
			data.extend(model.into_bytes());
		}
		data
	}

	#[test]
	fn fixed_stride() {
		let ctx = BspParseContext::from(BspFormat::Quake2);
		let data = quake2_models(3);
		let lump = Lump::<Model>::parse(&data, ctx).unwrap();

		assert_eq!(lump.len(), 3);
		assert_eq!(lump.get(2).unwrap().get_int(ModelField::HeadNode), 2);
		assert!(lump.get(3).is_none());
		assert_eq!(lump.to_bytes(), data);
	}

	#[test]
	fn size_mismatch() {
		let err = Lump::<Model>::parse(&[0; 50], BspParseContext::from(BspFormat::Quake2)).unwrap_err();
		assert!(matches!(err.root(), BspParseError::LumpSizeMismatch { len: 50, record_len: 48 }));
	}

	#[test]
	fn editing() {
		let ctx = BspParseContext::from(BspFormat::Quake2);
		let mut lump = Lump::<Model>::parse(&quake2_models(3), ctx).unwrap();

		lump.get_mut(1).unwrap().set(ModelField::NumFaces, 4).unwrap();
		assert_eq!(lump.get(1).unwrap().get_int(ModelField::NumFaces), 4);

		lump.insert_zeroed(1, 2).unwrap();
		assert_eq!(lump.len(), 5);
		assert_eq!(lump.get(3).unwrap().get_int(ModelField::NumFaces), 4);

		lump.remove(0..3).unwrap();
		assert_eq!(lump.len(), 2);
		assert_eq!(lump.get(0).unwrap().get_int(ModelField::HeadNode), 1);
		assert_eq!(lump.to_bytes().len(), 96);

		assert!(matches!(lump.remove(1..3), Err(BspParseError::IndexOutOfRange { index: 3, len: 2 })));
		assert!(matches!(lump.insert_zeroed(3, 1), Err(BspParseError::IndexOutOfRange { index: 3, len: 2 })));
	}

	#[test]
	fn converting_inserts() {
		let mut lump = Lump::<Model>::new(BspParseContext::from(BspFormat::Quake3)).unwrap();
		let mut model = Record::<Model>::zeroed(BspParseContext::from(BspFormat::Quake2)).unwrap();
		model.set(ModelField::FirstFace, 8).unwrap();

		lump.push(model).unwrap();
		assert_eq!(lump.to_bytes().len(), 40);
		assert_eq!(lump.get(0).unwrap().get_int(ModelField::FirstFace), 8);
	}

	#[test]
	fn ranges_across_lumps() {
		let ctx = BspParseContext::from(BspFormat::Quake2);
		let lump = Lump::<Model>::parse(&quake2_models(4), ctx).unwrap();

		let heads: Vec<i32> = lump.get_range(1..3).unwrap().map(|model| model.get_int(ModelField::HeadNode)).collect();
		assert_eq!(heads, vec![1, 2]);
		assert!(lump.get_range(3..5).is_none());
	}

	#[test]
	fn raw_lumps() {
		let mut raw = RawLump::parse(LumpKind::Faces, &[1, 2, 3, 4, 5, 6], 2).unwrap();
		assert_eq!(raw.len(), 3);
		assert_eq!(raw.get(1), Some(&[3, 4][..]));

		let edit = raw.insert(1, &[9, 9]).unwrap();
		assert_eq!(edit, LumpEdit::Insert { lump: LumpKind::Faces, at: 1, count: 1 });
		assert_eq!(raw.to_bytes(), vec![1, 2, 9, 9, 3, 4, 5, 6]);

		raw.remove(0..2).unwrap();
		assert_eq!(raw.to_bytes(), vec![3, 4, 5, 6]);
		assert!(RawLump::parse(LumpKind::Faces, &[0; 5], 2).is_err());
	}
}
