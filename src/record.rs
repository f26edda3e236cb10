//! Record kinds, and the views that read and write a record's fields through its format's layout.

use std::fmt;

use crate::{
	codec::LumpEncoding,
	data::field::{FieldKind, FieldLayout, FieldRole, RecordField, RecordLayout},
	lump::LumpParseOptions,
	reader::BspByteReader,
	*,
};

/// A kind of record, e.g. [`Model`]. Ties a set of field ids to the per-format layout table that locates them.
pub trait RecordKind: fmt::Debug + Copy + 'static {
	type Field: RecordField;
	/// Extra data decoded alongside each record that isn't part of its bytes, like resolved texture pixels.
	type Payload: Clone + Default + fmt::Debug;

	const NAME: &'static str;
	/// Which lump these records live in.
	const LUMP: LumpKind;

	/// The layout row for `ctx`, or `None` if this record kind has no known layout there.
	fn layout(ctx: &BspParseContext) -> Option<&'static <Self::Field as RecordField>::Layout>;

	/// How a lump of these records is split into records.
	fn encoding(ctx: &BspParseContext) -> LumpEncoding {
		let _ = ctx;
		LumpEncoding::FixedStride
	}

	/// Splits a lump's bytes into records. The default slices at the fixed record length.
	fn decode_lump(data: &[u8], ctx: BspParseContext, options: &LumpParseOptions) -> BspResult<Lump<Self>> {
		let _ = options;
		Lump::parse_fixed(data, ctx)
	}

	/// Serializes a lump of these records.
	fn encode_lump(lump: &Lump<Self>) -> Vec<u8> {
		lump.concat_records()
	}

	/// Like [`RecordKind::layout`], but errors if there isn't one.
	fn descriptor(ctx: &BspParseContext) -> BspResult<&'static <Self::Field as RecordField>::Layout> {
		Self::layout(ctx).ok_or(BspParseError::UnsupportedFormat {
			record: Self::NAME,
			format: ctx.format,
			version: ctx.version,
		})
	}

	/// The fixed length of a record in `ctx`. Variable-length records error like unknown layouts do.
	fn record_len(ctx: &BspParseContext) -> BspResult<usize> {
		Self::descriptor(ctx)?.record_len().ok_or(BspParseError::UnsupportedFormat {
			record: Self::NAME,
			format: ctx.format,
			version: ctx.version,
		})
	}

	/// Where `field` lives in a record of `ctx`, `None` if it doesn't exist there.
	#[inline]
	fn field_layout(field: Self::Field, ctx: &BspParseContext) -> Option<FieldLayout> {
		Self::layout(ctx).and_then(|layout| field.slot(layout))
	}
}

/// Read access to a record's fields.
pub trait RecordRead {
	type Kind: RecordKind;

	fn bytes(&self) -> &[u8];
	fn ctx(&self) -> &BspParseContext;
	fn payload(&self) -> &<Self::Kind as RecordKind>::Payload;

	/// Whether `field` exists in this record's format.
	#[inline]
	fn has(&self, field: <Self::Kind as RecordKind>::Field) -> bool {
		Self::Kind::field_layout(field, self.ctx()).is_some()
	}

	/// Reads `field`. Fields that don't exist in this record's format, or lie outside of its bytes, read as the sentinel
	/// of their value type (see [`ValueType::sentinel`]).
	fn get(&self, field: <Self::Kind as RecordKind>::Field) -> FieldValue {
		Self::Kind::field_layout(field, self.ctx())
			.and_then(|layout| read_field(self.bytes(), layout, self.ctx()).ok())
			.unwrap_or_else(|| field.value_type().sentinel())
	}

	#[inline]
	fn get_int(&self, field: <Self::Kind as RecordKind>::Field) -> i32 {
		self.get(field).as_int().unwrap_or(-1)
	}
	#[inline]
	fn get_float(&self, field: <Self::Kind as RecordKind>::Field) -> f32 {
		self.get(field).as_float().unwrap_or(0.)
	}
	#[inline]
	fn get_vector(&self, field: <Self::Kind as RecordKind>::Field) -> Vector3 {
		self.get(field).as_vector().unwrap_or(Vector3::ZERO)
	}
	fn get_name(&self, field: <Self::Kind as RecordKind>::Field) -> String {
		match self.get(field) {
			FieldValue::Name(name) => name,
			_ => String::new(),
		}
	}

	/// Reads an index field, `None` if it doesn't exist or holds a negative marker.
	fn index(&self, field: <Self::Kind as RecordKind>::Field) -> Option<usize> {
		if !self.has(field) {
			return None;
		}
		usize::try_from(self.get_int(field)).ok()
	}

	/// Projects a count field and the index field it's paired with into the range it addresses in the target lump.
	fn range(&self, count_field: <Self::Kind as RecordKind>::Field) -> Option<Range<usize>> {
		let FieldRole::Count { first } = count_field.role() else { return None };
		let start = self.index(first)?;
		let count = self.index(count_field)?;
		Some(start..start + count)
	}

	/// Every field existing in this record's format, with its value.
	fn present_fields(&self) -> Vec<(<Self::Kind as RecordKind>::Field, FieldValue)> {
		<Self::Kind as RecordKind>::Field::iter()
			.filter(|field| self.has(*field))
			.map(|field| (field, self.get(field)))
			.collect()
	}
}

/// Write access to a record's fields.
pub trait RecordWrite: RecordRead {
	fn bytes_mut(&mut self) -> &mut [u8];

	/// Replaces the whole record, for records whose length depends on their contents. Returns `false` if this view
	/// can't change the length of its record.
	fn replace_bytes(&mut self, bytes: Vec<u8>) -> bool {
		let _ = bytes;
		false
	}

	fn payload_mut(&mut self) -> &mut <Self::Kind as RecordKind>::Payload;

	/// Writes `field`. Does nothing if the field doesn't exist in this record's format.
	///
	/// Integers written to 16-bit fields keep only their low 16 bits, names written to fixed-width fields are cut off at the
	/// field's width.
	fn set(&mut self, field: <Self::Kind as RecordKind>::Field, value: impl Into<FieldValue>) -> BspResult<()> {
		let value = value.into();
		if value.value_type() != field.value_type() {
			return Err(BspParseError::FieldTypeMismatch {
				field: field.name(),
				expected: field.value_type(),
				found: value.value_type(),
			});
		}
		// A NUL would end the name early on disk, and split a record of delimited names in two.
		if matches!(&value, FieldValue::Name(name) if name.contains('\0')) {
			return Err(BspParseError::NulInName { field: field.name() });
		}
		let Some(layout) = Self::Kind::field_layout(field, self.ctx()) else { return Ok(()) };

		// Delimited names resize their record where the view allows it, and are cut off at the current length otherwise.
		if let (FieldKind::DelimitedName, FieldValue::Name(name)) = (layout.kind, &value) {
			let mut bytes = self.bytes()[..layout.offset.min(self.bytes().len())].to_vec();
			bytes.extend_from_slice(name.as_bytes());
			if self.replace_bytes(bytes) {
				return Ok(());
			}
		}

		write_field(self.bytes_mut(), layout, &value).job(format!("Writing field {}", field.name()))
	}
}

/// Decodes a field's bytes.
pub(crate) fn read_field(bytes: &[u8], layout: FieldLayout, ctx: &BspParseContext) -> BspResult<FieldValue> {
	let mut reader = BspByteReader::new(bytes, ctx).with_pos(layout.offset);

	Ok(match layout.kind {
		FieldKind::I16 => FieldValue::Int(reader.read::<i16>()? as i32),
		FieldKind::U16 => FieldValue::Int(reader.read::<u16>()? as i32),
		FieldKind::I32 => FieldValue::Int(reader.read()?),
		FieldKind::F32 => FieldValue::Float(reader.read()?),
		FieldKind::Vector3 => FieldValue::Vector(reader.read()?),
		FieldKind::Name(width) => FieldValue::Name(decode_name(reader.read_bytes(width)?)),
		FieldKind::DelimitedName => FieldValue::Name(decode_name(reader.read_bytes(bytes.len().saturating_sub(layout.offset))?)),
	})
}

/// Encodes `value` into the bytes of a field.
fn write_field(bytes: &mut [u8], layout: FieldLayout, value: &FieldValue) -> BspResult<()> {
	let range = layout.byte_range(bytes.len());
	let size = bytes.len();
	let Some(dst) = bytes.get_mut(range.clone()) else {
		return Err(BspParseError::BufferOutOfBounds {
			from: range.start,
			to: range.end,
			size,
		});
	};

	match (layout.kind, value) {
		(FieldKind::I16, FieldValue::Int(v)) => dst.copy_from_slice(&(*v as i16).to_le_bytes()),
		(FieldKind::U16, FieldValue::Int(v)) => dst.copy_from_slice(&(*v as u16).to_le_bytes()),
		(FieldKind::I32, FieldValue::Int(v)) => dst.copy_from_slice(&v.to_le_bytes()),
		(FieldKind::F32, FieldValue::Float(v)) => dst.copy_from_slice(&v.to_le_bytes()),
		(FieldKind::Vector3, FieldValue::Vector(v)) => dst.copy_from_slice(&v.to_le_bytes()),
		(FieldKind::Name(_) | FieldKind::DelimitedName, FieldValue::Name(name)) => {
			dst.fill(0);
			let len = name.len().min(dst.len());
			dst[..len].copy_from_slice(&name.as_bytes()[..len]);
		}
		(kind, value) => {
			return Err(BspParseError::FieldTypeMismatch {
				field: "<raw>",
				expected: kind.value_type(),
				found: value.value_type(),
			})
		}
	}

	Ok(())
}

/// Text up to the first NUL, non-UTF-8 bytes replaced.
pub(crate) fn decode_name(bytes: &[u8]) -> String {
	let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
	String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Shared view of a record inside a [`Lump`].
pub struct RecordRef<'a, R: RecordKind> {
	pub(crate) bytes: &'a [u8],
	pub(crate) ctx: &'a BspParseContext,
	pub(crate) payload: &'a R::Payload,
}

impl<R: RecordKind> Clone for RecordRef<'_, R> {
	fn clone(&self) -> Self {
		*self
	}
}
impl<R: RecordKind> Copy for RecordRef<'_, R> {}

impl<'a, R: RecordKind> RecordRef<'a, R> {
	/// Copies this record out of its lump.
	pub fn to_record(&self) -> Record<R> {
		Record {
			bytes: self.bytes.to_vec(),
			ctx: *self.ctx,
			payload: self.payload.clone(),
		}
	}
}

impl<R: RecordKind> RecordRead for RecordRef<'_, R> {
	type Kind = R;

	#[inline]
	fn bytes(&self) -> &[u8] {
		self.bytes
	}
	#[inline]
	fn ctx(&self) -> &BspParseContext {
		self.ctx
	}
	#[inline]
	fn payload(&self) -> &R::Payload {
		self.payload
	}
}

impl<R: RecordKind> fmt::Debug for RecordRef<'_, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		debug_record(self, f)
	}
}

/// Where a [`RecordMut`] writes to: a slice of a packed lump buffer, or a record with its own allocation.
pub(crate) enum RecordBytesMut<'a> {
	Packed(&'a mut [u8]),
	Segment(&'a mut Vec<u8>),
}

/// Exclusive view of a record inside a [`Lump`]. Writes go straight into the lump.
pub struct RecordMut<'a, R: RecordKind> {
	pub(crate) bytes: RecordBytesMut<'a>,
	pub(crate) ctx: &'a BspParseContext,
	pub(crate) payload: &'a mut R::Payload,
}

impl<R: RecordKind> RecordRead for RecordMut<'_, R> {
	type Kind = R;

	fn bytes(&self) -> &[u8] {
		match &self.bytes {
			RecordBytesMut::Packed(bytes) => &bytes[..],
			RecordBytesMut::Segment(bytes) => &bytes[..],
		}
	}
	#[inline]
	fn ctx(&self) -> &BspParseContext {
		self.ctx
	}
	#[inline]
	fn payload(&self) -> &R::Payload {
		self.payload
	}
}

impl<R: RecordKind> RecordWrite for RecordMut<'_, R> {
	fn bytes_mut(&mut self) -> &mut [u8] {
		match &mut self.bytes {
			RecordBytesMut::Packed(bytes) => &mut bytes[..],
			RecordBytesMut::Segment(bytes) => bytes.as_mut_slice(),
		}
	}

	fn replace_bytes(&mut self, bytes: Vec<u8>) -> bool {
		match &mut self.bytes {
			RecordBytesMut::Packed(_) => false,
			RecordBytesMut::Segment(segment) => {
				**segment = bytes;
				true
			}
		}
	}

	#[inline]
	fn payload_mut(&mut self) -> &mut R::Payload {
		self.payload
	}
}

impl<R: RecordKind> fmt::Debug for RecordMut<'_, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		debug_record(self, f)
	}
}

/// A record detached from any lump, for building records to insert, or converting between formats.
#[derive(Clone)]
pub struct Record<R: RecordKind> {
	bytes: Vec<u8>,
	ctx: BspParseContext,
	payload: R::Payload,
}

impl<R: RecordKind> Record<R> {
	/// A record of `ctx` with every byte zero. Variable-length records start out as short as they can be.
	pub fn zeroed(ctx: BspParseContext) -> BspResult<Self> {
		let len = R::descriptor(&ctx)?.record_len().unwrap_or(0);
		Ok(Self {
			bytes: vec![0; len],
			ctx,
			payload: R::Payload::default(),
		})
	}

	/// Wraps the bytes of a single record, checking them against the record length of `ctx`.
	pub fn from_bytes(bytes: Vec<u8>, ctx: BspParseContext) -> BspResult<Self> {
		let record_len = R::descriptor(&ctx)?.record_len();
		match (R::encoding(&ctx), record_len) {
			(LumpEncoding::FixedStride, Some(record_len)) if bytes.len() != record_len => {
				return Err(BspParseError::LumpSizeMismatch { len: bytes.len(), record_len })
			}
			(LumpEncoding::OffsetTable, Some(record_len)) if !bytes.is_empty() && bytes.len() < record_len => {
				return Err(BspParseError::BufferOutOfBounds {
					from: 0,
					to: record_len,
					size: bytes.len(),
				})
			}
			_ => {}
		}

		Ok(Self {
			bytes,
			ctx,
			payload: R::Payload::default(),
		})
	}

	/// Converts `source` to the layout of `ctx` by field.
	///
	/// If the contexts match, this is a plain byte copy. Otherwise the new record starts zeroed, and every field existing
	/// in both formats is copied over. Fields only the target has stay zero, fields only the source has are dropped.
	pub fn copy_from<S: RecordRead<Kind = R>>(source: &S, ctx: BspParseContext) -> BspResult<Self> {
		if *source.ctx() == ctx {
			return Ok(Self {
				bytes: source.bytes().to_vec(),
				ctx,
				payload: source.payload().clone(),
			});
		}

		let mut record = Self::zeroed(ctx).job(format!("Converting {} record from {}", R::NAME, source.ctx().format))?;
		for field in R::Field::iter() {
			if source.has(field) && record.has(field) {
				record.set(field, source.get(field))?;
			}
		}
		record.payload = source.payload().clone();

		Ok(record)
	}

	pub fn with_payload(mut self, payload: R::Payload) -> Self {
		self.payload = payload;
		self
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}

	pub(crate) fn into_parts(self) -> (Vec<u8>, BspParseContext, R::Payload) {
		(self.bytes, self.ctx, self.payload)
	}
}

impl<R: RecordKind> RecordRead for Record<R> {
	type Kind = R;

	#[inline]
	fn bytes(&self) -> &[u8] {
		&self.bytes
	}
	#[inline]
	fn ctx(&self) -> &BspParseContext {
		&self.ctx
	}
	#[inline]
	fn payload(&self) -> &R::Payload {
		&self.payload
	}
}

impl<R: RecordKind> RecordWrite for Record<R> {
	#[inline]
	fn bytes_mut(&mut self) -> &mut [u8] {
		&mut self.bytes
	}

	fn replace_bytes(&mut self, bytes: Vec<u8>) -> bool {
		self.bytes = bytes;
		true
	}

	#[inline]
	fn payload_mut(&mut self) -> &mut R::Payload {
		&mut self.payload
	}
}

impl<R: RecordKind> fmt::Debug for Record<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		debug_record(self, f)
	}
}

fn debug_record<V: RecordRead>(record: &V, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	let mut s = f.debug_struct(V::Kind::NAME);
	for (field, value) in record.present_fields() {
		s.field(field.name(), &value);
	}
	s.finish()
}

#[cfg(test)]
mod record_tests {
	use super::*;

	#[test]
	fn type_mismatch() {
		let mut model = Record::<Model>::zeroed(BspParseContext::from(BspFormat::Quake2)).unwrap();

		assert!(matches!(
			model.set(ModelField::Origin, 5),
			Err(BspParseError::FieldTypeMismatch {
				field: "Origin",
				expected: ValueType::Vector,
				found: ValueType::Int
			})
		));
		// Type errors come before the absence check.
		assert!(model.set(ModelField::NumLeaves, "leaf").is_err());
	}

	#[test]
	fn names_with_nul() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let mut texture = Record::<Texture>::zeroed(ctx).unwrap();
		texture.set(TextureField::Name, "wall").unwrap();

		assert!(matches!(texture.set(TextureField::Name, "wa\0ll"), Err(BspParseError::NulInName { field: "Name" })));
		assert_eq!(texture.get_name(TextureField::Name), "wall");
	}

	#[test]
	fn copy_between_formats() {
		let mut quake = Record::<Model>::zeroed(BspParseContext::from(BspFormat::Quake)).unwrap();
		quake.set(ModelField::Minimums, glam::vec3(-64., -64., 0.)).unwrap();
		quake.set(ModelField::HeadNode, 12).unwrap();
		quake.set(ModelField::HeadClipNode1, 3).unwrap();
		quake.set(ModelField::NumFaces, 9).unwrap();

		let quake2 = Record::copy_from(&quake, BspParseContext::from(BspFormat::Quake2)).unwrap();
		assert_eq!(quake2.bytes().len(), 48);
		assert_eq!(glam::Vec3::from(quake2.get_vector(ModelField::Minimums)), glam::vec3(-64., -64., 0.));
		assert_eq!(quake2.get_int(ModelField::HeadNode), 12);
		assert_eq!(quake2.get_int(ModelField::NumFaces), 9);
		assert_eq!(quake2.get_vector(ModelField::Origin), Vector3::ZERO);

		let back = Record::copy_from(&quake2, BspParseContext::from(BspFormat::Quake)).unwrap();
		assert_eq!(back.get_int(ModelField::HeadNode), 12);
		assert_eq!(back.get_int(ModelField::NumFaces), 9);
		// Dropped on the way through Quake 2.
		assert_eq!(back.get_int(ModelField::HeadClipNode1), 0);
	}

	#[test]
	fn same_context_copies_bytes() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let bytes: Vec<u8> = (0..64).collect();
		let model = Record::<Model>::from_bytes(bytes.clone(), ctx).unwrap();

		assert_eq!(Record::copy_from(&model, ctx).unwrap().into_bytes(), bytes);
	}

	#[test]
	fn wrong_length() {
		assert!(matches!(
			Record::<Model>::from_bytes(vec![0; 63], BspParseContext::from(BspFormat::Quake)),
			Err(BspParseError::LumpSizeMismatch { len: 63, record_len: 64 })
		));
	}

	#[test]
	fn names() {
		assert_eq!(decode_name(b"wall\0\0junk"), "wall");
		assert_eq!(decode_name(b"exactly16bytes!!"), "exactly16bytes!!");
	}
}
