//! Field descriptors: where a semantic field lives inside a record, and how its bytes are encoded.
//!
//! Every record kind declares its fields with [`record_fields!`], which generates the field id enum and a layout struct with
//! one slot per field. A record kind's layout table is then a handful of `const` layout values, one per group of formats that
//! share a byte layout, where every slot has to be written out as present or [`ABSENT`].

use std::fmt;

use crate::*;

/// How a field's bytes are encoded on disk. All multi-byte values are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
	I16,
	U16,
	I32,
	F32,
	/// Three `f32`s, 12 bytes.
	Vector3,
	/// NUL-padded name of a fixed byte width.
	Name(usize),
	/// A name taking up the rest of its record, used by lumps of delimited strings.
	DelimitedName,
}

impl FieldKind {
	/// Byte width on disk, `None` for [`FieldKind::DelimitedName`], which is as wide as its record.
	pub const fn width(self) -> Option<usize> {
		match self {
			Self::I16 | Self::U16 => Some(2),
			Self::I32 | Self::F32 => Some(4),
			Self::Vector3 => Some(12),
			Self::Name(width) => Some(width),
			Self::DelimitedName => None,
		}
	}

	/// Whether an integer can be stored in this encoding without wrapping. Always false for non-integer kinds.
	pub const fn holds(self, value: i64) -> bool {
		match self {
			Self::I16 => value >= i16::MIN as i64 && value <= i16::MAX as i64,
			Self::U16 => value >= 0 && value <= u16::MAX as i64,
			Self::I32 => value >= i32::MIN as i64 && value <= i32::MAX as i64,
			_ => false,
		}
	}

	/// The type of value this encoding decodes to.
	pub const fn value_type(self) -> ValueType {
		match self {
			Self::I16 | Self::U16 | Self::I32 => ValueType::Int,
			Self::F32 => ValueType::Float,
			Self::Vector3 => ValueType::Vector,
			Self::Name(_) | Self::DelimitedName => ValueType::Name,
		}
	}
}

/// Where a field lives in a record of a specific format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLayout {
	pub offset: usize,
	pub kind: FieldKind,
}

impl FieldLayout {
	/// Byte width of this field in a record of `record_len` bytes.
	#[inline]
	pub fn width(&self, record_len: usize) -> usize {
		self.kind.width().unwrap_or(record_len.saturating_sub(self.offset))
	}

	/// The bytes of a `record_len` long record this field occupies.
	#[inline]
	pub fn byte_range(&self, record_len: usize) -> Range<usize> {
		self.offset..self.offset + self.width(record_len)
	}
}

/// Marks a field as not existing in a layout.
pub const ABSENT: Option<FieldLayout> = None;

pub const fn i16_at(offset: usize) -> Option<FieldLayout> {
	Some(FieldLayout { offset, kind: FieldKind::I16 })
}
pub const fn u16_at(offset: usize) -> Option<FieldLayout> {
	Some(FieldLayout { offset, kind: FieldKind::U16 })
}
pub const fn i32_at(offset: usize) -> Option<FieldLayout> {
	Some(FieldLayout { offset, kind: FieldKind::I32 })
}
pub const fn f32_at(offset: usize) -> Option<FieldLayout> {
	Some(FieldLayout { offset, kind: FieldKind::F32 })
}
pub const fn vec3_at(offset: usize) -> Option<FieldLayout> {
	Some(FieldLayout { offset, kind: FieldKind::Vector3 })
}
pub const fn name_at(offset: usize, width: usize) -> Option<FieldLayout> {
	Some(FieldLayout {
		offset,
		kind: FieldKind::Name(width),
	})
}
pub const fn delimited_name() -> Option<FieldLayout> {
	Some(FieldLayout {
		offset: 0,
		kind: FieldKind::DelimitedName,
	})
}

/// The semantic type of a field, independent of how any one format encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
	Int,
	Float,
	Vector,
	Name,
}

impl ValueType {
	/// What reading a field of this type returns when the field does not exist in the record's format.
	///
	/// `-1` for integers (indices and counts), zero for floats and vectors, and an empty name.
	pub fn sentinel(self) -> FieldValue {
		match self {
			Self::Int => FieldValue::Int(-1),
			Self::Float => FieldValue::Float(0.),
			Self::Vector => FieldValue::Vector(Vector3::ZERO),
			Self::Name => FieldValue::Name(String::new()),
		}
	}
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	Int(i32),
	Float(f32),
	Vector(Vector3),
	Name(String),
}

impl FieldValue {
	pub fn value_type(&self) -> ValueType {
		match self {
			Self::Int(_) => ValueType::Int,
			Self::Float(_) => ValueType::Float,
			Self::Vector(_) => ValueType::Vector,
			Self::Name(_) => ValueType::Name,
		}
	}

	pub fn as_int(&self) -> Option<i32> {
		match self {
			Self::Int(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f32> {
		match self {
			Self::Float(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_vector(&self) -> Option<Vector3> {
		match self {
			Self::Vector(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_name(&self) -> Option<&str> {
		match self {
			Self::Name(v) => Some(v),
			_ => None,
		}
	}
}

impl fmt::Display for FieldValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(v) => v.fmt(f),
			Self::Float(v) => v.fmt(f),
			Self::Vector(Vector3([x, y, z])) => write!(f, "({x}, {y}, {z})"),
			Self::Name(v) => write!(f, "{v:?}"),
		}
	}
}

impl From<i32> for FieldValue {
	fn from(value: i32) -> Self {
		Self::Int(value)
	}
}
impl From<f32> for FieldValue {
	fn from(value: f32) -> Self {
		Self::Float(value)
	}
}
impl From<Vector3> for FieldValue {
	fn from(value: Vector3) -> Self {
		Self::Vector(value)
	}
}
impl From<glam::Vec3> for FieldValue {
	fn from(value: glam::Vec3) -> Self {
		Self::Vector(value.into())
	}
}
impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		Self::Name(value.to_owned())
	}
}
impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		Self::Name(value)
	}
}

/// Three little-endian `f32`s as stored in records. Convert to and from [`glam::Vec3`] for any math.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector3(pub [f32; 3]);

impl Vector3 {
	pub const ZERO: Self = Self([0.; 3]);

	pub fn from_le_bytes(bytes: [u8; 12]) -> Self {
		let component = |i: usize| f32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);
		Self([component(0), component(1), component(2)])
	}

	pub fn to_le_bytes(self) -> [u8; 12] {
		let mut bytes = [0; 12];
		for (chunk, component) in bytes.chunks_exact_mut(4).zip(self.0) {
			chunk.copy_from_slice(&component.to_le_bytes());
		}
		bytes
	}
}

impl From<glam::Vec3> for Vector3 {
	fn from(value: glam::Vec3) -> Self {
		Self(value.to_array())
	}
}

impl From<Vector3> for glam::Vec3 {
	fn from(value: Vector3) -> Self {
		glam::Vec3::from_array(value.0)
	}
}

/// How a field takes part in the document-wide reference graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole<F> {
	/// A plain value.
	Value,
	/// Position of a record in another lump (or the same one).
	Index(LumpKind),
	/// Length of the contiguous range that starts at the index field `first`.
	Count { first: F },
}

/// A layout table row: the record length and the location of every field, for a group of formats.
pub trait RecordLayout: fmt::Debug + 'static {
	/// Length of a record in bytes, or `None` if records are variable-length.
	fn record_len(&self) -> Option<usize>;
}

/// A semantic field id of a record kind, generated by [`record_fields!`].
pub trait RecordField: Copy + Eq + fmt::Debug + IntoEnumIterator + Into<&'static str> + 'static {
	type Layout: RecordLayout;

	/// The location of this field in a layout row, or `None` if the row's formats don't have it.
	fn slot(self, layout: &Self::Layout) -> Option<FieldLayout>;

	fn role(self) -> FieldRole<Self>;

	fn value_type(self) -> ValueType;

	#[inline]
	fn name(self) -> &'static str {
		self.into()
	}

	/// The count field paired with this field, if this is an index field starting a range.
	fn paired_count(self) -> Option<Self> {
		Self::iter().find(|field| matches!(field.role(), FieldRole::Count { first } if first == self))
	}
}

/// Declares the field id enum and the layout row struct of a record kind.
///
/// ```ignore
/// record_fields! {
///     pub enum ModelField in ModelLayout {
///         Origin: Vector => origin,
///         FirstFace: Int as FieldRole::Index(LumpKind::Faces) => first_face,
///         NumFaces: Int as FieldRole::Count { first: ModelField::FirstFace } => num_faces,
///     }
/// }
/// ```
macro_rules! record_fields {
	(
		$(#[$meta:meta])*
		pub enum $field:ident in $layout:ident {
			$(
				$(#[$variant_meta:meta])*
				$variant:ident: $value_type:ident $(as $role:expr)? => $slot:ident,
			)*
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::EnumCount, strum::IntoStaticStr, strum::Display)]
		pub enum $field {
			$(
				$(#[$variant_meta])*
				$variant,
			)*
		}

		#[doc = concat!("One row of the [`", stringify!($field), "`] layout table.")]
		#[derive(Debug, Clone, Copy)]
		pub struct $layout {
			/// Length of a record in bytes, `None` for variable-length records.
			pub len: Option<usize>,
			$(pub $slot: Option<$crate::data::field::FieldLayout>,)*
		}

		impl $crate::data::field::RecordLayout for $layout {
			#[inline]
			fn record_len(&self) -> Option<usize> {
				self.len
			}
		}

		impl $crate::data::field::RecordField for $field {
			type Layout = $layout;

			fn slot(self, layout: &$layout) -> Option<$crate::data::field::FieldLayout> {
				match self {
					$(Self::$variant => layout.$slot,)*
				}
			}

			fn role(self) -> $crate::data::field::FieldRole<Self> {
				match self {
					$(Self::$variant => $crate::data::field::record_fields!(@role $($role)?),)*
				}
			}

			fn value_type(self) -> $crate::data::field::ValueType {
				match self {
					$(Self::$variant => $crate::data::field::ValueType::$value_type,)*
				}
			}
		}
	};
	(@role) => {
		$crate::data::field::FieldRole::Value
	};
	(@role $role:expr) => {
		$role
	};
}
pub(crate) use record_fields;

#[cfg(test)]
mod field_tests {
	use super::*;

	#[test]
	fn vector_bytes() {
		let vector = Vector3([1., -2.5, 1024.]);
		let bytes = vector.to_le_bytes();

		assert_eq!(&bytes[0..4], &1f32.to_le_bytes());
		assert_eq!(&bytes[4..8], &(-2.5f32).to_le_bytes());
		assert_eq!(Vector3::from_le_bytes(bytes), vector);
		assert_eq!(glam::Vec3::from(vector), glam::vec3(1., -2.5, 1024.));
	}

	#[test]
	fn widths() {
		assert_eq!(FieldKind::I16.width(), Some(2));
		assert_eq!(FieldKind::Vector3.width(), Some(12));
		assert_eq!(FieldKind::Name(64).width(), Some(64));
		assert_eq!(FieldKind::DelimitedName.width(), None);

		assert_eq!(i32_at(36).unwrap().byte_range(64), 36..40);
		assert_eq!(delimited_name().unwrap().width(5), 5);
	}

	#[test]
	fn integer_ranges() {
		assert!(FieldKind::U16.holds(65535));
		assert!(!FieldKind::U16.holds(65536));
		assert!(!FieldKind::U16.holds(-1));
		assert!(FieldKind::I16.holds(-32768));
		assert!(!FieldKind::I16.holds(32768));
		assert!(FieldKind::I32.holds(i32::MAX as i64));
		assert!(!FieldKind::I32.holds(i32::MAX as i64 + 1));
		assert!(!FieldKind::F32.holds(0));
	}

	#[test]
	fn sentinels() {
		assert_eq!(ValueType::Int.sentinel(), FieldValue::Int(-1));
		assert_eq!(ValueType::Vector.sentinel(), FieldValue::Vector(Vector3::ZERO));
		assert_eq!(ValueType::Name.sentinel().as_name(), Some(""));
	}
}
