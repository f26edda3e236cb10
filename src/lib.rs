//! Format-polymorphic record lumps for BSP map files.
//!
//! A [`Lump`] holds the records of one lump of one map, in the byte layout of the map's [`BspFormat`]. Records are read and
//! written through semantic field ids (e.g. [`ModelField::FirstFace`]) instead of engine-specific structs, and the layout of
//! every field for every format lives in one declarative table per record kind.
//!
//! Lumps that reference each other by position are kept consistent by [`BspData`], which shifts index fields across the
//! whole document whenever a lump grows or shrinks.

pub mod prelude;
pub(crate) use prelude::*;

pub mod bsp;
pub mod codec;
pub mod data;
pub mod format;
pub mod lump;
pub mod reader;
pub mod record;
pub mod refs;


// Re-exports
pub use glam;
pub use image;
pub use smallvec;

pub use bsp::{BspData, BspParseInput, BspParseSettings, DocumentRecord, LumpFailure, LumpInput};
pub use codec::LumpEncoding;
pub use data::{
	field::{FieldKind, FieldLayout, FieldRole, FieldValue, RecordField, ValueType, Vector3},
	leaves::{Leaf, LeafField},
	models::{Model, ModelField},
	texture::{
		MipPixels, Palette, PixelSource, Texture, TextureArchive, TextureDiagnostics, TextureField, TexturePixels, TextureSource,
	},
	LumpEntry, LumpKind,
};
pub use format::BspFormat;
pub use lump::{Lump, LumpParseOptions, RawLump};
pub use reader::BspParseContext;
pub use record::{Record, RecordKind, RecordMut, RecordRead, RecordRef, RecordWrite};
pub use refs::{DanglingCause, DanglingReference, LumpEdit, ReferenceReport};

#[derive(Debug, Clone, Error)]
pub enum BspParseError {
	#[error("Missing input: {0}")]
	MissingInput(&'static str),
	#[error("The {0} lump is not loaded")]
	MissingLump(LumpKind),
	#[error("{record} records have no known layout in {format} (lump version {version})")]
	UnsupportedFormat {
		record: &'static str,
		format: BspFormat,
		version: i32,
	},
	#[error("Lump of {len} bytes is not a multiple of the {record_len} byte record length")]
	LumpSizeMismatch { len: usize, record_len: usize },
	#[error("Texture lump of {len} bytes can't hold {count} texture offsets")]
	InvalidTextureCount { count: i32, len: usize },
	#[error("Texture {index} points to offset {offset}, outside of the {len} byte lump")]
	TextureOffsetOutOfBounds { index: usize, offset: i32, len: usize },
	#[error("Texture name starting at byte {offset} is missing its NUL terminator")]
	UnterminatedName { offset: usize },
	#[error("Tried to read bytes from {from} to {to} from buffer of size {size}")]
	BufferOutOfBounds { from: usize, to: usize, size: usize },
	#[error("Palette byte length {0} instead of 768.")]
	InvalidPaletteLength(usize),
	#[error("Texture \"{name}\" not found in the texture source")]
	PaletteResolution { name: String },
	#[error("Failed to decode pixels of texture \"{name}\": {reason}")]
	TextureDecode { name: String, reason: String },
	#[error("Field {field} holds {expected:?} values, tried to set {found:?}")]
	FieldTypeMismatch {
		field: &'static str,
		expected: ValueType,
		found: ValueType,
	},
	#[error("Name for field {field} contains a NUL byte")]
	NulInName { field: &'static str },
	#[error("Index {index} out of range for lump of length {len}")]
	IndexOutOfRange { index: usize, len: usize },

	/// For telling the user exactly where the error occurred in the process.
	#[error("{0} - {1}")]
	DoingJob(String, Box<BspParseError>),
}

impl BspParseError {
	/// The error behind any [`BspParseError::DoingJob`].
	pub fn root(&self) -> &BspParseError {
		let mut err = self;
		loop {
			match err {
				Self::DoingJob(_, child) => err = child,
				_ => return err,
			}
		}
	}
}

pub type BspResult<T> = Result<T, BspParseError>;

pub trait BspParseResultDoingJobExt {
	/// Like `map_err`, but specifically for adding messages to BSP errors to tell the user exactly what was going on when the error occurred.
	fn job(self, job: impl ToString) -> Self;
}

impl<T> BspParseResultDoingJobExt for BspResult<T> {
	fn job(self, job: impl ToString) -> Self {
		match self {
			Ok(v) => Ok(v),
			Err(err) => Err(BspParseError::DoingJob(job.to_string(), Box::new(err))),
		}
	}
}

#[cfg(test)]
mod error_tests {
	use super::*;

	#[test]
	fn root_unwraps_jobs() {
		let result: BspResult<()> = Err(BspParseError::MissingInput("test"));
		let err = result.job("inner").job("outer").unwrap_err();

		assert_eq!(err.to_string(), "outer - inner - Missing input: test");
		assert!(matches!(err.root(), BspParseError::MissingInput("test")));
	}
}
