//! Record kinds, their per-format layout tables, and the lump directory metadata the container works with.

pub mod field;
pub mod leaves;
pub mod models;
pub mod texture;

use crate::*;

/// Points to the chunk of data in the file a lump resides in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LumpEntry {
	pub offset: u32,
	pub len: u32,
	/// Version of the lump's record layout. Zero for formats without per-lump versions.
	pub version: i32,
	/// Four-byte identifier, only used by some Source-engine games.
	pub ident: [u8; 4],
}

impl LumpEntry {
	/// Returns the slice of `data` (BSP file input) that this entry points to.
	pub fn get<'a>(&self, data: &'a [u8]) -> BspResult<&'a [u8]> {
		let (from, to) = (self.offset as usize, self.offset as usize + self.len as usize);
		if to > data.len() {
			Err(BspParseError::BufferOutOfBounds { from, to, size: data.len() })
		} else {
			Ok(&data[from..to])
		}
	}

	/// The context records of this lump are parsed with.
	#[inline]
	pub fn context(&self, format: BspFormat) -> BspParseContext {
		BspParseContext::new(format, self.version)
	}
}

/// Identifies a lump within a document, independently of where the format puts it in the lump directory.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter, strum::EnumString, strum::IntoStaticStr, strum::Display,
)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LumpKind {
	Models,
	/// Embedded mip textures, texture infos, shaders or texture name strings, depending on the format.
	Textures,
	Leaves,
	Nodes,
	ClipNodes,
	Faces,
	Brushes,
	/// Face indices referenced by leaves. Called `marksurfaces` in Quake.
	LeafFaces,
	LeafBrushes,
	/// Call of Duty patch collision indices.
	PatchIndices,
	Planes,
	Vertices,
	Edges,
	SurfaceEdges,
}

impl LumpKind {
	/// Slot of this lump in the lump directory of `format`, or `None` if the lump does not exist there or has no record
	/// descriptor in this crate.
	pub fn directory_index(self, format: BspFormat) -> Option<usize> {
		use BspFormat::*;

		match self {
			Self::Models => match format {
				Raven | Quake3 => Some(7),
				MOHAA | FAKK | Quake2 | SiN | Daikatana | SoF => Some(13),
				GoldSrc | Quake | Nightfire | Vindictus | TacticalInterventionEncrypted | Source17 | Source18 | Source19 | Source20
				| Source21 | Source22 | Source23 | Source27 | L4D2 | DMoMaM | Titanfall => Some(14),
				STEF2 | STEF2Demo => Some(15),
				CoD => Some(27),
				CoD2 => Some(35),
				CoD4 => Some(37),
			},
			Self::Textures => match format {
				Quake | GoldSrc | Nightfire => Some(2),
				Quake2 | Daikatana | SiN | SoF => Some(5),
				Quake3 | Raven => Some(1),
				CoD | CoD2 | CoD4 | MOHAA | FAKK | STEF2 | STEF2Demo => Some(0),
				Source17 | Source18 | Source19 | Source20 | Source21 | Source22 | Source23 | Source27 | L4D2
				| TacticalInterventionEncrypted | Vindictus | DMoMaM => Some(43),
				Titanfall => None,
			},
			Self::Leaves => match format {
				Quake | GoldSrc => Some(10),
				Quake2 | Daikatana | SoF => Some(8),
				Quake3 | Raven => Some(4),
				Source17 | Source18 | Source19 | Source20 | Source21 | Source22 | Source23 | Source27 | L4D2
				| TacticalInterventionEncrypted | DMoMaM => Some(10),
				Nightfire | SiN | STEF2 | STEF2Demo | MOHAA | FAKK | CoD | CoD2 | CoD4 | Titanfall | Vindictus => None,
			},
			Self::Nodes
			| Self::ClipNodes
			| Self::Faces
			| Self::Brushes
			| Self::LeafFaces
			| Self::LeafBrushes
			| Self::PatchIndices
			| Self::Planes
			| Self::Vertices
			| Self::Edges
			| Self::SurfaceEdges => None,
		}
	}
}
