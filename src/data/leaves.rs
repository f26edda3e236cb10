//! Leaves of the BSP tree, the convex regions that hold ranges of faces and brushes.

use crate::data::field::*;
use crate::*;

record_fields! {
	/// Fields of a leaf record.
	pub enum LeafField in LeafLayout {
		Contents: Int => contents,
		/// Offset into the visibility lump, Quake and GoldSrc only. Later formats go through [`LeafField::Cluster`].
		Visibility: Int => visibility,
		Cluster: Int => cluster,
		Area: Int => area,
		FirstLeafFace: Int as FieldRole::Index(LumpKind::LeafFaces) => first_leaf_face,
		NumLeafFaces: Int as FieldRole::Count { first: LeafField::FirstLeafFace } => num_leaf_faces,
		FirstLeafBrush: Int as FieldRole::Index(LumpKind::LeafBrushes) => first_leaf_brush,
		NumLeafBrushes: Int as FieldRole::Count { first: LeafField::FirstLeafBrush } => num_leaf_brushes,
		/// Index into the Source water data lump, `-1` for dry leaves.
		WaterData: Int => water_data,
	}
}

const QUAKE: LeafLayout = LeafLayout {
	len: Some(28),
	contents: i32_at(0),
	visibility: i32_at(4),
	cluster: ABSENT,
	area: ABSENT,
	first_leaf_face: u16_at(20),
	num_leaf_faces: u16_at(22),
	first_leaf_brush: ABSENT,
	num_leaf_brushes: ABSENT,
	water_data: ABSENT,
};

const QUAKE2: LeafLayout = LeafLayout {
	len: Some(28),
	contents: i32_at(0),
	visibility: ABSENT,
	cluster: i16_at(4),
	area: i16_at(6),
	first_leaf_face: u16_at(20),
	num_leaf_faces: u16_at(22),
	first_leaf_brush: u16_at(24),
	num_leaf_brushes: u16_at(26),
	water_data: ABSENT,
};

/// Quake 3 leaves have no contents, they are taken from the brushes.
const QUAKE3: LeafLayout = LeafLayout {
	len: Some(48),
	contents: ABSENT,
	visibility: ABSENT,
	cluster: i32_at(0),
	area: i32_at(4),
	first_leaf_face: i32_at(32),
	num_leaf_faces: i32_at(36),
	first_leaf_brush: i32_at(40),
	num_leaf_brushes: i32_at(44),
	water_data: ABSENT,
};

/// Source leaves before lump version 1 carry 24 bytes of ambient lighting after the water data.
const SOURCE_V0: LeafLayout = LeafLayout {
	len: Some(56),
	contents: i32_at(0),
	visibility: ABSENT,
	cluster: i16_at(4),
	// Area shares its 16 bits with the leaf flags.
	area: ABSENT,
	first_leaf_face: u16_at(20),
	num_leaf_faces: u16_at(22),
	first_leaf_brush: u16_at(24),
	num_leaf_brushes: u16_at(26),
	water_data: i16_at(28),
};

const SOURCE_V1: LeafLayout = LeafLayout { len: Some(32), ..SOURCE_V0 };

/// Record kind of the leaf lump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf;

impl RecordKind for Leaf {
	type Field = LeafField;
	type Payload = ();

	const NAME: &'static str = "Leaf";
	const LUMP: LumpKind = LumpKind::Leaves;

	fn layout(ctx: &BspParseContext) -> Option<&'static LeafLayout> {
		use BspFormat::*;

		match ctx.format {
			Quake | GoldSrc => Some(&QUAKE),
			Quake2 | Daikatana | SoF => Some(&QUAKE2),
			Quake3 | Raven => Some(&QUAKE3),
			Source17 | Source18 | Source19 | Source20 | Source21 | Source22 | Source23 | Source27 | L4D2
			| TacticalInterventionEncrypted | DMoMaM => match ctx.version {
				0 => Some(&SOURCE_V0),
				1 => Some(&SOURCE_V1),
				_ => None,
			},
			Nightfire | SiN | STEF2 | STEF2Demo | MOHAA | FAKK | CoD | CoD2 | CoD4 | Titanfall | Vindictus => None,
		}
	}
}

#[cfg(test)]
mod leaf_tests {
	use super::*;

	#[test]
	fn source_versions() {
		let v0 = BspParseContext::new(BspFormat::Source20, 0);
		let v1 = BspParseContext::new(BspFormat::Source20, 1);

		assert_eq!(Leaf::record_len(&v0).unwrap(), 56);
		assert_eq!(Leaf::record_len(&v1).unwrap(), 32);
		assert!(matches!(
			Leaf::record_len(&BspParseContext::new(BspFormat::Source20, 2)),
			Err(BspParseError::UnsupportedFormat { record: "Leaf", version: 2, .. })
		));
	}

	#[test]
	fn unsigned_face_range() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let mut bytes = vec![0; 28];
		bytes[20..22].copy_from_slice(&0xFFF0u16.to_le_bytes());
		bytes[22..24].copy_from_slice(&2u16.to_le_bytes());
		let leaf = Record::<Leaf>::from_bytes(bytes, ctx).unwrap();

		assert_eq!(leaf.get_int(LeafField::FirstLeafFace), 0xFFF0);
		assert_eq!(leaf.range(LeafField::NumLeafFaces), Some(0xFFF0..0xFFF2));
		assert_eq!(leaf.get(LeafField::Cluster), FieldValue::Int(-1));
	}

	#[test]
	fn unsupported_formats() {
		assert!(Leaf::record_len(&BspParseContext::from(BspFormat::CoD)).is_err());
		assert!(Leaf::layout(&BspParseContext::from(BspFormat::Titanfall)).is_none());
	}
}
