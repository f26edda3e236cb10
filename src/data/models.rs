//! Models: the world itself and every brush entity, as bounds plus ranges into the face, leaf, brush and patch lumps.

use crate::data::field::*;
use crate::*;

record_fields! {
	/// Fields of a model record.
	pub enum ModelField in ModelLayout {
		Minimums: Vector => minimums,
		Maximums: Vector => maximums,
		Origin: Vector => origin,
		/// Root of the model's BSP tree.
		HeadNode: Int as FieldRole::Index(LumpKind::Nodes) => head_node,
		/// Collision hull roots of id Tech 2 formats. These point into the clip node lump, whose
		/// indices are shifted by the hull they belong to, so they aren't tracked.
		HeadClipNode1: Int => head_clip_node_1,
		HeadClipNode2: Int => head_clip_node_2,
		HeadClipNode3: Int => head_clip_node_3,
		FirstLeaf: Int as FieldRole::Index(LumpKind::Leaves) => first_leaf,
		NumLeaves: Int as FieldRole::Count { first: ModelField::FirstLeaf } => num_leaves,
		FirstBrush: Int as FieldRole::Index(LumpKind::Brushes) => first_brush,
		NumBrushes: Int as FieldRole::Count { first: ModelField::FirstBrush } => num_brushes,
		FirstFace: Int as FieldRole::Index(LumpKind::Faces) => first_face,
		NumFaces: Int as FieldRole::Count { first: ModelField::FirstFace } => num_faces,
		FirstPatchIndex: Int as FieldRole::Index(LumpKind::PatchIndices) => first_patch_index,
		NumPatchIndices: Int as FieldRole::Count { first: ModelField::FirstPatchIndex } => num_patch_indices,
	}
}

/// Quake and GoldSrc. The leaf count is the number of visleafs, which start at leaf 1, so there is no first leaf field.
const QUAKE: ModelLayout = ModelLayout {
	len: Some(64),
	minimums: vec3_at(0),
	maximums: vec3_at(12),
	origin: ABSENT,
	head_node: i32_at(36),
	head_clip_node_1: i32_at(40),
	head_clip_node_2: i32_at(44),
	head_clip_node_3: i32_at(48),
	first_leaf: ABSENT,
	num_leaves: i32_at(52),
	first_brush: ABSENT,
	num_brushes: ABSENT,
	first_face: i32_at(56),
	num_faces: i32_at(60),
	first_patch_index: ABSENT,
	num_patch_indices: ABSENT,
};

const NIGHTFIRE: ModelLayout = ModelLayout {
	len: Some(56),
	minimums: vec3_at(0),
	maximums: vec3_at(12),
	origin: ABSENT,
	head_node: i32_at(24),
	head_clip_node_1: i32_at(28),
	head_clip_node_2: i32_at(32),
	head_clip_node_3: i32_at(36),
	first_leaf: i32_at(40),
	num_leaves: i32_at(44),
	first_brush: ABSENT,
	num_brushes: ABSENT,
	first_face: i32_at(48),
	num_faces: i32_at(52),
	first_patch_index: ABSENT,
	num_patch_indices: ABSENT,
};

/// Quake 2, Daikatana and every Source generation.
const QUAKE2: ModelLayout = ModelLayout {
	len: Some(48),
	minimums: vec3_at(0),
	maximums: vec3_at(12),
	origin: vec3_at(24),
	head_node: i32_at(36),
	head_clip_node_1: ABSENT,
	head_clip_node_2: ABSENT,
	head_clip_node_3: ABSENT,
	first_leaf: ABSENT,
	num_leaves: ABSENT,
	first_brush: ABSENT,
	num_brushes: ABSENT,
	first_face: i32_at(40),
	num_faces: i32_at(44),
	first_patch_index: ABSENT,
	num_patch_indices: ABSENT,
};

/// SiN and Soldier of Fortune share the Quake 2 record, but nothing reads their maximums.
const SIN: ModelLayout = ModelLayout { maximums: ABSENT, ..QUAKE2 };

/// Dark Messiah pads the origin out to 16 bytes.
const DMOMAM: ModelLayout = ModelLayout {
	len: Some(52),
	head_node: i32_at(40),
	first_face: i32_at(44),
	num_faces: i32_at(48),
	..QUAKE2
};

/// Quake 3 and the Ritual/EF2 derivatives.
const QUAKE3: ModelLayout = ModelLayout {
	len: Some(40),
	minimums: vec3_at(0),
	maximums: vec3_at(12),
	origin: ABSENT,
	head_node: ABSENT,
	head_clip_node_1: ABSENT,
	head_clip_node_2: ABSENT,
	head_clip_node_3: ABSENT,
	first_leaf: ABSENT,
	num_leaves: ABSENT,
	first_brush: i32_at(32),
	num_brushes: i32_at(36),
	first_face: i32_at(24),
	num_faces: i32_at(28),
	first_patch_index: ABSENT,
	num_patch_indices: ABSENT,
};

const RAVEN: ModelLayout = ModelLayout { maximums: ABSENT, ..QUAKE3 };

const COD: ModelLayout = ModelLayout {
	len: Some(48),
	first_patch_index: i32_at(32),
	num_patch_indices: i32_at(36),
	first_brush: i32_at(40),
	num_brushes: i32_at(44),
	..QUAKE3
};

const COD2: ModelLayout = ModelLayout {
	first_patch_index: ABSENT,
	num_patch_indices: ABSENT,
	..COD
};

/// Call of Duty 4 narrows the face range to 16-bit values.
const COD4: ModelLayout = ModelLayout {
	first_face: i16_at(24),
	num_faces: i16_at(28),
	..COD2
};

/// Titanfall models carry only their bounds, the rest of the record points into mesh lumps this crate doesn't describe.
const TITANFALL: ModelLayout = ModelLayout {
	len: Some(32),
	minimums: vec3_at(0),
	maximums: vec3_at(12),
	origin: ABSENT,
	head_node: ABSENT,
	head_clip_node_1: ABSENT,
	head_clip_node_2: ABSENT,
	head_clip_node_3: ABSENT,
	first_leaf: ABSENT,
	num_leaves: ABSENT,
	first_brush: ABSENT,
	num_brushes: ABSENT,
	first_face: ABSENT,
	num_faces: ABSENT,
	first_patch_index: ABSENT,
	num_patch_indices: ABSENT,
};

/// Record kind of the model lump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model;

impl RecordKind for Model {
	type Field = ModelField;
	type Payload = ();

	const NAME: &'static str = "Model";
	const LUMP: LumpKind = LumpKind::Models;

	fn layout(ctx: &BspParseContext) -> Option<&'static ModelLayout> {
		use BspFormat::*;

		Some(match ctx.format {
			Quake | GoldSrc => &QUAKE,
			Nightfire => &NIGHTFIRE,
			Quake2 | Daikatana | Source17 | Source18 | Source19 | Source20 | Source21 | Source22 | Source23 | Source27 | L4D2
			| TacticalInterventionEncrypted | Vindictus => &QUAKE2,
			SiN | SoF => &SIN,
			DMoMaM => &DMOMAM,
			Quake3 | STEF2 | STEF2Demo | MOHAA | FAKK => &QUAKE3,
			Raven => &RAVEN,
			CoD => &COD,
			CoD2 => &COD2,
			CoD4 => &COD4,
			Titanfall => &TITANFALL,
		})
	}
}

#[cfg(test)]
mod model_tests {
	use super::*;

	#[test]
	fn record_lengths() {
		let len = |format: BspFormat| Model::record_len(&BspParseContext::from(format)).unwrap();

		assert_eq!(len(BspFormat::Quake), 64);
		assert_eq!(len(BspFormat::GoldSrc), 64);
		assert_eq!(len(BspFormat::Nightfire), 56);
		assert_eq!(len(BspFormat::Quake2), 48);
		assert_eq!(len(BspFormat::Source20), 48);
		assert_eq!(len(BspFormat::DMoMaM), 52);
		assert_eq!(len(BspFormat::Quake3), 40);
		assert_eq!(len(BspFormat::CoD), 48);
		assert_eq!(len(BspFormat::CoD4), 48);
		assert_eq!(len(BspFormat::Titanfall), 32);
	}

	#[test]
	fn head_node_round_trip() {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let mut model = Record::<Model>::zeroed(ctx).unwrap();

		assert_eq!(Model::field_layout(ModelField::HeadNode, &ctx), i32_at(36));
		model.set(ModelField::HeadNode, 1000).unwrap();
		assert_eq!(model.get(ModelField::HeadNode), FieldValue::Int(1000));
		assert_eq!(&model.bytes()[36..40], &1000i32.to_le_bytes());

		// Same bytes, read as a format whose models have no head node.
		let reinterpreted = Record::<Model>::from_bytes(model.bytes()[..40].to_vec(), BspParseContext::from(BspFormat::Quake3)).unwrap();
		assert_eq!(reinterpreted.get(ModelField::HeadNode), FieldValue::Int(-1));
	}

	#[test]
	fn absent_fields() {
		let ctx = BspParseContext::from(BspFormat::Titanfall);
		let mut model = Record::<Model>::zeroed(ctx).unwrap();

		assert_eq!(model.get(ModelField::Origin), FieldValue::Vector(Vector3::ZERO));
		assert_eq!(model.get(ModelField::NumFaces), FieldValue::Int(-1));
		model.set(ModelField::NumFaces, 7).unwrap();
		assert!(model.bytes().iter().all(|b| *b == 0));
	}

	#[test]
	fn narrow_face_range() {
		let ctx = BspParseContext::from(BspFormat::CoD4);
		let mut model = Record::<Model>::zeroed(ctx).unwrap();

		model.set(ModelField::FirstFace, 0x1_0005).unwrap();
		assert_eq!(model.get_int(ModelField::FirstFace), 5);
		assert_eq!(&model.bytes()[26..28], &[0, 0]);
	}

	#[test]
	fn ranges() {
		let ctx = BspParseContext::from(BspFormat::Quake2);
		let mut model = Record::<Model>::zeroed(ctx).unwrap();
		model.set(ModelField::FirstFace, 4).unwrap();
		model.set(ModelField::NumFaces, 3).unwrap();

		assert_eq!(model.range(ModelField::NumFaces), Some(4..7));
		assert_eq!(model.range(ModelField::NumBrushes), None);
		assert_eq!(ModelField::FirstFace.paired_count(), Some(ModelField::NumFaces));
		assert_eq!(ModelField::HeadNode.paired_count(), None);
	}
}
