//! Keeping index and count fields consistent while lumps grow and shrink.
//!
//! A field tagged [`FieldRole::Index`] holds the position of a record in its target lump, optionally paired with a field
//! tagged [`FieldRole::Count`] giving the length of the range it starts. Whenever records are inserted into or removed from
//! a lump, every index into it is shifted so it keeps pointing at the same record.
//!
//! Ranges grow when records are inserted strictly inside them, and shrink by how much of them is removed. Inserting
//! right at a range's start or end leaves its count alone. Negative indices are markers (no face, leaf instead of node, ...)
//! and are never touched.

use crate::{data::field::FieldRole, *};

/// A structural change to one lump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LumpEdit {
	/// `count` records inserted before position `at`.
	Insert { lump: LumpKind, at: usize, count: usize },
	Remove { lump: LumpKind, range: Range<usize> },
}

/// Where an index and its count end up after a [`LumpEdit`]. Wider than any field, so a result that no longer fits the
/// field it came from can be told apart (see [`FieldKind::holds`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftedReference {
	pub index: i64,
	pub count: Option<i64>,
	/// The index pointed into a removed range, and was clamped to its start.
	pub dangling: bool,
}

impl LumpEdit {
	/// The lump whose length this edit changes.
	pub fn lump(&self) -> LumpKind {
		match self {
			Self::Insert { lump, .. } | Self::Remove { lump, .. } => *lump,
		}
	}

	/// Shifts a non-negative index into the edited lump, and the count of the range it starts if it has one.
	pub fn shift(&self, index: i32, count: Option<i32>) -> ShiftedReference {
		let v = index as i64;
		let count = count.map(i64::from);

		match self {
			Self::Insert { at, count: inserted, .. } => {
				let (at, inserted) = (*at as i64, *inserted as i64);

				if v >= at {
					ShiftedReference {
						index: v + inserted,
						count,
						dangling: false,
					}
				} else {
					ShiftedReference {
						index: v,
						count: count.map(|c| if at < v + c { c + inserted } else { c }),
						dangling: false,
					}
				}
			}
			Self::Remove { range, .. } => {
				let (lo, hi) = (range.start as i64, range.end as i64);

				let count = count.map(|c| c - ((v + c).min(hi) - v.max(lo)).max(0));

				if v >= hi {
					ShiftedReference {
						index: v - (hi - lo),
						count,
						dangling: false,
					}
				} else if v >= lo {
					ShiftedReference {
						index: lo,
						count,
						dangling: true,
					}
				} else {
					ShiftedReference {
						index: v,
						count,
						dangling: false,
					}
				}
			}
		}
	}
}

/// Why a [`DanglingReference`] was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum DanglingCause {
	/// The record it pointed at was removed. The index was clamped to the start of the removed range.
	#[strum(to_string = "was removed")]
	Removed,
	/// The shifted index or count doesn't fit the field's width. The field was left as it was.
	#[strum(to_string = "can't be stored in the field after shifting")]
	Overflow,
	/// The range reaches past the end of the target lump.
	#[strum(to_string = "is out of range")]
	OutOfRange,
}

/// An index field pointing at a record that was removed, that doesn't exist, or that it can no longer store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} of {lump} record {record} points at {target} record {index}, which {cause}")]
pub struct DanglingReference {
	pub lump: LumpKind,
	pub record: usize,
	pub field: &'static str,
	pub target: LumpKind,
	/// The value the field held before the edit.
	pub index: i32,
	pub count: Option<i32>,
	pub cause: DanglingCause,
}

/// The dangling references found while tracking an edit or validating a document. Empty means all good.
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_more::Deref, derive_more::IntoIterator)]
pub struct ReferenceReport {
	#[deref]
	#[into_iterator(owned, ref)]
	pub dangling: Vec<DanglingReference>,
}

impl ReferenceReport {
	#[inline]
	pub fn is_clean(&self) -> bool {
		self.dangling.is_empty()
	}

	pub fn extend(&mut self, other: ReferenceReport) {
		self.dangling.extend(other.dangling);
	}
}

impl<R: RecordKind> Lump<R> {
	/// Shifts every index field in this lump that points into the lump `edit` changed.
	///
	/// If `edit` inserted into this very lump, the inserted records are left alone.
	pub fn apply_edit(&mut self, edit: &LumpEdit) -> ReferenceReport {
		let target = edit.lump();
		let index_fields: SmallVec<[R::Field; 4]> =
			R::Field::iter().filter(|field| matches!(field.role(), FieldRole::Index(lump) if lump == target)).collect();
		let mut report = ReferenceReport::default();
		if index_fields.is_empty() {
			return report;
		}

		let inserted = match edit {
			LumpEdit::Insert { lump, at, count } if *lump == R::LUMP => *at..*at + *count,
			_ => 0..0,
		};

		let ctx = *self.ctx();
		let fits = |field: R::Field, value: i64| R::field_layout(field, &ctx).is_some_and(|layout| layout.kind.holds(value));

		for i in (0..self.len()).filter(|i| !inserted.contains(i)) {
			let Some(mut record) = self.get_mut(i) else { continue };

			for field in index_fields.iter().copied() {
				if !record.has(field) {
					continue;
				}
				let index = record.get_int(field);
				if index < 0 {
					continue;
				}
				let count_field = field.paired_count().filter(|count_field| record.has(*count_field));
				let count = count_field.map(|count_field| record.get_int(count_field)).filter(|count| *count >= 0);

				let shifted = edit.shift(index, count);
				let overflows = !fits(field, shifted.index)
					|| count_field.zip(shifted.count).is_some_and(|(count_field, new_count)| !fits(count_field, new_count));

				let cause = if overflows {
					Some(DanglingCause::Overflow)
				} else {
					if shifted.index != index as i64 {
						if let Err(err) = record.set(field, shifted.index as i32) {
							log::warn!("Failed to shift {} of {} {i}: {err}", field.name(), R::NAME);
						}
					}
					if let (Some(count_field), Some(new_count)) = (count_field, shifted.count) {
						if Some(new_count) != count.map(i64::from) {
							if let Err(err) = record.set(count_field, new_count as i32) {
								log::warn!("Failed to resize {} of {} {i}: {err}", count_field.name(), R::NAME);
							}
						}
					}
					shifted.dangling.then_some(DanglingCause::Removed)
				};

				if let Some(cause) = cause {
					let dangling = DanglingReference {
						lump: R::LUMP,
						record: i,
						field: field.name(),
						target,
						index,
						count,
						cause,
					};
					log::warn!("{dangling}");
					report.dangling.push(dangling);
				}
			}
		}

		report
	}

	/// Finds index fields whose range doesn't fit inside their target lump. Targets `target_len` returns `None` or zero for
	/// aren't checked.
	pub fn check_references(&self, target_len: &dyn Fn(LumpKind) -> Option<usize>) -> ReferenceReport {
		let mut report = ReferenceReport::default();

		for field in R::Field::iter() {
			let FieldRole::Index(target) = field.role() else { continue };
			let Some(len) = target_len(target).filter(|len| *len > 0) else { continue };
			let count_field = field.paired_count();

			for (i, record) in self.iter().enumerate() {
				let Some(index) = record.index(field) else { continue };
				let count = count_field.and_then(|count_field| record.index(count_field));

				let out_of_range = match count {
					Some(count) => index + count > len,
					None => index >= len,
				};
				if out_of_range {
					report.dangling.push(DanglingReference {
						lump: R::LUMP,
						record: i,
						field: field.name(),
						target,
						index: index as i32,
						count: count.map(|count| count as i32),
						cause: DanglingCause::OutOfRange,
					});
				}
			}
		}

		report
	}
}

#[cfg(test)]
mod refs_tests {
	use super::*;

	fn insert(at: usize, count: usize) -> LumpEdit {
		LumpEdit::Insert { lump: LumpKind::Faces, at, count }
	}
	fn remove(range: Range<usize>) -> LumpEdit {
		LumpEdit::Remove { lump: LumpKind::Faces, range }
	}

	#[test]
	fn insert_shifts() {
		// Before the range.
		assert_eq!(insert(2, 3).shift(5, Some(4)).index, 8);
		// At the start of the range, which moves as a whole.
		assert_eq!(insert(5, 3).shift(5, Some(4)), ShiftedReference { index: 8, count: Some(4), dangling: false });
		// Strictly inside grows it.
		assert_eq!(insert(7, 3).shift(5, Some(4)), ShiftedReference { index: 5, count: Some(7), dangling: false });
		// At the end leaves it alone.
		assert_eq!(insert(9, 3).shift(5, Some(4)), ShiftedReference { index: 5, count: Some(4), dangling: false });
		assert_eq!(insert(9, 3).shift(5, None).index, 5);
	}

	#[test]
	fn remove_shifts() {
		// After the range.
		assert_eq!(remove(0..2).shift(5, Some(4)), ShiftedReference { index: 3, count: Some(4), dangling: false });
		// Overlapping the end.
		assert_eq!(remove(7..12).shift(5, Some(4)), ShiftedReference { index: 5, count: Some(2), dangling: false });
		// Overlapping the start, clamped.
		assert_eq!(remove(4..7).shift(5, Some(4)), ShiftedReference { index: 4, count: Some(2), dangling: true });
		// Removing the whole range.
		assert_eq!(remove(5..9).shift(5, Some(4)), ShiftedReference { index: 5, count: Some(0), dangling: true });
		// Entirely after.
		assert_eq!(remove(9..10).shift(5, Some(4)).count, Some(4));
		assert!(!remove(3..3).shift(3, None).dangling);
	}

	#[test]
	fn self_references() {
		let ctx = BspParseContext::from(BspFormat::Quake2);
		let texinfos = [1, 2, 0, -1].map(|next| {
			let mut texinfo = Record::<Texture>::zeroed(ctx).unwrap();
			texinfo.set(TextureField::NextTexInfo, next).unwrap();
			texinfo
		});
		// Built untracked, pushing one by one would shift the links to records not pushed yet.
		let mut lump = Lump::from_records(ctx, texinfos).unwrap();
		assert_eq!(lump.iter().map(|texinfo| texinfo.get_int(TextureField::NextTexInfo)).collect::<Vec<_>>(), vec![1, 2, 0, -1]);

		let report = lump.insert_zeroed(1, 2).unwrap();
		assert!(report.is_clean());
		let nexts: Vec<i32> = lump.iter().map(|texinfo| texinfo.get_int(TextureField::NextTexInfo)).collect();
		// The zeroed records point at 0, which is before the insertion.
		assert_eq!(nexts, vec![3, 0, 0, 4, 0, -1]);

		let report = lump.remove(3..4).unwrap();
		assert_eq!(report.len(), 1);
		assert_eq!(report[0].record, 0);
		assert_eq!(report[0].index, 3);
		assert_eq!(report[0].cause, DanglingCause::Removed);
		assert_eq!(lump.get(0).unwrap().get_int(TextureField::NextTexInfo), 3);
	}

	fn quake_leaf(first: i32, count: i32) -> Lump<Leaf> {
		let ctx = BspParseContext::from(BspFormat::Quake);
		let mut leaf = Record::<Leaf>::zeroed(ctx).unwrap();
		leaf.set(LeafField::FirstLeafFace, first).unwrap();
		leaf.set(LeafField::NumLeafFaces, count).unwrap();
		Lump::from_records(ctx, [leaf]).unwrap()
	}

	#[test]
	fn shifts_past_the_field_width() {
		let leaf_faces = |at, count| LumpEdit::Insert { lump: LumpKind::LeafFaces, at, count };
		let range = |lump: &Lump<Leaf>| {
			let leaf = lump.get(0).unwrap();
			(leaf.get_int(LeafField::FirstLeafFace), leaf.get_int(LeafField::NumLeafFaces))
		};

		// The last index a u16 holds can't move up.
		let mut leaves = quake_leaf(65535, 1);
		let report = leaves.apply_edit(&leaf_faces(0, 1));
		assert_eq!(range(&leaves), (65535, 1));
		assert_eq!(report.len(), 1);
		assert_eq!(report[0].cause, DanglingCause::Overflow);
		assert_eq!(report[0].index, 65535);
		assert_eq!(report[0].field, "FirstLeafFace");

		// Neither can a count growing past it, and the index stays with it.
		let mut leaves = quake_leaf(10, 65535);
		let report = leaves.apply_edit(&leaf_faces(11, 1));
		assert_eq!(range(&leaves), (10, 65535));
		assert_eq!(report[0].cause, DanglingCause::Overflow);
		assert_eq!(report[0].count, Some(65535));

		// One below the limit still fits.
		let mut leaves = quake_leaf(65534, 1);
		assert!(leaves.apply_edit(&leaf_faces(0, 1)).is_clean());
		assert_eq!(range(&leaves), (65535, 1));
	}

	#[test]
	fn shifts_past_signed_widths() {
		let faces = |count| LumpEdit::Insert { lump: LumpKind::Faces, at: 0, count };

		// Call of Duty 4 stores the face range in 16 signed bits, wrapping would turn it into a marker.
		let ctx = BspParseContext::from(BspFormat::CoD4);
		let mut model = Record::<Model>::zeroed(ctx).unwrap();
		model.set(ModelField::FirstFace, i16::MAX as i32).unwrap();
		let mut models = Lump::from_records(ctx, [model]).unwrap();
		let report = models.apply_edit(&faces(1));
		assert_eq!(report[0].cause, DanglingCause::Overflow);
		assert_eq!(models.get(0).unwrap().get_int(ModelField::FirstFace), i16::MAX as i32);

		let ctx = BspParseContext::from(BspFormat::Quake3);
		let mut model = Record::<Model>::zeroed(ctx).unwrap();
		model.set(ModelField::FirstFace, i32::MAX).unwrap();
		let mut models = Lump::from_records(ctx, [model]).unwrap();
		assert_eq!(faces(1).shift(i32::MAX, None).index, i32::MAX as i64 + 1);
		let report = models.apply_edit(&faces(1));
		assert_eq!(report[0].cause, DanglingCause::Overflow);
		assert_eq!(models.get(0).unwrap().get_int(ModelField::FirstFace), i32::MAX);
	}

	#[test]
	fn validation() {
		let ctx = BspParseContext::from(BspFormat::Quake3);
		let mut model = Record::<Model>::zeroed(ctx).unwrap();
		model.set(ModelField::FirstFace, 2).unwrap();
		model.set(ModelField::NumFaces, 3).unwrap();
		let lump = Lump::from_records(ctx, [model]).unwrap();

		let faces = |len: usize| move |lump: LumpKind| (lump == LumpKind::Faces).then_some(len);
		assert!(lump.check_references(&faces(5)).is_clean());

		let report = lump.check_references(&faces(4));
		assert_eq!(report.len(), 1);
		assert_eq!(report[0].field, "FirstFace");
		assert_eq!(report[0].count, Some(3));
		assert_eq!(report[0].cause, DanglingCause::OutOfRange);

		// Empty targets aren't checked.
		assert!(lump.check_references(&faces(0)).is_clean());
	}
}
