//! The document: every lump of a map this crate was handed, parsed in the map's format, with edits tracked across all of them.

use std::collections::BTreeMap;

use crate::{
	lump::{AnyLump, LumpParseOptions},
	refs::{LumpEdit, ReferenceReport},
	*,
};

/// Settings for parsing lumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BspParseSettings {
	/// Whether to read pixels stored after mip texture headers when the texture source doesn't have them.
	///
	/// (Default: `true`)
	pub read_embedded_textures: bool,
}

impl Default for BspParseSettings {
	fn default() -> Self {
		Self { read_embedded_textures: true }
	}
}

/// One lump as read from the file by the container.
#[derive(Debug, Clone, Copy)]
pub struct LumpInput<'a> {
	pub kind: LumpKind,
	pub entry: LumpEntry,
	/// The bytes [`LumpEntry`] points to.
	pub data: &'a [u8],
	/// Record length of lumps without a record descriptor in this crate, which are kept as [`RawLump`]s.
	pub record_len: Option<usize>,
}

impl<'a> LumpInput<'a> {
	/// Slices the lump out of the whole file.
	pub fn from_file(kind: LumpKind, entry: LumpEntry, file: &'a [u8]) -> BspResult<Self> {
		Ok(Self {
			kind,
			entry,
			data: entry.get(file).job(format!("Slicing {kind} lump"))?,
			record_len: None,
		})
	}

	pub fn with_record_len(self, record_len: usize) -> Self {
		Self {
			record_len: Some(record_len),
			..self
		}
	}
}

/// Provides the required data to parse the lumps of a map.
#[derive(Clone, Default)]
pub struct BspParseInput<'a> {
	/// Decided by the container from the file header.
	pub format: Option<BspFormat>,
	pub lumps: Vec<LumpInput<'a>>,
	/// Where to find pixels of mip textures referenced by name.
	pub textures: Option<&'a dyn TextureSource>,
	pub settings: BspParseSettings,
}

/// A lump that failed to parse. The rest of the document is unaffected.
#[derive(Debug, Clone)]
pub struct LumpFailure {
	pub kind: LumpKind,
	pub error: BspParseError,
}

/// The lumps of a map.
#[derive(Debug, Clone)]
pub struct BspData {
	pub format: BspFormat,
	pub models: Option<Lump<Model>>,
	pub textures: Option<Lump<Texture>>,
	pub leaves: Option<Lump<Leaf>>,
	/// Lumps without a record descriptor in this format, kept so edits to them can be tracked.
	pub raw: BTreeMap<LumpKind, RawLump>,
	/// Lumps that were given but failed to parse.
	pub failures: Vec<LumpFailure>,
}

impl BspData {
	/// A document with no lumps.
	pub fn new(format: BspFormat) -> Self {
		Self {
			format,
			models: None,
			textures: None,
			leaves: None,
			raw: BTreeMap::new(),
			failures: Vec::new(),
		}
	}

	/// Parses every lump in `input`. Only fails if `input` has no format, a lump that fails to parse is instead recorded
	/// in [`BspData::failures`].
	pub fn parse(input: BspParseInput) -> BspResult<Self> {
		let format = input.format.ok_or(BspParseError::MissingInput("format"))?;
		let options = LumpParseOptions {
			textures: input.textures,
			settings: input.settings,
		};
		let mut data = Self::new(format);

		for lump in &input.lumps {
			if let Err(error) = data.parse_lump(lump, &options) {
				log::warn!("Failed to parse {} lump: {error}", lump.kind);
				data.failures.push(LumpFailure { kind: lump.kind, error });
			}
		}

		if let Some(textures) = &data.textures {
			let diagnostics = textures.diagnostics();
			if diagnostics.unresolved + diagnostics.failed > 0 {
				log::warn!(
					"{} textures without pixels, {} with malformed pixels",
					diagnostics.unresolved,
					diagnostics.failed
				);
			}
		}

		Ok(data)
	}

	fn parse_lump(&mut self, input: &LumpInput, options: &LumpParseOptions) -> BspResult<()> {
		let ctx = input.entry.context(self.format);

		// Lumps this crate has no layout for can still be kept opaque, if the container knows their record length.
		let opaque = |has_layout: bool| !has_layout && input.record_len.is_some();

		match input.kind {
			LumpKind::Models if !opaque(Model::layout(&ctx).is_some()) => {
				self.models = Some(Lump::parse_with(input.data, ctx, options)?)
			}
			LumpKind::Textures if !opaque(Texture::layout(&ctx).is_some()) => {
				self.textures = Some(Lump::parse_with(input.data, ctx, options)?)
			}
			LumpKind::Leaves if !opaque(Leaf::layout(&ctx).is_some()) => self.leaves = Some(Lump::parse_with(input.data, ctx, options)?),
			kind => {
				let record_len = input.record_len.ok_or(BspParseError::MissingInput("record length of raw lump"))?;
				self.raw.insert(kind, RawLump::parse(kind, input.data, record_len).job(format!("Parsing {kind} lump"))?);
			}
		}

		log::debug!("Parsed {} lump: {} records", input.kind, self.len_of(input.kind).unwrap_or(0));
		Ok(())
	}

	/// Record count of a loaded lump.
	pub fn len_of(&self, kind: LumpKind) -> Option<usize> {
		self.lump(kind).map(|lump| lump.len())
	}

	/// Serializes a loaded lump, for the container to write back.
	pub fn lump_bytes(&self, kind: LumpKind) -> Option<Vec<u8>> {
		self.lump(kind).map(|lump| lump.to_bytes())
	}

	/// Inserts `count` zeroed records into a lump, and shifts every reference to it across the document.
	pub fn insert_zeroed(&mut self, kind: LumpKind, at: usize, count: usize) -> BspResult<ReferenceReport> {
		let edit = self.lump_mut(kind).ok_or(BspParseError::MissingLump(kind))?.insert_zeroed_untracked(at, count)?;
		Ok(self.track(&edit))
	}

	/// Inserts records into their lump, and shifts every reference to it across the document. Records of other format
	/// contexts are converted by field.
	pub fn insert_records<R: DocumentRecord>(
		&mut self,
		at: usize,
		records: impl IntoIterator<Item = Record<R>>,
	) -> BspResult<ReferenceReport> {
		let edit = R::lump_mut(self)
			.ok_or(BspParseError::MissingLump(R::LUMP))?
			.insert_untracked(at, records.into_iter().collect())?;
		Ok(self.track(&edit))
	}

	/// Inserts whole records of bytes into a raw lump, and shifts every reference to it across the document.
	pub fn insert_raw(&mut self, kind: LumpKind, at: usize, records: &[u8]) -> BspResult<ReferenceReport> {
		let edit = self.raw.get_mut(&kind).ok_or(BspParseError::MissingLump(kind))?.insert(at, records)?;
		Ok(self.track(&edit))
	}

	/// Removes records from a lump. References into the removed range anywhere in the document are clamped and reported.
	pub fn remove(&mut self, kind: LumpKind, range: Range<usize>) -> BspResult<ReferenceReport> {
		let edit = self.lump_mut(kind).ok_or(BspParseError::MissingLump(kind))?.remove_untracked(range)?;
		Ok(self.track(&edit))
	}

	/// Every index field whose range doesn't fit inside its loaded target lump.
	pub fn validate_references(&self) -> ReferenceReport {
		let target_len = |kind: LumpKind| self.len_of(kind);
		let mut report = ReferenceReport::default();
		for lump in self.lumps() {
			report.extend(lump.check_references(&target_len));
		}
		report
	}

	fn track(&mut self, edit: &LumpEdit) -> ReferenceReport {
		let mut report = ReferenceReport::default();
		for lump in self.lumps_mut() {
			report.extend(lump.apply_edit(edit));
		}
		report
	}

	fn lump(&self, kind: LumpKind) -> Option<&dyn AnyLump> {
		match kind {
			LumpKind::Models if self.models.is_some() => self.models.as_ref().map(|lump| lump as &dyn AnyLump),
			LumpKind::Textures if self.textures.is_some() => self.textures.as_ref().map(|lump| lump as &dyn AnyLump),
			LumpKind::Leaves if self.leaves.is_some() => self.leaves.as_ref().map(|lump| lump as &dyn AnyLump),
			kind => self.raw.get(&kind).map(|lump| lump as &dyn AnyLump),
		}
	}

	fn lump_mut(&mut self, kind: LumpKind) -> Option<&mut dyn AnyLump> {
		match kind {
			LumpKind::Models if self.models.is_some() => self.models.as_mut().map(|lump| lump as &mut dyn AnyLump),
			LumpKind::Textures if self.textures.is_some() => self.textures.as_mut().map(|lump| lump as &mut dyn AnyLump),
			LumpKind::Leaves if self.leaves.is_some() => self.leaves.as_mut().map(|lump| lump as &mut dyn AnyLump),
			kind => self.raw.get_mut(&kind).map(|lump| lump as &mut dyn AnyLump),
		}
	}

	fn lumps(&self) -> Vec<&dyn AnyLump> {
		let mut lumps: Vec<&dyn AnyLump> = Vec::new();
		if let Some(lump) = &self.models {
			lumps.push(lump);
		}
		if let Some(lump) = &self.textures {
			lumps.push(lump);
		}
		if let Some(lump) = &self.leaves {
			lumps.push(lump);
		}
		lumps.extend(self.raw.values().map(|lump| lump as &dyn AnyLump));
		lumps
	}

	fn lumps_mut(&mut self) -> Vec<&mut dyn AnyLump> {
		let mut lumps: Vec<&mut dyn AnyLump> = Vec::new();
		if let Some(lump) = &mut self.models {
			lumps.push(lump);
		}
		if let Some(lump) = &mut self.textures {
			lumps.push(lump);
		}
		if let Some(lump) = &mut self.leaves {
			lumps.push(lump);
		}
		lumps.extend(self.raw.values_mut().map(|lump| lump as &mut dyn AnyLump));
		lumps
	}
}

/// Record kinds [`BspData`] has a typed lump for.
pub trait DocumentRecord: RecordKind {
	fn lump(data: &BspData) -> Option<&Lump<Self>>;
	fn lump_mut(data: &mut BspData) -> Option<&mut Lump<Self>>;
}

impl DocumentRecord for Model {
	fn lump(data: &BspData) -> Option<&Lump<Self>> {
		data.models.as_ref()
	}
	fn lump_mut(data: &mut BspData) -> Option<&mut Lump<Self>> {
		data.models.as_mut()
	}
}

impl DocumentRecord for Texture {
	fn lump(data: &BspData) -> Option<&Lump<Self>> {
		data.textures.as_ref()
	}
	fn lump_mut(data: &mut BspData) -> Option<&mut Lump<Self>> {
		data.textures.as_mut()
	}
}

impl DocumentRecord for Leaf {
	fn lump(data: &BspData) -> Option<&Lump<Self>> {
		data.leaves.as_ref()
	}
	fn lump_mut(data: &mut BspData) -> Option<&mut Lump<Self>> {
		data.leaves.as_mut()
	}
}

impl BspData {
	/// The typed lump of `R`, if loaded.
	pub fn records<R: DocumentRecord>(&self) -> Option<&Lump<R>> {
		R::lump(self)
	}

	pub fn records_mut<R: DocumentRecord>(&mut self) -> Option<&mut Lump<R>> {
		R::lump_mut(self)
	}
}
