//! The texture lump: embedded mip textures, texture infos, shaders or texture name strings, depending on the format.
//!
//! Quake and GoldSrc store mip textures behind an offset table, and Source packs texture names as NUL-terminated strings.
//! Everything else is a plain array of fixed-size records.

use std::{borrow::Cow, fmt};

use crate::{
	codec::{self, LumpEncoding},
	data::field::*,
	lump::LumpParseOptions,
	reader::{BspByteReader, BspValue},
	*,
};

record_fields! {
	/// Fields of a texture record.
	pub enum TextureField in TextureLayout {
		Name: Name => name,
		/// Surface flags. Engine specific.
		Flags: Int => flags,
		Contents: Int => contents,
		/// Light value of Quake 2 style texture infos.
		Value: Int => value,
		Subdivisions: Int => subdivisions,
		/// MoHAA's secondary texture name.
		MaskName: Name => mask_name,
		/// Next frame of an animated texture.
		NextTexInfo: Int as FieldRole::Index(LumpKind::Textures) => next_tex_info,
		UAxis: Vector => u_axis,
		UOffset: Float => u_offset,
		VAxis: Vector => v_axis,
		VOffset: Float => v_offset,
		Width: Int => width,
		Height: Int => height,
		/// Offsets of the four mip levels, relative to the start of the record. Zero means not stored in the lump.
		MipOffset0: Int => mip_offset_0,
		MipOffset1: Int => mip_offset_1,
		MipOffset2: Int => mip_offset_2,
		MipOffset3: Int => mip_offset_3,
	}
}

const NONE: TextureLayout = TextureLayout {
	len: None,
	name: ABSENT,
	flags: ABSENT,
	contents: ABSENT,
	value: ABSENT,
	subdivisions: ABSENT,
	mask_name: ABSENT,
	next_tex_info: ABSENT,
	u_axis: ABSENT,
	u_offset: ABSENT,
	v_axis: ABSENT,
	v_offset: ABSENT,
	width: ABSENT,
	height: ABSENT,
	mip_offset_0: ABSENT,
	mip_offset_1: ABSENT,
	mip_offset_2: ABSENT,
	mip_offset_3: ABSENT,
};

/// Mip texture header. Pixel data may follow inside the record's segment.
const QUAKE: TextureLayout = TextureLayout {
	len: Some(codec::MIP_TEXTURE_HEADER_LEN),
	name: name_at(0, 16),
	width: i32_at(16),
	height: i32_at(20),
	mip_offset_0: i32_at(24),
	mip_offset_1: i32_at(28),
	mip_offset_2: i32_at(32),
	mip_offset_3: i32_at(36),
	..NONE
};

/// Quake 2 texture info.
const QUAKE2: TextureLayout = TextureLayout {
	len: Some(76),
	u_axis: vec3_at(0),
	u_offset: f32_at(12),
	v_axis: vec3_at(16),
	v_offset: f32_at(28),
	flags: i32_at(32),
	value: i32_at(36),
	name: name_at(40, 32),
	next_tex_info: i32_at(72),
	..NONE
};

const SIN: TextureLayout = TextureLayout {
	len: Some(180),
	value: ABSENT,
	name: name_at(36, 64),
	next_tex_info: i32_at(100),
	..QUAKE2
};

/// Quake 3 shader reference.
const QUAKE3: TextureLayout = TextureLayout {
	len: Some(72),
	name: name_at(0, 64),
	flags: i32_at(64),
	contents: i32_at(68),
	..NONE
};

const FAKK_SHADER: TextureLayout = TextureLayout {
	len: Some(76),
	subdivisions: i32_at(72),
	..QUAKE3
};

const MOHAA_SHADER: TextureLayout = TextureLayout {
	len: Some(140),
	mask_name: name_at(76, 64),
	..FAKK_SHADER
};

const NIGHTFIRE: TextureLayout = TextureLayout {
	len: Some(64),
	name: name_at(0, 64),
	..NONE
};

/// Source texture data string data.
const SOURCE: TextureLayout = TextureLayout {
	len: None,
	name: delimited_name(),
	..NONE
};

/// Record kind of the texture lump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture;

impl RecordKind for Texture {
	type Field = TextureField;
	type Payload = TexturePixels;

	const NAME: &'static str = "Texture";
	const LUMP: LumpKind = LumpKind::Textures;

	fn layout(ctx: &BspParseContext) -> Option<&'static TextureLayout> {
		use BspFormat::*;

		match ctx.format {
			Quake | GoldSrc => Some(&QUAKE),
			Quake2 | Daikatana | SoF => Some(&QUAKE2),
			SiN => Some(&SIN),
			Quake3 | Raven | CoD | CoD2 | CoD4 => Some(&QUAKE3),
			FAKK | STEF2 | STEF2Demo => Some(&FAKK_SHADER),
			MOHAA => Some(&MOHAA_SHADER),
			Nightfire => Some(&NIGHTFIRE),
			Source17 | Source18 | Source19 | Source20 | Source21 | Source22 | Source23 | Source27 | L4D2
			| TacticalInterventionEncrypted | Vindictus | DMoMaM => Some(&SOURCE),
			Titanfall => None,
		}
	}

	fn encoding(ctx: &BspParseContext) -> LumpEncoding {
		match ctx.format {
			BspFormat::Quake | BspFormat::GoldSrc => LumpEncoding::OffsetTable,
			format if format.is_source() => LumpEncoding::DelimitedNames,
			_ => LumpEncoding::FixedStride,
		}
	}

	fn decode_lump(data: &[u8], ctx: BspParseContext, options: &LumpParseOptions) -> BspResult<Lump<Self>> {
		match Self::encoding(&ctx) {
			LumpEncoding::FixedStride => Lump::parse_fixed(data, ctx),
			LumpEncoding::DelimitedNames => {
				Self::descriptor(&ctx)?;
				let segments = codec::split_delimited(data)?;
				let payloads = vec![TexturePixels::default(); segments.len()];
				Ok(Lump::from_segments(ctx, segments, payloads, None))
			}
			LumpEncoding::OffsetTable => {
				Self::descriptor(&ctx)?;
				let codec::OffsetTable { records: segments, preamble } = codec::split_offset_table(data, &ctx)?;
				let payloads = segments
					.iter()
					.enumerate()
					.map(|(index, segment)| resolve_pixels(index, segment, &ctx, options))
					.collect();
				Ok(Lump::from_segments(ctx, segments, payloads, preamble))
			}
		}
	}

	fn encode_lump(lump: &Lump<Self>) -> Vec<u8> {
		match Self::encoding(lump.ctx()) {
			LumpEncoding::FixedStride => lump.concat_records(),
			LumpEncoding::DelimitedNames => codec::join_delimited(lump.record_slices()),
			LumpEncoding::OffsetTable => codec::join_offset_table(lump.record_slices().iter().copied(), lump.preamble()),
		}
	}
}

/// An id Tech 2 palette to use for embedded images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
	pub colors: [[u8; 3]; 256],
}

impl BspValue for Palette {
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
		let num_colors = reader.read::<i16>()?;

		if num_colors != 256 {
			return Err(BspParseError::InvalidPaletteLength(num_colors.max(0) as usize * 3));
		}

		let colors = reader.read_bytes(num_colors as usize * 3)?;

		Palette::parse(colors)
	}

	fn bsp_struct_size(ctx: &BspParseContext) -> usize {
		i16::bsp_struct_size(ctx) + 3 * 256
	}
}

impl Palette {
	/// Parses a palette from data. Palettes must be 768 bytes in length exactly.
	pub fn parse(data: &[u8]) -> BspResult<Self> {
		if data.len() != 768 {
			return Err(BspParseError::InvalidPaletteLength(data.len()));
		}
		let mut colors = [[0; 3]; 256];
		for (color, rgb) in colors.iter_mut().zip(data.chunks_exact(3)) {
			color.copy_from_slice(rgb);
		}
		Ok(Self { colors })
	}

	/// Maps every index to the gray of the same brightness. Useful as a fallback when the game's palette isn't at hand.
	pub fn grayscale() -> Self {
		let mut colors = [[0; 3]; 256];
		for (i, color) in colors.iter_mut().enumerate() {
			*color = [i as u8; 3];
		}
		Self { colors }
	}
}

/// Indexed pixels of a mip texture, as found in a [`TextureSource`].
#[derive(Debug, Clone)]
pub struct MipPixels {
	/// Full resolution first, each following level half the size of the previous.
	pub mips: SmallVec<[Vec<u8>; 4]>,
	pub palette: Palette,
}

/// External texture store, looked up by name for mip textures the map doesn't carry pixels for. Usually WAD files.
pub trait TextureSource {
	fn lookup_texture(&self, name: &str) -> Option<MipPixels>;
}

/// In-memory [`TextureSource`]. Looks names up exactly, then ignoring ASCII case.
#[derive(Debug, Clone, Default)]
pub struct TextureArchive {
	pub textures: HashMap<String, MipPixels>,
}

impl TextureArchive {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, pixels: MipPixels) -> Option<MipPixels> {
		self.textures.insert(name.into(), pixels)
	}
}

impl TextureSource for TextureArchive {
	fn lookup_texture(&self, name: &str) -> Option<MipPixels> {
		self.textures
			.get(name)
			.or_else(|| self.textures.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, pixels)| pixels))
			.cloned()
	}
}

/// Where a mip texture's pixels came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PixelSource {
	/// The record doesn't store a mip texture, or is empty.
	#[default]
	None,
	/// Found in the [`TextureSource`].
	External,
	/// Stored after the record's header in the lump.
	Embedded,
	/// Neither found in the texture source nor embedded.
	Unresolved,
	/// Pixels were found, but are malformed.
	Failed,
}

/// Pixels resolved for a texture record. Empty unless the record is a mip texture with pixels found somewhere.
#[derive(Clone, Default)]
pub struct TexturePixels {
	pub mips: SmallVec<[Vec<u8>; 4]>,
	/// GoldSrc embeds a palette with every texture, and texture sources may carry their own.
	pub palette: Option<Palette>,
	pub source: PixelSource,
}

impl fmt::Debug for TexturePixels {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TexturePixels")
			.field("mips", &self.mips.iter().map(Vec::len).collect::<SmallVec<[usize; 4]>>())
			.field("palette", &self.palette.as_ref().map(|_| ..))
			.field("source", &self.source)
			.finish()
	}
}

impl TexturePixels {
	/// Colors the full resolution mip level, `None` if there are no pixels or they don't fill `width * height`.
	pub fn to_rgb_image(&self, width: u32, height: u32, fallback_palette: &Palette) -> Option<image::RgbImage> {
		let pixels = self.mips.first()?;
		if pixels.len() != width as usize * height as usize || pixels.is_empty() {
			return None;
		}
		let palette = self.palette.as_ref().unwrap_or(fallback_palette);

		Some(image::RgbImage::from_fn(width, height, |x, y| {
			image::Rgb(palette.colors[pixels[(y * width + x) as usize] as usize])
		}))
	}
}

/// Counts of how pixel resolution went for a mip texture lump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureDiagnostics {
	pub external: usize,
	pub embedded: usize,
	pub unresolved: usize,
	pub failed: usize,
}

impl Lump<Texture> {
	pub fn diagnostics(&self) -> TextureDiagnostics {
		let mut diagnostics = TextureDiagnostics::default();
		for record in self.iter() {
			match record.payload().source {
				PixelSource::None => {}
				PixelSource::External => diagnostics.external += 1,
				PixelSource::Embedded => diagnostics.embedded += 1,
				PixelSource::Unresolved => diagnostics.unresolved += 1,
				PixelSource::Failed => diagnostics.failed += 1,
			}
		}
		diagnostics
	}

	/// Byte offset of the first name equal to `name` ignoring ASCII case, for lumps of delimited names.
	pub fn offset_of(&self, name: &str) -> Option<usize> {
		if Texture::encoding(self.ctx()) != LumpEncoding::DelimitedNames {
			return None;
		}
		codec::offset_of(self.record_slices(), name)
	}

	/// The name whose packed bytes contain `offset`, for lumps of delimited names. Bytes that aren't UTF-8 come out as
	/// replacement characters.
	pub fn name_at_offset(&self, offset: usize) -> Option<Cow<'_, str>> {
		if Texture::encoding(self.ctx()) != LumpEncoding::DelimitedNames {
			return None;
		}
		let index = codec::index_at_offset(self.record_slices(), offset)?;
		Some(String::from_utf8_lossy(self.get(index)?.bytes))
	}

	/// Colors every mip texture's full resolution level. Textures without their own palette use `fallback_palette`.
	pub fn rgb_images(&self, fallback_palette: &Palette) -> Vec<Option<image::RgbImage>> {
		self.iter()
			.map(|record| {
				let (width, height) = (record.get_int(TextureField::Width), record.get_int(TextureField::Height));
				if width <= 0 || height <= 0 {
					return None;
				}
				record.payload().to_rgb_image(width as u32, height as u32, fallback_palette)
			})
			.collect()
	}
}

/// The 40-byte header of a mip texture record.
#[derive(Debug, Clone)]
pub(crate) struct MipTextureHeader {
	pub name: [u8; 16],
	pub width: u32,
	pub height: u32,
	pub offsets: [u32; 4],
}

impl BspValue for MipTextureHeader {
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
		Ok(Self {
			name: reader.read()?,
			width: reader.read()?,
			height: reader.read()?,
			offsets: reader.read()?,
		})
	}

	fn bsp_struct_size(_ctx: &BspParseContext) -> usize {
		codec::MIP_TEXTURE_HEADER_LEN
	}
}

impl MipTextureHeader {
	pub fn name(&self) -> String {
		record::decode_name(&self.name)
	}

	#[inline]
	fn pixel_count(&self) -> usize {
		self.width as usize * self.height as usize
	}

	/// Reads the pixels stored after this header, `record` being the whole record this header starts.
	fn read_embedded(&self, record: &[u8], ctx: &BspParseContext) -> BspResult<TexturePixels> {
		let reader = BspByteReader::new(record, ctx);
		let mut mips = SmallVec::new();
		let mut end = reader.clone();

		for (level, offset) in self.offsets.into_iter().enumerate() {
			if offset == 0 {
				break;
			}
			// The offsets are relative to start of the header.
			let mut mip_reader = reader.with_pos(offset as usize);
			let size = (self.width as usize >> level) * (self.height as usize >> level);
			mips.push(mip_reader.read_bytes(size).job(format!("Reading mip level {level}"))?.to_vec());
			end = mip_reader;
		}

		// GoldSrc stores a palette directly after the last mip level.
		let palette = if ctx.format == BspFormat::GoldSrc { Some(end.read::<Palette>().job("Reading palette")?) } else { None };

		Ok(TexturePixels {
			mips,
			palette,
			source: PixelSource::Embedded,
		})
	}
}

/// Finds pixels for a mip texture record. Failures are logged and leave the record with no pixels.
fn resolve_pixels(index: usize, record: &[u8], ctx: &BspParseContext, options: &LumpParseOptions) -> TexturePixels {
	if record.is_empty() {
		return TexturePixels::default();
	}

	match lookup_pixels(record, ctx, options) {
		Ok(pixels) => pixels,
		Err(err) => {
			let source = match err.root() {
				BspParseError::PaletteResolution { .. } => PixelSource::Unresolved,
				_ => PixelSource::Failed,
			};
			log::warn!("Texture {index}: {err}");
			TexturePixels { source, ..Default::default() }
		}
	}
}

fn lookup_pixels(record: &[u8], ctx: &BspParseContext, options: &LumpParseOptions) -> BspResult<TexturePixels> {
	let header: MipTextureHeader = BspByteReader::new(record, ctx).read()?;
	let name = header.name();

	if let Some(pixels) = options.textures.and_then(|textures| textures.lookup_texture(&name)) {
		let found = pixels.mips.first().map(Vec::len).unwrap_or(0);
		if found != header.pixel_count() {
			return Err(BspParseError::TextureDecode {
				name,
				reason: format!("expected {} pixels in the full mip level, found {found}", header.pixel_count()),
			});
		}
		return Ok(TexturePixels {
			mips: pixels.mips,
			palette: Some(pixels.palette),
			source: PixelSource::External,
		});
	}

	if options.settings.read_embedded_textures && header.offsets[0] != 0 {
		return header.read_embedded(record, ctx).map_err(|err| BspParseError::TextureDecode {
			name,
			reason: err.to_string(),
		});
	}

	Err(BspParseError::PaletteResolution { name })
}
