//! The closed set of BSP dialects this crate knows record layouts for.

/// The game-engine dialect of a BSP file. Decided once from the file header by the container, and from then on drives every
/// record layout lookup.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::EnumCount, strum::EnumString, strum::IntoStaticStr, strum::Display,
)]
#[cfg_attr(feature = "bevy_reflect", derive(bevy_reflect::Reflect))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(ascii_case_insensitive)]
pub enum BspFormat {
	/// BSP v29, Quake.
	Quake,
	/// BSP v30, Half-Life and other GoldSrc games.
	GoldSrc,
	/// James Bond 007: Nightfire.
	Nightfire,
	/// IBSP v38, Quake 2.
	Quake2,
	Daikatana,
	SiN,
	/// Soldier of Fortune.
	SoF,
	/// IBSP v46, Quake 3 and most of its derivatives.
	Quake3,
	/// RBSP, Raven's Quake 3 derivative (Jedi Outcast/Academy, Soldier of Fortune 2).
	Raven,
	/// Star Trek: Elite Force 2.
	STEF2,
	/// Star Trek: Elite Force 2 demo, which predates the final record layouts.
	STEF2Demo,
	/// Medal of Honor: Allied Assault.
	MOHAA,
	/// Heavy Metal: F.A.K.K. 2.
	FAKK,
	/// Call of Duty.
	CoD,
	/// Call of Duty 2.
	CoD2,
	/// Call of Duty 4.
	CoD4,
	Titanfall,
	/// Vampire: The Masquerade - Bloodlines.
	Source17,
	Source18,
	Source19,
	Source20,
	Source21,
	Source22,
	Source23,
	Source27,
	/// Left 4 Dead 2.
	L4D2,
	/// Tactical Intervention, after decrypting.
	TacticalInterventionEncrypted,
	Vindictus,
	/// Dark Messiah of Might and Magic.
	DMoMaM,
}

impl BspFormat {
	/// Any of the Source engine generations, including their forks.
	pub fn is_source(self) -> bool {
		matches!(
			self,
			Self::Source17
				| Self::Source18 | Self::Source19
				| Self::Source20 | Self::Source21
				| Self::Source22 | Self::Source23
				| Self::Source27 | Self::L4D2
				| Self::TacticalInterventionEncrypted
				| Self::Vindictus | Self::DMoMaM
		)
	}
}
