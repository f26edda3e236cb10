#[cfg(feature = "bevy_reflect")]
pub(crate) use bevy_reflect::Reflect;
#[cfg(feature = "serde")]
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use smallvec::{smallvec, SmallVec};
pub(crate) use std::collections::HashMap;
pub(crate) use std::ops::Range;
pub(crate) use strum::IntoEnumIterator;
pub(crate) use thiserror::Error;

pub use crate::{
	BspData, BspFormat, BspParseContext, BspParseInput, BspParseSettings, FieldValue, Lump, LumpEntry, LumpInput, LumpKind, Record,
	RecordKind, RecordRead, RecordWrite,
};
pub use crate::{
	Leaf, LeafField, LumpParseOptions, Model, ModelField, PixelSource, Texture, TextureArchive, TextureDiagnostics, TextureField,
	TextureSource,
};
