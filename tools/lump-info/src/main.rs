//! Prints every present field of every record in a lump extracted from a BSP file.
//!
//! Usage: `lump-info <format> <lump> <file> [version]`

use polybsp::{prelude::*, BspParseError, RecordField};
use std::{env, error::Error, fs, str::FromStr};

fn print_records<R: RecordKind>(data: &[u8], ctx: BspParseContext) -> Result<Lump<R>, BspParseError> {
	let lump = Lump::<R>::parse(data, ctx)?;
	println!("{} {} records ({ctx:?})", lump.len(), R::NAME);

	for (i, record) in lump.iter().enumerate() {
		let fields: Vec<String> = record.present_fields().into_iter().map(|(field, value)| format!("{}: {value}", field.name())).collect();
		println!("[{i}] {}", fields.join(", "));
	}

	Ok(lump)
}

fn main() -> Result<(), Box<dyn Error>> {
	env_logger::init();

	let args: Vec<String> = env::args().skip(1).collect();
	let [format, kind, path, rest @ ..] = args.as_slice() else {
		return Err("Usage: lump-info <format> <lump> <file> [version]".into());
	};
	let format = BspFormat::from_str(format)?;
	let kind = LumpKind::from_str(kind)?;
	let version = rest.first().map(|version| version.parse::<i32>()).transpose()?.unwrap_or(0);
	let ctx = BspParseContext::new(format, version);

	log::info!("Reading {kind} lump of {path} as {format}");
	let data = fs::read(path)?;

	match kind {
		LumpKind::Models => {
			print_records::<Model>(&data, ctx)?;
		}
		LumpKind::Leaves => {
			print_records::<Leaf>(&data, ctx)?;
		}
		LumpKind::Textures => {
			let textures = print_records::<Texture>(&data, ctx)?;
			println!("{:?}", textures.diagnostics());
		}
		kind => return Err(format!("No record layout for {kind} lumps").into()),
	}

	Ok(())
}
