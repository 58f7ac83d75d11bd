//! Coordinate key conversions. Pure and offline.

use serde::Serialize;

use vaccimap_core::CoordinateKey;

use crate::cli::{GlobalOpts, KeyArgs, KeyCommand};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct KeyView {
    key: String,
    display: String,
    latitude: f64,
    longitude: f64,
}

impl From<&CoordinateKey> for KeyView {
    fn from(key: &CoordinateKey) -> Self {
        let (latitude, longitude) = key.coordinates();
        Self {
            key: key.as_str().to_owned(),
            display: key.display(),
            latitude,
            longitude,
        }
    }
}

pub fn handle(args: KeyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let key = match args.command {
        KeyCommand::Encode(at) => CoordinateKey::encode(at.latitude, at.longitude)?,
        KeyCommand::Decode { key } => key.parse::<CoordinateKey>()?,
    };

    let view = KeyView::from(&key);
    let out = output::render_single(
        &global.output,
        &view,
        |v| {
            output::detail_lines(&[
                ("Key", v.key.clone()),
                ("Display", v.display.clone()),
                ("Latitude", format!("{:?}", v.latitude)),
                ("Longitude", format!("{:?}", v.longitude)),
            ])
        },
        |v| v.key.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
