use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{App, Arg, ArgMatches};
use indicatif::{ProgressBar, ProgressStyle};
use rootcause::prelude::*;
use tiny_skia::{Color, Pixmap};
use tracing::{Level, info};

use atlas_minimap::atlas::{self, AtlasHandle};
use atlas_minimap::config::MinimapConfig;
use atlas_minimap::projection::{Point, WorldPos};
use atlas_minimap::{CameraPose, FrameOutcome, HostInput, Minimap, MinimapError};

fn parse_or<T: FromStr>(matches: &ArgMatches, name: &str, default: T) -> Result<T, MinimapError> {
    match matches.value_of(name) {
        Some(v) => v.parse::<T>().map_err(|_| {
            let flag = name.to_ascii_lowercase();
            MinimapError::invalid_config(format!("--{flag} got an invalid value: {v}"))
        }),
        None => Ok(default),
    }
}

/// Swap the built-in labels for their translations from a gettext catalog.
fn translate_labels(config: &mut MinimapConfig) -> Result<(), rootcause::Report> {
    let Some(path) = config.labels.catalog_path.clone() else {
        return Ok(());
    };
    let file = std::fs::File::open(&path).context("Failed to open label catalog")?;
    let catalog = gettext::Catalog::parse(file).context("Failed to parse label catalog")?;
    config.labels.north = catalog.gettext(&config.labels.north).to_string();
    config.labels.disclaimer = catalog.gettext(&config.labels.disclaimer).to_string();
    info!("Loaded label translations from {}", path.display());
    Ok(())
}

/// Write a premultiplied pixmap as a straight-alpha PNG.
fn save_png(pixmap: &Pixmap, path: &Path) -> Result<(), rootcause::Report> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    let image = image::RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .ok_or_else(|| MinimapError::Draw("pixmap size does not match its buffer".to_string()))
        .context("Failed to convert frame")?;
    image.save(path).context("Failed to write PNG")?;
    Ok(())
}

fn frame_path(output: &Path, index: usize, count: usize) -> PathBuf {
    if count == 1 {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "minimap".to_string());
    output.with_file_name(format!("{stem}_{index:04}.png"))
}

fn main() -> Result<(), rootcause::Report> {
    let matches = App::new("Atlas Minimap")
        .about("Renders a rotating circular minimap overlay from a world atlas image")
        .arg(
            Arg::with_name("CONFIG")
                .help("Path to a TOML config file")
                .short("c")
                .long("config")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("GENERATE_CONFIG")
                .help("Print a commented default config and exit")
                .long("generate-config"),
        )
        .arg(
            Arg::with_name("ATLAS")
                .help("Atlas image (overrides the config)")
                .short("a")
                .long("atlas")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FONT")
                .help("TTF/OTF font for the labels")
                .long("font")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("Output PNG path. With --frames N, files are numbered")
                .short("o")
                .long("output")
                .takes_value(true)
                .default_value("minimap.png"),
        )
        .arg(
            Arg::with_name("WIDTH")
                .help("Viewport width in pixels")
                .long("width")
                .takes_value(true)
                .default_value("1280"),
        )
        .arg(
            Arg::with_name("HEIGHT")
                .help("Viewport height in pixels")
                .long("height")
                .takes_value(true)
                .default_value("720"),
        )
        .arg(
            Arg::with_name("X")
                .help("Tracked world X")
                .short("x")
                .takes_value(true)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::with_name("Y")
                .help("Tracked world Y")
                .short("y")
                .takes_value(true)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::with_name("HEADING")
                .help("Heading in degrees, 0 = north")
                .long("heading")
                .takes_value(true)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::with_name("ZOOM")
                .help("Initial zoom")
                .short("z")
                .long("zoom")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("RADIUS")
                .help("Minimap radius in pixels")
                .short("r")
                .long("radius")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("OPACITY")
                .help("Map opacity in [0, 1]")
                .long("opacity")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("FRAMES")
                .help("Render N frames sweeping the heading through a full turn")
                .long("frames")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("BACKDROP")
                .help("Composite over an opaque black backdrop instead of transparency")
                .long("backdrop"),
        )
        .arg(
            Arg::with_name("NO_DISCLAIMER")
                .help("Hide the disclaimer text")
                .long("no-disclaimer"),
        )
        .arg(
            Arg::with_name("SHOW_CROSSHAIR")
                .help("Draw a dot at the viewport center")
                .long("crosshair"),
        )
        .arg(
            Arg::with_name("COUNTER_CLOCKWISE")
                .help("Turn the map the other way as the heading increases")
                .long("counter-clockwise"),
        )
        .arg(
            Arg::with_name("VERBOSE")
                .help("Enable debug logging")
                .short("v")
                .long("verbose"),
        )
        .get_matches();

    let level = if matches.is_present("VERBOSE") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if matches.is_present("GENERATE_CONFIG") {
        print!("{}", MinimapConfig::generate_default_toml());
        return Ok(());
    }

    let mut config = match matches.value_of("CONFIG") {
        Some(path) => MinimapConfig::load(Path::new(path))?,
        None => MinimapConfig::default(),
    };
    config
        .apply_cli_overrides(&matches)
        .context("Invalid command line option")?;
    translate_labels(&mut config)?;

    let width: u32 = parse_or(&matches, "WIDTH", 1280).context("Invalid viewport")?;
    let height: u32 = parse_or(&matches, "HEIGHT", 720).context("Invalid viewport")?;
    let tracked = WorldPos {
        x: parse_or(&matches, "X", 0.0).context("Invalid position")?,
        y: parse_or(&matches, "Y", 0.0).context("Invalid position")?,
    };
    let heading: f32 = parse_or(&matches, "HEADING", 0.0).context("Invalid heading")?;
    let frames: usize = parse_or(&matches, "FRAMES", 1).context("Invalid frame count")?;
    let frames = frames.max(1);
    let output = PathBuf::from(matches.value_of("OUTPUT").unwrap_or("minimap.png"));

    let texture = atlas::load_atlas(&config.atlas_path).context("Failed to load atlas")?;
    let mut minimap = Minimap::with_atlas(config, (width, height), AtlasHandle::ready(texture))
        .context("Failed to set up minimap")?;

    let progress = if frames > 1 {
        let bar = ProgressBar::new(frames as u64);
        let template = "{bar:40.cyan/blue} {pos}/{len} frames [{elapsed_precise}]";
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style);
        }
        Some(bar)
    } else {
        None
    };

    let mut backdrop = Pixmap::new(width, height)
        .ok_or_else(|| MinimapError::invalid_config(format!("invalid viewport {width}x{height}")))
        .context("Invalid viewport")?;

    for index in 0..frames {
        let sweep = 360.0 * index as f32 / frames as f32;
        let input = HostInput {
            camera: CameraPose {
                position: [tracked.x, tracked.y, 0.0],
                heading: (heading + sweep).to_radians(),
                viewport_width: width,
                viewport_height: height,
            },
            tracked_position: tracked,
            pointer: Point::new(-1.0, -1.0),
            scroll_delta: 0.0,
        };

        if let FrameOutcome::Skipped(e) = minimap.frame(&input) {
            Err::<(), _>(e).context("Minimap frame was not drawn")?;
        }

        let path = frame_path(&output, index, frames);
        if matches.is_present("BACKDROP") {
            backdrop.fill(Color::BLACK);
            minimap.blit_onto(&mut backdrop.as_mut());
            save_png(&backdrop, &path)?;
        } else if let Some(image) = minimap.image() {
            save_png(image, &path)?;
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }

    if let Some(bar) = progress {
        bar.finish();
    }
    info!("Wrote {frames} frame(s) to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_keeps_the_output_name() {
        let out = Path::new("out/minimap.png");
        assert_eq!(frame_path(out, 0, 1), PathBuf::from("out/minimap.png"));
    }

    #[test]
    fn sweeps_are_numbered() {
        let out = Path::new("out/minimap.png");
        assert_eq!(frame_path(out, 7, 36), PathBuf::from("out/minimap_0007.png"));
    }
}
