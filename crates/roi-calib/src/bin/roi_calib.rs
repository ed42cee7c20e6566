use clap::{ArgAction, Parser, Subcommand};
use roi_calib::core::{Image, Point, Rect};
use roi_calib::{CalibrationStore, Calibrator, CalibratorConfig, SessionState};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "roi-calib", version, about = "Inspect and apply four-point ROI calibrations")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON calibrator config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Calibration record path, overriding the config.
    #[arg(long, global = true)]
    calibration: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored calibration and derived geometry as JSON.
    Show,
    /// Place four points as if double-clicked and save the record.
    Set {
        /// x1 y1 x2 y2 x3 y3 x4 y4 in click order.
        #[arg(num_args = 8, allow_negative_numbers = true)]
        coords: Vec<i32>,
    },
    /// Write clipped, rectified and masked versions of a still image.
    Apply {
        #[arg(long)]
        image: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Serialize)]
struct Summary<'a> {
    path: &'a Path,
    complete: bool,
    clip_points: &'a [Point],
    visibility_points: &'a [Point],
    clip_rect: Rect,
    visibility_rect: Rect,
    perspective: Option<[[f64; 3]; 3]>,
    defaulted_slots: Option<usize>,
}

fn build_calibrator(cli: &Cli) -> Result<Calibrator, Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => CalibratorConfig::load_json(path)?,
        None => CalibratorConfig::default(),
    };
    let store = match &cli.calibration {
        Some(path) => CalibrationStore::new(path),
        None => CalibrationStore::from_config(&config),
    };
    Ok(Calibrator::with_store(config, store))
}

fn show(calibrator: &Calibrator) -> Result<(), Box<dyn Error>> {
    let summary = Summary {
        path: calibrator.store().path(),
        complete: calibrator.is_complete(),
        clip_points: calibrator.clip_points(),
        visibility_points: calibrator.visibility_points(),
        clip_rect: calibrator.clip_rect(),
        visibility_rect: calibrator.visibility_rect(),
        perspective: calibrator.perspective().map(|h| h.to_array()),
        defaulted_slots: calibrator.loaded_record().map(|r| r.defaulted_slots()),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn set(calibrator: &mut Calibrator, coords: &[i32]) -> Result<(), Box<dyn Error>> {
    if calibrator.state() != SessionState::Editing {
        calibrator.start_editing();
    }
    for xy in coords.chunks_exact(2) {
        calibrator.click(Point::new(xy[0], xy[1]));
    }
    if !calibrator.is_complete() {
        return Err("calibration did not complete".into());
    }
    println!("saved {}", calibrator.store().path().display());
    Ok(())
}

fn load_image(path: &Path) -> Result<Image, Box<dyn Error>> {
    let img = image::open(path)?;
    let out = if img.color().channel_count() == 1 {
        let gray = img.to_luma8();
        let (w, h) = gray.dimensions();
        Image::new(w as usize, h as usize, 1, gray.into_raw())?
    } else {
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        Image::new(w as usize, h as usize, 3, rgb.into_raw())?
    };
    Ok(out)
}

fn save_image(img: &Image, path: &Path) -> Result<(), Box<dyn Error>> {
    let (w, h) = (img.width as u32, img.height as u32);
    match img.channels {
        1 => image::GrayImage::from_raw(w, h, img.data.clone())
            .ok_or("buffer does not match image size")?
            .save(path)?,
        3 => image::RgbImage::from_raw(w, h, img.data.clone())
            .ok_or("buffer does not match image size")?
            .save(path)?,
        c => return Err(format!("cannot write {c}-channel image").into()),
    }
    log::info!("wrote {}", path.display());
    Ok(())
}

fn apply(calibrator: &Calibrator, image: &Path, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let frame = load_image(image)?;
    std::fs::create_dir_all(out_dir)?;

    let out = calibrator.process(&frame.view());
    save_image(&out.clipped, &out_dir.join("clipped.png"))?;
    match &out.rectified {
        Some(img) => save_image(img, &out_dir.join("rectified.png"))?,
        None => log::warn!("no perspective transform, rectified.png not written"),
    }
    match &out.masked {
        Some(img) => save_image(img, &out_dir.join("masked.png"))?,
        None => log::warn!("no visibility mask, masked.png not written"),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = roi_calib::core::level_for_verbosity(cli.verbose);
    #[cfg(feature = "tracing")]
    roi_calib::core::init_tracing(level, false);
    #[cfg(not(feature = "tracing"))]
    roi_calib::core::init_with_level(level)?;

    let mut calibrator = build_calibrator(&cli)?;
    match &cli.command {
        Command::Show => show(&calibrator),
        Command::Set { coords } => set(&mut calibrator, coords),
        Command::Apply { image, out_dir } => apply(&calibrator, image, out_dir),
    }
}
