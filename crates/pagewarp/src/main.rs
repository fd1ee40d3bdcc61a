//! Scan a single page photo from the command line: detect (or accept)
//! the page corners, rectify the perspective, apply a post-filter, and
//! write the filtered image plus the corners as JSON.
//!
//! This binary stands in for the photo-source and persistence
//! collaborators around the core: it drives a [`PageGeometrySession`]
//! through the full detect → adjust → rectify → filter lifecycle with
//! the inline runner, so each stage completes before the next command
//! is issued.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, ValueEnum};
use tracing::info;

use pagewarp_pipeline::{
    Corners, DetectorConfig, FilterKind, Point, RgbaImage, detect_corners_staged,
};
use pagewarp_session::{
    InlineRunner, PageGeometrySession, SessionConfig, SessionEvent, SessionError,
};

/// Detect page corners, rectify, and filter a photographed document.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Input photo path (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Output path for the filtered page image (PNG recommended).
    #[arg(short, long)]
    output: PathBuf,

    /// Where to write the detected/used corners as JSON.
    /// Defaults to the output path with a `.corners.json` extension.
    #[arg(long)]
    corners_out: Option<PathBuf>,

    /// Post-filter to apply to the rectified page.
    #[arg(long, value_enum, default_value_t = FilterArg::BackgroundFlatten)]
    filter: FilterArg,

    /// Manual corner override as eight comma-separated numbers:
    /// "tlx,tly,trx,try,brx,bry,blx,bly". Applied after detection,
    /// like a user dragging the corner handles.
    #[arg(long, value_name = "COORDS")]
    corners: Option<String>,

    /// Directory to dump detection diagnostics into (edge map and
    /// contour overlay PNGs).
    #[arg(long, value_name = "DIR")]
    debug_stages: Option<PathBuf>,
}

/// CLI surface for [`FilterKind`].
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    /// Keep the rectified image unchanged.
    None,
    /// Flatten uneven lighting and boost contrast.
    BackgroundFlatten,
    /// Binarize to black/white via a local-mean threshold.
    AdaptiveBinarize,
}

impl From<FilterArg> for FilterKind {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::None => Self::None,
            FilterArg::BackgroundFlatten => Self::BackgroundFlatten,
            FilterArg::AdaptiveBinarize => Self::AdaptiveBinarize,
        }
    }
}

/// Parse "tlx,tly,trx,try,brx,bry,blx,bly" into [`Corners`].
fn parse_corners(spec: &str) -> Result<Corners, String> {
    let values: Vec<f64> = spec
        .split(',')
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|e| format!("invalid coordinate '{s}': {e}"))
        })
        .collect::<Result<_, _>>()?;

    if values.len() != 8 {
        return Err(format!(
            "corners need 8 comma-separated numbers, got {}",
            values.len(),
        ));
    }

    Ok(Corners {
        top_left: Point::new(values[0], values[1]),
        top_right: Point::new(values[2], values[3]),
        bottom_right: Point::new(values[4], values[5]),
        bottom_left: Point::new(values[6], values[7]),
    })
}

/// Write the detector's intermediate rasters for inspection.
fn dump_stages(image: &RgbaImage, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (_, stages) = detect_corners_staged(image, &DetectorConfig::default())?;
    std::fs::create_dir_all(dir)?;
    stages.edges.save(dir.join("edges.png"))?;
    stages.contour_overlay().save(dir.join("contours.png"))?;
    stages.blurred.save(dir.join("blurred.png"))?;
    eprintln!("Wrote detection stages to {}", dir.display());
    Ok(())
}

/// Surface any `Failed` event the session delivered as a hard error.
fn check_failures(events: &Arc<Mutex<Vec<SessionEvent>>>) -> Result<(), SessionError> {
    let mut events = events
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    for event in events.drain(..) {
        if let SessionEvent::Failed { error } = event {
            return Err(error);
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    eprintln!("Reading image from {}", args.input.display());
    let image = image::open(&args.input)?.to_rgba8();
    info!(
        width = image.width(),
        height = image.height(),
        "photo loaded",
    );

    if let Some(dir) = &args.debug_stages {
        dump_stages(&image, dir)?;
    }

    let manual = args
        .corners
        .as_deref()
        .map(parse_corners)
        .transpose()
        .map_err(|e| format!("--corners: {e}"))?;

    // Drive the interactive lifecycle with the inline runner: each
    // call completes (and delivers its event) before returning.
    let events = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::clone(&events);
    let session = PageGeometrySession::with_runner(
        SessionConfig::default(),
        Arc::new(move |event| {
            store
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(event);
        }),
        Arc::new(InlineRunner),
    );

    session.load(image)?;
    check_failures(&events)?;
    let detected = session
        .corners()
        .ok_or("detection completed without corners")?;
    eprintln!(
        "Detected corners: ({:.0},{:.0}) ({:.0},{:.0}) ({:.0},{:.0}) ({:.0},{:.0})",
        detected.top_left.x,
        detected.top_left.y,
        detected.top_right.x,
        detected.top_right.y,
        detected.bottom_right.x,
        detected.bottom_right.y,
        detected.bottom_left.x,
        detected.bottom_left.y,
    );

    if let Some(corners) = manual {
        eprintln!("Overriding with manual corners");
        session.set_corners(corners)?;
    }

    session.rectify()?;
    check_failures(&events)?;
    session.apply_filter(args.filter.into())?;
    check_failures(&events)?;

    let artifacts = session.export().ok_or("session did not reach Filtered")?;
    eprintln!(
        "Rectified to {}x{} ({} filter)",
        artifacts.image.width(),
        artifacts.image.height(),
        artifacts.filter,
    );

    eprintln!("Saving filtered page to {}", args.output.display());
    artifacts.image.save(&args.output)?;

    let corners_path = args
        .corners_out
        .unwrap_or_else(|| args.output.with_extension("corners.json"));
    std::fs::write(
        &corners_path,
        serde_json::to_string_pretty(&artifacts.corners)?,
    )?;
    eprintln!("Saved corners to {}", corners_path.display());

    Ok(())
}
