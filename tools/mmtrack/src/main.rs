//! 命令行工具: 读取图像栈与追踪记录, 输出谱系摘要, 可选导出平面图像和自动定位结果.

use clap::Parser;
use log::LevelFilter;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use track_berry::consts::CHUNK_SIZE;
use track_berry::image::{
    composite_rgb, luts_for_stack, restore_lut_settings, stem, Gaussian8, ImageStack, ImgWriteRaw,
    ImgWriteVis, LutPlane,
};
use track_berry::plugin::{default_plugin, find_plugin, plugin_names, Plugin};
use track_berry::record::{RecordError, ViewerSettings};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Multi-dimensional microscopy tracking record tool
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Plugin for each image, in order (default: the highest-priority plugin)
    #[arg(short = 'p', long = "plugin", value_name = "PLUGIN")]
    plugins: Vec<String>,

    /// Record file for each image, in order (default: derived from the image name)
    #[arg(short = 'f', long = "records", value_name = "RECORDS")]
    records: Vec<PathBuf>,

    /// Log level (OFF, ERROR, WARN, INFO, DEBUG, TRACE)
    #[arg(long, default_value = "INFO", env = "MMTRACK_LOG_LEVEL", value_parser = parse_level)]
    log_level: LevelFilter,

    /// Write the first plane of each channel as PNG into this directory
    #[arg(long, value_name = "DIR")]
    export_dir: Option<PathBuf>,

    /// Run the Gaussian spot localizer on every plane and print the counts
    #[arg(long)]
    localize: bool,

    /// Image stacks (.npy, TCZYX with missing leading axes allowed)
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse().map_err(|_| format!("invalid log level `{s}`"))
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .init()
    {
        eprintln!("cannot initialize logger: {e}");
    }

    let images: Vec<Option<&Path>> = if args.images.is_empty() {
        vec![None]
    } else {
        args.images.iter().map(|p| Some(p.as_path())).collect()
    };

    let mut failed = false;
    for (i, image) in images.into_iter().enumerate() {
        if let Err(e) = process(&args, i, image) {
            log::error!("{e}");
            failed = true;
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn load_stack(path: &Path) -> CliResult<ImageStack> {
    let mut reader = ImageStack::read_by_chunk(path, CHUNK_SIZE)?;
    for bytes in &mut reader {
        log::debug!("{}: {} bytes read", path.display(), bytes?);
    }
    Ok(reader.finish()?)
}

fn process(args: &Args, i: usize, image: Option<&Path>) -> CliResult<()> {
    let stack = match image {
        Some(path) => load_stack(path)?,
        None => ImageStack::default(),
    };

    let entry = match args.plugins.get(i) {
        Some(name) => find_plugin(name).ok_or_else(|| {
            format!(
                "unknown plugin `{name}`; available: {}",
                plugin_names().join(", ")
            )
        })?,
        None => default_plugin(),
    };
    let mut plugin = entry.create();
    log::info!("Plugin: {}", plugin.name());

    let record_path = match (args.records.get(i), image) {
        (Some(p), _) => Some(p.clone()),
        (None, Some(img)) => Some(plugin.default_record_path(img)?),
        (None, None) => None,
    };

    let mut settings = ViewerSettings::default();
    if let Some(path) = record_path.as_deref().filter(|p| p.exists()) {
        settings = match plugin.load_records(path) {
            Err(e @ RecordError::ProvenanceMismatch { .. }) => {
                log::warn!("{e}");
                plugin.load_records_anyway(path)?
            }
            other => other?,
        };
    }

    print_summary(&*plugin, image, record_path.as_deref(), &stack);

    if let Some(dir) = &args.export_dir {
        let name = image.map(stem).unwrap_or_else(|| "stack".to_string());
        export_planes(&stack, &settings, dir, &name)?;
    }
    if args.localize {
        localize(&stack);
    }
    Ok(())
}

fn print_summary(plugin: &dyn Plugin, image: Option<&Path>, record: Option<&Path>, stack: &ImageStack) {
    let b = stack.bounds();
    let show = |p: Option<&Path>| p.map_or("-".to_string(), |p| p.display().to_string());
    println!("image:   {}", show(image));
    println!(
        "stack:   T={} C={} Z={} {}x{}",
        b.t_count, b.c_count, b.z_count, b.width, b.height
    );
    println!("plugin:  {}", plugin.name());
    println!("records: {}", show(record));

    let Some(session) = plugin.session() else {
        return;
    };
    let store = session.store();
    let live = store.live_len();
    println!(
        "spots:   {} live, {} deleted",
        live,
        store.spots().len() - live
    );
    println!("tracks:  {}", store.roots().len());
    println!("branch:  {}", store.branch_points().len());
    for v in store.audit() {
        println!("warning: {v}");
    }
}

fn export_planes(stack: &ImageStack, settings: &ViewerSettings, dir: &Path, name: &str) -> CliResult<()> {
    let mut luts = luts_for_stack(stack);
    restore_lut_settings(&mut luts, &settings.luts);

    let planes: Vec<_> = (0..stack.c_count())
        .filter_map(|c| stack.plane((0, c, 0)))
        .collect();
    for (c, (plane, lut)) in planes.iter().zip(&luts).enumerate() {
        let path = dir.join(format!("{name}_c{c}.png"));
        let view = if luts.len() == 1 {
            LutPlane::gray(plane.view(), lut)
        } else {
            LutPlane::color(plane.view(), lut)
        };
        view.save(&path)?;
        log::info!("Exported {}", path.display());
    }

    if planes.len() > 1 {
        if let Some(rgb) = composite_rgb(&planes, &luts) {
            let path = dir.join(format!("{name}_composite.png"));
            rgb.save_raw(&path)?;
            log::info!("Exported {}", path.display());
        }
    }
    Ok(())
}

fn localize(stack: &ImageStack) {
    let b = stack.bounds();
    for c in 0..b.c_count {
        let mut gaussian = Gaussian8::default();
        if let Some(channel) = stack.channel(c) {
            gaussian.set_image_clip(channel);
        }
        let tczs: Vec<_> = (0..b.t_count)
            .flat_map(|t| (0..b.z_count).map(move |z| (t, c, z)))
            .collect();
        let planes: Vec<_> = tczs.iter().filter_map(|&tcz| stack.plane(tcz)).collect();
        for (tcz, (spots, report)) in tczs.iter().zip(gaussian.fit_planes(&planes)) {
            println!("plane {tcz:?}: {} spots, {} dropped", spots.len(), report.total());
        }
    }
}
