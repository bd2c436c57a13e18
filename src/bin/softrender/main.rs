//! softrender CLI - render OBJ scenes headless.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use softrender::pathtracer::{write_ppm, OfflineSettings};
use softrender::{Engine, Settings};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("SOFTRENDER_BUILD_DATE"),
    " ",
    env!("SOFTRENDER_BUILD_TIME"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "softrender", version, long_version = LONG_VERSION)]
#[command(about = "Software rasterizer with shadow mapping and a BVH path tracer", long_about = None)]
struct Cli {
    /// Debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rasterize frames, optionally blending real-time ray traced tiles
    #[command(visible_alias = "r")]
    Render {
        /// OBJ files to load
        #[arg(required = true)]
        models: Vec<PathBuf>,

        /// Output image (format follows the extension)
        #[arg(short, long, default_value = "frame.png")]
        out: PathBuf,

        /// Frames to run before saving the last one
        #[arg(long, default_value_t = 1)]
        frames: u32,

        /// Blend one ray traced tile per frame
        #[arg(long)]
        rt: bool,

        /// Frame size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        size: Option<(u32, u32)>,

        /// Settings file (defaults to the user config location)
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Path trace the scene offline into a plain PPM
    #[command(visible_alias = "t")]
    Trace {
        #[arg(required = true)]
        models: Vec<PathBuf>,

        #[arg(short, long, default_value = "image.ppm")]
        out: PathBuf,

        #[arg(long)]
        width: Option<u32>,

        /// Samples per pixel
        #[arg(long)]
        spp: Option<u32>,

        /// Maximum bounces
        #[arg(long)]
        depth: Option<u32>,
    },

    /// Print the scene hierarchy and mesh statistics
    #[command(visible_alias = "i")]
    Info {
        #[arg(required = true)]
        models: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Render {
            models,
            out,
            frames,
            rt,
            size,
            settings,
        } => cmd_render(&models, &out, frames, rt, size, settings.as_deref()),
        Command::Trace {
            models,
            out,
            width,
            spp,
            depth,
        } => cmd_trace(&models, &out, width, spp, depth),
        Command::Info { models } => cmd_info(&models),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "softrender=debug"
    } else {
        "softrender=info"
    };
    let filter = EnvFilter::try_from_env("SOFTRENDER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if w == 0 || h == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((w, h))
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(p) => Settings::load_from(p).with_context(|| format!("reading settings {}", p.display())),
        None => Ok(Settings::load()),
    }
}

fn load_models(engine: &mut Engine, models: &[PathBuf]) -> Result<()> {
    for path in models {
        if !path.exists() {
            bail!("file not found: {}", path.display());
        }
        engine
            .load_model(path, None)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    engine.scene.clear_selection();
    Ok(())
}

fn cmd_render(
    models: &[PathBuf],
    out: &Path,
    frames: u32,
    rt: bool,
    size: Option<(u32, u32)>,
    settings: Option<&Path>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;
    if let Some((w, h)) = size {
        settings.width = w;
        settings.height = h;
    }
    if rt {
        settings.realtime.enabled = true;
    }

    let mut engine = Engine::from_settings(&settings).context("setting up renderer")?;
    load_models(&mut engine, models)?;

    for _ in 0..frames.max(1) {
        engine.render_frame();
    }
    tracing::info!("{}", engine.status_line());

    engine
        .capture_frame(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

fn cmd_trace(
    models: &[PathBuf],
    out: &Path,
    width: Option<u32>,
    spp: Option<u32>,
    depth: Option<u32>,
) -> Result<()> {
    let settings = Settings::load();
    let mut offline: OfflineSettings = settings.offline;
    if let Some(w) = width {
        offline.width = w.max(1);
    }
    if let Some(s) = spp {
        offline.samples_per_pixel = s.max(1);
    }
    if let Some(d) = depth {
        offline.max_depth = d;
    }

    let mut engine = Engine::from_settings(&settings).context("setting up renderer")?;
    load_models(&mut engine, models)?;

    let image = engine.trace_offline(&offline);
    write_ppm(&image, out).with_context(|| format!("writing {}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

fn cmd_info(models: &[PathBuf]) -> Result<()> {
    let mut engine = Engine::new(1, 1);
    load_models(&mut engine, models)?;
    let scene = &mut engine.scene;
    scene.update_all_transforms();

    println!("Hierarchy:");
    for line in scene.hierarchy_lines() {
        println!("  {line}");
    }

    println!();
    println!("Meshes: {}", scene.mesh_count());
    let mut total_tris = 0;
    for (node, model) in scene.visible_meshes() {
        let tris = model.triangle_count();
        total_tris += tris;
        println!(
            "  {:<24} {:>8} verts {:>8} faces {:>8} tris",
            node.name,
            model.vertex_count(),
            model.face_count(),
            tris
        );
    }
    println!("Triangles: {total_tris}");

    let bounds = scene.bounds();
    if !bounds.is_empty() {
        let c = bounds.center();
        println!(
            "Bounds: center ({:.3}, {:.3}, {:.3}) radius {:.3}",
            c.x,
            c.y,
            c.z,
            bounds.radius()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480"), Ok((640, 480)));
        assert_eq!(parse_size("32X16"), Ok((32, 16)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("ax10").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["softrender", "-v", "render", "a.obj", "--rt", "--size", "64x32"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Render { models, rt, size, frames, .. } => {
                assert_eq!(models, vec![PathBuf::from("a.obj")]);
                assert!(rt);
                assert_eq!(size, Some((64, 32)));
                assert_eq!(frames, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["softrender", "trace"]).is_err());
    }
}
