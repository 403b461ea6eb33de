//! gsdf-extract: extract a triangle mesh from a trained Gaussian + SDF model
//!
//! Usage:
//!   gsdf-extract -m path/to/model --iteration 30000

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gsdf_rs::io::{
    interpolated_mesh_path, save_mesh_ply, save_obj, snapshot_path, ModelDir, PlyEncoding,
};
use gsdf_rs::tetra::{
    extract_mesh_with_snapshots, BowyerWatson, ExtractConfig, ExtractStats, ShapeSource,
};
use gsdf_rs::{ExtractError, Mesh};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShapeArg {
    Field,
    Stored,
    Auto,
}

impl From<ShapeArg> for ShapeSource {
    fn from(s: ShapeArg) -> Self {
        match s {
            ShapeArg::Field => ShapeSource::Field,
            ShapeArg::Stored => ShapeSource::Stored,
            ShapeArg::Auto => ShapeSource::Auto,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gsdf-extract")]
#[command(
    about = "Extract a mesh from SDF-guided Gaussians with marching tetrahedra",
    long_about = None
)]
struct Cli {
    /// Trained model directory
    #[arg(short = 'm', long)]
    model_path: PathBuf,

    /// Checkpoint iteration to load
    #[arg(long, default_value = "30000")]
    iteration: u32,

    /// Binary search steps per crossing edge
    #[arg(long, default_value = "8")]
    steps: usize,

    /// Zero-based step(s) at which a mesh is written (the last step always is)
    #[arg(long = "export-step")]
    export_steps: Vec<usize>,

    /// Write ASCII instead of binary PLY
    #[arg(long)]
    ascii: bool,

    /// Also write an OBJ next to every PLY
    #[arg(long)]
    obj: bool,

    /// Keep faces with edges longer than their Gaussians' scale
    #[arg(long)]
    no_filter: bool,

    /// Enlargement for a bounding box derived from Gaussian centers
    #[arg(long, default_value = "1.1")]
    bbox_enlarge: f32,

    /// Also write a mesh on the linearly interpolated crossings
    #[arg(long)]
    interp: bool,

    /// Source of per-Gaussian scale and rotation
    #[arg(long, value_enum, default_value = "auto")]
    shape_source: ShapeArg,

    /// Output directory (default: <model>/test/ours_<iteration>/fusion)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> ExtractConfig {
        let defaults = ExtractConfig::default();
        ExtractConfig {
            binary_search_steps: self.steps,
            export_steps: if self.export_steps.is_empty() {
                defaults.export_steps
            } else {
                self.export_steps.clone()
            },
            bbox_enlarge: self.bbox_enlarge,
            filter_long_edges: !self.no_filter,
            shape_source: self.shape_source.into(),
            interpolated_mesh: self.interp,
        }
    }
}

/// Write `mesh` as PLY, plus OBJ when requested. `path_for` maps an
/// extension to the output path.
fn write_mesh<P>(mesh: &Mesh, path_for: P, cli: &Cli) -> Result<(), ExtractError>
where
    P: Fn(&str) -> PathBuf,
{
    let encoding = if cli.ascii {
        PlyEncoding::Ascii
    } else {
        PlyEncoding::BinaryLittleEndian
    };
    let path = path_for("ply");
    save_mesh_ply(mesh, &path, encoding)?;
    log::info!("wrote {}", path.display());
    if cli.obj {
        let path = path_for("obj");
        save_obj(mesh, &path)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

/// Save run metadata to text file
fn save_run_metadata(
    out_dir: &Path,
    cli: &Cli,
    config: &ExtractConfig,
    stats: &ExtractStats,
    elapsed_secs: f64,
) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(out_dir.join("extract_metadata.txt"))?;

    writeln!(file, "=== Mesh Extraction Metadata ===")?;
    writeln!(file)?;
    writeln!(file, "Command:")?;
    let args: Vec<String> = std::env::args().collect();
    writeln!(file, "{}", args.join(" "))?;
    writeln!(file)?;

    let now = time::OffsetDateTime::now_utc();
    writeln!(
        file,
        "Finished: {:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )?;
    writeln!(file, "Elapsed: {:.2}s", elapsed_secs)?;
    writeln!(file)?;

    writeln!(file, "Model:")?;
    writeln!(file, "  Path: {}", cli.model_path.display())?;
    writeln!(file, "  Iteration: {}", cli.iteration)?;
    writeln!(file)?;

    writeln!(file, "Config:")?;
    writeln!(file, "  Binary search steps: {}", config.binary_search_steps)?;
    writeln!(file, "  Snapshot steps: {:?}", config.snapshot_steps())?;
    writeln!(file, "  Filter long edges: {}", config.filter_long_edges)?;
    writeln!(file, "  Shape source: {:?}", config.shape_source)?;
    writeln!(file, "  Interpolated mesh: {}", config.interpolated_mesh)?;
    writeln!(file)?;

    writeln!(file, "Stats:")?;
    writeln!(file, "  Gaussians: {}", stats.gaussians)?;
    writeln!(file, "  Candidate points: {}", stats.candidate_points)?;
    writeln!(file, "  Points in bounding box: {}", stats.points_in_bbox)?;
    writeln!(file, "  Tetrahedra: {}", stats.tetrahedra)?;
    writeln!(file, "  Crossing edges: {}", stats.crossing_edges)?;
    writeln!(file, "  Faces before filter: {}", stats.faces_before_filter)?;
    writeln!(file, "  Vertices: {}", stats.vertices)?;
    writeln!(file, "  Faces: {}", stats.faces)?;
    writeln!(file)?;

    writeln!(file, "System:")?;
    writeln!(file, "  Platform: {}", std::env::consts::OS)?;
    writeln!(file, "  Architecture: {}", std::env::consts::ARCH)?;
    writeln!(file, "  Package version: {}", gsdf_rs::VERSION)?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config();
    log::info!("gsdf-extract v{}", gsdf_rs::VERSION);

    let model = ModelDir::new(&cli.model_path);
    let cloud = model.load_gaussians(cli.iteration).with_context(|| {
        let path = model.point_cloud_path(cli.iteration);
        format!("loading Gaussians from {}", path.display())
    })?;
    let field = model.load_field(cli.iteration).with_context(|| {
        let path = model.field_model_path(cli.iteration);
        format!("loading field from {}", path.display())
    })?;
    log::info!(
        "{} Gaussians, field network with {} layers ({} outputs)",
        cloud.len(),
        field.layers.len(),
        field.output_width()
    );

    let out_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| model.fusion_dir(cli.iteration));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let start = Instant::now();
    let extraction = extract_mesh_with_snapshots(
        cloud.as_slice(),
        Some(&field.bounding_box),
        &field,
        &BowyerWatson::default(),
        &config,
        |step, mesh| write_mesh(mesh, |ext| snapshot_path(&out_dir, step, ext), &cli),
    )
    .context("mesh extraction failed")?;

    if config.binary_search_steps == 0 {
        write_mesh(&extraction.mesh, |ext| snapshot_path(&out_dir, 0, ext), &cli)?;
    }
    if let Some(mesh) = &extraction.interpolated {
        write_mesh(mesh, |ext| interpolated_mesh_path(&out_dir, ext), &cli)?;
    }

    let elapsed = start.elapsed().as_secs_f64();
    log::info!(
        "extracted {} vertices, {} faces in {:.2}s",
        extraction.mesh.vertices.len(),
        extraction.mesh.faces.len(),
        elapsed
    );

    save_run_metadata(&out_dir, &cli, &config, &extraction.stats, elapsed)
        .context("writing extract_metadata.txt")?;
    Ok(())
}
