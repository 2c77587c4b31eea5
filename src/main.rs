use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pdf_stamp::geometry::Point;
use pdf_stamp::overlay::{OverlayRaster, UploadedImage};
use pdf_stamp::{Feature, Session, StampJob, TargetSpec, WorkspaceSize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdf-stamp", about = "Coloca una firma o marca de agua en páginas de un PDF")]
struct Args {
    /// PDF de entrada
    input: PathBuf,

    /// Imagen a colocar (PNG, JPG o un archivo de texto con una data: URL)
    #[arg(long, default_value = "signature.png")]
    overlay: PathBuf,

    /// "sign" (por defecto) o "watermark"
    #[arg(long)]
    feature: Option<String>,

    /// Archivo de trabajo JSON; las opciones siguientes lo sobrescriben
    #[arg(long)]
    job: Option<PathBuf>,

    /// "current", "all" o una lista de páginas como "1-3,5"
    #[arg(long)]
    pages: Option<String>,

    /// Página actual (desde 1) para --pages current
    #[arg(long)]
    page: Option<usize>,

    /// Centro, % del ancho desde la izquierda
    #[arg(long)]
    x: Option<f64>,

    /// Centro, % del alto desde arriba
    #[arg(long)]
    y: Option<f64>,

    /// Ancho en píxeles del área de trabajo
    #[arg(long)]
    width: Option<f64>,

    /// Alto en píxeles del área de trabajo
    #[arg(long)]
    height: Option<f64>,

    /// Rotación en grados, sentido horario
    #[arg(long)]
    rotation: Option<f64>,

    /// Opacidad 0.0-1.0
    #[arg(long)]
    opacity: Option<f64>,

    /// Tamaño del área de trabajo, p. ej. 612x792
    #[arg(long)]
    workspace: Option<String>,

    /// Archivo PDF de salida
    #[arg(short, long, default_value = "output_stamped.pdf")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let job = build_job(&args)?;

    println!("  Input:   {}", args.input.display());
    println!("  Imagen:  {}", args.overlay.display());
    println!("  Páginas: {:?}", job.target);
    println!("  Salida:  {}", args.output.display());
    println!();

    println!("[1/4] Leyendo el PDF...");
    let document = std::fs::read(&args.input)
        .with_context(|| format!("No se pudo abrir {}", args.input.display()))?;
    let mut session = Session::open(job.feature, document, job.workspace).map_err(user_error)?;
    println!("  {} páginas", session.page_count());

    println!("[2/4] Preparando la imagen...");
    let overlay = std::fs::read(&args.overlay)
        .with_context(|| format!("No se pudo abrir {}", args.overlay.display()))?;
    session
        .set_overlay(OverlayRaster::Uploaded(UploadedImage {
            file_name: args.overlay.display().to_string(),
            bytes: overlay,
        }))
        .map_err(user_error)?;

    println!("[3/4] Colocando la imagen...");
    session.set_current_page(job.page.saturating_sub(1));
    session.set_target(job.target.clone());
    session.editor_mut().set_placement(job.placement.clone());
    let stamped = session.apply().map_err(user_error)?;

    println!("[4/4] Escribiendo el PDF...");
    std::fs::write(&args.output, &stamped)
        .with_context(|| format!("No se pudo escribir {}", args.output.display()))?;
    println!(
        "  {} ({:.1} KB)",
        args.output.display(),
        stamped.len() as f64 / 1024.0
    );

    println!("Listo.");
    Ok(())
}

fn build_job(args: &Args) -> Result<StampJob> {
    let feature = args.feature.as_deref().map(parse_feature).transpose()?;
    let mut job = match &args.job {
        Some(path) => StampJob::load(path)?,
        None => StampJob::for_feature(feature.unwrap_or_default()),
    };
    if let Some(feature) = feature {
        job.feature = feature;
    }

    if let Some(pages) = &args.pages {
        job.target = TargetSpec::parse(pages);
    }
    if let Some(page) = args.page {
        job.page = page;
    }
    if let Some(ws) = &args.workspace {
        job.workspace = parse_workspace(ws)?;
    }

    let placement = &mut job.placement;
    let position = placement.position_percent;
    placement.position_percent = Point {
        x: args.x.unwrap_or(position.x),
        y: args.y.unwrap_or(position.y),
    };
    if let Some(w) = args.width {
        placement.size_pixels.width = w;
    }
    if let Some(h) = args.height {
        placement.size_pixels.height = h;
    }
    if let Some(r) = args.rotation {
        placement.rotation_degrees = r;
    }
    if let Some(o) = args.opacity {
        if !(0.0..=1.0).contains(&o) {
            return Err(anyhow!("--opacity debe estar entre 0 y 1"));
        }
        placement.opacity = o;
    }
    job.placement.validate().map_err(user_error)?;
    Ok(job)
}

fn parse_feature(s: &str) -> Result<Feature> {
    match s {
        "sign" => Ok(Feature::Sign),
        "watermark" => Ok(Feature::Watermark),
        other => Err(anyhow!("--feature debe ser 'sign' o 'watermark', no '{other}'")),
    }
}

fn parse_workspace(s: &str) -> Result<WorkspaceSize> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("--workspace debe tener la forma 612x792"))?;
    let w: f64 = w.trim().parse().context("ancho de --workspace")?;
    let h: f64 = h.trim().parse().context("alto de --workspace")?;
    Ok(WorkspaceSize::new(w, h)?)
}

fn user_error(e: pdf_stamp::StampError) -> anyhow::Error {
    anyhow!("{}\n  causa: {}", e.user_message(), e)
}
