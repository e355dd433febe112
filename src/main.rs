use anyhow::{Context, Result};
use avatar_retarget::config::Config;
use avatar_retarget::pose::decode_frame;
use avatar_retarget::rig::{BoneRole, Rig, RigBinding, Skeleton};
use avatar_retarget::tracker::{FrameFeed, FrameSlot, IkGoal, IkGoals, StreamSmoother};
use avatar_retarget::Retargeter;
use clap::Parser;
use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "avatar-retarget", version, about = "Replay landmark payloads onto a humanoid rig")]
struct Cli {
    /// Config file (defaults are used if missing)
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// One JSON pose payload per line
    #[arg(long)]
    input: PathBuf,

    /// Tick rate used for the replay
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Output JSON lines (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct GoalRecord {
    position: [f32; 3],
    rotation: [f32; 4],
}

#[derive(Serialize)]
struct IkRecord {
    left_hand: GoalRecord,
    right_hand: GoalRecord,
    left_foot: GoalRecord,
    right_foot: GoalRecord,
    look_at: [f32; 3],
}

#[derive(Serialize)]
struct TickRecord {
    tick: usize,
    timestamp: Option<f64>,
    root_position: [f32; 3],
    root_rotation: [f32; 4],
    bones: BTreeMap<&'static str, [f32; 4]>,
    ik: IkRecord,
}

fn vec3(v: &Vector3<f32>) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// [x, y, z, w]
fn quat(q: &UnitQuaternion<f32>) -> [f32; 4] {
    let c = q.quaternion().coords;
    [c.x, c.y, c.z, c.w]
}

fn goal(g: &IkGoal) -> GoalRecord {
    GoalRecord {
        position: vec3(&g.position),
        rotation: quat(&g.rotation),
    }
}

fn ik_record(goals: &IkGoals) -> IkRecord {
    IkRecord {
        left_hand: goal(&goals.left_hand),
        right_hand: goal(&goals.right_hand),
        left_foot: goal(&goals.left_foot),
        right_foot: goal(&goals.right_foot),
        look_at: vec3(&goals.look_at.position),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_retarget=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);
    let dt = if cli.fps > 0.0 { 1.0 / cli.fps } else { 1.0 / 60.0 };

    let mut rig = Skeleton::humanoid();
    let binding = RigBinding::from_names(&rig);
    let mut engine = Retargeter::bind(&rig, binding, &config).context("Failed to bind humanoid rig")?;
    let hips = engine
        .binding()
        .bone(BoneRole::Hips)
        .context("Hips bone not bound")?;

    let slot = FrameSlot::new();
    let mut feed = FrameFeed::new(StreamSmoother::from_config(&config.stream), slot.clone());

    let input = File::open(&cli.input)
        .with_context(|| format!("Failed to open input: {}", cli.input.display()))?;
    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    info!("Replaying {} at {:.0} fps", cli.input.display(), cli.fps);

    let mut ticks = 0;
    let mut skipped = 0;
    for (line_no, line) in BufReader::new(input).lines().enumerate() {
        let line = line.context("Failed to read input line")?;
        if line.trim().is_empty() {
            continue;
        }
        match decode_frame(&line) {
            Ok(Some(frame)) => feed.push(&frame),
            Ok(None) => {}
            Err(e) => {
                warn!("line {}: {:#}", line_no + 1, e);
                skipped += 1;
            }
        }

        let snapshot = slot.snapshot();
        let report = engine.tick(&mut rig, snapshot.as_deref(), dt);

        let bones = engine
            .binding()
            .bones()
            .map(|(role, bone)| (role.bone_name(), quat(&rig.local_rotation(bone))))
            .collect();
        let record = TickRecord {
            tick: ticks,
            timestamp: snapshot.as_ref().map(|f| f.timestamp),
            root_position: vec3(&rig.world_position(hips)),
            root_rotation: quat(&rig.world_rotation(hips)),
            bones,
            ik: ik_record(&report.goals),
        };
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
        ticks += 1;
    }
    out.flush()?;

    info!("Done: {} ticks, {} payloads skipped", ticks, skipped);
    Ok(())
}
