//! Layout simulator for exercising the tracking core without hardware.
//!
//! Builds a three block layout (yard, main line, station), runs a train
//! from the yard into the station through the logic task and prints every
//! event it produces. The station sits in a zone with a speed limit and
//! muted sound, so the train's policy changes on the way in.
//!
//! ```text
//!  yard [s0] B ---> A [s0 s1] main B ---> A [s0] station
//! ```
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin layout_sim --features demo
//! cargo run --bin layout_sim --features demo -- config.json
//! RUST_LOG=rs_interlock=debug cargo run --bin layout_sim --features demo
//! ```

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rs_interlock::services::{spawn, RuntimeHandle, SystemClock};
use rs_interlock::{
    BlockId, BlockSide, Config, Message, PathEnds, PathId, SensorState, TrainId, World,
    WorldCommand,
};

/// Ids of the demo layout.
struct Layout {
    yard: BlockId,
    main: BlockId,
    station: BlockId,
    yard_to_main: PathId,
    main_to_station: PathId,
    loco: TrainId,
}

fn build_layout(world: &mut World) -> anyhow::Result<Layout> {
    let yard = world.create_block("yard", 1);
    let main = world.create_block("main", 2);
    let station = world.create_block("station", 1);
    for block in [yard, main, station] {
        let inputs = world.block(block)?.inputs.len();
        for input in 0..inputs {
            world.input_changed(block, input, SensorState::Free);
        }
    }

    let yard_to_main = *world
        .update_paths(yard, vec![PathEnds::new(yard, BlockSide::B, main, BlockSide::A)])?
        .first()
        .context("yard path not created")?;
    let main_to_station = *world
        .update_paths(main, vec![PathEnds::new(main, BlockSide::B, station, BlockSide::A)])?
        .first()
        .context("main path not created")?;
    world.set_path_ready(yard_to_main, true)?;
    world.set_path_ready(main_to_station, true)?;

    let zone = world.create_zone("station area");
    world.add_block_to_zone(zone, station)?;
    world.set_zone_mute(zone, true)?;
    world.set_zone_speed_limit(zone, Some(30.0))?;

    let loco = world.create_train("BR 218");
    Ok(Layout {
        yard,
        main,
        station,
        yard_to_main,
        main_to_station,
        loco,
    })
}

async fn sensor(handle: &RuntimeHandle, block: BlockId, input: usize, value: SensorState) -> anyhow::Result<()> {
    handle
        .post(Message::SensorChanged { block, input, value })
        .await?;
    Ok(())
}

async fn command(handle: &RuntimeHandle, cmd: WorldCommand) -> anyhow::Result<()> {
    let name = cmd.name();
    let outcome = handle.command(cmd).await?;
    if !outcome.is_accepted() {
        anyhow::bail!("{name} refused");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // =========================================================================
    // Configuration
    // =========================================================================
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            Config::from_json(&json).with_context(|| format!("parsing {path}"))?
        }
        None => Config::default(),
    };
    let world_config = config
        .world
        .clone()
        .with_simulation(true)
        .with_path_release_delay_ms(config.world.path_release_delay_ms.min(500));

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log.filter.as_str())?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=================================");
    println!("  rs-interlock layout simulator");
    println!("=================================");
    println!();

    // =========================================================================
    // Logic task
    // =========================================================================
    let (handle, task) = spawn(World::new(world_config), &config.runtime, SystemClock::new());
    let mut events = handle.subscribe();
    let layout = handle
        .with_world(|world| build_layout(world).map_err(|e| e.to_string()))
        .await?
        .map_err(anyhow::Error::msg)?;

    // =========================================================================
    // Drive the train: yard -> main -> station
    // =========================================================================
    let train = layout.loco;
    command(&handle, WorldCommand::AssignTrain { block: layout.yard, train }).await?;
    command(&handle, WorldCommand::FlipTrain { block: layout.yard }).await?;
    command(
        &handle,
        WorldCommand::ReservePath {
            path: layout.yard_to_main,
            train,
            dry_run: false,
        },
    )
    .await?;
    command(&handle, WorldCommand::SetTrainPowered { train, powered: true }).await?;
    command(&handle, WorldCommand::SetTrainStopped { train, stopped: false }).await?;

    sensor(&handle, layout.main, 0, SensorState::Occupied).await?;
    sensor(&handle, layout.yard, 0, SensorState::Free).await?;

    command(
        &handle,
        WorldCommand::ReservePath {
            path: layout.main_to_station,
            train,
            dry_run: false,
        },
    )
    .await?;
    sensor(&handle, layout.main, 1, SensorState::Occupied).await?;
    sensor(&handle, layout.station, 0, SensorState::Occupied).await?;
    sensor(&handle, layout.main, 0, SensorState::Free).await?;
    sensor(&handle, layout.main, 1, SensorState::Free).await?;

    command(&handle, WorldCommand::SetTrainStopped { train, stopped: true }).await?;

    // Let the delayed path releases come due
    tokio::time::sleep(Duration::from_millis(800)).await;

    let (blocks, policy) = handle
        .with_world(move |world| {
            let blocks = world.train_blocks(train).unwrap_or_default();
            let policy = world.train(train).map(|t| t.policy).unwrap_or_default();
            (blocks, policy)
        })
        .await?;

    let world = handle.shutdown().await?;
    task.await?;

    // =========================================================================
    // Report
    // =========================================================================
    println!("Events:");
    while let Ok(event) = events.try_recv() {
        println!("  {:<24} {:?}", event.name(), event);
    }
    println!();
    println!("Train {train} holds {blocks:?}");
    println!(
        "Policy: mute={} no_smoke={} speed_limit={:?}",
        policy.mute, policy.no_smoke, policy.speed_limit
    );
    for block in world.blocks() {
        println!("  {:<8} {}", block.name, block.state.as_str());
    }
    println!("Pending releases: {}", world.pending_releases().len());
    Ok(())
}
