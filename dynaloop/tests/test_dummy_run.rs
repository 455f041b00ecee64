use anyhow::Result;
use dynaloop::{run, EnvRegistry, RunConfig, Script, EPISODES_DIR};
use dynaloop_core::replay_buffer::{episode_paths, ReplayKind};
use serde_json::Value;
use std::{fs, path::Path};
use tempdir::TempDir;

fn online_config(logdir: &Path) -> RunConfig {
    // One training iteration per step.
    RunConfig {
        task: "dummy_counter".to_string(),
        logdir: logdir.join("online"),
        script: Script::Train,
        steps: 200,
        pretrain: 2,
        train_ratio: 32.0,
        batch_size: 4,
        batch_length: 8,
        log_every: 50,
        save_every: 100,
        replay_size: 10_000,
        replay: ReplayKind::Reverb,
        sample_timeout_secs: 30.0,
        envs: 2,
        log_keys_sum: "^token$".to_string(),
        log_keys_max: "^count$".to_string(),
        seed: 1,
        ..Default::default()
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<Value>> {
    fs::read_to_string(path)?
        .lines()
        .map(|l| Ok(serde_json::from_str(l)?))
        .collect()
}

#[test]
fn test_train_then_resume() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new("dynaloop")?;
    let registry = EnvRegistry::builtin();

    let config = online_config(dir.path());
    let summary = run(&config, &registry)?;
    let rundir = config.run_dir();
    assert_eq!(summary.step, 200);
    // Steps before the first episode is committed are not trained on.
    assert!((3..=202).contains(&summary.train_steps));
    assert!(summary.real_step > 0);

    assert_eq!(RunConfig::load(rundir.join("config.yaml"))?, config);
    assert!(rundir.join("checkpoint.ckpt").is_file());
    assert!(!episode_paths(&rundir.join(EPISODES_DIR))?.is_empty());

    let metrics = read_jsonl(&rundir.join("metrics.jsonl"))?;
    assert!(metrics.iter().any(|m| m.get("train/loss").is_some()));
    assert!(metrics.iter().any(|m| m.get("replay/windows").is_some()));
    assert!(metrics.iter().any(|m| m.get("episode/score").is_some()));
    assert!(metrics.iter().any(|m| m.get("stats/sum_token").is_some()));
    assert!(metrics.iter().any(|m| m.get("stats/max_count").is_some()));
    for m in read_jsonl(&rundir.join("scores.jsonl"))? {
        for k in m.as_object().unwrap().keys() {
            assert!(["episode/score", "real_step", "step"].contains(&k.as_str()));
        }
    }

    // A longer budget resumes from the final checkpoint with the recorded
    // episodes, so training starts with the first step.
    let config = RunConfig {
        steps: 260,
        ..config
    };
    let summary = run(&config, &registry)?;
    assert_eq!(summary.step, 260);
    assert_eq!(summary.train_steps, 62);
    Ok(())
}

#[test]
fn test_train_offline_from_recorded_episodes() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new("dynaloop")?;
    let registry = EnvRegistry::builtin();

    let online = online_config(dir.path());
    run(&online, &registry)?;
    let rundir = online.run_dir();

    let config = RunConfig {
        logdir: dir.path().join("offline"),
        script: Script::TrainOffline,
        steps: 230,
        replay: ReplayKind::Uniform,
        from_checkpoint: Some(rundir.join("checkpoint.ckpt")),
        load_directories: vec![rundir.join(EPISODES_DIR)],
        ..online
    };
    let summary = run(&config, &registry)?;
    // Counters continue from the seed checkpoint.
    assert_eq!(summary.step, 230);
    assert_eq!(summary.train_steps, 32);
    assert!(config.run_dir().join("checkpoint.ckpt").is_file());
    Ok(())
}

#[test]
fn test_invalid_config_allocates_nothing() -> Result<()> {
    let dir = TempDir::new("dynaloop")?;
    let config = RunConfig {
        pretrain: 0,
        ..online_config(dir.path())
    };
    assert!(run(&config, &EnvRegistry::builtin()).is_err());
    assert!(!config.run_dir().exists());

    let config = RunConfig {
        task: "atari_pong".to_string(),
        ..online_config(dir.path())
    };
    assert!(run(&config, &EnvRegistry::builtin()).is_err());
    assert!(!config.run_dir().exists());
    Ok(())
}
