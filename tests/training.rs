use rand::{SeedableRng, rngs::StdRng};

use snake_rl::{
    Agent, Config, DqnAgent, Direction, EpisodeEnd, EpisodeLog, GridWorld, LoadPolicy, QEstimator, Sequential,
    TabularAgent, TrainingLoop,
    persistence::{load_parameters, load_q_table, restore_estimator},
};

fn small_config() -> Config {
    let mut config = Config::default();
    config.seed = 17;
    config.env.width = 8;
    config.env.height = 8;
    config.training.episodes = 6;
    config.training.max_steps_per_episode = 40;
    config.training.target_sync_every = 2;
    config.dqn.hidden_layers = vec![16];
    config.dqn.batch_size = 8;
    config.dqn.buffer_capacity = 200;
    config.dqn.epsilon_decay = 0.9;
    config.validate().unwrap();
    config
}

fn network(config: &Config, features: usize, seed: u64) -> Sequential {
    Sequential::from_config(&config.dqn, features, Direction::COUNT, &mut StdRng::seed_from_u64(seed))
}

#[test]
fn dqn_training_run_saves_a_loadable_model() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("dqn.bin");
    let csv = dir.path().join("episodes.csv");
    let config = small_config();

    let mut world = GridWorld::new(&config.env, config.seed).unwrap();
    let features = world.feature_count();
    let mut agent = DqnAgent::new(network(&config, features, 1), &config.dqn, config.seed).unwrap();
    let mut log = EpisodeLog::create(&csv).unwrap();

    let report = TrainingLoop::new(config.training.clone())
        .unwrap()
        .save_to(&model)
        .run(&mut world, &mut agent, |summary| log.record(summary))
        .unwrap();

    assert_eq!(report.len(), 6);
    for summary in &report.episodes {
        assert!(summary.steps >= 1 && summary.steps <= 40);
        assert!(summary.epsilon <= 1.0);
        if summary.end == EpisodeEnd::StepCap {
            assert_eq!(summary.steps, 40);
        }
    }
    assert!(agent.updates() > 0, "no learning happened");
    assert!(agent.epsilon() < 1.0);
    assert!(agent.epsilon() >= config.dqn.epsilon_min);

    let rows = std::fs::read_to_string(&csv).unwrap().lines().count();
    assert_eq!(rows, 7);

    let parameters = load_parameters(&model, features, Direction::COUNT).unwrap();
    assert_eq!(parameters, agent.online().parameters());

    let mut restored = network(&config, features, 2);
    assert!(restore_estimator(&mut restored, &model, LoadPolicy::Require).unwrap());
    let state = vec![world.reset()];
    let mut online = agent.online().clone();
    assert_eq!(restored.predict(&state).unwrap(), online.predict(&state).unwrap());
}

#[test]
fn greedy_evaluation_leaves_the_model_untouched() {
    let config = small_config();
    let mut world = GridWorld::new(&config.env, config.seed).unwrap();
    let features = world.feature_count();
    let mut agent = DqnAgent::new(network(&config, features, 3), &config.dqn, config.seed).unwrap();
    let before = agent.online().parameters();

    let report = TrainingLoop::new(config.training.clone())
        .unwrap()
        .evaluate(&mut world, &mut agent, 3)
        .unwrap();

    assert_eq!(report.len(), 3);
    assert!(agent.replay().is_empty());
    assert_eq!(agent.online().parameters(), before);
}

#[test]
fn tabular_training_run_saves_its_table() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("table.bin");
    let mut config = small_config();
    config.training.episodes = 20;

    let mut world = GridWorld::new(&config.env, config.seed).unwrap();
    let mut agent = TabularAgent::new(&config.tabular, config.seed);

    let report = TrainingLoop::new(config.training.clone())
        .unwrap()
        .save_to(&location)
        .run(&mut world, &mut agent, |_| Ok(()))
        .unwrap();

    assert_eq!(report.len(), 20);
    assert!(!agent.q_table().is_empty());

    let table = load_q_table(&location).unwrap();
    assert_eq!(table.len(), agent.q_table().len());
}

#[test]
fn missing_model_requires_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nothing-here.bin");
    let config = small_config();
    let mut estimator = network(&config, 11, 4);

    assert!(matches!(
        restore_estimator(&mut estimator, &missing, LoadPolicy::Require),
        Err(snake_rl::Error::ModelNotFound { .. })
    ));
    assert!(!restore_estimator(&mut estimator, &missing, LoadPolicy::FreshIfMissing).unwrap());
}
