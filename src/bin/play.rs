use std::{
    cell::RefCell,
    path::PathBuf,
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

use ::rand::{SeedableRng, rngs::StdRng};
use anyhow::{Context, Result};
use clap::Parser;
use macroquad::prelude::*;
use tracing::{error, info};

use snake_rl::{
    Agent, Config, DqnAgent, Frame, GridWorld, LoadPolicy, Presenter, Sequential,
    game::Direction,
    persistence::restore_estimator,
};

const SCORE_AREA_HEIGHT: f32 = 60.0;
const SCORE_TEXT_SIZE: f32 = 40.0;
const CELL_SIZE: i32 = 15;
const WINDOW_CELLS_WIDE: i32 = 72;
const WINDOW_CELLS_HIGH: i32 = 32;
const AGENT_TICK_SPEED: f32 = 0.05; // seconds
const GAME_OVER_PAUSE: f32 = 1.0; // seconds

#[derive(Parser)]
#[command(name = "play")]
#[command(version, about = "Watch a trained DQN agent play snake")]
struct Cli {
    /// JSON config used for training; the grid and network must match the model
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "input/snake_agent.bin")]
    model: PathBuf,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "snake_rl".to_owned(),
        window_width: WINDOW_CELLS_WIDE * CELL_SIZE,
        window_height: (SCORE_AREA_HEIGHT as i32) + WINDOW_CELLS_HIGH * CELL_SIZE,
        window_resizable: false,
        ..Default::default()
    }
}

/// Keeps the latest frame for the draw loop.
struct Screen {
    latest: Rc<RefCell<Option<Frame>>>,
}

impl Presenter for Screen {
    fn present(&mut self, frame: &Frame) {
        *self.latest.borrow_mut() = Some(frame.clone());
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    snake_rl::logging::init();

    if let Err(err) = run().await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the epoch")?
        .as_secs();

    let mut world = GridWorld::new(&config.env, seed)?;
    let mut network = Sequential::from_config(
        &config.dqn,
        world.feature_count(),
        Direction::COUNT,
        &mut StdRng::seed_from_u64(seed),
    );
    restore_estimator(&mut network, &cli.model, LoadPolicy::Require)
        .with_context(|| format!("loading model {}", cli.model.display()))?;
    let mut agent = DqnAgent::new(network, &config.dqn, seed)?;
    agent.set_epsilon(0.0);
    info!(model = %cli.model.display(), "playing greedily");

    let latest = Rc::new(RefCell::new(None));
    world.attach_presenter(Box::new(Screen {
        latest: Rc::clone(&latest),
    }));

    let mut state = world.reset();
    world.render();
    let mut time_accumulator: f32 = 0.0;
    let mut game_over_timer: f32 = 0.0;

    loop {
        time_accumulator += get_frame_time();

        if world.is_done() {
            game_over_timer += get_frame_time();
            if game_over_timer >= GAME_OVER_PAUSE {
                info!(score = world.state().score(), "game over");
                state = world.reset();
                world.render();
                game_over_timer = 0.0;
                time_accumulator = 0.0;
            }
        } else {
            while time_accumulator >= AGENT_TICK_SPEED && !world.is_done() {
                time_accumulator -= AGENT_TICK_SPEED;
                let action = agent.greedy_action(&state)?;
                state = world.step(action)?.features;
                world.render();
            }
        }

        clear_background(Color::new(0.85, 0.85, 0.85, 1.0));
        if let Some(frame) = latest.borrow().as_ref() {
            draw_frame(frame, world.is_done());
        }

        next_frame().await
    }
}

fn draw_frame(frame: &Frame, game_over: bool) {
    let screen_w = screen_width();
    let screen_h = screen_height();

    // score area

    let score_area = Rect::new(0.0, 0.0, screen_w, SCORE_AREA_HEIGHT);
    draw_rectangle(
        score_area.x,
        score_area.y,
        score_area.w,
        score_area.h,
        Color::new(0.1, 0.1, 0.2, 1.0),
    );
    draw_line(score_area.x, score_area.h, screen_w, score_area.h, 2.0, BLACK);

    let score_text = if game_over {
        format!("Game over! Score: {}", frame.score)
    } else {
        format!("Score: {}", frame.score)
    };
    let text_dims = measure_text(&score_text, None, SCORE_TEXT_SIZE as u16, 1.0);
    draw_text(
        &score_text,
        score_area.w / 2.0 - text_dims.width / 2.0,
        score_area.y + score_area.h / 2.0 + text_dims.height / 2.0,
        SCORE_TEXT_SIZE,
        WHITE,
    );

    // game area

    let game_area = Rect::new(0.0, score_area.h, screen_w, screen_h - score_area.h);
    let cell_width = game_area.w / frame.width as f32;
    let cell_height = game_area.h / frame.height as f32;
    let grid_line_color = Color::new(0.4, 0.4, 0.4, 0.3);

    for i in 1..frame.width {
        let x = game_area.x + i as f32 * cell_width;
        draw_line(x, game_area.y, x, game_area.y + game_area.h, 1.0, grid_line_color);
    }
    for i in 1..frame.height {
        let y = game_area.y + i as f32 * cell_height;
        draw_line(game_area.x, y, game_area.x + game_area.w, y, 1.0, grid_line_color);
    }

    let draw_cell = |cell: (i32, i32), border: Color, fill: Color| {
        let cell_fill_border: f32 = 2.0;
        let x = game_area.x + cell.0 as f32 * cell_width;
        let y = game_area.y + cell.1 as f32 * cell_height;
        draw_rectangle(x, y, cell_width - 1.0, cell_height - 1.0, border);
        draw_rectangle(
            x + cell_fill_border,
            y + cell_fill_border,
            (cell_width - 1.0) - cell_fill_border * 2.0,
            (cell_height - 1.0) - cell_fill_border * 2.0,
            fill,
        );
    };

    if let Some(food) = frame.food {
        draw_cell(food, Color::new(0.5, 0.0, 0.0, 1.0), RED);
    }
    for &segment in &frame.body {
        draw_cell(segment, DARKGREEN, GREEN);
    }
    draw_cell(frame.head, DARKGREEN, LIME);
}
