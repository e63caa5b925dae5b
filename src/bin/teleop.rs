// Keyboard teleop: WASD move, Z/X rotate, R/F throttle, T drive on/off,
// O field-oriented, H heading hold, V vision track, G range hold, L wheel
// lock, P start approach, C cancel, 0 reset heading, Q quit.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use swerve_runtime::config::{TOPIC_CMD_DRIVE, TOPIC_CMD_MODE};
use swerve_runtime::input::rescale;
use swerve_runtime::messages::{DriveCommand, ModeCommand};

const THROTTLE_STEP: f64 = 0.25;
const INPUT_TIMEOUT_MS: u64 = 100; // Reset axes after this much time with no input

// Axis shaping, matching the joystick profile the robot was tuned with
const TRANSLATE_DEADZONE: f64 = 0.05;
const TWIST_DEADZONE: f64 = 0.4;
const TWIST_EXPONENTIAL: f64 = 0.3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_drive = session.declare_publisher(TOPIC_CMD_DRIVE).await?;
    let pub_mode = session.declare_publisher(TOPIC_CMD_MODE).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=throttle, T=drive on/off");
    info!("Modes: O=field-oriented, H=heading hold, V=vision, G=range hold, L=lock");
    info!("       P=start approach, C=cancel approach, 0=reset heading, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&pub_drive, &pub_mode).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    pub_drive: &zenoh::pubsub::Publisher<'_>,
    pub_mode: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut throttle: f64 = 0.25;
    let mut drive_enabled = true;

    // Persistent axis state, raw [-1, 1] before shaping
    let mut x = 0.0;
    let mut y = 0.0;
    let mut z = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        let mut mode_cmd: Option<ModeCommand> = None;

        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    // Movement - update axis and refresh timestamp
                    KeyCode::Char('w') if pressed => {
                        x = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        x = -1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        y = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        y = -1.0;
                        last_movement_input = Instant::now();
                    }

                    // Rotation
                    KeyCode::Char('z') if pressed => {
                        z = 1.0;
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('x') if pressed => {
                        z = -1.0;
                        last_movement_input = Instant::now();
                    }

                    // Throttle control
                    KeyCode::Char('r') if pressed => {
                        throttle = (throttle + THROTTLE_STEP).min(1.0);
                        info!("Throttle: {:.0}%", throttle * 100.0);
                    }
                    KeyCode::Char('f') if pressed => {
                        throttle = (throttle - THROTTLE_STEP).max(0.0);
                        info!("Throttle: {:.0}%", throttle * 100.0);
                    }
                    KeyCode::Char('t') if pressed => {
                        drive_enabled = !drive_enabled;
                        info!(
                            "Drive {}",
                            if drive_enabled { "on" } else { "off (re-point only)" }
                        );
                    }

                    // Mode toggles
                    KeyCode::Char('o') if pressed => {
                        mode_cmd = Some(ModeCommand::ToggleFieldOriented);
                    }
                    KeyCode::Char('h') if pressed => {
                        mode_cmd = Some(ModeCommand::ToggleHeadingHold);
                    }
                    KeyCode::Char('v') if pressed => {
                        mode_cmd = Some(ModeCommand::ToggleVisionTracking);
                    }
                    KeyCode::Char('g') if pressed => {
                        mode_cmd = Some(ModeCommand::ToggleRangeHold);
                    }
                    KeyCode::Char('l') if pressed => {
                        mode_cmd = Some(ModeCommand::ToggleWheelLock);
                    }
                    KeyCode::Char('p') if pressed => {
                        mode_cmd = Some(ModeCommand::StartApproach);
                    }
                    KeyCode::Char('c') if pressed => {
                        mode_cmd = Some(ModeCommand::CancelApproach);
                    }
                    KeyCode::Char('0') if pressed => {
                        mode_cmd = Some(ModeCommand::ResetHeading);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if let Some(cmd) = mode_cmd {
            info!("Mode command: {:?}", cmd);
            pub_mode.put(serde_json::to_string(&cmd)?).await?;
        }

        // Reset axes if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            x = 0.0;
            y = 0.0;
            z = 0.0;
        }

        // Always publish at ~50Hz
        let cmd = DriveCommand {
            vx: rescale(x, TRANSLATE_DEADZONE, 0.0, 1.0),
            vy: rescale(y, TRANSLATE_DEADZONE, 0.0, 1.0),
            vz: rescale(z, TWIST_DEADZONE, TWIST_EXPONENTIAL, 1.0),
            throttle: drive_enabled.then_some(throttle),
        };
        pub_drive.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}
